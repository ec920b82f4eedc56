//! One build pass over a source snapshot
//!
//! Units are extracted concurrently, bounded by the configured parallelism.
//! Each descriptor is reconciled and committed through the [`Coordinator`] as a
//! single job. Outputs that no unit claims any more are deleted once every unit
//! has been processed, and the project index is persisted at the end.

use super::bundle::{update_bundle, BundleUpdate, SERVICE_COMPONENT_HEADER};
use super::cancel::CancelToken;
use super::coordinator::{on_store, CommitError, Coordinator};
use super::index::{IndexSettings, ProjectIndex, UnitOutputs};
use crate::config::ScrgenConfig;
use crate::diagnostics::{Diagnostic, Severity};
use crate::extractor::{descriptor_key, ComponentModelExtractor, ExtractorOptions, UnitExtraction};
use crate::fs::FileSystem;
use crate::model::descriptor::ComponentDescriptor;
use crate::model::hierarchy::TypeIndex;
use crate::model::source::SourceSnapshot;
use crate::reconcile::{empty_document, reconcile};
use crate::version::SpecVersion;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorStatus {
    Created,
    Updated,
    Unchanged,
    /// Moved from the path of the component's previous name, then reconciled
    Renamed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorReport {
    pub component: String,
    pub implementation: String,
    pub key: String,
    pub version: SpecVersion,
    pub status: DescriptorStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReport {
    pub key: String,
    pub descriptors: Vec<DescriptorReport>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub units: Vec<UnitReport>,
    /// Descriptor keys still produced by some unit, sorted
    pub retained: Vec<String>,
    pub deleted: Vec<String>,
    /// Value for the `Service-Component` manifest header
    pub service_component: String,
    pub cancelled: bool,
    pub full_rebuild: bool,
    /// Bundle files rewritten to list the retained descriptors
    #[serde(default)]
    pub bundle: BundleUpdate,
}

impl BatchReport {
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.units.iter().flat_map(|u| u.diagnostics.iter())
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics().filter(|d| d.severity == Severity::Error).count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics().filter(|d| d.severity == Severity::Warning).count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &DescriptorReport> {
        self.units
            .iter()
            .flat_map(|u| u.descriptors.iter())
            .filter(|d| d.status == DescriptorStatus::Failed)
    }

    /// `Service-Component: a.xml,\n b.xml` with manifest continuation lines
    pub fn manifest_header(&self) -> Option<String> {
        if self.retained.is_empty() {
            None
        } else {
            Some(format!("{}: {}", SERVICE_COMPONENT_HEADER, self.retained.join(",\n ")))
        }
    }
}

/// Shared by the unit tasks of one pass
struct UnitContext {
    snapshot: Arc<SourceSnapshot>,
    types: TypeIndex,
    options: ExtractorOptions,
    fs: Arc<dyn FileSystem>,
    project_dir: PathBuf,
    output_path: String,
    previous: ProjectIndex,
    coordinator: Arc<dyn Coordinator>,
    cancel: CancelToken,
    fresh: bool,
    /// Unit key to the outputs it produced in this pass
    produced: Mutex<BTreeMap<String, UnitOutputs>>,
    /// Descriptor keys written in this pass; updated only from store jobs
    claimed: Arc<Mutex<BTreeSet<String>>>,
}

pub struct Batch {
    options: ExtractorOptions,
    settings: IndexSettings,
    output_path: String,
    parallelism: usize,
    index_path: PathBuf,
    project_dir: PathBuf,
    fs: Arc<dyn FileSystem>,
    full: bool,
    activation_policy: bool,
}

impl Batch {
    pub fn new(config: &ScrgenConfig, project_dir: impl AsRef<Path>, fs: Arc<dyn FileSystem>) -> Self {
        let project_dir = project_dir.as_ref().to_path_buf();
        Self {
            options: config.extractor_options(),
            settings: config.index_settings(),
            output_path: config.output_path.trim_matches('/').to_string(),
            parallelism: config.parallelism.max(1),
            index_path: project_dir.join(&config.index_file),
            project_dir,
            fs,
            full: false,
            activation_policy: config.activation_policy,
        }
    }

    /// Regenerates every descriptor from an empty document instead of
    /// reconciling into the existing one
    pub fn full(mut self, full: bool) -> Self {
        self.full = full;
        self
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Extracts every unit without touching any document
    pub fn check(&self, snapshot: &SourceSnapshot) -> Vec<UnitExtraction> {
        let types = TypeIndex::from_snapshot(snapshot);
        let extractor = ComponentModelExtractor::new(&types, self.options, self.fs.as_ref(), &self.project_dir);
        snapshot.units.iter().map(|unit| extractor.extract_unit(unit)).collect()
    }

    fn load_index(&self) -> ProjectIndex {
        match ProjectIndex::load(self.fs.as_ref(), &self.index_path) {
            Ok(index) => index,
            Err(e) => {
                warn!("{}; rebuilding from scratch", e);
                ProjectIndex::default()
            }
        }
    }

    pub async fn run(
        &self,
        snapshot: Arc<SourceSnapshot>,
        coordinator: Arc<dyn Coordinator>,
        cancel: &CancelToken,
    ) -> BatchReport {
        let previous = self.load_index();
        let full_rebuild = self.full || !previous.is_current(&self.settings);
        info!(
            units = snapshot.units.len(),
            full_rebuild,
            "Building descriptors into {}",
            self.project_dir.join(&self.output_path).display()
        );

        let context = Arc::new(UnitContext {
            types: TypeIndex::from_snapshot(&snapshot),
            snapshot: snapshot.clone(),
            options: self.options,
            fs: self.fs.clone(),
            project_dir: self.project_dir.clone(),
            output_path: self.output_path.clone(),
            previous: previous.clone(),
            coordinator: coordinator.clone(),
            cancel: cancel.clone(),
            fresh: self.full,
            produced: Mutex::new(BTreeMap::new()),
            claimed: Arc::new(Mutex::new(BTreeSet::new())),
        });

        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut tasks = JoinSet::new();
        for position in 0..snapshot.units.len() {
            let context = context.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                process_unit(&context, position).await
            });
        }

        let mut units = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(report)) => units.push(report),
                Ok(None) => {}
                Err(e) => warn!("Unit task failed: {}", e),
            }
        }
        units.sort_by(|a, b| a.key.cmp(&b.key));

        let cancelled = cancel.is_cancelled();
        let produced = std::mem::take(&mut *context.produced.lock().unwrap_or_else(|p| p.into_inner()));
        let index = next_index(&self.settings, &snapshot, &previous, produced, cancelled);

        let retained = index.descriptor_keys();
        let abandoned: Vec<String> = previous.descriptor_keys().difference(&retained).cloned().collect();
        let mut deleted = Vec::new();
        if cancelled {
            info!("Build cancelled; abandoned descriptors are kept until the next pass");
        } else {
            for key in &abandoned {
                let target = key.clone();
                match on_store(coordinator.as_ref(), cancel, move |store| store.delete(&target)).await {
                    Ok(true) => {
                        debug!("Deleted abandoned descriptor {}", key);
                        deleted.push(key.clone());
                    }
                    Ok(false) => {}
                    Err(e) => warn!("Failed to delete {}: {}", key, e),
                }
            }
        }

        if index != previous {
            match index.save(self.fs.as_ref(), &self.index_path) {
                Ok(()) => debug!("Saved project index to {}", self.index_path.display()),
                Err(e) => warn!("{}", e),
            }
        }

        let retained: Vec<String> = retained.into_iter().collect();
        let bundle = if cancelled || (retained.is_empty() && abandoned.is_empty()) {
            BundleUpdate::default()
        } else {
            update_bundle(
                self.fs.as_ref(),
                &self.project_dir,
                &retained,
                &abandoned,
                self.activation_policy,
            )
        };

        let report = BatchReport {
            units,
            service_component: retained.join(","),
            retained,
            deleted,
            cancelled,
            full_rebuild,
            bundle,
        };
        info!(
            descriptors = report.retained.len(),
            deleted = report.deleted.len(),
            errors = report.error_count(),
            warnings = report.warning_count(),
            "Build finished"
        );
        report
    }
}

/// Outputs recorded for the next pass
///
/// Units that were not processed because of cancellation keep their previous
/// outputs, including units that no longer exist.
fn next_index(
    settings: &IndexSettings,
    snapshot: &SourceSnapshot,
    previous: &ProjectIndex,
    mut produced: BTreeMap<String, UnitOutputs>,
    cancelled: bool,
) -> ProjectIndex {
    let mut index = ProjectIndex::new(settings.clone());
    let present: BTreeSet<&str> = snapshot.units.iter().map(|u| u.key.as_str()).collect();

    for unit in &snapshot.units {
        if let Some(outputs) = produced.remove(&unit.key) {
            index.set_unit(unit.key.clone(), outputs);
        } else if let Some(outputs) = previous.unit(&unit.key) {
            index.set_unit(unit.key.clone(), outputs.clone());
        }
    }
    if cancelled {
        for (key, outputs) in previous.units() {
            if !present.contains(key.as_str()) {
                index.set_unit(key.clone(), outputs.clone());
            }
        }
    }
    index
}

async fn process_unit(context: &UnitContext, position: usize) -> Option<UnitReport> {
    let unit = &context.snapshot.units[position];
    if context.cancel.is_cancelled() {
        debug!("Skipping {}: build cancelled", unit.key);
        return None;
    }

    let extraction = {
        let extractor = ComponentModelExtractor::new(
            &context.types,
            context.options,
            context.fs.as_ref(),
            &context.project_dir,
        );
        extractor.extract_unit(unit)
    };

    let previous = context.previous.unit(&unit.key).cloned().unwrap_or_default();
    let mut outputs = UnitOutputs::new();
    let mut descriptors = Vec::new();
    let mut interrupted = false;

    for descriptor in &extraction.descriptors {
        let key = descriptor_key(&context.output_path, &descriptor.name);
        let renamed_from = previous
            .get(&descriptor.implementation)
            .filter(|old| **old != key)
            .cloned();
        outputs.insert(descriptor.implementation.clone(), key.clone());

        let (status, error) = match commit_descriptor(context, descriptor.clone(), key.clone(), renamed_from).await {
            Ok(status) => {
                debug!("{} {:?}", key, status);
                (status, None)
            }
            Err(e) => {
                if matches!(e, CommitError::Cancelled) {
                    interrupted = true;
                }
                warn!("Failed to write {}: {}", key, e);
                (DescriptorStatus::Failed, Some(e.to_string()))
            }
        };
        descriptors.push(DescriptorReport {
            component: descriptor.name.clone(),
            implementation: descriptor.implementation.clone(),
            key,
            version: descriptor.version,
            status,
            error,
        });
    }

    if !interrupted {
        context
            .produced
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(unit.key.clone(), outputs);
    }

    Some(UnitReport {
        key: unit.key.clone(),
        descriptors,
        diagnostics: extraction.diagnostics,
    })
}

/// Renames, reconciles and writes one descriptor as a single store job
///
/// A previous path is only moved while no other descriptor of this pass has
/// claimed it.
async fn commit_descriptor(
    context: &UnitContext,
    descriptor: ComponentDescriptor,
    key: String,
    renamed_from: Option<String>,
) -> Result<DescriptorStatus, CommitError> {
    let fresh = context.fresh;
    let claimed = context.claimed.clone();
    on_store(context.coordinator.as_ref(), &context.cancel, move |store| {
        let movable = {
            let mut claimed = claimed.lock().unwrap_or_else(|p| p.into_inner());
            claimed.insert(key.clone());
            renamed_from.filter(|old| !claimed.contains(old))
        };

        let mut renamed = false;
        if let Some(old) = &movable {
            if !store.exists(&key) && store.rename(old, &key)? {
                debug!("Moved {} to {}", old, key);
                renamed = true;
            }
        }

        let existed = store.exists(&key);
        let existing = if fresh {
            None
        } else {
            store.parse(&key).unwrap_or_else(|e| {
                warn!("Replacing unreadable descriptor: {:#}", e);
                None
            })
        };
        let base = existing.unwrap_or_else(empty_document);
        let reconciliation = reconcile(&descriptor, Some(&base))?;

        if existed && reconciliation.is_unchanged() {
            return Ok(if renamed {
                DescriptorStatus::Renamed
            } else {
                DescriptorStatus::Unchanged
            });
        }
        store.commit(&key, &base, &reconciliation.mutations)?;
        Ok(match (renamed, existed) {
            (true, _) => DescriptorStatus::Renamed,
            (false, true) => DescriptorStatus::Updated,
            (false, false) => DescriptorStatus::Created,
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ValidationLevel;

    fn settings() -> IndexSettings {
        IndexSettings {
            output_path: "OSGI-INF".into(),
            spec_version: SpecVersion::V1_4,
            validation_level: ValidationLevel::Error,
            missing_unbind_level: ValidationLevel::Error,
        }
    }

    fn outputs(pairs: &[(&str, &str)]) -> UnitOutputs {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn snapshot(keys: &[&str]) -> SourceSnapshot {
        SourceSnapshot::from_json(&format!(
            "{{\"units\": [{}]}}",
            keys.iter()
                .map(|k| format!("{{\"key\": \"{}\"}}", k))
                .collect::<Vec<_>>()
                .join(",")
        ))
        .unwrap()
    }

    #[test]
    fn test_next_index_drops_removed_units() {
        let mut previous = ProjectIndex::new(settings());
        previous.set_unit("a.java", outputs(&[("A", "OSGI-INF/a.xml")]));
        previous.set_unit("gone.java", outputs(&[("G", "OSGI-INF/g.xml")]));

        let produced = BTreeMap::from([("a.java".to_string(), outputs(&[("A", "OSGI-INF/a2.xml")]))]);
        let index = next_index(&settings(), &snapshot(&["a.java"]), &previous, produced, false);
        assert_eq!(
            index.descriptor_keys().into_iter().collect::<Vec<_>>(),
            vec!["OSGI-INF/a2.xml"]
        );
    }

    #[test]
    fn test_next_index_keeps_unprocessed_when_cancelled() {
        let mut previous = ProjectIndex::new(settings());
        previous.set_unit("a.java", outputs(&[("A", "OSGI-INF/a.xml")]));
        previous.set_unit("b.java", outputs(&[("B", "OSGI-INF/b.xml")]));
        previous.set_unit("gone.java", outputs(&[("G", "OSGI-INF/g.xml")]));

        let produced = BTreeMap::from([("a.java".to_string(), outputs(&[("A", "OSGI-INF/a.xml")]))]);
        let index = next_index(&settings(), &snapshot(&["a.java", "b.java"]), &previous, produced, true);
        assert_eq!(index.descriptor_keys().len(), 3);
    }

    #[test]
    fn test_manifest_header() {
        let mut report = BatchReport::default();
        assert_eq!(report.manifest_header(), None);
        report.retained = vec!["OSGI-INF/a.xml".into(), "OSGI-INF/b.xml".into()];
        assert_eq!(
            report.manifest_header().as_deref(),
            Some("Service-Component: OSGI-INF/a.xml,\n OSGI-INF/b.xml")
        );
    }
}
