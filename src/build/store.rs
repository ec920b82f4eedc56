//! Descriptor documents addressed by descriptor key

use crate::fs::FileSystem;
use crate::reconcile::{apply, Mutation};
use crate::xml::descriptor::COMPONENT;
use crate::xml::{parse, to_xml_string, DocumentError, Node};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Storage of descriptor documents
///
/// Keys are project-relative paths such as `OSGI-INF/com.acme.Foo.xml`.
pub trait DocumentStore: Send {
    fn exists(&self, key: &str) -> bool;

    /// Raw document text, `None` when there is no document
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes `mutations` applied to `base`; nothing is written if any
    /// mutation fails
    fn commit(&mut self, key: &str, base: &Node, mutations: &[Mutation]) -> Result<()>;

    /// Returns whether a document was removed
    fn delete(&mut self, key: &str) -> Result<bool>;

    /// Moves a document; returns `false` when `from` is missing or `to` exists
    fn rename(&mut self, from: &str, to: &str) -> Result<bool>;

    /// Parsed document whose root is a component element
    fn parse(&self, key: &str) -> Result<Option<Node>> {
        let Some(text) = self.get(key)? else {
            return Ok(None);
        };
        let root = parse(&text).with_context(|| format!("Failed to parse {}", key))?;
        if root.local_name() != COMPONENT {
            return Err(DocumentError::NotAComponent(root.tag)).with_context(|| format!("Unexpected content in {}", key));
        }
        Ok(Some(root))
    }
}

/// Store over a project directory
pub struct FsDocumentStore {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl AsRef<Path>) -> Self {
        Self {
            fs,
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn ensure_parent(&self, path: &Path) -> Result<()> {
        match path.parent() {
            Some(parent) if !self.fs.exists(parent) => self.fs.create_dir_all(parent),
            _ => Ok(()),
        }
    }
}

impl DocumentStore for FsDocumentStore {
    fn exists(&self, key: &str) -> bool {
        self.fs.is_file(&self.path(key))
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path(key);
        if !self.fs.is_file(&path) {
            return Ok(None);
        }
        self.fs.read_to_string(&path).map(Some)
    }

    fn commit(&mut self, key: &str, base: &Node, mutations: &[Mutation]) -> Result<()> {
        let document = apply(base, mutations).with_context(|| format!("Failed to update {}", key))?;
        let text = to_xml_string(&document).with_context(|| format!("Failed to serialize {}", key))?;
        let path = self.path(key);
        self.ensure_parent(&path)?;
        self.fs.write(&path, &text)
    }

    fn delete(&mut self, key: &str) -> Result<bool> {
        let path = self.path(key);
        if !self.fs.is_file(&path) {
            return Ok(false);
        }
        self.fs.remove_file(&path)?;
        Ok(true)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<bool> {
        let (source, target) = (self.path(from), self.path(to));
        if !self.fs.is_file(&source) || self.fs.exists(&target) {
            return Ok(false);
        }
        self.ensure_parent(&target)?;
        self.fs.rename(&source, &target)?;
        Ok(true)
    }
}
