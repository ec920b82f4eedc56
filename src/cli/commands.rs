use crate::diagnostics::ValidationLevel;
use crate::version::SpecVersion;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Compiles Declarative Services annotations into component descriptors
#[derive(Parser, Debug)]
#[command(
    name = "scrgen",
    about = "Compiles Declarative Services annotations into component descriptors",
    version,
    author,
    long_about = "scrgen reads a source snapshot of annotated Java types (JSON or YAML), \
                  validates the component annotations and writes one OSGi component \
                  descriptor per component, updating existing descriptors in place."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - only log errors"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Generate descriptors for a source snapshot",
        long_about = "Extracts every annotated component of the snapshot and reconciles its \
                      descriptor under the output path. Descriptors of removed or renamed \
                      components are moved or deleted.\n\n\
                      Examples:\n  \
                      scrgen build snapshot.json\n  \
                      scrgen build snapshots/ --project-dir bundle --format json\n  \
                      scrgen build snapshot.yaml --spec-version 1.3 --full"
    )]
    Build(BuildArgs),

    #[command(
        about = "Validate a source snapshot without writing descriptors",
        long_about = "Runs the same extraction and validation as build and reports \
                      diagnostics and the descriptors that would be written.\n\n\
                      Examples:\n  \
                      scrgen check snapshot.json\n  \
                      scrgen check snapshot.json --validation-level warning"
    )]
    Check(CheckArgs),

    #[command(
        about = "Print the property name generated for an annotation member",
        long_about = "Applies the component property type naming rules.\n\n\
                      Examples:\n  \
                      scrgen name service_ranking\n  \
                      scrgen name value --prefix my. --class-name\n  \
                      scrgen name '$_$' --spec-version 1.4"
    )]
    Name(NameArgs),
}

/// Options shared by build and check
#[derive(Parser, Debug, Clone)]
pub struct ProjectArgs {
    #[arg(
        value_name = "SNAPSHOT",
        help = "Source snapshot file (.json, .yaml) or a directory of snapshot files"
    )]
    pub snapshot: PathBuf,

    #[arg(
        short = 'p',
        long,
        value_name = "DIR",
        help = "Project directory (defaults to current directory)"
    )]
    pub project_dir: Option<PathBuf>,

    #[arg(long, value_name = "PATH", help = "Descriptor folder relative to the project")]
    pub output_path: Option<String>,

    #[arg(long, value_name = "VERSION", value_parser = parse_spec_version, help = "Highest annotation version recognized (1.3 or 1.4)")]
    pub spec_version: Option<SpecVersion>,

    #[arg(long, value_name = "LEVEL", value_parser = parse_validation_level, help = "error, warning or ignore")]
    pub validation_level: Option<ValidationLevel>,

    #[arg(long, value_name = "LEVEL", value_parser = parse_validation_level, help = "Severity of a missing implicit unbind method")]
    pub missing_unbind_level: Option<ValidationLevel>,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    #[arg(long, help = "Regenerate every descriptor instead of updating it in place")]
    pub full: bool,

    #[arg(long, value_name = "SECONDS", help = "Bound on waiting for one descriptor write")]
    pub commit_timeout: Option<u64>,

    #[arg(long, value_name = "N", help = "Units processed concurrently")]
    pub parallelism: Option<usize>,
}

#[derive(Parser, Debug, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct NameArgs {
    #[arg(value_name = "IDENTIFIER", help = "Annotation member or simple class name")]
    pub identifier: String,

    #[arg(long, value_name = "PREFIX", help = "Property prefix of the annotation type")]
    pub prefix: Option<String>,

    #[arg(long, value_name = "VERSION", value_parser = parse_spec_version, default_value = "1.4", help = "Naming rules version")]
    pub spec_version: SpecVersion,

    #[arg(long, help = "Map a single-element annotation's class name instead of a member")]
    pub class_name: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

fn parse_spec_version(s: &str) -> Result<SpecVersion, String> {
    s.parse().map_err(|e| format!("{}", e))
}

fn parse_validation_level(s: &str) -> Result<ValidationLevel, String> {
    s.parse()
        .map_err(|_| format!("Invalid level: {}. Valid options: error, warning, ignore", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_default_build_args() {
        let args = CliArgs::parse_from(["scrgen", "build", "snapshot.json"]);
        match args.command {
            Commands::Build(build) => {
                assert_eq!(build.project.snapshot, PathBuf::from("snapshot.json"));
                assert_eq!(build.project.format, OutputFormatArg::Human);
                assert!(build.project.project_dir.is_none());
                assert!(build.project.spec_version.is_none());
                assert!(!build.full);
            }
            _ => panic!("Expected Build command"),
        }
    }

    #[test]
    fn test_build_overrides() {
        let args = CliArgs::parse_from([
            "scrgen",
            "build",
            "snap.yaml",
            "--spec-version",
            "1.3",
            "--validation-level",
            "warning",
            "--format",
            "json",
            "--full",
        ]);
        match args.command {
            Commands::Build(build) => {
                assert_eq!(build.project.spec_version, Some(SpecVersion::V1_3));
                assert_eq!(build.project.validation_level, Some(ValidationLevel::Warning));
                assert_eq!(build.project.format, OutputFormatArg::Json);
                assert!(build.full);
            }
            _ => panic!("Expected Build command"),
        }
    }

    #[test]
    fn test_invalid_level_rejected() {
        let result = CliArgs::try_parse_from(["scrgen", "check", "s.json", "--validation-level", "fatal"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_name_args() {
        let args = CliArgs::parse_from(["scrgen", "name", "getFooBar", "--class-name", "-v"]);
        assert!(args.verbose);
        match args.command {
            Commands::Name(name) => {
                assert_eq!(name.identifier, "getFooBar");
                assert_eq!(name.spec_version, SpecVersion::V1_4);
                assert!(name.class_name);
                assert!(name.prefix.is_none());
            }
            _ => panic!("Expected Name command"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(CliArgs::try_parse_from(["scrgen", "-q", "-v", "name", "x"]).is_err());
    }
}
