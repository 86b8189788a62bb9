//! Command-line configuration.
//!
//! Arguments are parsed with clap. Optional lookup tables can also be given
//! through environment variables:
//!
//! - `UOP_BUILDER_DICTIONARY`: filename dictionary for package commands
//! - `UOP_BUILDER_REMAP`: remap table for map imports
//!
//! # Example
//!
//! ```text
//! uop-builder map import facet0.uop map0.mul staidx0.mul statics0.mul radarcol.mul --fast
//! uop-builder package export gumpartLegacyMUL.uop ./gumps --dictionary Dictionary.bin
//! uop-builder package import gumpartLegacyMUL.uop ./gumps --stamp .last-import
//! ```

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::error::{BuilderError, BuilderResult, Input};

/// Exit code of a failed map import
pub const MAP_FAILURE_CODE: u8 = 6;

/// Exit code of a failed package export or import
pub const PACKAGE_FAILURE_CODE: u8 = 3;

/// Dictionary looked up in the working directory when none is configured
pub const DEFAULT_DICTIONARY: &str = "Dictionary.bin";

/// Top-level command line
#[derive(Debug, Clone, Parser)]
#[command(
    name = "uop-builder",
    about = "Import legacy maps into MYP packages and move package contents in and out",
    version
)]
pub struct BuilderConfig {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Command groups
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Map package commands
    #[command(subcommand)]
    Map(MapCommand),

    /// Generic package commands
    #[command(subcommand)]
    Package(PackageCommand),
}

impl Command {
    /// Exit code reported when the command fails after validation
    pub fn failure_code(&self) -> u8 {
        match self {
            Self::Map(_) => MAP_FAILURE_CODE,
            Self::Package(_) => PACKAGE_FAILURE_CODE,
        }
    }
}

/// Map package commands
#[derive(Debug, Clone, Subcommand)]
pub enum MapCommand {
    /// Replace the map blocks of a package with a converted legacy map
    Import(MapImportArgs),
}

/// Arguments of `map import`
#[derive(Debug, Clone, Args)]
pub struct MapImportArgs {
    /// Map package to rewrite in place (facet*.uop)
    pub package: PathBuf,

    /// Legacy tile grid (map*.mul)
    pub map: PathBuf,

    /// Legacy statics index (staidx*.mul)
    pub index: PathBuf,

    /// Legacy statics data (statics*.mul)
    pub statics: PathBuf,

    /// Radar colour table (radarcol.mul)
    pub radar: PathBuf,

    /// Load the legacy files into memory instead of mapping them
    #[arg(long)]
    pub fast: bool,

    /// Remap table translating legacy tile ids (binary or .json)
    #[arg(long, env = "UOP_BUILDER_REMAP")]
    pub remap: Option<PathBuf>,
}

impl MapImportArgs {
    /// Check every input exists, in exit code order
    pub fn validate(&self) -> BuilderResult<()> {
        require_file(Input::Package, &self.package)?;
        require_file(Input::Map, &self.map)?;
        require_file(Input::Index, &self.index)?;
        require_file(Input::Statics, &self.statics)?;
        require_file(Input::Radar, &self.radar)?;
        if let Some(remap) = &self.remap {
            require_file(Input::Remap, remap)?;
        }
        Ok(())
    }
}

/// Generic package commands
#[derive(Debug, Clone, Subcommand)]
pub enum PackageCommand {
    /// Write every file of a package into a directory
    Export(ExportArgs),

    /// Replace package files with their counterparts in a directory
    Import(ImportArgs),
}

/// Arguments of `package export`
#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    /// Package to read
    pub package: PathBuf,

    /// Existing directory to write files into
    pub directory: PathBuf,

    /// Filename dictionary (defaults to ./Dictionary.bin when present)
    #[arg(long, env = "UOP_BUILDER_DICTIONARY")]
    pub dictionary: Option<PathBuf>,
}

impl ExportArgs {
    /// Check every input exists, in exit code order
    pub fn validate(&self) -> BuilderResult<()> {
        require_file(Input::Package, &self.package)?;
        require_directory(&self.directory)?;
        if let Some(dictionary) = &self.dictionary {
            require_file(Input::Dictionary, dictionary)?;
        }
        Ok(())
    }
}

/// Arguments of `package import`
#[derive(Debug, Clone, Args)]
pub struct ImportArgs {
    /// Package to rewrite in place
    pub package: PathBuf,

    /// Directory holding replacement files
    pub directory: PathBuf,

    /// Filename dictionary (defaults to ./Dictionary.bin when present)
    #[arg(long, env = "UOP_BUILDER_DICTIONARY")]
    pub dictionary: Option<PathBuf>,

    /// Only import files modified after the time stored in this file, and
    /// store the current time in it afterwards
    #[arg(long)]
    pub stamp: Option<PathBuf>,
}

impl ImportArgs {
    /// Check every input exists, in exit code order
    pub fn validate(&self) -> BuilderResult<()> {
        require_file(Input::Package, &self.package)?;
        require_directory(&self.directory)?;
        if let Some(dictionary) = &self.dictionary {
            require_file(Input::Dictionary, dictionary)?;
        }
        Ok(())
    }
}

fn require_file(input: Input, path: &Path) -> BuilderResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(BuilderError::MissingInput {
            input,
            path: path.to_path_buf(),
        })
    }
}

fn require_directory(path: &Path) -> BuilderResult<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(BuilderError::MissingInput {
            input: Input::Directory,
            path: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        BuilderConfig::command().debug_assert();
    }

    #[test]
    fn test_parse_map_import() {
        let config = BuilderConfig::try_parse_from([
            "uop-builder",
            "map",
            "import",
            "facet0.uop",
            "map0.mul",
            "staidx0.mul",
            "statics0.mul",
            "radarcol.mul",
            "--fast",
        ])
        .unwrap();

        let Command::Map(MapCommand::Import(args)) = &config.command else {
            panic!("expected map import");
        };
        assert!(args.fast);
        assert_eq!(args.radar, PathBuf::from("radarcol.mul"));
        assert_eq!(config.command.failure_code(), MAP_FAILURE_CODE);
    }

    #[test]
    fn test_parse_package_import_with_stamp() {
        let config = BuilderConfig::try_parse_from([
            "uop-builder",
            "package",
            "import",
            "art.uop",
            "out",
            "--stamp",
            "last.txt",
        ])
        .unwrap();

        let Command::Package(PackageCommand::Import(args)) = &config.command else {
            panic!("expected package import");
        };
        assert_eq!(args.stamp, Some(PathBuf::from("last.txt")));
        assert_eq!(config.command.failure_code(), PACKAGE_FAILURE_CODE);
    }

    #[test]
    fn test_validation_order() {
        let args = MapImportArgs {
            package: PathBuf::from("/nonexistent/facet.uop"),
            map: PathBuf::from("/nonexistent/map.mul"),
            index: PathBuf::new(),
            statics: PathBuf::new(),
            radar: PathBuf::new(),
            fast: false,
            remap: None,
        };
        let err = args.validate().unwrap_err();
        assert_eq!(err.exit_code(MAP_FAILURE_CODE), 1);
    }
}
