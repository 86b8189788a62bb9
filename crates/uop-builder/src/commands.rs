//! Command implementations

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};
use uop_formats::FileNameDictionary;
use uop_formats::directory::{ExportSummary, export_directory, import_directory};
use uop_formats::package::{Package, RewriteSummary};
use uop_map::{LegacyPaths, LegacySources, MapImportSummary, RemapTable, import_map};

use crate::config::{
    BuilderConfig, Command, DEFAULT_DICTIONARY, ExportArgs, ImportArgs, MapCommand, MapImportArgs,
    PackageCommand,
};
use crate::error::BuilderResult;
use crate::inplace::rewrite_in_place;
use crate::stamp::{read_stamp, write_stamp};

/// Run the configured command
pub fn run(config: &BuilderConfig) -> BuilderResult<()> {
    match &config.command {
        Command::Map(MapCommand::Import(args)) => map_import(args).map(|_| ()),
        Command::Package(PackageCommand::Export(args)) => package_export(args).map(|_| ()),
        Command::Package(PackageCommand::Import(args)) => package_import(args).map(|_| ()),
    }
}

/// Replace the map blocks of a package with a converted legacy map
pub fn map_import(args: &MapImportArgs) -> BuilderResult<MapImportSummary> {
    args.validate()?;

    let remap = match &args.remap {
        Some(path) => {
            let remap = RemapTable::open(path)?;
            info!("Loaded {} remap entries from {}", remap.len(), path.display());
            remap
        }
        None => RemapTable::new(),
    };

    let paths = LegacyPaths {
        map: args.map.clone(),
        index: args.index.clone(),
        statics: args.statics.clone(),
        radar: args.radar.clone(),
    };
    let mut sources = LegacySources::open(&paths, args.fast)?;
    if args.fast {
        debug!("Legacy files loaded into memory");
    }

    let summary = rewrite_in_place(&args.package, |reader, writer| {
        let summary = import_map(reader, writer, &mut sources, &remap, |percent| {
            info!("Map import {percent}%");
        })?;
        Ok(summary)
    })?;

    info!(
        "Wrote {} files ({} bytes) to {}",
        summary.rewrite.files,
        summary.rewrite.bytes_written,
        args.package.display()
    );
    Ok(summary)
}

/// Write every file of a package into a directory
pub fn package_export(args: &ExportArgs) -> BuilderResult<ExportSummary> {
    args.validate()?;
    let dictionary = load_dictionary(args.dictionary.as_deref())?;

    let mut reader = BufReader::new(File::open(&args.package)?);
    let mut package = Package::open(&mut reader)?;
    let summary = export_directory(&mut package, &mut reader, &args.directory, &dictionary)?;
    Ok(summary)
}

/// Replace package files with their counterparts in a directory
pub fn package_import(args: &ImportArgs) -> BuilderResult<RewriteSummary> {
    args.validate()?;
    let dictionary = load_dictionary(args.dictionary.as_deref())?;

    let started = SystemTime::now();
    let modified_after = match &args.stamp {
        Some(path) => read_stamp(path)?,
        None => None,
    };

    let summary = rewrite_in_place(&args.package, |reader, writer| {
        let mut package = Package::open(reader)?;
        let summary = import_directory(
            &mut package,
            reader,
            writer,
            &args.directory,
            &dictionary,
            modified_after,
        )?;
        Ok(summary)
    })?;

    if let Some(path) = &args.stamp {
        write_stamp(path, started)?;
    }
    Ok(summary)
}

/// Load the configured dictionary, falling back to [`DEFAULT_DICTIONARY`]
/// in the working directory and then to an empty one
fn load_dictionary(path: Option<&Path>) -> BuilderResult<FileNameDictionary> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_DICTIONARY);
            if !fallback.is_file() {
                warn!("No filename dictionary, using block.file.dat names");
                return Ok(FileNameDictionary::new());
            }
            fallback
        }
    };

    let dictionary = FileNameDictionary::open(&path)?;
    info!(
        "Loaded {} names from {}",
        dictionary.len(),
        path.display()
    );
    Ok(dictionary)
}
