//! Export packages to directories and import them back
//!
//! Every file is mapped to a path below the directory through a
//! [`FileNameDictionary`]. Export writes the logical (inflated) payload of
//! each file. Import is a rewrite in which each file that has a counterpart
//! on disk is replaced by that file's contents, keeping its compression mode.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::dictionary::FileNameDictionary;
use crate::package::{
    FileContext, FileEntry, Outcome, Package, PackageResult, RewriteSummary, Transform,
};

/// Path of `entry` below `directory`
///
/// Names that are absolute or climb out of the directory are replaced by the
/// `"{block}.{file}.dat"` fallback.
pub fn entry_path(directory: &Path, dictionary: &FileNameDictionary, entry: &FileEntry) -> PathBuf {
    let name = dictionary.file_name(entry);
    match relative_path(&name) {
        Some(relative) => directory.join(relative),
        None => {
            warn!("Unsafe file name {name:?}, using {}", entry.fallback_name());
            directory.join(entry.fallback_name())
        }
    }
}

fn relative_path(name: &str) -> Option<PathBuf> {
    let normalized = name.replace('\\', "/");
    let path = Path::new(&normalized);
    let mut components = path.components().peekable();
    components.peek()?;

    components
        .all(|c| matches!(c, Component::Normal(_)))
        .then(|| path.to_path_buf())
}

/// Totals of a directory export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Files written
    pub files: usize,
    /// Logical bytes written
    pub bytes: u64,
}

/// Write every file of the package below `directory`
pub fn export_directory<R: Read + Seek>(
    package: &mut Package,
    reader: &mut R,
    directory: &Path,
    dictionary: &FileNameDictionary,
) -> PackageResult<ExportSummary> {
    let blocks = package.blocks(reader).collect::<PackageResult<Vec<_>>>()?;
    let mut summary = ExportSummary::default();

    for block in blocks {
        let files = package
            .files(reader, block)
            .collect::<PackageResult<Vec<_>>>()?;

        for entry in files {
            let path = entry_path(directory, dictionary, &entry);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut output = BufWriter::new(File::create(&path)?);
            let bytes = entry.copy_payload(reader, &mut output, false)?;
            output.flush()?;

            debug!("Exported {} ({bytes} bytes)", path.display());
            summary.files += 1;
            summary.bytes += bytes;
        }
    }

    info!(
        "Exported {} files ({} bytes) to {}",
        summary.files,
        summary.bytes,
        directory.display()
    );
    Ok(summary)
}

/// Transform replacing files with their counterparts in a directory
#[derive(Debug)]
pub struct DirectoryImport<'d> {
    directory: PathBuf,
    dictionary: &'d FileNameDictionary,
    modified_after: Option<SystemTime>,
    imported: usize,
}

impl<'d> DirectoryImport<'d> {
    /// Import every file found below `directory`
    pub fn new(directory: impl Into<PathBuf>, dictionary: &'d FileNameDictionary) -> Self {
        Self {
            directory: directory.into(),
            dictionary,
            modified_after: None,
            imported: 0,
        }
    }

    /// Only import files modified strictly after `time`
    #[must_use]
    pub fn modified_after(mut self, time: SystemTime) -> Self {
        self.modified_after = Some(time);
        self
    }

    /// Files imported so far
    pub fn imported(&self) -> usize {
        self.imported
    }

    fn wants(&self, path: &Path) -> io::Result<bool> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Ok(false),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        match self.modified_after {
            Some(time) => Ok(metadata.modified()? > time),
            None => Ok(true),
        }
    }
}

impl Transform for DirectoryImport<'_> {
    type Error = io::Error;

    fn apply(&mut self, sink: &mut dyn Write, file: FileContext<'_>) -> io::Result<Outcome> {
        let path = entry_path(&self.directory, self.dictionary, file.entry);
        if !self.wants(&path)? {
            return Ok(Outcome::Copied);
        }

        let mut input = File::open(&path)?;
        let bytes = io::copy(&mut input, sink)?;

        debug!("Imported {} ({bytes} bytes)", path.display());
        self.imported += 1;
        Ok(Outcome::Replaced(bytes))
    }
}

/// Rewrite the package, replacing files found below `directory`
pub fn import_directory<R, W>(
    package: &mut Package,
    reader: &mut R,
    writer: &mut W,
    directory: &Path,
    dictionary: &FileNameDictionary,
    modified_after: Option<SystemTime>,
) -> PackageResult<RewriteSummary>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let mut import = DirectoryImport::new(directory, dictionary);
    if let Some(time) = modified_after {
        import = import.modified_after(time);
    }

    let summary = package.rewrite(reader, writer, &mut import)?;
    info!(
        "Imported {} files from {}",
        import.imported(),
        directory.display()
    );
    Ok(summary)
}
