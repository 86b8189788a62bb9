//! In-place rewriting of package files
//!
//! The package is moved to a temporary copy, which becomes the read source
//! while a fresh file is written at the original path.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{debug, error};

use crate::error::BuilderResult;

/// Rewrite `package` with `rewrite`, reading from a temporary copy of it
///
/// On failure the temporary copy is kept and its path logged, and the
/// partial output is removed.
pub fn rewrite_in_place<T, F>(package: &Path, rewrite: F) -> BuilderResult<T>
where
    F: FnOnce(&mut BufReader<File>, &mut BufWriter<File>) -> BuilderResult<T>,
{
    let mut temp = tempfile::Builder::new()
        .prefix("uop-builder-")
        .suffix(".uop")
        .tempfile()?;
    {
        let mut original = File::open(package)?;
        io::copy(&mut original, temp.as_file_mut())?;
        temp.as_file_mut().flush()?;
    }
    debug!(
        "Copied {} to {}",
        package.display(),
        temp.path().display()
    );

    fs::remove_file(package)?;

    let result = (|| {
        let mut reader = BufReader::new(temp.reopen()?);
        let mut writer = BufWriter::new(File::create(package)?);
        let value = rewrite(&mut reader, &mut writer)?;
        writer.flush()?;
        Ok(value)
    })();

    match result {
        Ok(value) => {
            temp.close()?;
            Ok(value)
        }
        Err(err) => {
            match temp.keep() {
                Ok((_, path)) => error!("Original package kept at {}", path.display()),
                Err(keep) => error!("Failed to keep original package copy: {}", keep.error),
            }
            if let Err(remove) = fs::remove_file(package) {
                debug!("Could not remove partial output: {remove}");
            }
            Err(err)
        }
    }
}
