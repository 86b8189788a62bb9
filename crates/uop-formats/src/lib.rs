//! Reader, builder and streaming rewriter for MYP game asset packages
//!
#![allow(clippy::cast_possible_wrap)] // Slot fields are signed on disk
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::return_self_not_must_use)] // Builder patterns
//! MYP packages (usually `.uop` files) store game assets in a chain of
//! blocks, each with a fixed-size file table and the file data behind it.
//! This crate reads that layout, writes new packages, and rewrites existing
//! ones while a caller-supplied [`Transform`](package::Transform) replaces
//! selected payloads.
//!
//! # Modules
//!
//! - [`package`]: container model, compression adapter, rewrite engine and
//!   builder
//! - [`dictionary`]: hash to file name lookup loaded from `Dictionary.bin`
//! - [`directory`]: export a package to a directory tree and import it back
//!
//! # Example
//!
//! ```rust,no_run
//! use std::fs::File;
//! use std::io::BufReader;
//! use uop_formats::package::{CopyAll, Package};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut reader = BufReader::new(File::open("facet0.uop")?);
//! let mut writer = File::create("facet0.copy.uop")?;
//!
//! let mut package = Package::open(&mut reader)?;
//! let summary = package.rewrite(&mut reader, &mut writer, CopyAll)?;
//! println!("{} files copied", summary.files);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod dictionary;
pub mod directory;
pub mod package;

pub use dictionary::{DictionaryError, DictionaryResult, FileNameDictionary};
pub use package::{Package, PackageError, PackageResult};
