//! Command-line front end for MYP package rewriting
//!
//! Three commands are available:
//!
//! - `map import`: replace the map blocks of a facet package with a map
//!   converted from legacy MUL files
//! - `package export`: write every file of a package into a directory
//! - `package import`: replace package files with their counterparts in a
//!   directory, optionally only those changed since the last import
//!
//! Rewrites happen in place: the package is copied to a temporary file that
//! serves as the read source while the package path is written afresh.

#![warn(missing_docs)]

pub mod commands;
pub mod config;
pub mod error;
pub mod inplace;
pub mod stamp;

pub use commands::run;
pub use config::BuilderConfig;
pub use error::{BuilderError, BuilderResult, Input};
