//! Command implementations for the GapNeedle CLI

pub mod align;
pub mod inspect;
pub mod stitch;
pub mod gaps;
pub mod telomere;

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::error::{CliError, CliResult};

/// Fail early with a suggestion-carrying error when an input is missing.
pub(crate) fn require_file(path: &Path) -> CliResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CliError::file_not_found(path))
    }
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}
