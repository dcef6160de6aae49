pub mod remote_copy;
pub mod text_import;

use crate::utils::error::{EtlError, Result};
use std::collections::HashSet;
use std::path::Path;

/// The destination file may be missing, but its directory must exist.
pub(crate) fn check_destination_dir(destination: &Path) -> Result<()> {
    match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
            Err(EtlError::DestinationNotFound {
                path: parent.to_path_buf(),
            })
        }
        _ => Ok(()),
    }
}

/// Turn raw header cells into usable, distinct column names.
///
/// Empty names become `column_<n>` (1-based position) and repeated names get a
/// `_<k>` suffix, so every header yields a creatable table.
pub(crate) fn unique_column_names(headers: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(headers.len());
    let mut names = Vec::with_capacity(headers.len());

    for (i, header) in headers.iter().enumerate() {
        let base = if header.trim().is_empty() {
            format!("column_{}", i + 1)
        } else {
            header.clone()
        };

        let mut name = base.clone();
        let mut k = 2;
        while !seen.insert(name.to_lowercase()) {
            name = format!("{}_{}", base, k);
            k += 1;
        }
        if name != *header {
            tracing::warn!("⚠️ Column {} '{}' renamed to '{}'", i + 1, header, name);
        }
        names.push(name);
    }
    names
}
