//! JSON input for grid descriptions and feeder metadata.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::InputError;
use crate::grid::{GridInput, Metadata};

fn parse<T: DeserializeOwned>(content: &str, label: &str) -> Result<T, InputError> {
    serde_json::from_str(content).map_err(|source| InputError::Json {
        path: label.to_string(),
        source,
    })
}

fn read<T: DeserializeOwned>(path: &Path) -> Result<T, InputError> {
    let label = path.display().to_string();
    let content = fs::read_to_string(path).map_err(|source| InputError::Io {
        path: label.clone(),
        source,
    })?;
    parse(&content, &label)
}

/// Reads a grid description. Only the JSON shape is checked here; topology
/// checks happen in `Grid::build`.
///
/// # Errors
///
/// Returns an `InputError` if the file cannot be read or is not a valid grid document.
pub fn load_grid_json(path: &Path) -> Result<GridInput, InputError> {
    read(path)
}

/// Parses a grid description from a string.
///
/// # Errors
///
/// Returns `InputError::Json` for malformed documents or unknown fields.
pub fn parse_grid_json(content: &str) -> Result<GridInput, InputError> {
    parse(content, "<grid>")
}

/// Reads LV feeder metadata.
///
/// # Errors
///
/// Returns an `InputError` if the file cannot be read or is not valid metadata.
pub fn load_metadata_json(path: &Path) -> Result<Metadata, InputError> {
    read(path)
}

/// Parses LV feeder metadata from a string.
///
/// # Errors
///
/// Returns `InputError::Json` for malformed documents.
pub fn parse_metadata_json(content: &str) -> Result<Metadata, InputError> {
    parse(content, "<metadata>")
}
