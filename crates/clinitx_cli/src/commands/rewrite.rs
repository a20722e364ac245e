//! Rewrite command implementation.
//!
//! Resolves placeholder references in a single resource body against a
//! mapping given on the command line, without touching any store.

use super::{read_file, CliError, Format};
use clinitx_core::{rewrite_references, ReferenceIndex, Rewritten};
use clinitx_storage::{ResourceKey, VersionId};
use std::path::Path;

/// Parses one `placeholder=Type/id@version` mapping.
///
/// The version defaults to 1 when `@version` is omitted.
pub fn parse_mapping(mapping: &str) -> Result<(String, ResourceKey, VersionId), CliError> {
    let (placeholder, target) = mapping
        .split_once('=')
        .ok_or_else(|| CliError::Argument(format!("expected placeholder=Type/id, got {mapping:?}")))?;
    if placeholder.is_empty() {
        return Err(CliError::Argument(format!("empty placeholder in {mapping:?}")));
    }

    let (target, version) = match target.rsplit_once('@') {
        Some((target, version)) => {
            let version: u64 = version
                .parse()
                .map_err(|_| CliError::Argument(format!("invalid version in {mapping:?}")))?;
            if version == 0 {
                return Err(CliError::Argument(format!("versions start at 1 in {mapping:?}")));
            }
            (target, VersionId::new(version))
        }
        None => (target, VersionId::INITIAL),
    };

    let key = ResourceKey::parse(target)
        .ok_or_else(|| CliError::Argument(format!("expected Type/id, got {target:?}")))?;
    Ok((placeholder.to_string(), key, version))
}

/// Builds a reference index from command-line mappings.
pub fn build_index(mappings: &[String]) -> Result<ReferenceIndex, CliError> {
    let mut index = ReferenceIndex::new();
    for (i, mapping) in mappings.iter().enumerate() {
        let (placeholder, key, version) = parse_mapping(mapping)?;
        index
            .record(&placeholder, i, key, version)
            .map_err(|err| CliError::Argument(err.to_string()))?;
    }
    Ok(index)
}

/// Rewrites the resource in `text` against `mappings`.
pub fn execute(text: &str, mappings: &[String]) -> Result<Rewritten, CliError> {
    let index = build_index(mappings)?;
    let body: serde_json::Value = serde_json::from_str(text)?;
    let rewritten = rewrite_references(&body, &index);
    for reference in &rewritten.references {
        tracing::info!(
            pointer = %reference.pointer,
            from = %reference.from,
            to = %reference.to,
            "reference rewritten"
        );
    }
    Ok(rewritten)
}

/// Runs the rewrite command.
pub fn run(path: &Path, mappings: &[String], format: Format) -> Result<(), CliError> {
    let text = read_file(path)?;
    let rewritten = execute(&text, mappings)?;
    println!("{}", format.render(&rewritten.body)?);
    Ok(())
}
