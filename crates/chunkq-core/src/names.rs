//! Category and chunk name validation.
//!
//! Both kinds of names become a single file system path component under the
//! data directory, so anything that could escape that directory is rejected.

use std::path::{Component, Path};

use crate::error::NameError;

/// True if `name` is exactly one normal path component.
///
/// This rejects empty names, `.`/`..`, absolute paths, and anything a path
/// cleaner would rewrite.
fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(c)), None) if c == name
    )
}

/// A category is valid iff it is non-empty, contains none of `/`, `\`, `.`
/// and is left unchanged by path cleaning.
pub fn validate_category(category: &str) -> Result<(), NameError> {
    if category.is_empty()
        || category.contains(&['/', '\\', '.'][..])
        || !is_single_component(category)
    {
        return Err(NameError::InvalidCategory(category.to_string()));
    }
    Ok(())
}

/// Chunk names may contain dots (instance names are free-form) but must still
/// name a file directly inside the category directory.
pub fn validate_chunk_name(chunk: &str) -> Result<(), NameError> {
    if chunk.is_empty() || chunk.contains(&['/', '\\'][..]) || !is_single_component(chunk) {
        return Err(NameError::InvalidChunk(chunk.to_string()));
    }
    Ok(())
}
