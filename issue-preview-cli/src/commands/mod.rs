pub mod check;
pub mod render;
pub mod serve;

use std::path::Path;

use anyhow::{Context, Result};
use issue_preview_core::{parse, FormTemplate};

/// Read and parse an issue form, with the path in every error.
pub(crate) fn load_template(path: &Path) -> Result<FormTemplate> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse(&bytes).with_context(|| format!("{} is not a valid issue form", path.display()))
}
