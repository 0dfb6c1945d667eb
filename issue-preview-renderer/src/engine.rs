//! Tera rendering engine: [`Renderer`] and the [`ErrorPage`] payload.
//!
//! # Templates
//!
//! | Name                     | Renders                                  |
//! |--------------------------|------------------------------------------|
//! | `page.html`              | page shell, sidebar, label chips         |
//! | `error.html`             | error document shown for a broken edit   |
//! | `fields/_header.html`    | field label, required marker, description|
//! | `fields/<kind>.html`     | one partial per [`FormField`] kind       |
//! | `style.css`              | stylesheet inlined into both pages       |
//!
//! Any of them can be replaced by a file with the same relative name inside
//! an override directory (see [`Renderer::with_overrides`]).
//!
//! [`FormField`]: issue_preview_core::FormField

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tera::Tera;

use issue_preview_core::FormTemplate;

use crate::context::{FieldCtx, PageCtx};
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates: baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("style.css", include_str!("templates/style.css")),
    ("page.html", include_str!("templates/page.html")),
    ("error.html", include_str!("templates/error.html")),
    ("fields/_header.html", include_str!("templates/fields/_header.html")),
    ("fields/markdown.html", include_str!("templates/fields/markdown.html")),
    ("fields/input.html", include_str!("templates/fields/input.html")),
    ("fields/textarea.html", include_str!("templates/fields/textarea.html")),
    ("fields/dropdown.html", include_str!("templates/fields/dropdown.html")),
    ("fields/checkboxes.html", include_str!("templates/fields/checkboxes.html")),
];

const OVERRIDE_EXTENSIONS: &[&str] = &["html", "css"];

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io {
        path: path.into(),
        source,
    }
}

fn template_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

fn is_override_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| OVERRIDE_EXTENSIONS.contains(&ext))
}

/// Walk `dir` recursively, reading every `.html`/`.css` file keyed by its
/// name relative to `root`.
fn read_overrides(
    root: &Path,
    dir: &Path,
    out: &mut BTreeMap<String, String>,
) -> Result<(), RenderError> {
    for entry in std::fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let path = entry.map_err(|e| io_err(dir, e))?.path();
        if path.is_dir() {
            read_overrides(root, &path, out)?;
            continue;
        }
        if !path.is_file() || !is_override_file(&path) {
            continue;
        }
        let rel = path.strip_prefix(root).unwrap_or(&path);
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        out.insert(template_name(rel), contents);
    }
    Ok(())
}

fn build_tera(override_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: BTreeMap<String, String> = TPLS
        .iter()
        .map(|(name, content)| (template_name(Path::new(name)), (*content).to_string()))
        .collect();
    if let Some(dir) = override_dir.filter(|d| d.exists()) {
        read_overrides(dir, dir, &mut templates)?;
    }

    let mut tera = Tera::default();
    tera.add_raw_templates(templates)?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// ErrorPage
// ---------------------------------------------------------------------------

/// Payload for the error document published when a render fails.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPage {
    pub heading: String,
    /// Source file the error refers to.
    pub source: String,
    pub message: String,
    pub location: Option<String>,
    /// Version of the last good preview still held by the server, if any.
    pub last_good_version: Option<u64>,
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Tera-based renderer for issue form previews.
///
/// Create once with [`Renderer::new`] and reuse; rendering takes `&self`.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Construct a new [`Renderer`] with the embedded templates.
    pub fn new() -> Result<Self, RenderError> {
        Ok(Renderer {
            tera: build_tera(None)?,
        })
    }

    /// Construct a renderer whose templates may be replaced by files in
    /// `override_dir` (matched by relative path, case-insensitive).
    pub fn with_overrides(override_dir: &Path) -> Result<Self, RenderError> {
        Ok(Renderer {
            tera: build_tera(Some(override_dir))?,
        })
    }

    /// Render a parsed template to a complete HTML document.
    ///
    /// Deterministic: the same `template` always yields the same bytes.
    pub fn render(&self, template: &FormTemplate) -> Result<String, RenderError> {
        let mut fields = Vec::with_capacity(template.fields.len());
        for (index, field) in template.fields.iter().enumerate() {
            let ctx = FieldCtx::from_field(index, field);
            let html = self.tera.render(ctx.template_name(), &ctx.to_tera_context()?)?;
            fields.push(html.trim().to_string());
        }

        let page = PageCtx::new(template, fields);
        let html = self.tera.render("page.html", &page.to_tera_context()?)?;
        Ok(normalize_line_endings(html))
    }

    /// Render the error document. Never fails: if `error.html` itself cannot
    /// be rendered, a minimal hand-built page is returned instead.
    pub fn render_error(&self, page: &ErrorPage) -> String {
        let rendered = tera::Context::from_serialize(page)
            .and_then(|ctx| self.tera.render("error.html", &ctx));
        match rendered {
            Ok(html) => normalize_line_endings(html),
            Err(_) => fallback_error_html(page),
        }
    }
}

fn fallback_error_html(page: &ErrorPage) -> String {
    let location = page
        .location
        .as_deref()
        .map(|l| format!("<p>at <code>{}</code></p>\n", tera::escape_html(l)))
        .unwrap_or_default();
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{heading}</title></head>\n<body>\n<h1>{heading}</h1>\n<p>{source}</p>\n{location}<pre>{message}</pre>\n</body>\n</html>\n",
        heading = tera::escape_html(&page.heading),
        source = tera::escape_html(&page.source),
        location = location,
        message = tera::escape_html(&page.message),
    )
}

fn normalize_line_endings(html: String) -> String {
    if html.contains('\r') {
        html.replace("\r\n", "\n")
    } else {
        html
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
