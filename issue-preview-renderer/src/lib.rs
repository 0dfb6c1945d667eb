//! # issue-preview-renderer
//!
//! Tera-based renderer that turns a parsed GitHub issue form into a
//! self-contained HTML preview.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use issue_preview_renderer::Renderer;
//!
//! fn preview(source: &[u8]) -> Option<String> {
//!     let template = issue_preview_core::parse(source).ok()?;
//!     let renderer = Renderer::new().ok()?;
//!     renderer.render(&template).ok()
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::{markdown_to_html, FieldCtx, PageCtx};
pub use engine::{ErrorPage, Renderer};
pub use error::RenderError;
