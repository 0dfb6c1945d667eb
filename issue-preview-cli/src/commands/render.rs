//! `issue-preview render`: one-shot render to an HTML file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use issue_preview_renderer::Renderer;

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Issue form YAML file to render.
    pub yaml_file: PathBuf,

    /// Output file (defaults to `<yaml stem>.html` next to the source).
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Directory of template overrides.
    #[arg(long)]
    pub templates: Option<PathBuf>,
}

impl RenderArgs {
    pub fn run(self) -> Result<()> {
        let template = super::load_template(&self.yaml_file)?;
        let renderer = build_renderer(self.templates.as_deref())?;
        let html = renderer
            .render(&template)
            .with_context(|| format!("failed to render {}", self.yaml_file.display()))?;

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| default_output(&self.yaml_file));
        std::fs::write(&output, html)
            .with_context(|| format!("failed to write {}", output.display()))?;

        println!("{} {}", "Rendered".green().bold(), output.display());
        Ok(())
    }
}

pub(crate) fn build_renderer(templates: Option<&Path>) -> Result<Renderer> {
    match templates {
        Some(dir) => Renderer::with_overrides(dir)
            .with_context(|| format!("failed to load templates from {}", dir.display())),
        None => Renderer::new().context("failed to initialise renderer"),
    }
}

fn default_output(yaml_file: &Path) -> PathBuf {
    yaml_file.with_extension("html")
}
