//! `issue-preview check`: validate a template.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Issue form YAML file to validate.
    pub yaml_file: PathBuf,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let template = super::load_template(&self.yaml_file)?;
        println!(
            "{} {}: '{}' ({} fields, {} required)",
            "✓".green(),
            self.yaml_file.display(),
            template.name,
            template.input_fields().count(),
            template.required_count(),
        );
        Ok(())
    }
}
