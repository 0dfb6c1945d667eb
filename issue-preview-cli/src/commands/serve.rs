//! `issue-preview serve`: live preview server.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use issue_preview_server::config::{DEFAULT_HOST, DEFAULT_PORT};
use issue_preview_server::{start_blocking, PreviewConfig, ReadPolicy, WatchConfig};

use crate::browser;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Issue form YAML file to preview.
    pub yaml_file: PathBuf,

    /// Port for the preview server.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind.
    #[arg(long, default_value_t = DEFAULT_HOST)]
    pub host: IpAddr,

    /// Browser executable to open the preview with (defaults to the system opener).
    #[arg(long, conflicts_with = "no_open")]
    pub browser: Option<String>,

    /// Do not open a browser.
    #[arg(long)]
    pub no_open: bool,

    /// How often the file is polled, in milliseconds.
    #[arg(long, default_value_t = 250)]
    pub poll_interval_ms: u64,

    /// Quiet period before a change is rendered, in milliseconds.
    #[arg(long, default_value_t = 200)]
    pub debounce_ms: u64,

    /// Directory of template overrides.
    #[arg(long)]
    pub templates: Option<PathBuf>,
}

impl ServeArgs {
    pub fn run(self) -> Result<()> {
        if !self.yaml_file.is_file() {
            bail!("{} does not exist or is not a file", self.yaml_file.display());
        }
        if self.poll_interval_ms == 0 {
            bail!("--poll-interval-ms must be greater than zero");
        }

        let config = self.to_config();
        let open = !self.no_open;
        let browser = self.browser.clone();

        start_blocking(config, move |addr| {
            let url = preview_url(addr);
            println!("{} {}", "Previewing".green().bold(), url);
            if open {
                if let Err(err) = browser::open(&url, browser.as_deref()) {
                    eprintln!("{} could not open browser: {err:#}", "warning:".yellow());
                }
            }
            println!("Press Ctrl-C to stop.");
        })
        .context("preview server exited with error")
    }

    fn to_config(&self) -> PreviewConfig {
        PreviewConfig {
            source: self.yaml_file.clone(),
            host: self.host,
            port: self.port,
            watch: WatchConfig {
                poll_interval: Duration::from_millis(self.poll_interval_ms),
                debounce: Duration::from_millis(self.debounce_ms),
                read_policy: ReadPolicy::default(),
            },
            templates: self.templates.clone(),
        }
    }
}

/// URL a browser on this machine can reach, even when bound to `0.0.0.0`.
fn preview_url(addr: SocketAddr) -> String {
    let host = if addr.ip().is_unspecified() {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    } else {
        addr.ip()
    };
    format!("http://{}/", SocketAddr::new(host, addr.port()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unspecified_bind_address_maps_to_localhost() {
        let addr: SocketAddr = "0.0.0.0:8123".parse().unwrap();
        assert_eq!(preview_url(addr), "http://127.0.0.1:8123/");
        let addr: SocketAddr = "[::1]:8000".parse().unwrap();
        assert_eq!(preview_url(addr), "http://[::1]:8000/");
    }

    #[test]
    fn args_map_onto_preview_config() {
        let args = ServeArgs {
            yaml_file: PathBuf::from("bug.yml"),
            port: 9000,
            host: DEFAULT_HOST,
            browser: None,
            no_open: true,
            poll_interval_ms: 100,
            debounce_ms: 50,
            templates: None,
        };
        let config = args.to_config();
        assert_eq!(config.port, 9000);
        assert_eq!(config.watch.poll_interval, Duration::from_millis(100));
        assert_eq!(config.watch.debounce, Duration::from_millis(50));
        assert_eq!(config.source, PathBuf::from("bug.yml"));
    }
}
