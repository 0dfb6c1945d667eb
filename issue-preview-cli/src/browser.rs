//! Opening the preview URL in a browser.

use std::process::{Command, Stdio};

use anyhow::{Context, Result};

/// Open `url` with `browser` if given, otherwise with the platform opener.
///
/// Does not wait for the browser; the child is reaped on a detached thread.
pub fn open(url: &str, browser: Option<&str>) -> Result<()> {
    let mut command = match browser {
        Some(executable) => {
            let mut command = Command::new(executable);
            command.arg(url);
            command
        }
        None => system_opener(url),
    };

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to launch {:?}", command.get_program()))?;
    std::thread::spawn(move || {
        let _ = child.wait();
    });
    Ok(())
}

#[cfg(target_os = "macos")]
fn system_opener(url: &str) -> Command {
    let mut command = Command::new("open");
    command.arg(url);
    command
}

#[cfg(target_os = "windows")]
fn system_opener(url: &str) -> Command {
    let mut command = Command::new("cmd");
    command.args(["/C", "start", "", url]);
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn system_opener(url: &str) -> Command {
    let mut command = Command::new("xdg-open");
    command.arg(url);
    command
}
