use std::fs;
use std::net::TcpListener;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

const FEATURE_FORM: &str = r#"name: Feature request
description: Suggest an idea
title: "[Feat]: "
labels: [enhancement]
body:
  - type: markdown
    attributes:
      value: Thanks for the suggestion.
  - type: input
    id: goal
    attributes:
      label: Goal
    validations:
      required: true
  - type: textarea
    id: details
    attributes:
      label: Details
"#;

fn preview_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("issue-preview"))
}

fn write_form(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write form");
    path
}

#[test]
fn check_reports_field_counts() {
    let dir = TempDir::new().expect("tempdir");
    let form = write_form(dir.path(), "feature.yml", FEATURE_FORM);

    preview_cmd()
        .arg("check")
        .arg(&form)
        .assert()
        .success()
        .stdout(contains("Feature request"))
        .stdout(contains("2 fields, 1 required"));
}

#[test]
fn check_fails_with_location_for_invalid_form() {
    let dir = TempDir::new().expect("tempdir");
    let form = write_form(
        dir.path(),
        "broken.yml",
        "name: Broken\ndescription: d\nbody:\n  - type: textarea\n    id: x\n",
    );

    preview_cmd()
        .arg("check")
        .arg(&form)
        .assert()
        .code(1)
        .stderr(contains("is not a valid issue form"))
        .stderr(contains("body[0].attributes.label"));
}

#[test]
fn render_writes_html_next_to_source() {
    let dir = TempDir::new().expect("tempdir");
    let form = write_form(dir.path(), "feature.yml", FEATURE_FORM);

    preview_cmd()
        .arg("render")
        .arg(&form)
        .assert()
        .success()
        .stdout(contains("Rendered"));

    let html = fs::read_to_string(dir.path().join("feature.html")).expect("rendered html");
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("Feature request"));
    assert!(html.contains("<span class=\"label-chip\">enhancement</span>"));
    assert_eq!(html.matches("class=\"required-marker\"").count(), 1);
}

#[test]
fn render_honours_output_flag() {
    let dir = TempDir::new().expect("tempdir");
    let form = write_form(dir.path(), "feature.yml", FEATURE_FORM);
    let out = dir.path().join("preview.html");

    preview_cmd()
        .args(["render", "--output"])
        .arg(&out)
        .arg(&form)
        .assert()
        .success();

    assert!(out.exists());
    assert!(!dir.path().join("feature.html").exists());
}

#[test]
fn serve_rejects_missing_file() {
    let dir = TempDir::new().expect("tempdir");

    preview_cmd()
        .args(["serve", "--no-open"])
        .arg(dir.path().join("missing.yml"))
        .assert()
        .code(1)
        .stderr(contains("does not exist"));
}

#[test]
fn serve_exits_with_bind_failure_code_when_port_taken() {
    let dir = TempDir::new().expect("tempdir");
    let form = write_form(dir.path(), "feature.yml", FEATURE_FORM);
    let taken = TcpListener::bind("127.0.0.1:0").expect("reserve port");
    let port = taken.local_addr().expect("addr").port();

    preview_cmd()
        .args(["serve", "--no-open", "--port", &port.to_string()])
        .arg(&form)
        .assert()
        .code(3)
        .stderr(contains("could not bind"));

    drop(taken);
}
