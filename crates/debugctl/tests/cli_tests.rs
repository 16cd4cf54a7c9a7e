//! CLI integration tests for debugctl
//!
//! Tests the CLI surface against debug files written by a real inspector:
//! - debugctl show FILE [--type T | --divergences] [--json]
//! - debugctl summary FILE [--json]
//! - debugctl latest COMPONENT
//! - debugctl correlate CONTEXT_ID
//! - debugctl selftest
//!
//! Handlers are driven in-process through `commands::run`; exit codes are
//! checked against the built binary.

use clap::Parser;
use debug_rails::{state, DebugConfig, Inspector};
use debugctl::cli::Cli;
use debugctl::commands;
use debugctl::errors::{EXIT_GENERAL_ERROR, EXIT_SUCCESS};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

/// Write a small parser session under `root` and return its file
fn write_session(root: &Path, component: &str, context_id: &str) -> PathBuf {
    let config = DebugConfig::default().with_base_dir(root);
    let inspector = Inspector::with_config(component, Some(context_id), config);
    inspector.enable().unwrap();
    inspector.snapshot("token-read", state! { "token" => "IDENT" });
    inspector.expected_state("arity-check", 3, 2, state! { "fn" => "foo" });
    inspector.checkpoint("done", state! {});
    let path = inspector.debug_file().unwrap();
    inspector.close();
    path
}

/// Run debugctl in-process, returning (exit code, stdout)
fn run(args: &[&str]) -> anyhow::Result<(i32, String)> {
    let mut argv = vec!["debugctl", "--no-color"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv)?;
    let mut out = Vec::new();
    let code = commands::run(cli, &mut out, false)?;
    Ok((code, String::from_utf8(out)?))
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

// ============================================================================
// show
// ============================================================================

#[test]
fn test_show_prints_every_entry() {
    let temp = TempDir::new().unwrap();
    let file = write_session(temp.path(), "parser", "ctx-show");

    let (code, stdout) = run(&["show", arg(&file)]).unwrap();
    assert_eq!(code, EXIT_SUCCESS);
    assert!(stdout.contains("SNAPSHOT"));
    assert!(stdout.contains("DIVERGENCE"));
    assert!(stdout.contains("CHECKPOINT"));
    assert!(stdout.contains("token = IDENT"));
}

#[test]
fn test_show_type_filter_json() {
    let temp = TempDir::new().unwrap();
    let file = write_session(temp.path(), "parser", "ctx-json");

    let (_, stdout) = run(&["show", arg(&file), "--type", "divergence", "--json"]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let entries = value.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["entry_type"], "DIVERGENCE");
    assert_eq!(entries[0]["label"], "arity-check");
    assert_eq!(entries[0]["context_id"], "ctx-json");
    assert_eq!(entries[0]["state"]["expected"], 3);
    assert_eq!(entries[0]["state"]["matches"], false);
}

#[test]
fn test_show_divergences_only() {
    let temp = TempDir::new().unwrap();
    let file = write_session(temp.path(), "parser", "ctx-div");

    let (_, stdout) = run(&["show", arg(&file), "--divergences"]).unwrap();
    assert!(stdout.contains("arity-check"));
    assert!(!stdout.contains("token-read"));
}

#[test]
fn test_unknown_type_is_rejected() {
    let result = Cli::try_parse_from(["debugctl", "show", "f.debug", "--type", "NOPE"]);
    assert!(result.is_err());
}

#[test]
fn test_show_missing_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("absent.debug");
    let err = run(&["show", arg(&missing)]).unwrap_err();
    assert!(format!("{:#}", err).contains("absent.debug"));
}

// ============================================================================
// summary / latest
// ============================================================================

#[test]
fn test_summary_json_counts() {
    let temp = TempDir::new().unwrap();
    let file = write_session(temp.path(), "parser", "ctx-sum");

    let (_, stdout) = run(&["summary", arg(&file), "--json"]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["total"], 3);
    assert_eq!(value["counts"]["SNAPSHOT"], 1);
    assert_eq!(value["counts"]["DIVERGENCE"], 1);
    assert_eq!(value["header"]["component"], "parser");
    assert_eq!(value["header"]["format_version"], 1);
    assert_eq!(value["divergences"][0]["expected"], 3);
    assert_eq!(value["divergences"][0]["actual"], 2);
}

#[test]
fn test_latest_uses_root_override() {
    let temp = TempDir::new().unwrap();
    let file = write_session(temp.path(), "parser", "ctx-latest");

    let (code, stdout) = run(&["--root", arg(temp.path()), "latest", "parser"]).unwrap();
    assert_eq!(code, EXIT_SUCCESS);
    assert!(stdout.contains(arg(&file)));
    assert!(stdout.contains("ctx-latest"));
    assert!(stdout.contains("arity-check"));
}

#[test]
fn test_latest_without_files_fails() {
    let temp = TempDir::new().unwrap();
    let err = run(&["--root", arg(temp.path()), "latest", "ghost"]).unwrap_err();
    assert!(err.to_string().contains("ghost"));
}

// ============================================================================
// correlate
// ============================================================================

#[test]
fn test_correlate_across_components() {
    let temp = TempDir::new().unwrap();
    write_session(temp.path(), "lexer", "req-1");
    write_session(temp.path(), "parser", "req-1");
    write_session(temp.path(), "parser", "req-2");

    let (_, stdout) = run(&["--root", arg(temp.path()), "correlate", "req-1", "--json"]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["components"]["lexer"], 3);
    assert_eq!(value["components"]["parser"], 3);
    assert_eq!(value["entries"].as_array().unwrap().len(), 6);
    assert!(value["entries"]
        .as_array()
        .unwrap()
        .iter()
        .all(|e| e["context_id"] == "req-1"));
}

#[test]
fn test_correlate_empty_root() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("never-created");
    let (code, stdout) = run(&["--root", arg(&root), "correlate", "req-9"]).unwrap();
    assert_eq!(code, EXIT_SUCCESS);
    assert!(stdout.contains("no matching entries"));
}

// ============================================================================
// Binary exit codes
// ============================================================================

fn binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_debugctl"))
}

#[test]
fn test_binary_selftest_succeeds() {
    let temp = TempDir::new().unwrap();
    let output = binary()
        .args(["--root", arg(temp.path()), "selftest"])
        .output()
        .expect("Failed to run debugctl");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(EXIT_SUCCESS), "stdout: {}", stdout);
    assert!(stdout.contains("checks passed"));
    assert!(!stdout.contains("[FAIL]"));
    // the binary installs the counting allocator
    assert!(stdout.contains("memory source: allocator"), "stdout: {}", stdout);
}

#[test]
fn test_binary_missing_file_exits_with_error() {
    let temp = TempDir::new().unwrap();
    let output = binary()
        .args(["show", arg(&temp.path().join("nope.debug"))])
        .output()
        .expect("Failed to run debugctl");

    assert_eq!(output.status.code(), Some(EXIT_GENERAL_ERROR));
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope.debug"));
}
