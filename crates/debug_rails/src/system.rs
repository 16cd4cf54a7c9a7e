//! Process identity and system context sources
//!
//! Identity is read once when an inspector is built. System context is
//! collected per SYSTEM_CONTEXT entry from independent sources; any source
//! that fails is left out without affecting the others.

use crate::entry::{State, StateValue};
use crate::format::UNKNOWN;
use crate::memory::to_mb;
use std::process::Command;
use sysinfo::System;

/// Compiler that built this library
pub const RUST_VERSION: &str = env!("DEBUG_RAILS_RUSTC_VERSION");

/// Process-invariant facts, captured once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub hostname: String,
    pub pid: u32,
    /// `user@host:pid`
    pub origin: String,
    pub home: String,
    pub rust_version: String,
    pub num_cpu: usize,
}

impl Identity {
    /// Read identity from the environment and OS
    pub fn capture() -> Self {
        let username = env_or_unknown("USER");
        let hostname = System::host_name()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());
        let pid = std::process::id();
        let origin = format!("{}@{}:{}", username, hostname, pid);

        Self {
            username,
            hostname,
            pid,
            origin,
            home: env_or_unknown("HOME"),
            rust_version: RUST_VERSION.to_string(),
            num_cpu: num_cpus::get(),
        }
    }
}

fn env_or_unknown(key: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Best-effort system context
pub fn collect_context(identity: &Identity) -> State {
    let mut state = State::new();

    state.insert("user".into(), identity.username.clone().into());
    state.insert("home".into(), identity.home.clone().into());
    if let Ok(shell) = std::env::var("SHELL") {
        state.insert("shell".into(), shell.into());
    }

    if let Ok(cwd) = std::env::current_dir() {
        state.insert("cwd".into(), cwd.display().to_string().into());
    }

    if let Some(load) = load_average() {
        state.insert("load".into(), StateValue::List(load));
    }

    if let Some((total, available)) = memory_totals() {
        state.insert("mem_total_mb".into(), StateValue::from_u64(to_mb(total)));
        state.insert("mem_available_mb".into(), StateValue::from_u64(to_mb(available)));
    }

    if let Some(disk) = disk_usage() {
        state.insert("disk_usage".into(), StateValue::List(disk));
    }

    if let Some(os) = System::long_os_version() {
        state.insert("os".into(), os.into());
    }

    state.insert("rust_version".into(), identity.rust_version.clone().into());
    state.insert("num_cpu".into(), identity.num_cpu.into());

    state
}

/// 1/5/15 minute load averages as written by the kernel
fn load_average() -> Option<Vec<String>> {
    let content = std::fs::read_to_string("/proc/loadavg").ok()?;
    parse_loadavg(&content)
}

fn parse_loadavg(content: &str) -> Option<Vec<String>> {
    let fields: Vec<String> = content.split_whitespace().take(3).map(str::to_string).collect();
    if fields.len() == 3 {
        Some(fields)
    } else {
        None
    }
}

/// (total, available) bytes of system memory
fn memory_totals() -> Option<(u64, u64)> {
    let mut sys = System::new();
    sys.refresh_memory();
    let total = sys.total_memory();
    if total == 0 {
        return None;
    }
    Some((total, sys.available_memory()))
}

/// Data row of `df -h .` split into fields
fn disk_usage() -> Option<Vec<String>> {
    let output = Command::new("df").args(["-h", "."]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8(output.stdout).ok()?;
    parse_df(&stdout)
}

fn parse_df(stdout: &str) -> Option<Vec<String>> {
    let row = stdout.lines().nth(1)?;
    let fields: Vec<String> = row.split_whitespace().map(str::to_string).collect();
    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}
