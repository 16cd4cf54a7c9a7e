//! Debug configuration
//!
//! Optional settings file: `~/.config/debug-rails/debugging.toml`
//! (or the path in `$DEBUG_RAILS_CONFIG`).
//!
//! Loading never fails. A missing, unreadable or malformed file, or an
//! unresolvable home directory, leaves the config in a fallback state and
//! every accessor returns its hardcoded default. Each knob also falls back
//! on its own when the file leaves it empty or zero.

use serde::{Deserialize, Deserializer};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// Environment variable naming an alternate settings file
pub const CONFIG_ENV: &str = "DEBUG_RAILS_CONFIG";

/// Settings file location relative to `$HOME`
pub const CONFIG_RELATIVE_PATH: &str = ".config/debug-rails/debugging.toml";

/// Debug root relative to `$HOME`
pub const DEFAULT_BASE_DIR: &str = ".local/state/debug-rails/debug";

pub const DEFAULT_FILE_EXTENSION: &str = ".debug";
pub const DEFAULT_DIR_MODE: u32 = 0o755;
pub const DEFAULT_FILE_MODE: u32 = 0o644;
pub const DEFAULT_STACK_DEPTH: usize = 10;

// ============================================================================
// File schema
// ============================================================================

/// Settings file contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub paths: PathsSection,
    pub permissions: PermissionsSection,
    pub output: OutputSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    /// Absolute, or relative to `$HOME`
    pub base_dir: String,
    pub file_extension: String,
}

/// Unix modes; integers (`0o755`) or octal strings (`"0755"`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PermissionsSection {
    #[serde(deserialize_with = "deserialize_mode")]
    pub directory: u32,
    #[serde(deserialize_with = "deserialize_mode")]
    pub file: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub default_stack_depth: i64,
}

fn deserialize_mode<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawMode {
        Int(i64),
        Text(String),
    }

    match RawMode::deserialize(deserializer)? {
        // out-of-range numbers count as unset
        RawMode::Int(n) => Ok(u32::try_from(n).unwrap_or(0)),
        RawMode::Text(s) => {
            let s = s.trim();
            let digits = s.strip_prefix("0o").unwrap_or(s);
            u32::from_str_radix(digits, 8)
                .map_err(|_| serde::de::Error::custom(format!("invalid octal mode: {}", s)))
        }
    }
}

// ============================================================================
// Load status
// ============================================================================

/// Why the configuration holds the values it does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigStatus {
    /// Settings file parsed
    Loaded(PathBuf),
    /// No settings file; all fallbacks
    Missing(PathBuf),
    /// File exists but could not be read; all fallbacks
    Unreadable { path: PathBuf, reason: String },
    /// File could not be parsed; all fallbacks
    Malformed { path: PathBuf, reason: String },
    /// No home directory to look under; all fallbacks
    NoHome,
    /// Built in code without a load attempt
    Defaults,
}

// ============================================================================
// Configuration
// ============================================================================

/// Immutable debug configuration with per-knob fallbacks
#[derive(Debug, Clone)]
pub struct DebugConfig {
    file: Option<ConfigFile>,
    status: ConfigStatus,
    home: Option<PathBuf>,
    base_override: Option<PathBuf>,
}

impl Default for DebugConfig {
    /// All fallbacks, no load attempt
    fn default() -> Self {
        Self {
            file: None,
            status: ConfigStatus::Defaults,
            home: home_dir(),
            base_override: None,
        }
    }
}

impl DebugConfig {
    /// Process-wide configuration, loaded on first use
    ///
    /// The load runs exactly once even when many threads race to trigger it.
    pub fn shared() -> &'static DebugConfig {
        static SHARED: OnceLock<DebugConfig> = OnceLock::new();
        SHARED.get_or_init(DebugConfig::load)
    }

    /// Load from `$DEBUG_RAILS_CONFIG` or `~/.config/debug-rails/debugging.toml`
    pub fn load() -> Self {
        let env_path = std::env::var_os(CONFIG_ENV)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        Self::load_with(env_path, home_dir())
    }

    /// [`DebugConfig::load`] with the environment lookups supplied
    ///
    /// `env_path` wins over the home-relative file. Without either there is
    /// nothing to load and every knob falls back.
    pub fn load_with(env_path: Option<PathBuf>, home: Option<PathBuf>) -> Self {
        let path = match (env_path, &home) {
            (Some(path), _) => path,
            (None, Some(h)) => h.join(CONFIG_RELATIVE_PATH),
            (None, None) => {
                debug!("no home directory, using debug config fallbacks");
                return Self {
                    file: None,
                    status: ConfigStatus::NoHome,
                    home: None,
                    base_override: None,
                };
            }
        };

        Self::load_with_home(&path, home)
    }

    /// Load from an explicit settings file
    pub fn load_from(path: &Path) -> Self {
        Self::load_with_home(path, home_dir())
    }

    fn load_with_home(path: &Path, home: Option<PathBuf>) -> Self {
        let (file, status) = match fs::read_to_string(path) {
            Ok(text) => match toml::from_str::<ConfigFile>(&text) {
                Ok(file) => (Some(file), ConfigStatus::Loaded(path.to_path_buf())),
                Err(e) => (
                    None,
                    ConfigStatus::Malformed {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    },
                ),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                (None, ConfigStatus::Missing(path.to_path_buf()))
            }
            Err(e) => (
                None,
                ConfigStatus::Unreadable {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                },
            ),
        };

        debug!(path = %path.display(), status = ?status, "debug config load");

        Self {
            file,
            status,
            home,
            base_override: None,
        }
    }

    /// Override the debug root (takes precedence over the settings file)
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_override = Some(dir.into());
        self
    }

    /// Override the home directory used to resolve relative paths
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn status(&self) -> &ConfigStatus {
        &self.status
    }

    /// Debug root directory
    pub fn base_dir(&self) -> PathBuf {
        if let Some(dir) = &self.base_override {
            return dir.clone();
        }

        let configured = self
            .file
            .as_ref()
            .map(|f| f.paths.base_dir.trim())
            .filter(|d| !d.is_empty());

        match (configured, &self.home) {
            (Some(dir), _) if Path::new(dir).is_absolute() => PathBuf::from(dir),
            (Some(dir), Some(home)) => home.join(dir),
            (Some(dir), None) => PathBuf::from(dir),
            (None, Some(home)) => home.join(DEFAULT_BASE_DIR),
            (None, None) => std::env::temp_dir().join("debug-rails").join("debug"),
        }
    }

    /// Directory holding one component's debug files
    pub fn component_dir(&self, component: &str) -> PathBuf {
        self.base_dir().join(file_stem_component(component))
    }

    /// File extension, always with a leading dot
    pub fn file_extension(&self) -> String {
        match self
            .file
            .as_ref()
            .map(|f| f.paths.file_extension.trim())
            .filter(|e| !e.is_empty() && *e != ".")
        {
            Some(ext) if ext.starts_with('.') => ext.to_string(),
            Some(ext) => format!(".{}", ext),
            None => DEFAULT_FILE_EXTENSION.to_string(),
        }
    }

    pub fn dir_mode(&self) -> u32 {
        match self.file.as_ref().map(|f| f.permissions.directory & 0o7777) {
            Some(mode) if mode != 0 => mode,
            _ => DEFAULT_DIR_MODE,
        }
    }

    pub fn file_mode(&self) -> u32 {
        match self.file.as_ref().map(|f| f.permissions.file & 0o7777) {
            Some(mode) if mode != 0 => mode,
            _ => DEFAULT_FILE_MODE,
        }
    }

    /// Call-stack depth used when a caller asks for depth 0
    pub fn default_stack_depth(&self) -> usize {
        match self.file.as_ref().map(|f| f.output.default_stack_depth) {
            Some(depth) if depth > 0 => usize::try_from(depth).unwrap_or(DEFAULT_STACK_DEPTH),
            _ => DEFAULT_STACK_DEPTH,
        }
    }
}

/// Component name as a single path segment
pub fn file_stem_component(component: &str) -> String {
    let cleaned: String = component
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}
