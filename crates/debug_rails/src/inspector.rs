//! Inspector - per-component state inspection engine
//!
//! One inspector per component, created by that component. Construction is
//! cheap and touches nothing on disk; `enable` creates the debug file and
//! writes the session banner; capture calls append entries until `disable`.
//!
//! An inspector may be shared between threads. Each entry is written under
//! a lock as one block, so concurrent captures never interleave.

use crate::config::DebugConfig;
use crate::entry::{Correlation, Entry, EntryType, State};
use crate::error::InspectError;
use crate::system::Identity;
use crate::writer::DebugSink;
use chrono::Local;
use std::fs::DirBuilder;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// State inspector for one component
#[derive(Debug)]
pub struct Inspector {
    correlation: Correlation,
    identity: Identity,
    component_dir: PathBuf,
    config: DebugConfig,
    enabled: AtomicBool,
    sink: Mutex<Option<DebugSink>>,
}

impl Inspector {
    /// Disabled inspector with a synthesized context id and the shared config
    pub fn new(component: &str) -> Self {
        Self::with_config(component, None, DebugConfig::shared().clone())
    }

    /// Disabled inspector sharing a context id with sibling rails
    ///
    /// An empty id is treated as absent.
    pub fn with_context_id(component: &str, context_id: &str) -> Self {
        Self::with_config(component, Some(context_id), DebugConfig::shared().clone())
    }

    /// Disabled inspector with an injected configuration
    pub fn with_config(component: &str, context_id: Option<&str>, config: DebugConfig) -> Self {
        let identity = Identity::capture();
        let context_id = match context_id.filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => synthesize_context_id(component, identity.pid),
        };

        Self {
            correlation: Correlation {
                component: component.to_string(),
                origin: identity.origin.clone(),
                context_id,
            },
            component_dir: config.component_dir(component),
            identity,
            config,
            enabled: AtomicBool::new(false),
            sink: Mutex::new(None),
        }
    }

    pub fn component(&self) -> &str {
        &self.correlation.component
    }

    pub fn context_id(&self) -> &str {
        &self.correlation.context_id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn config(&self) -> &DebugConfig {
        &self.config
    }

    /// Directory this inspector writes into
    pub fn component_dir(&self) -> &Path {
        &self.component_dir
    }

    /// Current debug file, while enabled
    pub fn debug_file(&self) -> Option<PathBuf> {
        self.lock_sink().as_ref().map(|sink| sink.path().to_path_buf())
    }

    /// Start writing: create the component directory, a new debug file and
    /// its banner
    ///
    /// Calling this while already enabled does nothing. On error the
    /// inspector stays disabled.
    pub fn enable(&self) -> Result<(), InspectError> {
        let mut sink = self.lock_sink();
        if sink.is_some() {
            return Ok(());
        }

        create_dir(&self.component_dir, self.config.dir_mode())?;

        let started = Local::now();
        let stem = format!(
            "{}-{}",
            crate::config::file_stem_component(self.component()),
            started.timestamp()
        );
        let mut new_sink = DebugSink::create(
            &self.component_dir,
            &stem,
            &self.config.file_extension(),
            self.config.file_mode(),
        )?;
        new_sink.write_banner(
            self.component(),
            self.context_id(),
            self.identity.pid,
            started.naive_local(),
        )?;

        info!(
            component = %self.component(),
            context_id = %self.context_id(),
            path = %new_sink.path().display(),
            "inspector enabled"
        );

        *sink = Some(new_sink);
        self.enabled.store(true, Ordering::Release);
        Ok(())
    }

    /// Stop writing and close the debug file; does nothing when disabled
    pub fn disable(&self) {
        let mut sink = self.lock_sink();
        self.enabled.store(false, Ordering::Release);
        if let Some(closed) = sink.take() {
            debug!(
                component = %self.component(),
                path = %closed.path().display(),
                "inspector disabled"
            );
        }
    }

    /// Alias for [`Inspector::disable`]
    pub fn close(&self) {
        self.disable();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Build and append one entry; the call site is the caller of the public
    /// capture method
    #[track_caller]
    pub(crate) fn record(&self, entry_type: EntryType, label: &str, state: State) {
        let entry = Entry {
            timestamp: Local::now().naive_local(),
            entry_type,
            label: label.to_string(),
            call_site: crate::callsite::caller_site(),
            state,
        };

        let mut sink = self.lock_sink();
        let Some(sink) = sink.as_mut() else {
            return;
        };
        if let Err(err) = sink.append(&entry, &self.correlation) {
            warn!(
                component = %self.component(),
                entry_type = %entry_type,
                error = %err,
                "dropped debug entry"
            );
        }
    }

    fn lock_sink(&self) -> MutexGuard<'_, Option<DebugSink>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Inspector {
    fn drop(&mut self) {
        self.disable();
    }
}

/// `component-pid-nanos`
fn synthesize_context_id(component: &str, pid: u32) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{}-{}-{}", component, pid, nanos)
}

fn create_dir(dir: &Path, mode: u32) -> Result<(), InspectError> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    builder.create(dir).map_err(|source| InspectError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}
