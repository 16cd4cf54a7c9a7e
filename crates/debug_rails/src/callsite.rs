//! Call-site and call-stack introspection
//!
//! Call sites come from `#[track_caller]` locations, which the compiler
//! fills in exactly and for free. Deeper stacks are walked with `backtrace`
//! and depend on debug symbols being available; frames without them render
//! as `unknown`.

use crate::format::UNKNOWN;
use std::panic::Location;
use std::path::Path;

/// Separator between frames in a rendered stack chain
pub const CHAIN_SEPARATOR: &str = " <- ";

/// Upper bound on frames inspected for one walk
const MAX_WALK: usize = 256;

/// `file:line` of a tracked caller location
fn call_site(location: &Location<'_>) -> String {
    format!("{}:{}", basename(location.file()), location.line())
}

/// `file:line` of whoever called the `#[track_caller]` chain this runs in
#[track_caller]
pub fn caller_site() -> String {
    call_site(Location::caller())
}

/// One resolved stack frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub function: String,
    pub location: Option<String>,
}

impl Frame {
    /// `function (file:line)`
    pub fn render(&self) -> String {
        match &self.location {
            Some(location) => format!("{} ({})", self.function, location),
            None => format!("{} ({})", self.function, UNKNOWN),
        }
    }
}

/// Walk the current stack, innermost first, skipping frames of the walker
/// and of the inspector itself
///
/// Returns at most `depth` frames; fewer when the stack is shallower.
pub fn stack_frames(depth: usize) -> Vec<Frame> {
    if depth == 0 {
        return Vec::new();
    }

    let mut frames = Vec::new();
    backtrace::trace(|raw| {
        let mut function = None;
        let mut location = None;
        backtrace::resolve_frame(raw, |symbol| {
            if function.is_none() {
                function = symbol.name().map(|name| format!("{:#}", name));
            }
            if location.is_none() {
                if let (Some(file), Some(line)) = (symbol.filename(), symbol.lineno()) {
                    location = Some(format!("{}:{}", basename_path(file), line));
                }
            }
        });

        frames.push(Frame {
            function: function.unwrap_or_else(|| UNKNOWN.to_string()),
            location,
        });
        frames.len() < MAX_WALK
    });

    frames
        .into_iter()
        .skip_while(|f| is_internal(&f.function))
        .take(depth)
        .collect()
}

/// Render frames as a single chain string
pub fn render_chain(frames: &[Frame]) -> String {
    frames
        .iter()
        .map(Frame::render)
        .collect::<Vec<_>>()
        .join(CHAIN_SEPARATOR)
}

fn is_internal(function: &str) -> bool {
    function.starts_with("backtrace::")
        || function.starts_with("debug_rails::callsite::")
        || function.contains("Inspector>::call_stack")
        || function.contains("Inspector::call_stack")
        || function == UNKNOWN
}

fn basename(file: &str) -> &str {
    file.rsplit(['/', '\\']).next().unwrap_or(file)
}

fn basename_path(file: &Path) -> String {
    file.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn where_am_i() -> String {
        caller_site()
    }

    #[test]
    fn test_call_site_points_at_caller() {
        let line = line!() + 1;
        let site = where_am_i();
        assert_eq!(site, format!("callsite.rs:{}", line));
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("src/a/b.rs"), "b.rs");
        assert_eq!(basename("C:\\x\\y.rs"), "y.rs");
        assert_eq!(basename("plain.rs"), "plain.rs");
    }

    #[test]
    fn test_stack_frames_respects_depth() {
        assert!(stack_frames(0).is_empty());
        let frames = stack_frames(3);
        assert!(frames.len() <= 3);
        let frames = stack_frames(10_000);
        assert!(frames.len() <= MAX_WALK);
    }

    #[test]
    fn test_render_chain() {
        let frames = vec![
            Frame { function: "a::f".into(), location: Some("f.rs:1".into()) },
            Frame { function: "a::g".into(), location: None },
        ];
        assert_eq!(render_chain(&frames), "a::f (f.rs:1) <- a::g (unknown)");
    }
}
