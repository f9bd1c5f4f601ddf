//! Parse configuration.
//!
//! [`ParseOptions`] configures a single call. [`configure`] changes process-wide
//! defaults; each parse takes a snapshot when it starts, so a concurrent
//! change never affects a parse in flight.

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::ErrorMap;

/// Default bound on lazy schema nesting.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Process-wide defaults.
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    /// Disables the cached object plan. Results are identical either way.
    pub jitless: bool,
    /// Consulted after the per-call error map and before the default messages.
    pub custom_error: Option<ErrorMap>,
    pub max_depth: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            jitless: false,
            custom_error: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

static GLOBAL: Lazy<RwLock<GlobalConfig>> = Lazy::new(|| RwLock::new(GlobalConfig::default()));

/// Returns a snapshot of the process-wide configuration.
pub fn global() -> GlobalConfig {
    GLOBAL.read().clone()
}

/// Mutates the process-wide configuration.
///
/// # Example
///
/// ```rust
/// use sieve::config;
///
/// config::configure(|c| c.max_depth = 512);
/// assert_eq!(config::global().max_depth, 512);
/// config::configure(|c| c.max_depth = config::DEFAULT_MAX_DEPTH);
/// ```
pub fn configure(f: impl FnOnce(&mut GlobalConfig)) {
    let mut guard = GLOBAL.write();
    f(&mut guard);
    tracing::debug!(
        jitless = guard.jitless,
        max_depth = guard.max_depth,
        custom_error = guard.custom_error.is_some(),
        "global parse configuration updated"
    );
}

/// Options for a single parse call.
///
/// Unset fields fall back to the [global configuration](global).
///
/// # Example
///
/// ```rust
/// use sieve::{ParseOptions, Schema};
///
/// let options = ParseOptions::new().report_input(true);
/// let result = Schema::number().safe_parse_with("nope", &options).unwrap();
///
/// let issues = result.into_result().unwrap_err();
/// assert_eq!(issues.first().input, Some("nope".into()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub(crate) error: Option<ErrorMap>,
    pub(crate) report_input: bool,
    pub(crate) jitless: Option<bool>,
    pub(crate) max_depth: Option<usize>,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-call error map.
    pub fn error(mut self, map: ErrorMap) -> Self {
        self.error = Some(map);
        self
    }

    /// Keeps the offending input on returned issues.
    pub fn report_input(mut self, report: bool) -> Self {
        self.report_input = report;
        self
    }

    pub fn jitless(mut self, jitless: bool) -> Self {
        self.jitless = Some(jitless);
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }
}
