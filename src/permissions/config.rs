//! Permission checker configuration

use serde::{Deserialize, Serialize};

use super::cache::DEFAULT_CACHE_CAPACITY;

/// Priority given to rules created by "always allow/deny" choices
pub const DEFAULT_SESSION_PRIORITY: i32 = 100;

/// Tunables for a [`super::PermissionChecker`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// Maximum number of compiled value patterns kept in the shared cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Priority of rules installed by `allow_always` / `deny_always`
    #[serde(default = "default_session_priority")]
    pub session_priority: i32,

    /// Reject unknown pattern prefixes when loading rule sets
    #[serde(default)]
    pub strict_patterns: bool,
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_session_priority() -> i32 {
    DEFAULT_SESSION_PRIORITY
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            session_priority: DEFAULT_SESSION_PRIORITY,
            strict_patterns: false,
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compiled-pattern cache capacity (0 disables caching)
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_session_priority(mut self, priority: i32) -> Self {
        self.session_priority = priority;
        self
    }

    pub fn with_strict_patterns(mut self, strict: bool) -> Self {
        self.strict_patterns = strict;
        self
    }
}
