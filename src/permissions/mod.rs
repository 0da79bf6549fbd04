//! Permission system for tool execution
//!
//! Decides, for every tool invocation, whether it runs automatically
//! (`Allow`), needs user confirmation (`Ask`), or is blocked (`Deny`).
//!
//! Three layers of rule sets are consulted in order:
//! - **Session**: in-memory rules added at runtime (e.g. "always allow")
//! - **Project**: optional per-project overrides
//! - **Global**: always present, supplies the final default
//!
//! ## Patterns
//!
//! Rules match invocations with comma-separated components that must all
//! match: `tool:<name>`, `arg:<name>:<value>` and `category:<category>`.
//! Values may be exact strings, globs (`*rm -rf*`) or regexes (`^git (push|pull)`).
//!
//! ## Example
//!
//! ```rust
//! use shadow_policy_engine::permissions::{
//!     Arguments, PermissionChecker, PermissionLevel, PermissionRule, RuleSet,
//! };
//!
//! let global = RuleSet::with_rules(
//!     vec![
//!         PermissionRule::ask("tool:bash"),
//!         PermissionRule::deny("tool:bash,arg:command:*rm -rf*").with_priority(50),
//!     ],
//!     PermissionLevel::Ask,
//! );
//! let checker = PermissionChecker::new(global, None);
//!
//! let mut args = Arguments::new();
//! args.insert("command".into(), "rm -rf /tmp".into());
//!
//! let result = checker.check("bash", &args);
//! assert!(result.denied());
//! ```

mod cache;
mod checker;
mod config;
mod level;
mod pattern;
mod rule;
mod rule_set;

pub use cache::{CompiledValue, ValueCache, DEFAULT_CACHE_CAPACITY};
pub use checker::{PermissionChecker, UserDecision};
pub use config::{CheckerConfig, DEFAULT_SESSION_PRIORITY};
pub use level::{PermissionCategory, PermissionLevel};
pub use pattern::{stringify_value, Arguments, Pattern, PatternComponent, PatternMatcher};
pub use rule::{PermissionResult, PermissionRule, PermissionScope};
pub use rule_set::{RuleSet, RuleSetConfig, NO_MATCH_REASON};
