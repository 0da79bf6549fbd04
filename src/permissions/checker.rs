//! Layered permission checker
//!
//! Resolves a decision across three rule sets:
//! - Session: in-memory rules added during the current session
//! - Project: optional project overrides
//! - Global: always present, supplies the final default
//!
//! A layer only decides when one of its rules actually matched; falling
//! through to its own default hands the decision to the next layer.
//!
//! Every layer is held as an immutable `Arc<RuleSet>` snapshot. Readers
//! clone the `Arc` and evaluate without holding a lock; writers build a new
//! rule set and swap the pointer.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use super::config::CheckerConfig;
use super::level::PermissionLevel;
use super::pattern::{Arguments, Pattern, PatternMatcher};
use super::rule::{PermissionResult, PermissionRule, PermissionScope};
use super::rule_set::{RuleSet, RuleSetConfig};
use crate::core::PolicyResult;

/// The user's answer to an `Ask` result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserDecision {
    /// Allow this invocation only
    Allow,
    /// Deny this invocation only
    Deny,
    /// Allow and remember for the rest of the session
    AlwaysAllow,
    /// Deny and remember for the rest of the session
    AlwaysDeny,
}

fn snapshot<T: Clone>(lock: &RwLock<T>) -> T {
    // Values are swapped whole, so a poisoned lock still holds a valid one
    lock.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn replace<T>(lock: &RwLock<T>, value: T) {
    *lock.write().unwrap_or_else(PoisonError::into_inner) = value;
}

/// Permission checker shared by every tool call of a session
///
/// Wrap it in an `Arc` to share it between concurrent tool executions;
/// all methods take `&self`.
///
/// # Example
///
/// ```
/// use shadow_policy_engine::permissions::{
///     Arguments, PermissionChecker, PermissionLevel, PermissionRule, RuleSet,
/// };
///
/// let global = RuleSet::with_rules(
///     vec![PermissionRule::allow("category:read")],
///     PermissionLevel::Ask,
/// );
/// let checker = PermissionChecker::new(global, None);
///
/// assert!(checker.check("grep", &Arguments::new()).allowed());
/// assert!(checker.check("bash", &Arguments::new()).needs_confirmation());
///
/// checker.allow_always("bash", None);
/// assert!(checker.check("bash", &Arguments::new()).allowed());
/// ```
#[derive(Debug)]
pub struct PermissionChecker {
    global: RwLock<Arc<RuleSet>>,
    project: RwLock<Option<Arc<RuleSet>>>,
    session: RwLock<Arc<RuleSet>>,
    matcher: Arc<PatternMatcher>,
    config: CheckerConfig,
}

impl PermissionChecker {
    /// Create a checker with an empty session layer
    pub fn new(global: RuleSet, project: Option<RuleSet>) -> Self {
        Self::with_config(global, project, CheckerConfig::default())
    }

    pub fn with_config(global: RuleSet, project: Option<RuleSet>, config: CheckerConfig) -> Self {
        let matcher = Arc::new(PatternMatcher::with_capacity(config.cache_capacity));
        let bind = |rule_set: RuleSet| Arc::new(rule_set.with_matcher(Arc::clone(&matcher)));

        Self {
            global: RwLock::new(bind(global)),
            project: RwLock::new(project.map(bind)),
            session: RwLock::new(bind(RuleSet::new(PermissionLevel::Ask))),
            matcher,
            config,
        }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Matcher shared by all layers
    pub fn matcher(&self) -> &Arc<PatternMatcher> {
        &self.matcher
    }

    /// Build a rule set from its persisted shape, bound to this checker's
    /// matcher. Unknown pattern prefixes are rejected in strict mode.
    pub fn load_rule_set(&self, config: RuleSetConfig) -> PolicyResult<RuleSet> {
        let rule_set = if self.config.strict_patterns {
            RuleSet::from_config_strict(config)?
        } else {
            RuleSet::from_config(config)
        };
        Ok(rule_set.with_matcher(Arc::clone(&self.matcher)))
    }

    /// Decide whether a tool invocation may run
    ///
    /// Checks in order: session → project → global → global default
    pub fn check(&self, tool_name: &str, arguments: &Arguments) -> PermissionResult {
        let result = self.session().evaluate(tool_name, arguments);
        if result.is_rule_match() {
            tracing::debug!(
                "[PermissionChecker] Session rule decided {} for {}",
                result.level,
                tool_name
            );
            return result.with_scope(PermissionScope::Session);
        }

        if let Some(project) = self.project() {
            let result = project.evaluate(tool_name, arguments);
            if result.is_rule_match() {
                tracing::debug!(
                    "[PermissionChecker] Project rule decided {} for {}",
                    result.level,
                    tool_name
                );
                return result.with_scope(PermissionScope::Project);
            }
        }

        let global = self.global();
        let result = global.evaluate(tool_name, arguments);
        if result.is_rule_match() {
            tracing::debug!(
                "[PermissionChecker] Global rule decided {} for {}",
                result.level,
                tool_name
            );
            return result.with_scope(PermissionScope::Global);
        }

        let level = global.default_level();
        tracing::debug!(
            "[PermissionChecker] No rule matched {}, using global default {}",
            tool_name,
            level
        );
        PermissionResult::from_default(level, format!("using global default: {}", level))
            .with_scope(PermissionScope::Global)
    }

    /// Like [`check`](Self::check) for a raw tool input; non-object inputs
    /// are treated as having no arguments.
    pub fn check_input(&self, tool_name: &str, input: &Value) -> PermissionResult {
        match input {
            Value::Object(arguments) => self.check(tool_name, arguments),
            _ => self.check(tool_name, &Arguments::new()),
        }
    }

    fn update_session<R>(&self, f: impl FnOnce(&mut RuleSet) -> R) -> R {
        let mut guard = self.session.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = RuleSet::clone(&guard);
        let out = f(&mut next);
        *guard = Arc::new(next);
        out
    }

    /// Add a session rule, replacing any session rule with the same pattern
    pub fn add_session_rule(&self, rule: PermissionRule) {
        tracing::info!(
            "Adding session permission rule: {} -> {} (priority {})",
            rule.pattern,
            rule.permission,
            rule.priority
        );
        self.update_session(|session| {
            session.remove_rule(rule.pattern.as_str());
            session.add_rule(rule);
        });
    }

    /// Remove the session rule with this exact pattern
    pub fn remove_session_rule(&self, pattern: &str) -> bool {
        let removed = self.update_session(|session| session.remove_rule(pattern));
        if removed {
            tracing::info!("Removed session permission rule: {}", pattern);
        }
        removed
    }

    pub fn clear_session_rules(&self) {
        tracing::info!("Clearing session permission rules");
        self.update_session(RuleSet::clear);
    }

    /// Reset the session layer when the working session ends
    pub fn end_session(&self) {
        let count = self.update_session(|session| {
            let count = session.len();
            session.clear();
            count
        });
        tracing::info!("Session ended, discarded {} session rule(s)", count);
    }

    pub fn get_session_rules(&self) -> Vec<PermissionRule> {
        self.session().rules().to_vec()
    }

    /// Always allow this tool (optionally narrowed to the first argument)
    /// for the rest of the session
    pub fn allow_always(&self, tool_name: &str, arguments: Option<&Arguments>) -> PermissionRule {
        self.always(tool_name, arguments, PermissionLevel::Allow)
    }

    /// Always deny this tool (optionally narrowed to the first argument)
    /// for the rest of the session
    pub fn deny_always(&self, tool_name: &str, arguments: Option<&Arguments>) -> PermissionRule {
        self.always(tool_name, arguments, PermissionLevel::Deny)
    }

    fn always(
        &self,
        tool_name: &str,
        arguments: Option<&Arguments>,
        level: PermissionLevel,
    ) -> PermissionRule {
        // Only the first argument narrows the rule
        let first = arguments
            .and_then(|args| args.iter().next())
            .map(|(name, value)| (name.as_str(), value));
        let verb = match level {
            PermissionLevel::Allow => "allow",
            PermissionLevel::Ask => "ask for",
            PermissionLevel::Deny => "deny",
        };

        let rule = PermissionRule::new(Pattern::for_invocation(tool_name, first), level)
            .with_description(format!("Session rule: always {} {}", verb, tool_name))
            .with_priority(self.config.session_priority);

        self.add_session_rule(rule.clone());
        rule
    }

    /// Apply the user's answer to an `Ask` result
    ///
    /// "Always" answers install a session rule for the same invocation.
    /// Returns the level the caller should act on.
    pub fn apply_decision(
        &self,
        tool_name: &str,
        arguments: Option<&Arguments>,
        decision: UserDecision,
    ) -> PermissionLevel {
        match decision {
            UserDecision::Allow => PermissionLevel::Allow,
            UserDecision::Deny => PermissionLevel::Deny,
            UserDecision::AlwaysAllow => {
                self.allow_always(tool_name, arguments);
                PermissionLevel::Allow
            }
            UserDecision::AlwaysDeny => {
                self.deny_always(tool_name, arguments);
                PermissionLevel::Deny
            }
        }
    }

    /// Replace the global layer
    pub fn reload_global(&self, global: RuleSet) {
        tracing::info!("Reloading global permission rules ({} rule(s))", global.len());
        replace(
            &self.global,
            Arc::new(global.with_matcher(Arc::clone(&self.matcher))),
        );
    }

    /// Replace (or remove) the project layer
    pub fn reload_project(&self, project: Option<RuleSet>) {
        match &project {
            Some(rules) => tracing::info!(
                "Reloading project permission rules ({} rule(s))",
                rules.len()
            ),
            None => tracing::info!("Removing project permission rules"),
        }
        let matcher = &self.matcher;
        replace(
            &self.project,
            project.map(|rules| Arc::new(rules.with_matcher(Arc::clone(matcher)))),
        );
    }

    pub fn global(&self) -> Arc<RuleSet> {
        snapshot(&self.global)
    }

    pub fn project(&self) -> Option<Arc<RuleSet>> {
        snapshot(&self.project)
    }

    pub fn session(&self) -> Arc<RuleSet> {
        snapshot(&self.session)
    }
}
