//! Permission rules and check results

use std::fmt;

use serde::{Deserialize, Serialize};

use super::level::PermissionLevel;
use super::pattern::Pattern;

/// A single permission rule
///
/// Rules are treated as immutable values: updating a rule means replacing
/// it in its rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    /// Which invocations this rule applies to
    pub pattern: Pattern,
    /// Level returned when the rule wins
    pub permission: PermissionLevel,
    /// Human-readable reason, used as the result's reason when set
    #[serde(default)]
    pub description: String,
    /// Disabled rules never match
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Higher priority rules are preferred
    #[serde(default)]
    pub priority: i32,
}

fn default_enabled() -> bool {
    true
}

impl PermissionRule {
    /// Create an enabled rule with priority 0 and no description
    pub fn new(pattern: impl Into<Pattern>, permission: PermissionLevel) -> Self {
        Self {
            pattern: pattern.into(),
            permission,
            description: String::new(),
            enabled: true,
            priority: 0,
        }
    }

    pub fn allow(pattern: impl Into<Pattern>) -> Self {
        Self::new(pattern, PermissionLevel::Allow)
    }

    pub fn ask(pattern: impl Into<Pattern>) -> Self {
        Self::new(pattern, PermissionLevel::Ask)
    }

    pub fn deny(pattern: impl Into<Pattern>) -> Self {
        Self::new(pattern, PermissionLevel::Deny)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Reason reported when this rule decides a check
    pub fn reason(&self) -> String {
        if self.description.is_empty() {
            format!("matched rule: {}", self.pattern)
        } else {
            self.description.clone()
        }
    }
}

/// Policy layer a decision came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionScope {
    /// In-memory rules for the current session
    Session,
    /// Project overrides
    Project,
    /// Global rules and the final default
    Global,
}

impl fmt::Display for PermissionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionScope::Session => write!(f, "session"),
            PermissionScope::Project => write!(f, "project"),
            PermissionScope::Global => write!(f, "global"),
        }
    }
}

/// Outcome of evaluating an invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionResult {
    /// Decided level
    pub level: PermissionLevel,
    /// Winning rule; `None` when the level came from a default
    pub rule: Option<PermissionRule>,
    /// Explanation for the decision
    pub reason: String,
    /// Layer that decided, set by [`super::PermissionChecker`]
    pub scope: Option<PermissionScope>,
}

impl PermissionResult {
    /// Result decided by a matching rule
    pub fn from_rule(rule: PermissionRule) -> Self {
        Self {
            level: rule.permission,
            reason: rule.reason(),
            rule: Some(rule),
            scope: None,
        }
    }

    /// Result taken from a default level
    pub fn from_default(level: PermissionLevel, reason: impl Into<String>) -> Self {
        Self {
            level,
            rule: None,
            reason: reason.into(),
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: PermissionScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Whether an actual rule fired (as opposed to a default)
    pub fn is_rule_match(&self) -> bool {
        self.rule.is_some()
    }

    pub fn allowed(&self) -> bool {
        self.level == PermissionLevel::Allow
    }

    pub fn needs_confirmation(&self) -> bool {
        self.level == PermissionLevel::Ask
    }

    pub fn denied(&self) -> bool {
        self.level == PermissionLevel::Deny
    }
}

impl fmt::Display for PermissionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_defaults() {
        let rule = PermissionRule::ask("tool:bash");
        assert_eq!(rule.pattern.as_str(), "tool:bash");
        assert_eq!(rule.permission, PermissionLevel::Ask);
        assert!(rule.enabled);
        assert_eq!(rule.priority, 0);
        assert_eq!(rule.reason(), "matched rule: tool:bash");
    }

    #[test]
    fn test_rule_reason_prefers_description() {
        let rule = PermissionRule::ask("tool:bash").with_description("Confirm shell commands");
        assert_eq!(rule.reason(), "Confirm shell commands");
    }

    #[test]
    fn test_rule_deserialize_fills_defaults() {
        let rule: PermissionRule =
            serde_json::from_str(r#"{"pattern": "tool:read", "permission": "allow"}"#).unwrap();
        assert_eq!(rule, PermissionRule::allow("tool:read"));
    }

    #[test]
    fn test_rule_serialize_shape() {
        let rule = PermissionRule::deny("tool:bash,arg:command:*rm*")
            .with_description("no rm")
            .with_priority(50);
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "pattern": "tool:bash,arg:command:*rm*",
                "permission": "deny",
                "description": "no rm",
                "enabled": true,
                "priority": 50
            })
        );
    }

    #[test]
    fn test_result_predicates_exclusive() {
        for level in [PermissionLevel::Allow, PermissionLevel::Ask, PermissionLevel::Deny] {
            let result = PermissionResult::from_default(level, "default");
            let flags = [result.allowed(), result.needs_confirmation(), result.denied()];
            assert_eq!(flags.iter().filter(|f| **f).count(), 1);
            assert!(!result.is_rule_match());
        }
    }

    #[test]
    fn test_result_from_rule() {
        let result = PermissionResult::from_rule(PermissionRule::deny("tool:rm"))
            .with_scope(PermissionScope::Project);
        assert!(result.denied());
        assert!(result.is_rule_match());
        assert_eq!(result.scope, Some(PermissionScope::Project));
        assert_eq!(result.to_string(), "deny: matched rule: tool:rm");
    }
}
