//! Rule set evaluation
//!
//! A rule set picks a single winner among its enabled, matching rules by
//! comparing, in order:
//!
//! 1. `priority` (higher wins)
//! 2. pattern specificity (higher wins)
//! 3. restrictiveness of the permission (`Deny > Ask > Allow`)
//!
//! Remaining ties go to the rule that was added first. When nothing
//! matches, the rule set's default level is returned with no rule.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::level::PermissionLevel;
use super::pattern::{Arguments, PatternMatcher};
use super::rule::{PermissionResult, PermissionRule};
use crate::core::PolicyResult;

/// Reason reported when a rule set falls back to its default
pub const NO_MATCH_REASON: &str = "no matching rule, using default";

/// Persisted shape of a rule set: `{"default": "...", "rules": [...]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSetConfig {
    #[serde(default = "default_level")]
    pub default: PermissionLevel,
    #[serde(default)]
    pub rules: Vec<PermissionRule>,
}

fn default_level() -> PermissionLevel {
    PermissionLevel::Ask
}

/// An ordered collection of rules plus a fallback level
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<PermissionRule>,
    default: PermissionLevel,
    matcher: Arc<PatternMatcher>,
}

/// Composite ordering key; larger wins
fn rank(rule: &PermissionRule) -> (i32, i32, PermissionLevel) {
    (rule.priority, rule.pattern.specificity(), rule.permission)
}

impl RuleSet {
    /// Create an empty rule set with its own pattern matcher
    pub fn new(default: PermissionLevel) -> Self {
        Self::with_rules(Vec::new(), default)
    }

    pub fn with_rules(rules: Vec<PermissionRule>, default: PermissionLevel) -> Self {
        Self {
            rules,
            default,
            matcher: Arc::new(PatternMatcher::new()),
        }
    }

    /// Evaluate with a shared matcher (and its compiled-pattern cache)
    pub fn with_matcher(mut self, matcher: Arc<PatternMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn matcher(&self) -> &Arc<PatternMatcher> {
        &self.matcher
    }

    /// Decide the level for one invocation
    pub fn evaluate(&self, tool_name: &str, arguments: &Arguments) -> PermissionResult {
        let winner = self
            .rules
            .iter()
            .filter(|rule| {
                rule.enabled && self.matcher.matches(&rule.pattern, tool_name, arguments)
            })
            .fold(None::<&PermissionRule>, |best, rule| match best {
                Some(best) if rank(rule) <= rank(best) => Some(best),
                _ => Some(rule),
            });

        match winner {
            Some(rule) => {
                tracing::debug!(
                    "Rule '{}' decided {} for {}",
                    rule.pattern,
                    rule.permission,
                    tool_name
                );
                PermissionResult::from_rule(rule.clone())
            }
            None => PermissionResult::from_default(self.default, NO_MATCH_REASON),
        }
    }

    /// Append a rule. Duplicate patterns are kept; callers that need
    /// unique patterns remove the old rule first.
    pub fn add_rule(&mut self, rule: PermissionRule) {
        self.rules.push(rule);
    }

    /// Remove every rule whose pattern string equals `pattern`.
    /// Returns whether anything was removed.
    pub fn remove_rule(&mut self, pattern: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|rule| rule.pattern.as_str() != pattern);
        self.rules.len() != before
    }

    /// First rule whose pattern string equals `pattern`
    pub fn get_rule(&self, pattern: &str) -> Option<&PermissionRule> {
        self.rules.iter().find(|rule| rule.pattern.as_str() == pattern)
    }

    pub fn rules(&self) -> &[PermissionRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    pub fn default_level(&self) -> PermissionLevel {
        self.default
    }

    pub fn set_default(&mut self, default: PermissionLevel) {
        self.default = default;
    }

    /// Reject rules whose patterns contain unknown component prefixes
    pub fn validate(&self) -> PolicyResult<()> {
        self.rules.iter().try_for_each(|rule| rule.pattern.validate())
    }

    pub fn to_config(&self) -> RuleSetConfig {
        RuleSetConfig {
            default: self.default,
            rules: self.rules.clone(),
        }
    }

    pub fn from_config(config: RuleSetConfig) -> Self {
        Self::with_rules(config.rules, config.default)
    }

    /// Like [`RuleSet::from_config`], but fails on unknown pattern prefixes
    pub fn from_config_strict(config: RuleSetConfig) -> PolicyResult<Self> {
        let rule_set = Self::from_config(config);
        rule_set.validate()?;
        Ok(rule_set)
    }

    pub fn to_value(&self) -> PolicyResult<Value> {
        Ok(serde_json::to_value(self.to_config())?)
    }

    pub fn from_value(value: Value) -> PolicyResult<Self> {
        Ok(Self::from_config(serde_json::from_value(value)?))
    }

    pub fn to_json(&self) -> PolicyResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_config())?)
    }

    pub fn from_json(json: &str) -> PolicyResult<Self> {
        Ok(Self::from_config(serde_json::from_str(json)?))
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(PermissionLevel::Ask)
    }
}

impl PartialEq for RuleSet {
    fn eq(&self, other: &Self) -> bool {
        self.default == other.default && self.rules == other.rules
    }
}

impl From<RuleSetConfig> for RuleSet {
    fn from(config: RuleSetConfig) -> Self {
        RuleSet::from_config(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PolicyError;
    use serde_json::json;

    fn args(value: Value) -> Arguments {
        match value {
            Value::Object(map) => map,
            _ => Arguments::new(),
        }
    }

    fn bash_rules() -> RuleSet {
        RuleSet::with_rules(
            vec![
                PermissionRule::ask("tool:bash"),
                PermissionRule::deny("tool:bash,arg:command:*rm -rf*").with_priority(50),
            ],
            PermissionLevel::Ask,
        )
    }

    #[test]
    fn test_single_rule_match() {
        let rules =
            RuleSet::with_rules(vec![PermissionRule::allow("tool:read")], PermissionLevel::Ask);
        let result = rules.evaluate("read", &Arguments::new());
        assert_eq!(result.level, PermissionLevel::Allow);
        assert_eq!(result.reason, "matched rule: tool:read");
    }

    #[test]
    fn test_default_when_nothing_matches() {
        let rules =
            RuleSet::with_rules(vec![PermissionRule::allow("tool:read")], PermissionLevel::Deny);
        let result = rules.evaluate("write", &Arguments::new());
        assert_eq!(result.level, PermissionLevel::Deny);
        assert!(result.rule.is_none());
        assert_eq!(result.reason, NO_MATCH_REASON);
    }

    #[test]
    fn test_priority_wins() {
        let rules = bash_rules();
        let result = rules.evaluate("bash", &args(json!({"command": "rm -rf /tmp"})));
        assert_eq!(result.level, PermissionLevel::Deny);

        let result = rules.evaluate("bash", &args(json!({"command": "ls -la"})));
        assert_eq!(result.level, PermissionLevel::Ask);
    }

    #[test]
    fn test_priority_dominates_specificity() {
        let rules = RuleSet::with_rules(
            vec![
                PermissionRule::deny("tool:bash,arg:command:git push"),
                PermissionRule::allow("tool:*").with_priority(1),
            ],
            PermissionLevel::Ask,
        );
        let result = rules.evaluate("bash", &args(json!({"command": "git push"})));
        assert_eq!(result.level, PermissionLevel::Allow);
    }

    #[test]
    fn test_specificity_breaks_priority_tie() {
        let rules = RuleSet::with_rules(
            vec![
                PermissionRule::deny("tool:*"),
                PermissionRule::allow("tool:bash,arg:command:git status"),
            ],
            PermissionLevel::Ask,
        );
        let result = rules.evaluate("bash", &args(json!({"command": "git status"})));
        assert_eq!(result.level, PermissionLevel::Allow);

        // Only the broad rule matches here
        let result = rules.evaluate("bash", &args(json!({"command": "git push"})));
        assert_eq!(result.level, PermissionLevel::Deny);
    }

    #[test]
    fn test_restrictiveness_breaks_full_tie() {
        for order in [false, true] {
            let mut rules = vec![PermissionRule::allow("tool:bash"), PermissionRule::deny("bash")];
            if order {
                rules.reverse();
            }
            let rule_set = RuleSet::with_rules(rules, PermissionLevel::Allow);
            let result = rule_set.evaluate("bash", &Arguments::new());
            assert_eq!(result.level, PermissionLevel::Deny);
        }
    }

    #[test]
    fn test_identical_rank_keeps_first() {
        let rules = RuleSet::with_rules(
            vec![
                PermissionRule::ask("tool:bash").with_description("first"),
                PermissionRule::ask("bash").with_description("second"),
            ],
            PermissionLevel::Allow,
        );
        let result = rules.evaluate("bash", &Arguments::new());
        assert_eq!(result.reason, "first");
    }

    #[test]
    fn test_disabled_rules_ignored() {
        let rules = RuleSet::with_rules(
            vec![PermissionRule::deny("tool:bash").with_enabled(false)],
            PermissionLevel::Allow,
        );
        let result = rules.evaluate("bash", &Arguments::new());
        assert_eq!(result.level, PermissionLevel::Allow);
        assert!(result.rule.is_none());
    }

    #[test]
    fn test_bracket_glob_rule_applies() {
        let rules = RuleSet::with_rules(
            vec![PermissionRule::deny("tool:bash,arg:command:*[1*")],
            PermissionLevel::Allow,
        );
        let result = rules.evaluate("bash", &args(json!({"command": "cat a[1].txt"})));
        assert_eq!(result.level, PermissionLevel::Deny);
        assert!(result.is_rule_match());
    }

    #[test]
    fn test_trailing_comma_rule_is_dead() {
        let rules =
            RuleSet::with_rules(vec![PermissionRule::allow("tool:bash,")], PermissionLevel::Ask);
        let result = rules.evaluate("bash", &Arguments::new());
        assert_eq!(result.level, PermissionLevel::Ask);
        assert!(result.rule.is_none());
    }

    #[test]
    fn test_add_remove_get() {
        let mut rules = RuleSet::new(PermissionLevel::Ask);
        rules.add_rule(PermissionRule::allow("tool:read"));
        rules.add_rule(PermissionRule::deny("tool:read"));
        assert_eq!(rules.len(), 2);

        assert_eq!(
            rules.get_rule("tool:read").map(|r| r.permission),
            Some(PermissionLevel::Allow)
        );
        assert!(rules.get_rule("tool:write").is_none());

        assert!(rules.remove_rule("tool:read"));
        assert!(rules.is_empty());
        assert!(!rules.remove_rule("tool:read"));
    }

    #[test]
    fn test_config_shape() {
        let rules = RuleSet::with_rules(
            vec![PermissionRule::ask("tool:bash").with_description("Confirm shell commands")],
            PermissionLevel::Deny,
        );
        assert_eq!(
            rules.to_value().unwrap(),
            json!({
                "default": "deny",
                "rules": [{
                    "pattern": "tool:bash",
                    "permission": "ask",
                    "description": "Confirm shell commands",
                    "enabled": true,
                    "priority": 0
                }]
            })
        );
    }

    #[test]
    fn test_from_value_defaults_and_errors() {
        let rules = RuleSet::from_value(json!({
            "default": "allow",
            "rules": [{"pattern": "tool:bash", "permission": "deny"}]
        }))
        .unwrap();
        assert_eq!(rules.default_level(), PermissionLevel::Allow);
        assert_eq!(rules.rules()[0], PermissionRule::deny("tool:bash"));

        let err = RuleSet::from_value(json!({"default": "sometimes"})).unwrap_err();
        assert!(matches!(err, PolicyError::Serialization(_)));
    }

    #[test]
    fn test_json_round_trip_evaluates_identically() {
        let rules = bash_rules();
        let back = RuleSet::from_json(&rules.to_json().unwrap()).unwrap();
        assert_eq!(back, rules);

        for command in ["rm -rf /", "ls", "echo hi"] {
            let a = args(json!({ "command": command }));
            assert_eq!(rules.evaluate("bash", &a), back.evaluate("bash", &a));
        }
    }

    #[test]
    fn test_strict_loading() {
        let config = RuleSetConfig {
            default: PermissionLevel::Ask,
            rules: vec![PermissionRule::deny("argg:command:rm")],
        };
        assert!(matches!(
            RuleSet::from_config_strict(config.clone()),
            Err(PolicyError::UnknownComponent { .. })
        ));
        // Permissive loading keeps the rule as a tool-name pattern
        assert_eq!(RuleSet::from_config(config).len(), 1);
    }

    #[test]
    fn test_shared_matcher() {
        let matcher = Arc::new(PatternMatcher::with_capacity(4));
        let rules =
            RuleSet::with_rules(vec![PermissionRule::allow("tool:web_*")], PermissionLevel::Ask)
                .with_matcher(Arc::clone(&matcher));

        assert!(rules.evaluate("web_fetch", &Arguments::new()).allowed());
        assert_eq!(matcher.cache().len(), 1);
    }
}
