//! Rule pattern parsing and matching
//!
//! A pattern is a comma-separated list of components, all of which must
//! match for the rule to apply:
//!
//! - `tool:<value>` - matches the tool name
//! - `arg:<name>:<value>` - matches the stringified argument `name`
//!   (`arg:<name>` alone matches any present value)
//! - `category:<value>` - matches the tool's [`PermissionCategory`]
//!
//! Any other segment is read as an implicit `tool:` component.
//!
//! Values are matched by exact equality first, then as an unanchored regex
//! if they contain any of `^ $ + \ ( ) { } |`, otherwise as a glob where
//! `*` matches any run of characters and `?` a single character.

use std::borrow::Cow;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::cache::{CompiledValue, ValueCache, DEFAULT_CACHE_CAPACITY};
use super::level::PermissionCategory;
use crate::core::{PolicyError, PolicyResult};

/// Argument map of a single tool invocation
pub type Arguments = serde_json::Map<String, Value>;

const REGEX_CHARS: &[char] = &['^', '$', '+', '\\', '(', ')', '{', '}', '|'];
const WILDCARD_CHARS: &[char] = &['*', '?'];

/// One parsed constraint of a pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternComponent {
    /// Constrains the tool name
    Tool(String),
    /// Constrains a named argument; a missing argument never matches
    Arg { name: String, value: String },
    /// Constrains the tool's category
    Category(String),
}

impl PatternComponent {
    fn parse(segment: &str) -> Self {
        if let Some(value) = segment.strip_prefix("tool:") {
            PatternComponent::Tool(value.to_string())
        } else if let Some(rest) = segment.strip_prefix("arg:") {
            match rest.split_once(':') {
                Some((name, value)) => PatternComponent::Arg {
                    name: name.to_string(),
                    value: value.to_string(),
                },
                None => PatternComponent::Arg {
                    name: rest.to_string(),
                    value: "*".to_string(),
                },
            }
        } else if let Some(value) = segment.strip_prefix("category:") {
            PatternComponent::Category(value.to_string())
        } else {
            PatternComponent::Tool(segment.to_string())
        }
    }

    /// Contribution of this component to the pattern's specificity
    pub fn specificity(&self) -> i32 {
        let base = 10;
        match self {
            PatternComponent::Tool(value) => base + if has_wildcard(value) { 5 } else { 20 },
            PatternComponent::Arg { value, .. } => {
                base + 30 + if has_wildcard(value) { 5 } else { 20 }
            }
            PatternComponent::Category(_) => base + 5,
        }
    }
}

fn has_wildcard(value: &str) -> bool {
    value.contains(WILDCARD_CHARS)
}

/// Segments such as `argg:foo` look like a component prefix but are not one
fn looks_like_unknown_prefix(segment: &str) -> bool {
    match segment.split_once(':') {
        Some((prefix, _)) => {
            !prefix.is_empty()
                && prefix
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        }
        None => false,
    }
}

/// A parsed rule pattern
///
/// Serialises as its source string. Two patterns are equal when their
/// source strings are identical.
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Pattern {
    source: String,
    components: Vec<PatternComponent>,
    unrecognized: Vec<String>,
}

impl Pattern {
    /// Parse a pattern string. Never fails: unknown prefixes become tool
    /// components (see [`Pattern::validate`] for a strict check).
    pub fn parse(source: impl Into<String>) -> Self {
        let source = source.into();
        let mut components = Vec::new();
        let mut unrecognized = Vec::new();

        for segment in source.split(',').map(str::trim) {
            let component = PatternComponent::parse(segment);
            if matches!(&component, PatternComponent::Tool(value) if value == segment)
                && looks_like_unknown_prefix(segment)
            {
                tracing::warn!(
                    "Pattern segment '{}' in '{}' has no known prefix, treating it as a tool name",
                    segment,
                    source
                );
                unrecognized.push(segment.to_string());
            }
            components.push(component);
        }

        Self {
            source,
            components,
            unrecognized,
        }
    }

    /// Pattern matching a tool by exact name, optionally narrowed to one argument value
    pub fn for_invocation(tool_name: &str, argument: Option<(&str, &Value)>) -> Self {
        let source = match argument {
            Some((name, value)) => {
                format!("tool:{},arg:{}:{}", tool_name, name, stringify_value(value))
            }
            None => format!("tool:{}", tool_name),
        };
        Self::parse(source)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn components(&self) -> &[PatternComponent] {
        &self.components
    }

    /// Sum of component scores; higher means more narrowly targeted
    pub fn specificity(&self) -> i32 {
        self.components.iter().map(PatternComponent::specificity).sum()
    }

    /// Reject segments whose prefix is not tool/arg/category
    pub fn validate(&self) -> PolicyResult<()> {
        match self.unrecognized.first() {
            Some(segment) => Err(PolicyError::UnknownComponent {
                pattern: self.source.clone(),
                segment: segment.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl From<String> for Pattern {
    fn from(source: String) -> Self {
        Pattern::parse(source)
    }
}

impl From<&str> for Pattern {
    fn from(source: &str) -> Self {
        Pattern::parse(source)
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        pattern.source
    }
}

/// String form of an argument value used for matching.
///
/// Strings are used as-is; any other value uses its compact JSON text.
pub fn stringify_value(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

/// Translate a glob into an anchored regex: `*` is any run of characters,
/// `?` exactly one, everything else is literal.
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("(?s)^");
    let mut literal = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut literal))),
        }
    }
    out.push('$');
    out
}

fn compile_value(pattern: &str) -> CompiledValue {
    if pattern.contains(REGEX_CHARS) {
        match Regex::new(pattern) {
            Ok(re) => CompiledValue::Regex(re),
            Err(e) => {
                tracing::warn!("Invalid regex value pattern '{}': {}", pattern, e);
                CompiledValue::Invalid
            }
        }
    } else {
        match Regex::new(&glob_to_regex(pattern)) {
            Ok(re) => CompiledValue::Glob(re),
            Err(e) => {
                tracing::warn!("Invalid glob value pattern '{}': {}", pattern, e);
                CompiledValue::Invalid
            }
        }
    }
}

/// Evaluates patterns against tool invocations
///
/// Owns the cache of compiled value patterns. Share one matcher (behind an
/// `Arc`) between every rule set that should reuse compilations.
#[derive(Debug, Default)]
pub struct PatternMatcher {
    cache: ValueCache,
}

impl PatternMatcher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Create a matcher whose cache keeps at most `capacity` compiled patterns
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: ValueCache::new(capacity),
        }
    }

    pub fn cache(&self) -> &ValueCache {
        &self.cache
    }

    /// Check whether every component of `pattern` matches the invocation
    pub fn matches(&self, pattern: &Pattern, tool_name: &str, arguments: &Arguments) -> bool {
        if pattern.components.is_empty() {
            return false;
        }

        pattern.components.iter().all(|component| match component {
            PatternComponent::Tool(value) => self.match_value(value, tool_name),
            PatternComponent::Arg { name, value } => match arguments.get(name) {
                Some(arg) => self.match_value(value, &stringify_value(arg)),
                None => false,
            },
            PatternComponent::Category(value) => {
                self.match_value(value, PermissionCategory::for_tool(tool_name).as_str())
            }
        })
    }

    /// Match a single value pattern against a string
    pub fn match_value(&self, pattern: &str, value: &str) -> bool {
        if pattern.is_empty() {
            return false;
        }
        if pattern == value {
            return true;
        }
        // Literal that is not equal cannot match as a glob either
        if !pattern.contains(REGEX_CHARS) && !pattern.contains(WILDCARD_CHARS) {
            return false;
        }

        self.cache
            .get_or_compile(pattern, compile_value)
            .is_match(value)
    }
}
