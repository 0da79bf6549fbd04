//! Permission levels and tool categories

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::PolicyError;

/// Outcome level of a permission check
///
/// Variants are declared in order of restrictiveness, so the derived
/// `Ord` gives `Allow < Ask < Deny`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    /// Execute without asking
    Allow,
    /// Ask the user before executing
    Ask,
    /// Never execute
    Deny,
}

impl PermissionLevel {
    /// Lowercase tag used in persisted configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::Allow => "allow",
            PermissionLevel::Ask => "ask",
            PermissionLevel::Deny => "deny",
        }
    }

    /// The more restrictive of two levels
    pub fn most_restrictive(self, other: Self) -> Self {
        self.max(other)
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionLevel {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(PermissionLevel::Allow),
            "ask" => Ok(PermissionLevel::Ask),
            "deny" => Ok(PermissionLevel::Deny),
            _ => Err(PolicyError::InvalidLevel(s.to_string())),
        }
    }
}

/// Coarse grouping of tools, usable in `category:` pattern components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionCategory {
    Read,
    Write,
    Execute,
    Network,
    Destructive,
    Other,
}

/// Static tool name -> category table. Lookups are case-insensitive.
const TOOL_CATEGORIES: &[(&str, PermissionCategory)] = &[
    ("read", PermissionCategory::Read),
    ("read_file", PermissionCategory::Read),
    ("glob", PermissionCategory::Read),
    ("grep", PermissionCategory::Read),
    ("ls", PermissionCategory::Read),
    ("list_directory", PermissionCategory::Read),
    ("search", PermissionCategory::Read),
    ("write", PermissionCategory::Write),
    ("write_file", PermissionCategory::Write),
    ("edit", PermissionCategory::Write),
    ("multi_edit", PermissionCategory::Write),
    ("notebook_edit", PermissionCategory::Write),
    ("todo", PermissionCategory::Write),
    ("bash", PermissionCategory::Execute),
    ("shell", PermissionCategory::Execute),
    ("exec", PermissionCategory::Execute),
    ("run_command", PermissionCategory::Execute),
    ("web_fetch", PermissionCategory::Network),
    ("web_search", PermissionCategory::Network),
    ("fetch", PermissionCategory::Network),
    ("http_request", PermissionCategory::Network),
    ("delete", PermissionCategory::Destructive),
    ("delete_file", PermissionCategory::Destructive),
    ("remove", PermissionCategory::Destructive),
    ("rm", PermissionCategory::Destructive),
];

impl PermissionCategory {
    /// Look up the category of a tool, defaulting to `Other`
    pub fn for_tool(tool_name: &str) -> Self {
        TOOL_CATEGORIES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(tool_name))
            .map(|(_, category)| *category)
            .unwrap_or(PermissionCategory::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionCategory::Read => "read",
            PermissionCategory::Write => "write",
            PermissionCategory::Execute => "execute",
            PermissionCategory::Network => "network",
            PermissionCategory::Destructive => "destructive",
            PermissionCategory::Other => "other",
        }
    }
}

impl fmt::Display for PermissionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
