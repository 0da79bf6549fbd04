//! Permission and policy engine for agent tool calls
//!
//! Every attempted tool invocation is checked against layered rule sets
//! (session, project, global) and resolved to allow, ask or deny, together
//! with the rule and reason behind the decision. Acting on the decision is
//! left to the caller.

pub mod core;
pub mod permissions;

// Optional components
pub mod logging;

pub use crate::core::{PolicyError, PolicyResult};
pub use permissions::{
    Arguments, PermissionChecker, PermissionLevel, PermissionResult, PermissionRule, RuleSet,
};
