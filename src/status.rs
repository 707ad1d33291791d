//! Status conditions
//!
//! Conditions are mutated in memory only. The reconciliation engine persists
//! them with a single status merge patch at the end of each cycle, so marking
//! a condition with the state it already has must leave the object unchanged.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition owned by the engine, reflecting the latest delegate call
pub const ACTIVE: &str = "Active";

/// Condition status following Kubernetes conventions
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Status condition
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type
    #[serde(rename = "type")]
    pub type_: String,

    /// Status (True, False, Unknown)
    pub status: ConditionStatus,

    /// Last time the status changed
    pub last_transition_time: DateTime<Utc>,

    /// Machine-readable reason
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Access to the conditions list of a resource's status
pub trait StatusConditions {
    fn conditions(&self) -> &[Condition];
    fn conditions_mut(&mut self) -> &mut Vec<Condition>;
}

/// Look up a condition by type
pub fn get_condition<'a, K: StatusConditions>(obj: &'a K, type_: &str) -> Option<&'a Condition> {
    obj.conditions().iter().find(|c| c.type_ == type_)
}

/// Whether the named condition is present and True
pub fn is_true<K: StatusConditions>(obj: &K, type_: &str) -> bool {
    get_condition(obj, type_).is_some_and(|c| c.status == ConditionStatus::True)
}

/// Set the condition to True, clearing reason and message
pub fn mark_true<K: StatusConditions>(obj: &mut K, type_: &str) {
    set_condition(obj, type_, ConditionStatus::True, "", "");
}

/// Set the condition to False with a reason and message
pub fn mark_false<K: StatusConditions>(obj: &mut K, type_: &str, reason: &str, message: &str) {
    set_condition(obj, type_, ConditionStatus::False, reason, message);
}

/// Set the condition to Unknown with a reason and message
pub fn mark_unknown<K: StatusConditions>(obj: &mut K, type_: &str, reason: &str, message: &str) {
    set_condition(obj, type_, ConditionStatus::Unknown, reason, message);
}

fn set_condition<K: StatusConditions>(
    obj: &mut K,
    type_: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
) {
    let conditions = obj.conditions_mut();
    match conditions.iter_mut().find(|c| c.type_ == type_) {
        Some(existing) => {
            if existing.status != status {
                existing.status = status;
                existing.last_transition_time = Utc::now();
            }
            if existing.reason != reason {
                existing.reason = reason.to_string();
            }
            if existing.message != message {
                existing.message = message.to_string();
            }
        }
        None => conditions.push(Condition {
            type_: type_.to_string(),
            status,
            last_transition_time: Utc::now(),
            reason: reason.to_string(),
            message: message.to_string(),
        }),
    }
}
