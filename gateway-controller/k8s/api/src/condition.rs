use crate::{Condition, Time};
use chrono::{DateTime, Utc};

pub const STATUS_TRUE: &str = "True";
pub const STATUS_FALSE: &str = "False";

/// Builds a condition stamped with `now` as its transition time.
pub fn new_condition(
    type_: impl Into<String>,
    accepted: bool,
    reason: impl Into<String>,
    message: impl Into<String>,
    observed_generation: Option<i64>,
    now: DateTime<Utc>,
) -> Condition {
    Condition {
        type_: type_.into(),
        status: if accepted { STATUS_TRUE } else { STATUS_FALSE }.to_string(),
        reason: reason.into(),
        message: message.into(),
        observed_generation,
        last_transition_time: Time(now),
    }
}

pub fn find<'c>(conditions: &'c [Condition], type_: &str) -> Option<&'c Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Merges `condition` into `conditions` by type.
///
/// A condition of the same type is replaced; otherwise the condition is
/// appended. When the status of an existing condition does not change, its
/// original transition time is kept. Returns whether anything changed.
pub fn merge(conditions: &mut Vec<Condition>, mut condition: Condition) -> bool {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time.clone();
            }
            if *existing == condition {
                return false;
            }
            *existing = condition;
            true
        }
        None => {
            conditions.push(condition);
            true
        }
    }
}
