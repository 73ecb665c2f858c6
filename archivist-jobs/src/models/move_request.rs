//! Move request model

use serde::{Deserialize, Serialize};

/// Request to reparent and/or reorder one record
///
/// Positions are zero-based indices among the parent's children ordered by
/// `lft`. A sibling move happens only when both positions are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub object_id: i64,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub old_position: Option<i64>,
    #[serde(default)]
    pub new_position: Option<i64>,
}

impl MoveRequest {
    /// Both positions, when a sibling move was requested
    pub fn positions(&self) -> Option<(i64, i64)> {
        match (self.old_position, self.new_position) {
            (Some(old), Some(new)) => Some((old, new)),
            _ => None,
        }
    }
}
