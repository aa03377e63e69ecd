//! Real-time collaboration constants, message protocol, and validation.
//!
//! This module lives in `core` (zero internal deps) so that the repository
//! layer, the WebSocket handlers, and the REST handlers can all reference the
//! same lock lifetimes, queue bounds, and wire protocol.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

// ---------------------------------------------------------------------------
// Lock lifetime constants
// ---------------------------------------------------------------------------

/// Default maximum lock age in seconds before the sweep reclaims it.
pub const DEFAULT_LOCK_MAX_AGE_SECS: i64 = 120;

/// Minimum configurable lock age in seconds.
pub const MIN_LOCK_MAX_AGE_SECS: i64 = 5;

/// Maximum configurable lock age in seconds (1 hour).
pub const MAX_LOCK_MAX_AGE_SECS: i64 = 3600;

/// How often the stale-lock sweep runs (in seconds).
pub const DEFAULT_LOCK_SWEEP_INTERVAL_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Connection constants
// ---------------------------------------------------------------------------

/// Bound on each connection's outbound message queue. A connection that
/// falls this far behind is disconnected rather than allowed to stall
/// broadcasts to the rest of its room.
pub const WS_SEND_QUEUE_CAPACITY: usize = 256;

/// Longest accepted box identifier.
pub const MAX_BOX_ID_LEN: usize = 128;

// ---------------------------------------------------------------------------
// Collaboration WebSocket message protocol
// ---------------------------------------------------------------------------

/// Messages exchanged over the collaboration WebSocket.
///
/// Serialized as JSON with an internally-tagged `"type"` discriminator so the
/// client can route messages by type string. The set is closed: anything that
/// does not parse into one of these variants is rejected at the socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum CollabMessage {
    /// Client sends: subscribe this connection to a project room.
    #[serde(rename = "room.join")]
    RoomJoin { project_id: DbId },

    /// Client sends: leave the current room and give up all held locks.
    #[serde(rename = "room.leave")]
    RoomLeave,

    /// Client sends: request exclusive ownership of a box.
    #[serde(rename = "lock.acquire")]
    LockAcquire { box_id: String },

    /// Client sends: give up ownership of a box.
    #[serde(rename = "lock.release")]
    LockRelease { box_id: String },

    /// Client sends: overwrite the project snapshot. `bundle` is the opaque
    /// session blob, base64-encoded.
    #[serde(rename = "project.update")]
    ProjectUpdate {
        content: serde_json::Value,
        #[serde(default)]
        bundle: Option<String>,
    },

    /// Server confirms a room subscription.
    #[serde(rename = "room.joined")]
    RoomJoined { project_id: DbId },

    /// Server pushes the full ownership table to a new room member.
    #[serde(rename = "ownership.snapshot")]
    OwnershipSnapshot {
        project_id: DbId,
        locks: Vec<OwnedBox>,
    },

    /// Server answers the requester of a `lock.acquire`.
    #[serde(rename = "lock.result")]
    LockResult {
        box_id: String,
        granted: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        owner_id: Option<DbId>,
    },

    /// Server answers the requester of a `lock.release`. `released: false`
    /// means the caller did not hold the lock (stale state, already swept).
    #[serde(rename = "release.result")]
    ReleaseResult { box_id: String, released: bool },

    /// Server broadcasts: a box changed owner. `owner_id: None` means the
    /// box reverted to unclaimed.
    #[serde(rename = "ownership.changed")]
    OwnershipChanged {
        project_id: DbId,
        box_id: String,
        owner_id: Option<DbId>,
    },

    /// Server broadcasts: the project snapshot was overwritten.
    #[serde(rename = "project.updated")]
    ProjectUpdated { project_id: DbId, sync_version: i64 },

    /// Server reports a per-message failure without closing the socket.
    #[serde(rename = "error")]
    Error { message: String },
}

/// One entry in an ownership snapshot broadcast.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OwnedBox {
    pub box_id: String,
    pub user_id: DbId,
    pub acquired_at: String,
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Validate a box identifier. Returns `Ok(())` or an error message.
pub fn validate_box_id(box_id: &str) -> Result<(), String> {
    if box_id.is_empty() {
        return Err("box_id must not be empty".to_string());
    }
    if box_id.len() > MAX_BOX_ID_LEN {
        return Err(format!(
            "box_id must be at most {MAX_BOX_ID_LEN} characters, got {}",
            box_id.len()
        ));
    }
    if box_id.chars().any(char::is_control) {
        return Err("box_id must not contain control characters".to_string());
    }
    Ok(())
}

/// Validate a project identifier.
pub fn validate_project_id(project_id: DbId) -> Result<(), String> {
    if project_id <= 0 {
        return Err(format!("project_id must be positive, got {project_id}"));
    }
    Ok(())
}

/// Validate a configured lock age in seconds.
pub fn validate_lock_max_age(secs: i64) -> Result<(), String> {
    if secs < MIN_LOCK_MAX_AGE_SECS {
        return Err(format!(
            "Lock max age must be at least {MIN_LOCK_MAX_AGE_SECS} second(s), got {secs}"
        ));
    }
    if secs > MAX_LOCK_MAX_AGE_SECS {
        return Err(format!(
            "Lock max age must be at most {MAX_LOCK_MAX_AGE_SECS} seconds, got {secs}"
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Box id validation
    // -----------------------------------------------------------------------

    #[test]
    fn test_valid_box_ids() {
        assert!(validate_box_id("trk-1").is_ok());
        assert!(validate_box_id("clip:intro/verse 2").is_ok());
        assert!(validate_box_id(&"x".repeat(MAX_BOX_ID_LEN)).is_ok());
    }

    #[test]
    fn test_empty_box_id() {
        let result = validate_box_id("");
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("empty"));
    }

    #[test]
    fn test_overlong_box_id() {
        let result = validate_box_id(&"x".repeat(MAX_BOX_ID_LEN + 1));
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("at most"));
    }

    #[test]
    fn test_box_id_with_control_chars() {
        assert!(validate_box_id("trk\n1").is_err());
        assert!(validate_box_id("trk\x001").is_err());
    }

    // -----------------------------------------------------------------------
    // Project id validation
    // -----------------------------------------------------------------------

    #[test]
    fn test_valid_project_ids() {
        assert!(validate_project_id(1).is_ok());
        assert!(validate_project_id(i64::MAX).is_ok());
    }

    #[test]
    fn test_invalid_project_ids() {
        assert!(validate_project_id(0).is_err());
        assert!(validate_project_id(-1).is_err());
    }

    // -----------------------------------------------------------------------
    // Lock age validation
    // -----------------------------------------------------------------------

    #[test]
    fn test_valid_lock_max_ages() {
        assert!(validate_lock_max_age(MIN_LOCK_MAX_AGE_SECS).is_ok());
        assert!(validate_lock_max_age(DEFAULT_LOCK_MAX_AGE_SECS).is_ok());
        assert!(validate_lock_max_age(MAX_LOCK_MAX_AGE_SECS).is_ok());
    }

    #[test]
    fn test_lock_max_age_too_short() {
        let result = validate_lock_max_age(MIN_LOCK_MAX_AGE_SECS - 1);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("at least"));
    }

    #[test]
    fn test_lock_max_age_too_long() {
        let result = validate_lock_max_age(MAX_LOCK_MAX_AGE_SECS + 1);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("at most"));
    }

    // -----------------------------------------------------------------------
    // CollabMessage serialization
    // -----------------------------------------------------------------------

    #[test]
    fn test_room_join_serialization() {
        let msg = CollabMessage::RoomJoin { project_id: 42 };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"room.join"#));

        let deserialized: CollabMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, deserialized);
    }

    #[test]
    fn test_lock_acquire_serialization() {
        let msg = CollabMessage::LockAcquire {
            box_id: "trk-1".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"lock.acquire"#));

        let deserialized: CollabMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, deserialized);
    }

    #[test]
    fn test_lock_result_omits_owner_when_granted() {
        let msg = CollabMessage::LockResult {
            box_id: "trk-1".to_string(),
            granted: true,
            owner_id: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("owner_id"));
    }

    #[test]
    fn test_lock_result_carries_owner_when_denied() {
        let msg = CollabMessage::LockResult {
            box_id: "trk-1".to_string(),
            granted: false,
            owner_id: Some(7),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""owner_id":7"#));

        let deserialized: CollabMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, deserialized);
    }

    #[test]
    fn test_ownership_changed_serialization() {
        let msg = CollabMessage::OwnershipChanged {
            project_id: 1,
            box_id: "trk-1".to_string(),
            owner_id: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"ownership.changed"#));
        assert!(json.contains(r#""owner_id":null"#));

        let deserialized: CollabMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, deserialized);
    }

    #[test]
    fn test_ownership_snapshot_serialization() {
        let msg = CollabMessage::OwnershipSnapshot {
            project_id: 1,
            locks: vec![OwnedBox {
                box_id: "trk-1".to_string(),
                user_id: 10,
                acquired_at: "2026-08-04T00:00:00Z".to_string(),
            }],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"ownership.snapshot"#));

        let deserialized: CollabMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, deserialized);
    }

    #[test]
    fn test_project_update_defaults_missing_bundle() {
        let json = r#"{"type":"project.update","content":{"boxes":[]}}"#;
        let msg: CollabMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            CollabMessage::ProjectUpdate {
                content: serde_json::json!({"boxes": []}),
                bundle: None,
            }
        );
    }

    #[test]
    fn test_unknown_message_type_rejected() {
        let json = r#"{"type":"lock.steal","box_id":"trk-1"}"#;
        assert!(serde_json::from_str::<CollabMessage>(json).is_err());
    }

    // -----------------------------------------------------------------------
    // Constants sanity checks
    // -----------------------------------------------------------------------

    #[test]
    fn test_default_lock_max_age_in_valid_range() {
        assert!(validate_lock_max_age(DEFAULT_LOCK_MAX_AGE_SECS).is_ok());
    }

    #[test]
    fn test_sweep_interval_is_positive() {
        assert!(DEFAULT_LOCK_SWEEP_INTERVAL_SECS > 0);
    }

    #[test]
    fn test_send_queue_capacity_is_positive() {
        assert!(WS_SEND_QUEUE_CAPACITY > 0);
    }
}
