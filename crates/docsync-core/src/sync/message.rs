//! Sync protocol message types
//!
//! JSON payloads exchanged with the sync server. Binary payloads travel as
//! base64 text (see [`crate::codec`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncError;

/// Announce interest in a workspace (payload: workspace id)
pub const EVENT_HANDSHAKE: &str = "client-handshake-sync";

/// Announce departure from a workspace (payload: workspace id)
pub const EVENT_LEAVE: &str = "client-leave-sync";

/// Request the delta missing from a document copy
pub const EVENT_LOAD_DOC: &str = "doc-load-v2";

/// Push local updates
pub const EVENT_PUSH_UPDATES: &str = "client-update-v2";

/// Server broadcast of remote updates
pub const EVENT_SERVER_UPDATES: &str = "server-updates";

/// Error code the server uses when a document does not exist
pub const DOC_NOT_FOUND: &str = "DOC_NOT_FOUND";

/// Pull request payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadDocRequest<'a> {
    pub workspace_id: &'a str,
    pub guid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_vector: Option<String>,
}

/// Successful pull reply body
#[derive(Debug, Clone, Deserialize)]
pub struct LoadDocData {
    pub missing: String,
    #[serde(default)]
    pub state: Option<String>,
}

/// Push request payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushUpdatesRequest<'a> {
    pub workspace_id: &'a str,
    pub guid: &'a str,
    pub updates: Vec<String>,
}

/// Server update broadcast
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerUpdates {
    pub workspace_id: String,
    pub guid: String,
    #[serde(default)]
    pub updates: Vec<String>,
}

/// Error marker carried in a reply's `error` field
///
/// The canonical shape is `{code?, message?}`. A bare string is taken as the
/// message; any other non-null value is kept as its JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReply {
    pub code: Option<String>,
    pub message: String,
}

impl ErrorReply {
    /// Extract the error marker from a reply, if there is one
    pub fn from_reply(reply: &Value) -> Option<Self> {
        match reply.get("error")? {
            Value::Null => None,
            Value::String(message) => Some(Self {
                code: None,
                message: message.clone(),
            }),
            Value::Object(fields) => {
                let code = fields
                    .get("code")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let message = fields
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| code.clone())
                    .unwrap_or_else(|| Value::Object(fields.clone()).to_string());
                Some(Self { code, message })
            }
            other => Some(Self {
                code: None,
                message: other.to_string(),
            }),
        }
    }

    /// Whether the server reported that the document does not exist
    pub fn is_not_found(&self) -> bool {
        self.code.as_deref() == Some(DOC_NOT_FOUND)
    }
}

impl From<ErrorReply> for SyncError {
    fn from(reply: ErrorReply) -> Self {
        SyncError::remote(reply.code, reply.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_request_encoding() {
        let request = LoadDocRequest {
            workspace_id: "ws-1",
            guid: "doc-1",
            state_vector: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"workspaceId": "ws-1", "guid": "doc-1"})
        );

        let request = LoadDocRequest {
            state_vector: Some("AQI=".to_string()),
            ..request
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap()["stateVector"],
            "AQI="
        );
    }

    #[test]
    fn test_push_request_encoding() {
        let request = PushUpdatesRequest {
            workspace_id: "ws-1",
            guid: "doc-1",
            updates: vec!["AAE=".to_string()],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"workspaceId": "ws-1", "guid": "doc-1", "updates": ["AAE="]})
        );
    }

    #[test]
    fn test_server_updates_decoding() {
        let broadcast: ServerUpdates = serde_json::from_value(json!({
            "workspaceId": "ws-1",
            "guid": "doc-1",
            "updates": ["AAE=", "AgM="]
        }))
        .unwrap();

        assert_eq!(broadcast.workspace_id, "ws-1");
        assert_eq!(broadcast.updates.len(), 2);
    }

    #[test]
    fn test_error_reply_shapes() {
        assert_eq!(ErrorReply::from_reply(&json!({"data": {}})), None);
        assert_eq!(ErrorReply::from_reply(&json!({"error": null})), None);
        assert_eq!(ErrorReply::from_reply(&Value::Null), None);

        let err = ErrorReply::from_reply(&json!({"error": "X"})).unwrap();
        assert_eq!(err.message, "X");
        assert_eq!(err.code, None);

        let err = ErrorReply::from_reply(&json!({"error": {"code": DOC_NOT_FOUND}})).unwrap();
        assert!(err.is_not_found());
        assert_eq!(err.message, DOC_NOT_FOUND);

        let err = ErrorReply::from_reply(&json!({
            "error": {"code": "INTERNAL", "message": "database offline"}
        }))
        .unwrap();
        assert!(!err.is_not_found());
        assert_eq!(err.message, "database offline");

        let err = ErrorReply::from_reply(&json!({"error": true})).unwrap();
        assert_eq!(err.message, "true");
    }
}
