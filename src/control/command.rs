//! Control-plane command parsing and response shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::backend_api::BackendHealthMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Ping,
    GetStatus,
    OpenServer,
    CloseServer,
}

impl ControlAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlAction::Ping => "PING",
            ControlAction::GetStatus => "GET_STATUS",
            ControlAction::OpenServer => "OPEN_SERVER",
            ControlAction::CloseServer => "CLOSE_SERVER",
        }
    }

    /// Case-insensitive lookup.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "PING" => Some(ControlAction::Ping),
            "GET_STATUS" => Some(ControlAction::GetStatus),
            "OPEN_SERVER" => Some(ControlAction::OpenServer),
            "CLOSE_SERVER" => Some(ControlAction::CloseServer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Invalid JSON format: {0}")]
    Malformed(String),

    #[error("Missing 'action' field")]
    MissingAction,

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Server URL required")]
    MissingServerUrl,
}

/// One parsed request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCommand {
    pub action: ControlAction,
    pub server_url: Option<String>,
}

impl ControlCommand {
    pub fn ping() -> Self {
        Self { action: ControlAction::Ping, server_url: None }
    }

    pub fn get_status() -> Self {
        Self { action: ControlAction::GetStatus, server_url: None }
    }

    pub fn open(url: impl Into<String>) -> Self {
        Self { action: ControlAction::OpenServer, server_url: Some(url.into()) }
    }

    pub fn close(url: impl Into<String>) -> Self {
        Self { action: ControlAction::CloseServer, server_url: Some(url.into()) }
    }

    /// Parse a frame payload.
    pub fn parse(payload: &[u8]) -> Result<Self, CommandError> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| CommandError::Malformed(e.to_string()))?;
        let request: Value =
            serde_json::from_str(text.trim()).map_err(|e| CommandError::Malformed(e.to_string()))?;

        let action = match request.get("action") {
            None | Some(Value::Null) => return Err(CommandError::MissingAction),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        if action.is_empty() {
            return Err(CommandError::MissingAction);
        }
        let action = ControlAction::parse(&action)
            .ok_or_else(|| CommandError::UnknownAction(action.to_ascii_uppercase()))?;

        let server_url = match request.get("serverUrl") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        };

        if matches!(action, ControlAction::OpenServer | ControlAction::CloseServer)
            && server_url.is_none()
        {
            return Err(CommandError::MissingServerUrl);
        }

        Ok(Self { action, server_url })
    }

    /// Wire form, as sent by [`ControlClient`](crate::control::client::ControlClient).
    pub fn to_json(&self) -> Value {
        let mut value = serde_json::json!({ "action": self.action.as_str() });
        if let Some(url) = &self.server_url {
            value["serverUrl"] = Value::String(url.clone());
        }
        value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
}

/// One backend entry of a GET_STATUS reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub url: String,
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<BackendHealthMetrics>,
}

/// Reply frame. Absent fields are omitted from the JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servers: Option<Vec<ServerStatus>>,
}

impl ControlResponse {
    fn bare(status: ResponseStatus) -> Self {
        Self {
            status,
            message: None,
            server_url: None,
            status_code: None,
            servers: None,
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::bare(ResponseStatus::Ok)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::bare(ResponseStatus::Error)
        }
    }

    pub fn pong() -> Self {
        Self::ok("PONG")
    }

    pub fn servers(servers: Vec<ServerStatus>) -> Self {
        Self {
            servers: Some(servers),
            ..Self::bare(ResponseStatus::Ok)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    /// Serialized reply. Falls back to a fixed error body if serialization fails.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to encode control response");
            br#"{"status":"ERROR","message":"Internal error"}"#.to_vec()
        })
    }
}

impl From<CommandError> for ControlResponse {
    fn from(err: CommandError) -> Self {
        ControlResponse::error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_is_case_insensitive() {
        let cmd = ControlCommand::parse(br#"{"action":"ping"}"#).unwrap();
        assert_eq!(cmd, ControlCommand::ping());
        let cmd = ControlCommand::parse(br#" {"action":"Get_Status"} "#).unwrap();
        assert_eq!(cmd.action, ControlAction::GetStatus);
    }

    #[test]
    fn parse_errors_carry_their_messages() {
        let cases = [
            ("{}", "Missing 'action' field"),
            (r#"{"action":""}"#, "Missing 'action' field"),
            (r#"{"action":"reboot"}"#, "Unknown action: REBOOT"),
            (r#"{"action":"OPEN_SERVER"}"#, "Server URL required"),
            (r#"{"action":"CLOSE_SERVER","serverUrl":"  "}"#, "Server URL required"),
        ];
        for (payload, message) in cases {
            assert_eq!(
                ControlCommand::parse(payload.as_bytes()).unwrap_err().to_string(),
                message
            );
        }

        let err = ControlCommand::parse(b"{not json").unwrap_err();
        assert!(err.to_string().starts_with("Invalid JSON format: "));
    }

    #[test]
    fn open_and_close_keep_url() {
        let cmd =
            ControlCommand::parse(br#"{"action":"open_server","serverUrl":"http://localhost:8081"}"#)
                .unwrap();
        assert_eq!(cmd, ControlCommand::open("http://localhost:8081"));
        assert_eq!(
            ControlCommand::parse(&serde_json::to_vec(&cmd.to_json()).unwrap()).unwrap(),
            cmd
        );
    }

    #[test]
    fn pong_serializes_exactly() {
        let json: Value = serde_json::from_slice(&ControlResponse::pong().to_bytes()).unwrap();
        assert_eq!(json, serde_json::json!({"status": "OK", "message": "PONG"}));
    }

    #[test]
    fn status_reply_shape() {
        let reply = ControlResponse::servers(vec![
            ServerStatus {
                url: "http://a".into(),
                status_code: 200,
                health: Some(BackendHealthMetrics {
                    cpu_usage_percent: 1.5,
                    is_open: true,
                    ..BackendHealthMetrics::default()
                }),
            },
            ServerStatus { url: "http://b".into(), status_code: 500, health: None },
        ]);
        let json: Value = serde_json::from_slice(&reply.to_bytes()).unwrap();
        assert_eq!(json["status"], "OK");
        assert_eq!(json["servers"][0]["statusCode"], 200);
        assert_eq!(json["servers"][0]["health"]["isOpen"], true);
        assert!(json["servers"][1].get("health").is_none());
        assert!(json.get("message").is_none());
    }
}
