use serde::Serialize;
use serde_json::Value;

/// Inbound viewer messages. The wire envelope is `{type, payload}`; kinds
/// this side does not recognize parse to `None` and are ignored, and
/// missing payload fields fall back to empty defaults, mirroring a liberal
/// receive policy.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Input { data: String },
    Resize { cols: i64, rows: i64 },
    SpecialKey { key: String, modifiers: Vec<String> },
    Ping,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text).ok()?;
        let kind = value.get("type")?.as_str()?;
        let payload = value.get("payload").cloned().unwrap_or(Value::Null);

        match kind {
            "input" => Some(Self::Input {
                data: str_field(&payload, "data"),
            }),
            "resize" => Some(Self::Resize {
                cols: int_field(&payload, "cols"),
                rows: int_field(&payload, "rows"),
            }),
            "special_key" => Some(Self::SpecialKey {
                key: str_field(&payload, "key"),
                modifiers: str_list_field(&payload, "modifiers"),
            }),
            "ping" => Some(Self::Ping),
            _ => None,
        }
    }
}

fn str_field(payload: &Value, key: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn int_field(payload: &Value, key: &str) -> i64 {
    match payload.get(key) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        // Some clients send dimensions as strings; coerce them.
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn str_list_field(payload: &Value, key: &str) -> Vec<String> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Outbound messages sent to viewers, serialized as `{type, payload}`.
///
/// `Error` is part of the wire contract but no core path emits it today.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    Output {
        data: String,
    },
    Status {
        status: String,
        pid: Option<u32>,
        message: Option<String>,
    },
    Pong {},
    #[allow(dead_code)]
    Error {
        code: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn output(data: String) -> Self {
        Self::Output { data }
    }

    pub fn status(status: &str, pid: Option<u32>, message: Option<&str>) -> Self {
        Self::Status {
            status: status.to_string(),
            pid,
            message: message.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_input() {
        let msg = ClientMessage::parse(r#"{"type":"input","payload":{"data":"ls\r"}}"#);
        assert_eq!(msg, Some(ClientMessage::Input { data: "ls\r".into() }));
    }

    #[test]
    fn parses_resize_with_missing_fields_as_zero() {
        let msg = ClientMessage::parse(r#"{"type":"resize","payload":{"cols":120}}"#);
        assert_eq!(msg, Some(ClientMessage::Resize { cols: 120, rows: 0 }));
    }

    #[test]
    fn parses_resize_with_string_dimensions() {
        let msg = ClientMessage::parse(r#"{"type":"resize","payload":{"cols":"120","rows":"40"}}"#);
        assert_eq!(msg, Some(ClientMessage::Resize { cols: 120, rows: 40 }));

        let msg = ClientMessage::parse(r#"{"type":"resize","payload":{"cols":"abc","rows":40}}"#);
        assert_eq!(msg, Some(ClientMessage::Resize { cols: 0, rows: 40 }));
    }

    #[test]
    fn parses_special_key() {
        let msg = ClientMessage::parse(
            r#"{"type":"special_key","payload":{"key":"ArrowUp","modifiers":["ctrl"]}}"#,
        );
        assert_eq!(
            msg,
            Some(ClientMessage::SpecialKey {
                key: "ArrowUp".into(),
                modifiers: vec!["ctrl".into()],
            })
        );
    }

    #[test]
    fn parses_ping_with_and_without_payload() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"ping","payload":{}}"#),
            Some(ClientMessage::Ping)
        );
        assert_eq!(ClientMessage::parse(r#"{"type":"ping"}"#), Some(ClientMessage::Ping));
    }

    #[test]
    fn unknown_kind_and_garbage_are_ignored() {
        assert_eq!(ClientMessage::parse(r#"{"type":"subscribe","payload":{}}"#), None);
        assert_eq!(ClientMessage::parse("not json"), None);
        assert_eq!(ClientMessage::parse(r#"{"payload":{}}"#), None);
    }

    #[test]
    fn output_wire_shape() {
        let wire = serde_json::to_value(ServerMessage::output("hi".into())).unwrap();
        assert_eq!(wire, json!({"type": "output", "payload": {"data": "hi"}}));
    }

    #[test]
    fn status_wire_shape() {
        let wire =
            serde_json::to_value(ServerMessage::status("running", Some(42), Some("Process started")))
                .unwrap();
        assert_eq!(
            wire,
            json!({
                "type": "status",
                "payload": {"status": "running", "pid": 42, "message": "Process started"}
            })
        );

        let stopped = serde_json::to_value(ServerMessage::status("stopped", None, None)).unwrap();
        assert_eq!(
            stopped,
            json!({
                "type": "status",
                "payload": {"status": "stopped", "pid": null, "message": null}
            })
        );
    }

    #[test]
    fn pong_wire_shape() {
        let wire = serde_json::to_value(ServerMessage::Pong {}).unwrap();
        assert_eq!(wire, json!({"type": "pong", "payload": {}}));
    }
}
