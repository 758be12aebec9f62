//! rosbridge v2 protocol frames.
//!
//! The protocol is JSON objects tagged by an `"op"` field. Only the ops the
//! client uses are modeled; anything else coming off the wire is skipped
//! with a warning.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Client -> server frames.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Outbound {
    Advertise {
        id: String,
        topic: String,
        #[serde(rename = "type")]
        ros_type: String,
    },
    Unadvertise {
        id: String,
        topic: String,
    },
    Publish {
        topic: String,
        msg: Value,
    },
    Subscribe {
        id: String,
        topic: String,
        #[serde(rename = "type")]
        ros_type: String,
    },
    Unsubscribe {
        id: String,
        topic: String,
    },
    CallService {
        id: String,
        service: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        args: Option<Value>,
    },
}

impl Outbound {
    pub fn to_json(&self) -> String {
        // The frame enum only contains JSON-representable data
        serde_json::to_string(self).expect("outbound frame serializes")
    }
}

/// Server -> client frames.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Inbound {
    Publish {
        topic: String,
        msg: Value,
    },
    ServiceResponse {
        service: String,
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        values: Option<Value>,
        #[serde(default = "default_result")]
        result: bool,
    },
    Status {
        #[serde(default)]
        level: String,
        #[serde(default)]
        msg: String,
        #[serde(default)]
        id: Option<String>,
    },
}

// Older rosbridge versions omit `result` and only ever reported success.
fn default_result() -> bool {
    true
}

impl Inbound {
    /// Parse one frame off the wire. Unknown ops and malformed frames come
    /// back as `None` after a warning; the connection stays up.
    pub fn parse(text: &str) -> Option<Inbound> {
        match serde_json::from_str::<Inbound>(text) {
            Ok(frame) => Some(frame),
            Err(e) => {
                let op = serde_json::from_str::<Value>(text)
                    .ok()
                    .and_then(|v| v.get("op").and_then(|op| op.as_str()).map(String::from));
                match op {
                    Some(op) => warn!("Skipping unhandled rosbridge op '{}'", op),
                    None => warn!("Skipping unparseable rosbridge frame: {}", e),
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscribe_frame_matches_wire_format() {
        let frame = Outbound::Subscribe {
            id: "roverdeck:sub:/scan".to_string(),
            topic: "/scan".to_string(),
            ros_type: "sensor_msgs/LaserScan".to_string(),
        };
        let value: Value = serde_json::from_str(&frame.to_json()).unwrap();
        assert_eq!(
            value,
            json!({
                "op": "subscribe",
                "id": "roverdeck:sub:/scan",
                "topic": "/scan",
                "type": "sensor_msgs/LaserScan"
            })
        );
    }

    #[test]
    fn call_service_omits_absent_args() {
        let frame = Outbound::CallService {
            id: "abc".to_string(),
            service: "/start_slam".to_string(),
            args: None,
        };
        let value: Value = serde_json::from_str(&frame.to_json()).unwrap();
        assert_eq!(
            value,
            json!({"op": "call_service", "id": "abc", "service": "/start_slam"})
        );
    }

    #[test]
    fn parses_publish_frame() {
        let frame = Inbound::parse(r#"{"op": "publish", "topic": "/scan", "msg": {"ranges": []}}"#)
            .unwrap();
        match frame {
            Inbound::Publish { topic, .. } => assert_eq!(topic, "/scan"),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn service_response_defaults_result_true() {
        let frame = Inbound::parse(
            r#"{"op": "service_response", "service": "/rosapi/topics", "values": {"topics": []}}"#,
        )
        .unwrap();
        match frame {
            Inbound::ServiceResponse { result, .. } => assert!(result),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn unknown_op_is_skipped() {
        assert_eq!(Inbound::parse(r#"{"op": "png", "data": ""}"#), None);
        assert_eq!(Inbound::parse("not json at all"), None);
    }
}
