//! Service request/response payloads used by the consoles.

use serde::{Deserialize, Serialize};

/// std_srvs/Trigger response, the shape every SLAM and navigation switch
/// service on the robot uses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// rosapi/Topics response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicsResponse {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
}

impl TopicsResponse {
    /// (topic, type) pairs; the types array may be shorter or absent.
    pub fn entries(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.topics.iter().enumerate().map(|(i, topic)| {
            (
                topic.as_str(),
                self.types.get(i).map(|t| t.as_str()),
            )
        })
    }
}

/// Request payload for pose-taking navigation services (/plan_path,
/// /navigate_to_pose): a target pose in the map frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavigateRequest {
    pub pose: super::PoseStamped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_response_defaults_are_failure_with_empty_message() {
        let response: TriggerResponse = serde_json::from_str("{}").unwrap();
        assert!(!response.success);
        assert!(response.message.is_empty());
    }

    #[test]
    fn topics_entries_tolerate_missing_types() {
        let response = TopicsResponse {
            topics: vec!["/scan".into(), "/cmd_vel".into()],
            types: vec!["sensor_msgs/LaserScan".into()],
        };
        let entries: Vec<_> = response.entries().collect();
        assert_eq!(entries[0], ("/scan", Some("sensor_msgs/LaserScan")));
        assert_eq!(entries[1], ("/cmd_vel", None));
    }
}
