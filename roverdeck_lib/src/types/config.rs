use crate::types::ArmProfile;
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::fs;

/// Deck-wide configuration, loaded once per console. Every topic and
/// service name the consoles touch lives here so a different robot setup
/// is a config edit, not a code change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoverdeckConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub topics: TopicsConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub teleop: TeleopConfig,
    #[serde(default)]
    pub arm: ArmProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub call_timeout_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "192.168.2.7".to_string(),
            port: 9090,
            connect_timeout_ms: 5000,
            call_timeout_ms: 5000,
            backoff_base_ms: 500,
            backoff_cap_ms: 15_000,
        }
    }
}

impl ConnectionConfig {
    /// rosbridge endpoint. The ROSBRIDGE_URL environment variable
    /// overrides host and port entirely.
    pub fn ws_url(&self) -> String {
        if let Ok(url) = std::env::var("ROSBRIDGE_URL") {
            if !url.is_empty() {
                return url;
            }
        }
        format!("ws://{}:{}", self.host, self.port)
    }

    pub fn client_options(&self) -> rosbridge_client::ClientOptions {
        use std::time::Duration;
        rosbridge_client::ClientOptions {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_cap: Duration::from_millis(self.backoff_cap_ms),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    pub cmd_vel: String,
    pub joint_states: String,
    pub joint_command: String,
    pub position_command: String,
    pub robot_pose: String,
    pub amcl_pose: String,
    pub map: String,
    pub map_image: String,
    pub scan: String,
    pub cloud: String,
    pub path: String,
    pub obstacles: String,
    pub battery: String,
    pub odom: String,
    pub goal_pose: String,
    pub initialpose: String,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            cmd_vel: "/cmd_vel".to_string(),
            joint_states: "/joint_states".to_string(),
            joint_command: "/joint_states/command".to_string(),
            position_command: "/position_controller/commands".to_string(),
            robot_pose: "/robot_pose".to_string(),
            amcl_pose: "/amcl_pose".to_string(),
            map: "/map".to_string(),
            map_image: "/map_image/compressed".to_string(),
            scan: "/scan".to_string(),
            cloud: "/unilidar/cloud".to_string(),
            path: "/path".to_string(),
            obstacles: "/obstacles".to_string(),
            battery: "/battery_state".to_string(),
            odom: "/odom".to_string(),
            goal_pose: "/goal_pose".to_string(),
            initialpose: "/initialpose".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub start_slam: String,
    pub stop_slam: String,
    pub save_map: String,
    pub toolbox_save_map: String,
    pub reset_map: String,
    pub plan_path: String,
    pub navigate_to_pose: String,
    pub pause_navigation: String,
    pub resume_navigation: String,
    pub cancel_navigation: String,
    pub topic_list: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            start_slam: "/start_slam".to_string(),
            stop_slam: "/stop_slam".to_string(),
            save_map: "/save_map".to_string(),
            toolbox_save_map: "/slam_toolbox/save_map".to_string(),
            reset_map: "/reset_map".to_string(),
            plan_path: "/plan_path".to_string(),
            navigate_to_pose: "/navigate_to_pose".to_string(),
            pause_navigation: "/pause_navigation".to_string(),
            resume_navigation: "/resume_navigation".to_string(),
            cancel_navigation: "/cancel_navigation".to_string(),
            topic_list: "/rosapi/topics".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TeleopConfig {
    /// Repeat interval for held motion commands (ms)
    pub publish_interval_ms: u64,
    pub default_linear: f64,
    pub default_angular: f64,
    /// Speed factor applied to both axes on diagonal motion
    pub diagonal_scale: f64,
    /// Joint jog step per command (rad)
    pub jog_step: f64,
}

impl Default for TeleopConfig {
    fn default() -> Self {
        Self {
            publish_interval_ms: 200,
            default_linear: 0.5,
            default_angular: 1.0,
            diagonal_scale: 0.7,
            jog_step: 0.1,
        }
    }
}

impl RoverdeckConfig {
    pub const DEFAULT_PATH: &'static str = "config/roverdeck.toml";

    /// Open the shared rosbridge connection described by this config.
    pub fn connect_client(&self) -> rosbridge_client::RosClient {
        rosbridge_client::RosClient::connect(
            self.connection.ws_url(),
            self.connection.client_options(),
        )
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: RoverdeckConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from ROVERDECK_CONFIG, the default path, or fall back to the
    /// built-in defaults when no file exists.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("ROVERDECK_CONFIG") {
            return Self::load_from_file(&path)
                .map_err(|e| eyre::eyre!("Failed to load config from {}: {}", path, e));
        }

        match Self::load_from_file(Self::DEFAULT_PATH) {
            Ok(config) => Ok(config),
            Err(_) => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.teleop.publish_interval_ms == 0 {
            eyre::bail!("teleop.publish_interval_ms must be non-zero");
        }
        if self.connection.backoff_base_ms == 0 {
            eyre::bail!("connection.backoff_base_ms must be non-zero");
        }
        self.arm.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        RoverdeckConfig::default().validate().unwrap();
    }

    #[test]
    fn default_url_uses_host_and_port() {
        let connection = ConnectionConfig {
            host: "10.0.0.5".to_string(),
            port: 9091,
            ..Default::default()
        };
        // Only meaningful when ROSBRIDGE_URL is unset in the test env
        if std::env::var("ROSBRIDGE_URL").is_err() {
            assert_eq!(connection.ws_url(), "ws://10.0.0.5:9091");
        }
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: RoverdeckConfig = toml::from_str(
            r#"
            [connection]
            host = "rover.local"
            port = 9090
            connect_timeout_ms = 3000
            call_timeout_ms = 3000
            backoff_base_ms = 250
            backoff_cap_ms = 8000
            "#,
        )
        .unwrap();
        assert_eq!(config.connection.host, "rover.local");
        assert_eq!(config.topics.cmd_vel, "/cmd_vel");
        assert_eq!(config.teleop.publish_interval_ms, 200);
        config.validate().unwrap();
    }

    #[test]
    fn single_topic_override_keeps_other_defaults() {
        let config: RoverdeckConfig = toml::from_str(
            r#"
            [topics]
            cloud = "/livox/points"
            "#,
        )
        .unwrap();
        assert_eq!(config.topics.cloud, "/livox/points");
        assert_eq!(config.topics.scan, "/scan");
    }

    #[test]
    fn invalid_interval_is_rejected() {
        let mut config = RoverdeckConfig::default();
        config.teleop.publish_interval_ms = 0;
        assert!(config.validate().is_err());
    }
}
