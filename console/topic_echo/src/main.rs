use eyre::Result;
use rosbridge_client::RosClient;
use roverdeck_lib::decode::{parse_pointcloud2, payload_len, scan_summary};
use roverdeck_lib::msgs::{
    CompressedImage, JointState, LaserScan, OccupancyGrid, Odometry, PointCloud2, TopicsResponse,
    Twist,
};
use roverdeck_lib::{init_tracing, local_time_string, now_millis, RoverdeckConfig};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const MAX_HISTORY: usize = 50;

/// Topics to show when the rosapi service is unavailable.
const FALLBACK_TOPICS: &[&str] = &[
    "/clicked_point",
    "/client_count",
    "/connected_clients",
    "/goal_pose",
    "/initialpose",
    "/parameter_events",
    "/point_cloud",
    "/position_controller/commands",
    "/rosout",
    "/tf",
    "/tf_static",
    "/unilidar/cloud",
    "/unilidar/imu",
    "/cmd_vel",
    "/odom",
    "/scan",
    "/joint_states",
];

/// Guess the message type from the topic name, for topics rosapi cannot
/// describe.
fn infer_topic_type(topic: &str) -> &'static str {
    if topic.contains("cloud") || topic.contains("point") {
        "sensor_msgs/PointCloud2"
    } else if topic.contains("cmd_vel") {
        "geometry_msgs/Twist"
    } else if topic.contains("odom") {
        "nav_msgs/Odometry"
    } else if topic.contains("scan") {
        "sensor_msgs/LaserScan"
    } else if topic.contains("joint") {
        "sensor_msgs/JointState"
    } else if topic.contains("battery") {
        "sensor_msgs/BatteryState"
    } else if topic.contains("compressed") {
        "sensor_msgs/CompressedImage"
    } else if topic.contains("map") {
        "nav_msgs/OccupancyGrid"
    } else {
        "std_msgs/String"
    }
}

/// One-line summary of a message, by type. Falls back to truncated JSON
/// for anything unrecognized.
fn summarize(ros_type: &str, msg: &Value) -> String {
    match ros_type {
        "sensor_msgs/PointCloud2" => match serde_json::from_value::<PointCloud2>(msg.clone()) {
            Ok(cloud) => match parse_pointcloud2(&cloud) {
                Ok(points) => format!(
                    "Points: {} ({}x{}, step {} bytes)",
                    points.len(),
                    cloud.width,
                    cloud.height,
                    cloud.point_step
                ),
                Err(e) => format!("Undecodable cloud: {}", e),
            },
            Err(_) => fallback_summary(msg),
        },
        "geometry_msgs/Twist" => match serde_json::from_value::<Twist>(msg.clone()) {
            Ok(twist) => format!(
                "Linear: [{:.2}, {:.2}, {:.2}], Angular: [{:.2}, {:.2}, {:.2}]",
                twist.linear.x,
                twist.linear.y,
                twist.linear.z,
                twist.angular.x,
                twist.angular.y,
                twist.angular.z
            ),
            Err(_) => fallback_summary(msg),
        },
        "nav_msgs/Odometry" => match serde_json::from_value::<Odometry>(msg.clone()) {
            Ok(odom) => {
                let position = &odom.pose.pose.position;
                format!(
                    "Position: ({:.2}, {:.2}), speed {:.2} m/s",
                    position.x,
                    position.y,
                    odom.ground_speed()
                )
            }
            Err(_) => fallback_summary(msg),
        },
        "sensor_msgs/LaserScan" => match serde_json::from_value::<LaserScan>(msg.clone()) {
            Ok(scan) => {
                let (count, min_range) = scan_summary(&scan);
                match min_range {
                    Some(min) => format!("{} returns, closest {:.2} m", count, min),
                    None => format!("{} returns", count),
                }
            }
            Err(_) => fallback_summary(msg),
        },
        "sensor_msgs/JointState" => match serde_json::from_value::<JointState>(msg.clone()) {
            Ok(state) => {
                let pairs: Vec<String> = state
                    .named_positions()
                    .take(6)
                    .map(|(name, position)| format!("{}={:.2}", name, position))
                    .collect();
                format!("{} joints: {}", state.name.len(), pairs.join(", "))
            }
            Err(_) => fallback_summary(msg),
        },
        "sensor_msgs/BatteryState" => {
            match serde_json::from_value::<roverdeck_lib::msgs::BatteryState>(msg.clone()) {
                Ok(battery) => format!(
                    "Battery {:.0}% at {:.1}V",
                    battery.percent(),
                    battery.voltage
                ),
                Err(_) => fallback_summary(msg),
            }
        }
        "sensor_msgs/CompressedImage" => {
            match serde_json::from_value::<CompressedImage>(msg.clone()) {
                Ok(image) => match payload_len(&image) {
                    Some(len) => format!("Frame '{}', {} bytes", image.format, len),
                    None => format!("Frame '{}', invalid base64", image.format),
                },
                Err(_) => fallback_summary(msg),
            }
        }
        "nav_msgs/OccupancyGrid" => match serde_json::from_value::<OccupancyGrid>(msg.clone()) {
            Ok(grid) => format!(
                "Grid {}x{} at {:.3} m/cell, {:.1}% known",
                grid.info.width,
                grid.info.height,
                grid.info.resolution,
                grid.known_fraction() * 100.0
            ),
            Err(_) => fallback_summary(msg),
        },
        "std_msgs/String" => match msg.get("data").and_then(|d| d.as_str()) {
            Some(data) => format!("Data: {}", data),
            None => fallback_summary(msg),
        },
        _ => fallback_summary(msg),
    }
}

fn fallback_summary(msg: &Value) -> String {
    let raw = msg.to_string();
    match raw.char_indices().nth(100) {
        Some((cut, _)) => format!("{}...", &raw[..cut]),
        None => raw,
    }
}

#[derive(Debug, Clone)]
struct EchoRecord {
    received_at: u64,
    topic: String,
    summary: String,
}

fn start_echo(
    client: &RosClient,
    topic: String,
    ros_type: &'static str,
    history: Arc<Mutex<VecDeque<EchoRecord>>>,
) -> JoinHandle<()> {
    let client = client.clone();
    tokio::spawn(async move {
        let Ok(mut sub) = client.subscribe::<Value>(&topic, ros_type).await else {
            warn!("Could not subscribe to {}", topic);
            return;
        };
        info!("Echoing {} as {}", topic, ros_type);
        while let Some(msg) = sub.recv().await {
            let summary = summarize(ros_type, &msg);
            info!("[{}] {}", topic, summary);
            let mut records = history.lock().unwrap();
            records.push_back(EchoRecord {
                received_at: now_millis(),
                topic: topic.clone(),
                summary,
            });
            while records.len() > MAX_HISTORY {
                records.pop_front();
            }
        }
    })
}

fn print_help() {
    println!("Echo commands:");
    println!("  topics        list topics (rosapi, with a static fallback)");
    println!("  echo <topic>  subscribe and print one-line summaries");
    println!("  stop          stop the current echo");
    println!("  history       show the last {} messages", MAX_HISTORY);
    println!("  clear         forget stored messages");
    println!("  help, quit");
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    info!("Starting topic echo console");

    let config = RoverdeckConfig::load()?;
    let client = config.connect_client();
    info!("Connecting to rosbridge at {}", client.url());

    let connect_deadline = Duration::from_millis(config.connection.connect_timeout_ms);
    if let Err(e) = client.wait_connected(connect_deadline).await {
        warn!("Not connected yet ({}); topic listing will fail until the link is up", e);
    }

    let history: Arc<Mutex<VecDeque<EchoRecord>>> = Arc::new(Mutex::new(VecDeque::new()));
    let mut echo_task: Option<JoinHandle<()>> = None;
    let topic_list_service = config.services.topic_list.clone();

    print_help();

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let mut parts = line.split_whitespace();
        match parts.next() {
            None => {}
            Some("topics") => {
                match client
                    .call_typed::<TopicsResponse>(&topic_list_service, None)
                    .await
                {
                    Ok(response) => {
                        info!("{} topics from rosapi:", response.topics.len());
                        for (topic, ros_type) in response.entries() {
                            match ros_type {
                                Some(t) => info!("  {}  [{}]", topic, t),
                                None => info!("  {}", topic),
                            }
                        }
                    }
                    Err(e) => {
                        warn!("rosapi not available ({}); using fallback list", e);
                        for topic in FALLBACK_TOPICS {
                            info!("  {}", topic);
                        }
                    }
                }
            }
            Some("echo") => match parts.next() {
                Some(topic) => {
                    if let Some(task) = echo_task.take() {
                        task.abort();
                    }
                    let ros_type = infer_topic_type(topic);
                    echo_task = Some(start_echo(
                        &client,
                        topic.to_string(),
                        ros_type,
                        Arc::clone(&history),
                    ));
                }
                None => warn!("usage: echo <topic>"),
            },
            Some("stop") => match echo_task.take() {
                Some(task) => {
                    task.abort();
                    info!("Echo stopped");
                }
                None => info!("No echo running"),
            },
            Some("history") => {
                let records = history.lock().unwrap().clone();
                if records.is_empty() {
                    info!("No messages stored");
                }
                for record in records {
                    info!(
                        "{} [{}] {}",
                        local_time_string(record.received_at),
                        record.topic,
                        record.summary
                    );
                }
            }
            Some("clear") => {
                history.lock().unwrap().clear();
                info!("History cleared");
            }
            Some("status") => {
                info!(
                    "Connection {:?}, echo {}",
                    client.state(),
                    if echo_task.is_some() { "running" } else { "idle" }
                );
            }
            Some("help") | Some("?") => print_help(),
            Some("q") | Some("quit") | Some("exit") => break,
            Some(other) => warn!("Unknown command '{}' (try 'help')", other),
        }
    }

    if let Some(task) = echo_task.take() {
        task.abort();
    }
    client.close();
    info!("Topic echo shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_inference_covers_known_topics() {
        assert_eq!(infer_topic_type("/unilidar/cloud"), "sensor_msgs/PointCloud2");
        assert_eq!(infer_topic_type("/cmd_vel"), "geometry_msgs/Twist");
        assert_eq!(infer_topic_type("/odom"), "nav_msgs/Odometry");
        assert_eq!(infer_topic_type("/scan"), "sensor_msgs/LaserScan");
        assert_eq!(infer_topic_type("/joint_states"), "sensor_msgs/JointState");
        assert_eq!(infer_topic_type("/battery_state"), "sensor_msgs/BatteryState");
        // compressed wins over map for the image topic
        assert_eq!(
            infer_topic_type("/map_image/compressed"),
            "sensor_msgs/CompressedImage"
        );
        assert_eq!(infer_topic_type("/map"), "nav_msgs/OccupancyGrid");
        assert_eq!(infer_topic_type("/rosout"), "std_msgs/String");
    }

    #[test]
    fn twist_summary_lists_both_vectors() {
        let msg = json!({
            "linear": {"x": 0.5, "y": 0.0, "z": 0.0},
            "angular": {"x": 0.0, "y": 0.0, "z": -1.0}
        });
        assert_eq!(
            summarize("geometry_msgs/Twist", &msg),
            "Linear: [0.50, 0.00, 0.00], Angular: [0.00, 0.00, -1.00]"
        );
    }

    #[test]
    fn string_summary_prints_data() {
        let msg = json!({"data": "hello"});
        assert_eq!(summarize("std_msgs/String", &msg), "Data: hello");
    }

    #[test]
    fn unknown_types_fall_back_to_truncated_json() {
        let msg = json!({"field": "y".repeat(200)});
        let summary = summarize("some_pkg/Custom", &msg);
        assert!(summary.len() <= 104);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn scan_summary_counts_valid_returns() {
        let msg = json!({
            "angle_min": 0.0,
            "angle_increment": 0.1,
            "range_min": 0.1,
            "range_max": 10.0,
            "ranges": [1.0, null, 2.0]
        });
        assert_eq!(
            summarize("sensor_msgs/LaserScan", &msg),
            "2 returns, closest 1.00 m"
        );
    }
}
