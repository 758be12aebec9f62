use eyre::Result;
use rosbridge_client::{ClientError, RosClient};
use roverdeck_lib::msgs::{
    NavigateRequest, Path, PoseStamped, PoseWithCovarianceStamped, TriggerResponse,
};
use roverdeck_lib::{init_tracing, RobotPose, RoverdeckConfig};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};

const POSE_STAMPED_TYPE: &str = "geometry_msgs/PoseStamped";
const POSE_COV_STAMPED_TYPE: &str = "geometry_msgs/PoseWithCovarianceStamped";
const PATH_TYPE: &str = "nav_msgs/Path";
const GRID_CELLS_TYPE: &str = "nav_msgs/GridCells";

#[derive(Debug, PartialEq)]
enum NavAction {
    Goal { x: f64, y: f64, theta: f64 },
    InitialPose { x: f64, y: f64, theta: f64 },
    Plan { x: f64, y: f64, theta: f64 },
    Navigate { x: f64, y: f64, theta: f64 },
    Pause,
    Resume,
    Cancel,
    Status,
    Help,
    Quit,
    Unknown(String),
    Noop,
}

#[derive(Default)]
struct NavDispatcher;

impl NavDispatcher {
    fn process_line(&mut self, line: &str) -> NavAction {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            return NavAction::Noop;
        };

        let mut parse_pose = |usage: &str| -> Result<(f64, f64, f64), NavAction> {
            let (Some(x), Some(y)) = (parts.next(), parts.next()) else {
                return Err(NavAction::Unknown(usage.to_string()));
            };
            let theta = parts.next().unwrap_or("0");
            match (x.parse(), y.parse(), theta.parse()) {
                (Ok(x), Ok(y), Ok(theta)) => Ok((x, y, theta)),
                _ => Err(NavAction::Unknown(usage.to_string())),
            }
        };

        match cmd {
            "goal" => match parse_pose("usage: goal <x> <y> [theta]") {
                Ok((x, y, theta)) => NavAction::Goal { x, y, theta },
                Err(action) => action,
            },
            "init" => match parse_pose("usage: init <x> <y> [theta]") {
                Ok((x, y, theta)) => NavAction::InitialPose { x, y, theta },
                Err(action) => action,
            },
            "plan" => match parse_pose("usage: plan <x> <y> [theta]") {
                Ok((x, y, theta)) => NavAction::Plan { x, y, theta },
                Err(action) => action,
            },
            "navigate" | "go" => match parse_pose("usage: navigate <x> <y> [theta]") {
                Ok((x, y, theta)) => NavAction::Navigate { x, y, theta },
                Err(action) => action,
            },
            "pause" => NavAction::Pause,
            "resume" => NavAction::Resume,
            "cancel" => NavAction::Cancel,
            "status" => NavAction::Status,
            "help" | "?" => NavAction::Help,
            "q" | "quit" | "exit" => NavAction::Quit,
            other => NavAction::Unknown(format!("unknown command '{}'", other)),
        }
    }
}

fn print_help() {
    println!("Navigation commands (poses in the map frame, theta in rad):");
    println!("  goal <x> <y> [theta]      publish a goal pose");
    println!("  init <x> <y> [theta]      publish an initial pose estimate");
    println!("  plan <x> <y> [theta]      ask the planner for a path");
    println!("  navigate <x> <y> [theta]  start navigating to a pose");
    println!("  pause / resume / cancel   run control");
    println!("  status, help, quit");
}

async fn run_trigger(client: &RosClient, service: &str, verb: &str) {
    match client.call_typed::<TriggerResponse>(service, None).await {
        Ok(response) if response.success => info!("{} succeeded: {}", verb, response.message),
        Ok(response) => warn!("{} failed: {}", verb, response.message),
        Err(e) => warn!("{} failed: {}", verb, e),
    }
}

/// Planner responses vary between stacks; pull a path out of the usual
/// field names and fall back to the raw payload.
fn describe_plan(values: &Value) -> String {
    for key in ["path", "plan"] {
        if let Some(path_value) = values.get(key) {
            if let Ok(path) = serde_json::from_value::<Path>(path_value.clone()) {
                return format!(
                    "{} poses, {:.2} m",
                    path.poses.len(),
                    path.length()
                );
            }
        }
    }
    let raw = values.to_string();
    match raw.char_indices().nth(100) {
        Some((cut, _)) => format!("{}...", &raw[..cut]),
        None => raw,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    info!("Starting navigation console");

    let config = RoverdeckConfig::load()?;
    let client = config.connect_client();
    info!("Connecting to rosbridge at {}", client.url());

    let connect_deadline = Duration::from_millis(config.connection.connect_timeout_ms);
    if let Err(e) = client.wait_connected(connect_deadline).await {
        warn!("Not connected yet ({}); navigation commands will fail until the link is up", e);
    }

    let amcl = Arc::new(Mutex::new(None::<RobotPose>));
    let path_stats = Arc::new(Mutex::new(None::<(usize, f64)>));
    let obstacle_count = Arc::new(Mutex::new(None::<usize>));

    {
        let amcl = Arc::clone(&amcl);
        let client = client.clone();
        let topic = config.topics.amcl_pose.clone();
        tokio::spawn(async move {
            let Ok(mut sub) = client
                .subscribe::<PoseWithCovarianceStamped>(&topic, POSE_COV_STAMPED_TYPE)
                .await
            else {
                return;
            };
            while let Some(msg) = sub.recv().await {
                *amcl.lock().unwrap() = Some(RobotPose::from_pose(&msg.pose.pose));
            }
        });
    }
    {
        let path_stats = Arc::clone(&path_stats);
        let client = client.clone();
        let topic = config.topics.path.clone();
        tokio::spawn(async move {
            let Ok(mut sub) = client.subscribe::<Path>(&topic, PATH_TYPE).await else {
                return;
            };
            while let Some(path) = sub.recv().await {
                *path_stats.lock().unwrap() = Some((path.poses.len(), path.length()));
            }
        });
    }
    {
        let obstacle_count = Arc::clone(&obstacle_count);
        let client = client.clone();
        let topic = config.topics.obstacles.clone();
        tokio::spawn(async move {
            let Ok(mut sub) = client.subscribe::<Value>(&topic, GRID_CELLS_TYPE).await else {
                return;
            };
            while let Some(msg) = sub.recv().await {
                let count = msg
                    .get("cells")
                    .and_then(|cells| cells.as_array())
                    .map(|cells| cells.len())
                    .unwrap_or(0);
                *obstacle_count.lock().unwrap() = Some(count);
            }
        });
    }

    let topics = config.topics.clone();
    let services = config.services.clone();
    let mut dispatcher = NavDispatcher;

    print_help();

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match dispatcher.process_line(&line) {
            NavAction::Goal { x, y, theta } => {
                let goal = PoseStamped::planar("map", x, y, theta);
                match client
                    .publish(&topics.goal_pose, POSE_STAMPED_TYPE, &goal)
                    .await
                {
                    Ok(()) => info!("Goal published: ({:.2}, {:.2}, {:.2} rad)", x, y, theta),
                    Err(e) => warn!("Failed to publish goal: {}", e),
                }
            }
            NavAction::InitialPose { x, y, theta } => {
                let estimate = PoseWithCovarianceStamped::initial_estimate(x, y, theta);
                match client
                    .publish(&topics.initialpose, POSE_COV_STAMPED_TYPE, &estimate)
                    .await
                {
                    Ok(()) => info!(
                        "Initial pose published: ({:.2}, {:.2}, {:.2} rad)",
                        x, y, theta
                    ),
                    Err(e) => warn!("Failed to publish initial pose: {}", e),
                }
            }
            NavAction::Plan { x, y, theta } => {
                let request = NavigateRequest {
                    pose: PoseStamped::planar("map", x, y, theta),
                };
                let args = serde_json::to_value(&request).ok();
                match client.call_service(&services.plan_path, args).await {
                    Ok(values) => info!("Planned path: {}", describe_plan(&values)),
                    Err(ClientError::ServiceFailure { message, .. }) => {
                        warn!("Failed to get path: {}", message);
                    }
                    Err(e) => warn!("Failed to get path: {}", e),
                }
            }
            NavAction::Navigate { x, y, theta } => {
                let request = NavigateRequest {
                    pose: PoseStamped::planar("map", x, y, theta),
                };
                let args = serde_json::to_value(&request).ok();
                match client.call_service(&services.navigate_to_pose, args).await {
                    Ok(_) => info!("Navigating to ({:.2}, {:.2}, {:.2} rad)", x, y, theta),
                    Err(e) => warn!("Failed to start navigation: {}", e),
                }
            }
            NavAction::Pause => run_trigger(&client, &services.pause_navigation, "Pause").await,
            NavAction::Resume => run_trigger(&client, &services.resume_navigation, "Resume").await,
            NavAction::Cancel => run_trigger(&client, &services.cancel_navigation, "Cancel").await,
            NavAction::Status => {
                info!("Connection {:?}", client.state());
                match *amcl.lock().unwrap() {
                    Some(p) => info!(
                        "Localized at ({:.2}, {:.2}), heading {:.1} deg",
                        p.x,
                        p.y,
                        p.theta.to_degrees()
                    ),
                    None => info!("No localization received yet"),
                }
                match *path_stats.lock().unwrap() {
                    Some((poses, length)) => {
                        info!("Current path: {} poses, {:.2} m", poses, length)
                    }
                    None => info!("No path received yet"),
                }
                if let Some(count) = *obstacle_count.lock().unwrap() {
                    info!("Obstacle cells: {}", count);
                }
            }
            NavAction::Help => print_help(),
            NavAction::Quit => break,
            NavAction::Unknown(message) => warn!("{}", message),
            NavAction::Noop => {}
        }
    }

    client.close();
    info!("Navigation console shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_parses_full_pose() {
        let mut d = NavDispatcher;
        assert_eq!(
            d.process_line("goal 1.5 -2.0 0.78"),
            NavAction::Goal {
                x: 1.5,
                y: -2.0,
                theta: 0.78
            }
        );
    }

    #[test]
    fn theta_defaults_to_zero() {
        let mut d = NavDispatcher;
        assert_eq!(
            d.process_line("navigate 3 4"),
            NavAction::Navigate {
                x: 3.0,
                y: 4.0,
                theta: 0.0
            }
        );
    }

    #[test]
    fn malformed_poses_are_rejected() {
        let mut d = NavDispatcher;
        assert!(matches!(d.process_line("goal 1.5"), NavAction::Unknown(_)));
        assert!(matches!(
            d.process_line("goal one two"),
            NavAction::Unknown(_)
        ));
    }

    #[test]
    fn describe_plan_reads_both_field_names() {
        let path = serde_json::json!({
            "header": {},
            "poses": [
                {"header": {}, "pose": {"position": {"x": 0.0, "y": 0.0, "z": 0.0}}},
                {"header": {}, "pose": {"position": {"x": 3.0, "y": 4.0, "z": 0.0}}}
            ]
        });
        let with_path = serde_json::json!({ "path": path });
        assert_eq!(describe_plan(&with_path), "2 poses, 5.00 m");
        let with_plan = serde_json::json!({ "plan": path });
        assert_eq!(describe_plan(&with_plan), "2 poses, 5.00 m");
    }

    #[test]
    fn describe_plan_truncates_unknown_payloads() {
        let values = serde_json::json!({"weird": "x".repeat(200)});
        let described = describe_plan(&values);
        assert!(described.len() <= 104);
        assert!(described.ends_with("..."));
    }
}
