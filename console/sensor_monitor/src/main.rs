use eyre::Result;
use rosbridge_client::RosClient;
use roverdeck_lib::decode::parse_pointcloud2;
use roverdeck_lib::msgs::{BatteryState, JointState, LaserScan, Odometry, PointCloud2};
use roverdeck_lib::{init_tracing, now_millis, DashboardState, RoverdeckConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

const BATTERY_TYPE: &str = "sensor_msgs/BatteryState";
const JOINT_STATE_TYPE: &str = "sensor_msgs/JointState";
const ODOMETRY_TYPE: &str = "nav_msgs/Odometry";
const LASER_SCAN_TYPE: &str = "sensor_msgs/LaserScan";
const POINT_CLOUD_TYPE: &str = "sensor_msgs/PointCloud2";

/// Interval between summary lines.
const SUMMARY_INTERVAL: Duration = Duration::from_secs(2);
/// A source that stays quiet this long is reported as stale.
const STALE_AFTER_MS: u64 = 5_000;

fn spawn_battery(client: &RosClient, topic: String, dashboard: Arc<Mutex<DashboardState>>) {
    let client = client.clone();
    tokio::spawn(async move {
        let Ok(mut sub) = client.subscribe::<BatteryState>(&topic, BATTERY_TYPE).await else {
            return;
        };
        while let Some(msg) = sub.recv().await {
            dashboard.lock().unwrap().apply_battery(&msg);
        }
    });
}

fn spawn_joints(client: &RosClient, topic: String, dashboard: Arc<Mutex<DashboardState>>) {
    let client = client.clone();
    tokio::spawn(async move {
        let Ok(mut sub) = client.subscribe::<JointState>(&topic, JOINT_STATE_TYPE).await else {
            return;
        };
        while let Some(msg) = sub.recv().await {
            dashboard.lock().unwrap().apply_joints(&msg);
        }
    });
}

fn spawn_odometry(client: &RosClient, topic: String, dashboard: Arc<Mutex<DashboardState>>) {
    let client = client.clone();
    tokio::spawn(async move {
        let Ok(mut sub) = client.subscribe::<Odometry>(&topic, ODOMETRY_TYPE).await else {
            return;
        };
        while let Some(msg) = sub.recv().await {
            dashboard.lock().unwrap().apply_odometry(&msg);
        }
    });
}

fn spawn_scan(client: &RosClient, topic: String, dashboard: Arc<Mutex<DashboardState>>) {
    let client = client.clone();
    tokio::spawn(async move {
        let Ok(mut sub) = client.subscribe::<LaserScan>(&topic, LASER_SCAN_TYPE).await else {
            return;
        };
        while let Some(msg) = sub.recv().await {
            dashboard.lock().unwrap().apply_scan(&msg);
        }
    });
}

fn spawn_cloud(client: &RosClient, topic: String, dashboard: Arc<Mutex<DashboardState>>) {
    let client = client.clone();
    tokio::spawn(async move {
        let Ok(mut sub) = client.subscribe::<PointCloud2>(&topic, POINT_CLOUD_TYPE).await else {
            return;
        };
        while let Some(msg) = sub.recv().await {
            match parse_pointcloud2(&msg) {
                Ok(points) => dashboard.lock().unwrap().apply_cloud(points.len()),
                Err(e) => warn!("Undecodable point cloud on {}: {}", topic, e),
            }
        }
    });
}

fn format_summary(dashboard: &DashboardState) -> String {
    let battery = match (dashboard.battery_percent, dashboard.battery_voltage) {
        (Some(percent), Some(voltage)) => format!("battery {:.0}% ({:.1}V)", percent, voltage),
        _ => "battery --".to_string(),
    };
    let speed = match dashboard.ground_speed {
        Some(speed) => format!("speed {:.2} m/s", speed),
        None => "speed --".to_string(),
    };
    let joints = match dashboard.joint_count {
        Some(count) => format!("joints {}", count),
        None => "joints --".to_string(),
    };
    let scan = match (dashboard.scan_points, dashboard.scan_min_range) {
        (Some(points), Some(min_range)) => {
            format!("scan {} pts, min {:.2} m", points, min_range)
        }
        (Some(points), None) => format!("scan {} pts", points),
        _ => "scan --".to_string(),
    };
    let cloud = match dashboard.cloud_points {
        Some(points) => format!("cloud {} pts", points),
        None => "cloud --".to_string(),
    };
    format!("{} | {} | {} | {} | {}", battery, speed, joints, scan, cloud)
}

fn print_help() {
    println!("Monitor commands:");
    println!("  status   print a summary now");
    println!("  help, quit");
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    info!("Starting sensor monitor");

    let config = RoverdeckConfig::load()?;
    let client = config.connect_client();
    info!("Connecting to rosbridge at {}", client.url());

    let connect_deadline = Duration::from_millis(config.connection.connect_timeout_ms);
    if let Err(e) = client.wait_connected(connect_deadline).await {
        warn!("Not connected yet ({}); waiting for the link to come up", e);
    }

    let dashboard = Arc::new(Mutex::new(DashboardState::default()));
    spawn_battery(&client, config.topics.battery.clone(), Arc::clone(&dashboard));
    spawn_joints(
        &client,
        config.topics.joint_states.clone(),
        Arc::clone(&dashboard),
    );
    spawn_odometry(&client, config.topics.odom.clone(), Arc::clone(&dashboard));
    spawn_scan(&client, config.topics.scan.clone(), Arc::clone(&dashboard));
    spawn_cloud(&client, config.topics.cloud.clone(), Arc::clone(&dashboard));

    let mut summary = tokio::time::interval(SUMMARY_INTERVAL);
    summary.set_missed_tick_behavior(MissedTickBehavior::Skip);

    print_help();

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                match line.trim() {
                    "" => {}
                    "status" => {
                        let snapshot = dashboard.lock().unwrap().clone();
                        info!("{}", format_summary(&snapshot));
                        if let Some(pose) = snapshot.pose {
                            info!(
                                "Pose ({:.2}, {:.2}), heading {:.1} deg",
                                pose.x,
                                pose.y,
                                pose.theta.to_degrees()
                            );
                        }
                    }
                    "help" | "?" => print_help(),
                    "q" | "quit" | "exit" => break,
                    other => warn!("Unknown command '{}' (try 'help')", other),
                }
            }
            _ = summary.tick() => {
                let snapshot = dashboard.lock().unwrap().clone();
                info!("{}", format_summary(&snapshot));
                let stale = snapshot.stale_sources(now_millis(), STALE_AFTER_MS);
                if !stale.is_empty() {
                    warn!("Stale sources: {}", stale.join(", "));
                }
            }
        }
    }

    client.close();
    info!("Sensor monitor shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_shows_placeholders_until_data_arrives() {
        let summary = format_summary(&DashboardState::default());
        assert_eq!(
            summary,
            "battery -- | speed -- | joints -- | scan -- | cloud --"
        );
    }

    #[test]
    fn summary_formats_live_values() {
        let mut dashboard = DashboardState::default();
        dashboard.apply_battery(&BatteryState {
            voltage: 12.4,
            percentage: 0.75,
            ..Default::default()
        });
        dashboard.apply_scan(&LaserScan {
            range_min: 0.1,
            range_max: 10.0,
            ranges: vec![2.0, 0.5, f64::INFINITY],
            ..Default::default()
        });
        let summary = format_summary(&dashboard);
        assert!(summary.contains("battery 75% (12.4V)"));
        assert!(summary.contains("scan 2 pts, min 0.50 m"));
    }
}
