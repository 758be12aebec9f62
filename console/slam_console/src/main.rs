use eyre::Result;
use rosbridge_client::{ClientError, RosClient};
use roverdeck_lib::msgs::{CompressedImage, OccupancyGrid, Pose, TriggerResponse};
use roverdeck_lib::{decode, init_tracing, MapImage, RobotPose, RoverdeckConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};

const POSE_TYPE: &str = "geometry_msgs/Pose";
const COMPRESSED_IMAGE_TYPE: &str = "sensor_msgs/CompressedImage";
const OCCUPANCY_GRID_TYPE: &str = "nav_msgs/OccupancyGrid";

#[derive(Debug, PartialEq)]
enum SlamAction {
    Start,
    StopMapping,
    Save { toolbox: bool },
    /// First `reset`: ask for confirmation before wiping the map.
    ResetRequested,
    ResetConfirmed,
    MapInfo,
    Export(String),
    Pose,
    Status,
    Help,
    Quit,
    Unknown(String),
    Noop,
}

/// Parses console commands. Destructive reset needs a second
/// `reset confirm`, and any other command in between cancels it.
#[derive(Default)]
struct SlamDispatcher {
    awaiting_reset_confirm: bool,
}

impl SlamDispatcher {
    fn process_line(&mut self, line: &str) -> SlamAction {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            return SlamAction::Noop;
        };

        if cmd == "reset" {
            if parts.next() == Some("confirm") && self.awaiting_reset_confirm {
                self.awaiting_reset_confirm = false;
                return SlamAction::ResetConfirmed;
            }
            self.awaiting_reset_confirm = true;
            return SlamAction::ResetRequested;
        }
        self.awaiting_reset_confirm = false;

        match cmd {
            "start" => SlamAction::Start,
            "stop" => SlamAction::StopMapping,
            "save" => SlamAction::Save {
                toolbox: parts.next() == Some("toolbox"),
            },
            "map" => SlamAction::MapInfo,
            "export" => match parts.next() {
                Some(path) => SlamAction::Export(path.to_string()),
                None => SlamAction::Unknown("usage: export <file.png>".to_string()),
            },
            "pose" => SlamAction::Pose,
            "status" => SlamAction::Status,
            "help" | "?" => SlamAction::Help,
            "q" | "quit" | "exit" => SlamAction::Quit,
            other => SlamAction::Unknown(format!("unknown command '{}'", other)),
        }
    }
}

fn print_help() {
    println!("SLAM commands:");
    println!("  start            start mapping (/start_slam)");
    println!("  stop             stop mapping (/stop_slam)");
    println!("  save [toolbox]   save the map, optionally via slam_toolbox");
    println!("  reset            reset the map (asks to confirm)");
    println!("  map              latest map frame and grid stats");
    println!("  export <path>    write the latest map frame to a file");
    println!("  pose, status, help, quit");
}

/// Trigger-style services report application failures in their response,
/// separate from transport failures.
async fn call_trigger(client: &RosClient, service: &str) -> Result<TriggerResponse, ClientError> {
    client.call_typed::<TriggerResponse>(service, None).await
}

/// Logs the outcome and reports whether the service succeeded.
async fn run_trigger(client: &RosClient, service: &str, verb: &str) -> bool {
    match call_trigger(client, service).await {
        Ok(response) if response.success => {
            info!("{} succeeded: {}", verb, response.message);
            true
        }
        Ok(response) => {
            warn!("{} failed: {}", verb, response.message);
            false
        }
        Err(e) => {
            warn!("{} failed: {}", verb, e);
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    info!("Starting SLAM console");

    let config = RoverdeckConfig::load()?;
    let client = config.connect_client();
    info!("Connecting to rosbridge at {}", client.url());

    let connect_deadline = Duration::from_millis(config.connection.connect_timeout_ms);
    if let Err(e) = client.wait_connected(connect_deadline).await {
        warn!("Not connected yet ({}); mapping controls will fail until the link is up", e);
    }

    let pose = Arc::new(Mutex::new(None::<RobotPose>));
    let map_image = Arc::new(Mutex::new(MapImage::default()));
    let grid_stats = Arc::new(Mutex::new(None::<(u32, u32, f64, f64)>));

    {
        let pose = Arc::clone(&pose);
        let client = client.clone();
        let topic = config.topics.robot_pose.clone();
        tokio::spawn(async move {
            let Ok(mut sub) = client.subscribe::<Pose>(&topic, POSE_TYPE).await else {
                return;
            };
            while let Some(msg) = sub.recv().await {
                *pose.lock().unwrap() = Some(RobotPose::from_pose(&msg));
            }
        });
    }
    {
        let map_image = Arc::clone(&map_image);
        let client = client.clone();
        let topic = config.topics.map_image.clone();
        tokio::spawn(async move {
            let Ok(mut sub) = client
                .subscribe::<CompressedImage>(&topic, COMPRESSED_IMAGE_TYPE)
                .await
            else {
                return;
            };
            while let Some(msg) = sub.recv().await {
                map_image.lock().unwrap().apply(&msg);
            }
        });
    }
    {
        let grid_stats = Arc::clone(&grid_stats);
        let client = client.clone();
        let topic = config.topics.map.clone();
        tokio::spawn(async move {
            let Ok(mut sub) = client
                .subscribe::<OccupancyGrid>(&topic, OCCUPANCY_GRID_TYPE)
                .await
            else {
                return;
            };
            while let Some(grid) = sub.recv().await {
                *grid_stats.lock().unwrap() = Some((
                    grid.info.width,
                    grid.info.height,
                    grid.info.resolution,
                    grid.known_fraction(),
                ));
            }
        });
    }

    let services = config.services.clone();
    let mut dispatcher = SlamDispatcher::default();
    let mut mapping_active = false;

    print_help();

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match dispatcher.process_line(&line) {
            SlamAction::Start => {
                if mapping_active {
                    warn!("Mapping is already active; stop it first");
                } else if run_trigger(&client, &services.start_slam, "Start mapping").await {
                    mapping_active = true;
                }
            }
            SlamAction::StopMapping => {
                if !mapping_active {
                    warn!("Mapping is not active");
                } else if run_trigger(&client, &services.stop_slam, "Stop mapping").await {
                    mapping_active = false;
                }
            }
            SlamAction::Save { toolbox } => {
                if map_image.lock().unwrap().received_at == 0 {
                    warn!("No map received yet; nothing to save");
                    continue;
                }
                let service = if toolbox {
                    &services.toolbox_save_map
                } else {
                    &services.save_map
                };
                run_trigger(&client, service, "Save map").await;
            }
            SlamAction::ResetRequested => {
                warn!("This clears the current map. Type 'reset confirm' to proceed");
            }
            SlamAction::ResetConfirmed => {
                if run_trigger(&client, &services.reset_map, "Reset map").await {
                    *map_image.lock().unwrap() = MapImage::default();
                    *grid_stats.lock().unwrap() = None;
                }
            }
            SlamAction::MapInfo => {
                let image = map_image.lock().unwrap().clone();
                if image.received_at == 0 {
                    info!("No map frame received yet");
                } else {
                    info!(
                        "Map frame: format '{}', {} base64 chars, received at {}",
                        image.format, image.base64_len, image.received_at
                    );
                }
                if let Some((width, height, resolution, known)) = *grid_stats.lock().unwrap() {
                    info!(
                        "Grid: {}x{} cells at {:.3} m/cell, {:.1}% known",
                        width,
                        height,
                        resolution,
                        known * 100.0
                    );
                }
            }
            SlamAction::Export(path) => {
                let image = map_image.lock().unwrap().clone();
                if image.received_at == 0 {
                    warn!("No map frame received yet");
                    continue;
                }
                let frame = CompressedImage {
                    format: image.format.clone(),
                    data: image.data.clone(),
                    ..Default::default()
                };
                match decode::payload(&frame) {
                    Some(bytes) => match std::fs::write(&path, &bytes) {
                        Ok(()) => info!("Wrote {} bytes to {}", bytes.len(), path),
                        Err(e) => warn!("Could not write {}: {}", path, e),
                    },
                    None => warn!("Latest map frame is not valid base64"),
                }
            }
            SlamAction::Pose => match *pose.lock().unwrap() {
                Some(p) => info!(
                    "Robot at ({:.2}, {:.2}), heading {:.1} deg",
                    p.x,
                    p.y,
                    p.theta.to_degrees()
                ),
                None => info!("No pose received yet"),
            },
            SlamAction::Status => {
                info!(
                    "Connection {:?}, mapping {}",
                    client.state(),
                    if mapping_active { "ACTIVE" } else { "idle" }
                );
            }
            SlamAction::Help => print_help(),
            SlamAction::Quit => break,
            SlamAction::Unknown(message) => warn!("{}", message),
            SlamAction::Noop => {}
        }
    }

    client.close();
    info!("SLAM console shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_requires_confirmation() {
        let mut d = SlamDispatcher::default();
        assert_eq!(d.process_line("reset"), SlamAction::ResetRequested);
        assert_eq!(d.process_line("reset confirm"), SlamAction::ResetConfirmed);
    }

    #[test]
    fn other_commands_cancel_pending_reset() {
        let mut d = SlamDispatcher::default();
        assert_eq!(d.process_line("reset"), SlamAction::ResetRequested);
        assert_eq!(d.process_line("status"), SlamAction::Status);
        // Confirmation without a fresh request re-arms instead of firing
        assert_eq!(d.process_line("reset confirm"), SlamAction::ResetRequested);
    }

    #[test]
    fn save_picks_the_toolbox_variant() {
        let mut d = SlamDispatcher::default();
        assert_eq!(d.process_line("save"), SlamAction::Save { toolbox: false });
        assert_eq!(
            d.process_line("save toolbox"),
            SlamAction::Save { toolbox: true }
        );
    }

    #[test]
    fn export_needs_a_path() {
        let mut d = SlamDispatcher::default();
        assert!(matches!(d.process_line("export"), SlamAction::Unknown(_)));
        assert_eq!(
            d.process_line("export map.png"),
            SlamAction::Export("map.png".to_string())
        );
    }
}
