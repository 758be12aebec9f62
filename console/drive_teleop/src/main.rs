use eyre::Result;
use rosbridge_client::RosClient;
use roverdeck_lib::msgs::Twist;
use roverdeck_lib::{init_tracing, RoverdeckConfig, TeleopConfig};
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

const TWIST_TYPE: &str = "geometry_msgs/Twist";

#[derive(Debug, PartialEq)]
enum DriveAction {
    Move { linear: f64, angular: f64 },
    Stop,
    SpeedUpdated,
    Status,
    Help,
    Quit,
    Unknown(String),
    Noop,
}

/// Maps console commands to motions. Held-key semantics are approximated
/// by repeating the active motion at the publish interval until `stop`.
struct DriveDispatcher {
    linear_speed: f64,
    angular_speed: f64,
    diagonal_scale: f64,
}

impl DriveDispatcher {
    fn new(teleop: &TeleopConfig) -> Self {
        Self {
            linear_speed: teleop.default_linear,
            angular_speed: teleop.default_angular,
            diagonal_scale: teleop.diagonal_scale,
        }
    }

    fn process_line(&mut self, line: &str) -> DriveAction {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            return DriveAction::Noop;
        };

        let lin = self.linear_speed;
        let ang = self.angular_speed;
        let diag = self.diagonal_scale;

        match cmd {
            "w" | "forward" => DriveAction::Move {
                linear: lin,
                angular: 0.0,
            },
            "s" | "back" => DriveAction::Move {
                linear: -lin,
                angular: 0.0,
            },
            "a" | "left" => DriveAction::Move {
                linear: 0.0,
                angular: ang,
            },
            "d" | "right" => DriveAction::Move {
                linear: 0.0,
                angular: -ang,
            },
            "wa" => DriveAction::Move {
                linear: lin * diag,
                angular: ang * diag,
            },
            "wd" => DriveAction::Move {
                linear: lin * diag,
                angular: -ang * diag,
            },
            "sa" => DriveAction::Move {
                linear: -lin * diag,
                angular: ang * diag,
            },
            "sd" => DriveAction::Move {
                linear: -lin * diag,
                angular: -ang * diag,
            },
            "x" | "stop" => DriveAction::Stop,
            "lin" => match parts.next().and_then(|v| v.parse::<f64>().ok()) {
                Some(value) => {
                    self.linear_speed = value.clamp(0.0, 2.0);
                    DriveAction::SpeedUpdated
                }
                None => DriveAction::Unknown("lin needs a value in m/s".to_string()),
            },
            "ang" => match parts.next().and_then(|v| v.parse::<f64>().ok()) {
                Some(value) => {
                    self.angular_speed = value.clamp(0.0, 3.14);
                    DriveAction::SpeedUpdated
                }
                None => DriveAction::Unknown("ang needs a value in rad/s".to_string()),
            },
            "status" => DriveAction::Status,
            "help" | "?" => DriveAction::Help,
            "q" | "quit" | "exit" => DriveAction::Quit,
            other => DriveAction::Unknown(other.to_string()),
        }
    }
}

fn print_help() {
    println!("Drive commands:");
    println!("  w/s        forward / backward");
    println!("  a/d        turn left / right");
    println!("  wa wd sa sd  diagonals (scaled)");
    println!("  x, stop    stop the robot");
    println!("  lin <v>    set linear speed (m/s)");
    println!("  ang <v>    set angular speed (rad/s)");
    println!("  status, help, quit");
}

async fn publish_twist(client: &RosClient, topic: &str, twist: &Twist) {
    if let Err(e) = client.publish(topic, TWIST_TYPE, twist).await {
        warn!("Failed to publish cmd_vel: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    info!("Starting drive teleop console");

    let config = RoverdeckConfig::load()?;
    let client = config.connect_client();
    info!("Connecting to rosbridge at {}", client.url());

    let connect_deadline = Duration::from_millis(config.connection.connect_timeout_ms);
    if let Err(e) = client.wait_connected(connect_deadline).await {
        warn!(
            "Not connected yet ({}); motion commands will fail until the link is up",
            e
        );
    }

    let cmd_vel = config.topics.cmd_vel.clone();
    let mut dispatcher = DriveDispatcher::new(&config.teleop);
    let mut active: Option<Twist> = None;

    let mut repeat =
        tokio::time::interval(Duration::from_millis(config.teleop.publish_interval_ms));
    repeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

    print_help();

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                match dispatcher.process_line(&line) {
                    DriveAction::Move { linear, angular } => {
                        let twist = Twist::planar(linear, angular);
                        publish_twist(&client, &cmd_vel, &twist).await;
                        active = Some(twist);
                        info!("Driving: linear {:.2} m/s, angular {:.2} rad/s", linear, angular);
                    }
                    DriveAction::Stop => {
                        active = None;
                        publish_twist(&client, &cmd_vel, &Twist::zero()).await;
                        info!("Stopped");
                    }
                    DriveAction::SpeedUpdated => {
                        info!(
                            "Speeds: linear {:.2} m/s, angular {:.2} rad/s",
                            dispatcher.linear_speed, dispatcher.angular_speed
                        );
                    }
                    DriveAction::Status => {
                        info!(
                            "Connection {:?}, linear {:.2} m/s, angular {:.2} rad/s, moving: {}",
                            client.state(),
                            dispatcher.linear_speed,
                            dispatcher.angular_speed,
                            active.is_some()
                        );
                    }
                    DriveAction::Help => print_help(),
                    DriveAction::Quit => break,
                    DriveAction::Unknown(cmd) => {
                        warn!("Unknown command '{}' (try 'help')", cmd);
                    }
                    DriveAction::Noop => {}
                }
            }
            _ = repeat.tick() => {
                if let Some(twist) = &active {
                    publish_twist(&client, &cmd_vel, twist).await;
                }
            }
        }
    }

    // Always leave the robot stopped
    publish_twist(&client, &cmd_vel, &Twist::zero()).await;
    client.close();
    info!("Drive teleop shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> DriveDispatcher {
        DriveDispatcher::new(&TeleopConfig::default())
    }

    #[test]
    fn forward_uses_linear_speed() {
        let mut d = dispatcher();
        assert_eq!(
            d.process_line("w"),
            DriveAction::Move {
                linear: 0.5,
                angular: 0.0
            }
        );
    }

    #[test]
    fn turns_are_pure_rotation() {
        let mut d = dispatcher();
        assert_eq!(
            d.process_line("a"),
            DriveAction::Move {
                linear: 0.0,
                angular: 1.0
            }
        );
        assert_eq!(
            d.process_line("d"),
            DriveAction::Move {
                linear: 0.0,
                angular: -1.0
            }
        );
    }

    #[test]
    fn diagonals_scale_both_axes() {
        let mut d = dispatcher();
        match d.process_line("sa") {
            DriveAction::Move { linear, angular } => {
                assert!((linear + 0.35).abs() < 1e-9);
                assert!((angular - 0.7).abs() < 1e-9);
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn speed_setters_clamp() {
        let mut d = dispatcher();
        assert_eq!(d.process_line("lin 9.9"), DriveAction::SpeedUpdated);
        assert_eq!(d.linear_speed, 2.0);
        assert_eq!(d.process_line("ang -5"), DriveAction::SpeedUpdated);
        assert_eq!(d.angular_speed, 0.0);
    }

    #[test]
    fn new_speed_applies_to_next_motion() {
        let mut d = dispatcher();
        d.process_line("lin 1.5");
        assert_eq!(
            d.process_line("w"),
            DriveAction::Move {
                linear: 1.5,
                angular: 0.0
            }
        );
    }

    #[test]
    fn blank_and_unknown_lines() {
        let mut d = dispatcher();
        assert_eq!(d.process_line("   "), DriveAction::Noop);
        assert_eq!(
            d.process_line("fly"),
            DriveAction::Unknown("fly".to_string())
        );
    }
}
