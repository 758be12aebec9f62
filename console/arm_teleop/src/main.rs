use eyre::Result;
use rosbridge_client::RosClient;
use roverdeck_lib::msgs::{Float64, Float64MultiArray, JointState};
use roverdeck_lib::{init_tracing, ArmProfile, JointAngles, RoverdeckConfig};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const FLOAT64_TYPE: &str = "std_msgs/Float64";
const MULTI_ARRAY_TYPE: &str = "std_msgs/Float64MultiArray";
const JOINT_STATE_TYPE: &str = "sensor_msgs/JointState";

#[derive(Debug, PartialEq)]
enum ArmAction {
    /// Target angles changed for these joint indices.
    TargetsChanged(Vec<usize>),
    /// Align targets with the last reported joint state.
    Hold,
    Status,
    Help,
    Quit,
    Unknown(String),
    Noop,
}

/// Turns console commands into clamped target angles. Every mutation goes
/// through the profile's joint limits; out-of-range requests land on the
/// limit instead of being rejected.
struct ArmDispatcher {
    profile: ArmProfile,
    jog_step: f64,
    targets: Vec<f64>,
}

impl ArmDispatcher {
    fn new(profile: ArmProfile, jog_step: f64) -> Self {
        let targets = vec![0.0; profile.dof()];
        Self {
            profile,
            jog_step,
            targets,
        }
    }

    /// Joint by name ("joint_3") or 1-based number ("3").
    fn resolve_joint(&self, token: &str) -> Option<usize> {
        if let Some(index) = self.profile.joint_index(token) {
            return Some(index);
        }
        token
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=self.profile.dof()).contains(n))
            .map(|n| n - 1)
    }

    fn process_line(&mut self, line: &str) -> ArmAction {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            return ArmAction::Noop;
        };

        match cmd {
            "set" => {
                let (Some(joint), Some(value)) = (parts.next(), parts.next()) else {
                    return ArmAction::Unknown("usage: set <joint> <rad>".to_string());
                };
                let Some(index) = self.resolve_joint(joint) else {
                    return ArmAction::Unknown(format!("no such joint '{}'", joint));
                };
                let Ok(angle) = value.parse::<f64>() else {
                    return ArmAction::Unknown(format!("'{}' is not an angle", value));
                };
                self.targets[index] = self.profile.clamp(index, angle);
                ArmAction::TargetsChanged(vec![index])
            }
            "jog" => {
                let (Some(joint), Some(direction)) = (parts.next(), parts.next()) else {
                    return ArmAction::Unknown("usage: jog <joint> +|-".to_string());
                };
                let Some(index) = self.resolve_joint(joint) else {
                    return ArmAction::Unknown(format!("no such joint '{}'", joint));
                };
                let step = match direction {
                    "+" => self.jog_step,
                    "-" => -self.jog_step,
                    other => {
                        return ArmAction::Unknown(format!("jog direction '{}' (use + or -)", other))
                    }
                };
                self.targets[index] = self.profile.clamp(index, self.targets[index] + step);
                ArmAction::TargetsChanged(vec![index])
            }
            "preset" => {
                let Some(name) = parts.next() else {
                    let names: Vec<_> = self.profile.presets.keys().cloned().collect();
                    return ArmAction::Unknown(format!("usage: preset <{}>", names.join("|")));
                };
                let Some(angles) = self.profile.preset(name) else {
                    return ArmAction::Unknown(format!("no preset '{}'", name));
                };
                let angles = angles.to_vec();
                for (index, angle) in angles.iter().enumerate() {
                    self.targets[index] = self.profile.clamp(index, *angle);
                }
                ArmAction::TargetsChanged((0..self.profile.dof()).collect())
            }
            "stop" | "hold" => ArmAction::Hold,
            "status" => ArmAction::Status,
            "help" | "?" => ArmAction::Help,
            "q" | "quit" | "exit" => ArmAction::Quit,
            other => ArmAction::Unknown(format!("unknown command '{}'", other)),
        }
    }
}

fn print_help(profile: &ArmProfile) {
    println!("Arm commands ({} joints: {}):", profile.dof(), profile.joints.join(", "));
    println!("  set <joint> <rad>   move one joint (clamped to limits)");
    println!("  jog <joint> +|-     nudge one joint by the jog step");
    println!(
        "  preset <name>       posture: {}",
        profile
            .presets
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  stop                hold at the last reported position");
    println!("  status, help, quit");
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    info!("Starting arm teleop console");

    let config = RoverdeckConfig::load()?;
    config.arm.validate()?;

    let client = config.connect_client();
    info!("Connecting to rosbridge at {}", client.url());

    let connect_deadline = Duration::from_millis(config.connection.connect_timeout_ms);
    if let Err(e) = client.wait_connected(connect_deadline).await {
        warn!("Not connected yet ({}); joint commands will fail until the link is up", e);
    }

    // Track actual joint angles in the background
    let actual = Arc::new(Mutex::new(JointAngles::default()));
    {
        let actual = Arc::clone(&actual);
        let client = client.clone();
        let topic = config.topics.joint_states.clone();
        tokio::spawn(async move {
            let Ok(mut sub) = client.subscribe::<JointState>(&topic, JOINT_STATE_TYPE).await
            else {
                return;
            };
            while let Some(state) = sub.recv().await {
                actual.lock().unwrap().apply(&state);
            }
        });
    }

    let mut dispatcher = ArmDispatcher::new(config.arm.clone(), config.teleop.jog_step);
    let joint_command = config.topics.joint_command.clone();
    let position_command = config.topics.position_command.clone();

    // Joints touched since the last flush; published at most once per
    // interval so rapid jogs coalesce
    let mut dirty: BTreeSet<usize> = BTreeSet::new();
    let mut flush =
        tokio::time::interval(Duration::from_millis(config.teleop.publish_interval_ms));
    flush.set_missed_tick_behavior(MissedTickBehavior::Skip);

    print_help(&dispatcher.profile);

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                match dispatcher.process_line(&line) {
                    ArmAction::TargetsChanged(changed) => {
                        for &index in &changed {
                            debug!(
                                "Target {} -> {:.3} rad",
                                dispatcher.profile.joints[index], dispatcher.targets[index]
                            );
                        }
                        dirty.extend(changed);
                    }
                    ArmAction::Hold => {
                        let angles = actual.lock().unwrap().clone();
                        if angles.angles.is_empty() {
                            warn!("No joint feedback received yet; nothing to hold");
                        } else {
                            let joints = dispatcher.profile.joints.clone();
                            for (index, name) in joints.iter().enumerate() {
                                if let Some(position) = angles.get(name) {
                                    dispatcher.targets[index] =
                                        dispatcher.profile.clamp(index, position);
                                }
                            }
                            dirty.extend(0..dispatcher.profile.dof());
                            info!("Holding at last reported position");
                        }
                    }
                    ArmAction::Status => {
                        let angles = actual.lock().unwrap().clone();
                        for (index, name) in dispatcher.profile.joints.iter().enumerate() {
                            let target = dispatcher.targets[index];
                            match angles.get(name) {
                                Some(position) => info!(
                                    "{}: target {:.3} rad ({:.1} deg), actual {:.3} rad",
                                    name, target, target.to_degrees(), position
                                ),
                                None => info!(
                                    "{}: target {:.3} rad ({:.1} deg), actual unknown",
                                    name, target, target.to_degrees()
                                ),
                            }
                        }
                    }
                    ArmAction::Help => print_help(&dispatcher.profile),
                    ArmAction::Quit => break,
                    ArmAction::Unknown(message) => warn!("{}", message),
                    ArmAction::Noop => {}
                }
            }
            _ = flush.tick() => {
                if dirty.is_empty() {
                    continue;
                }
                // Per-joint command topic first, then the whole vector for
                // the position controller
                for &index in &dirty {
                    let msg = Float64::new(dispatcher.targets[index]);
                    if let Err(e) = client.publish(&joint_command, FLOAT64_TYPE, &msg).await {
                        warn!("Failed to publish joint command: {}", e);
                    }
                }
                let msg = Float64MultiArray::from_values(dispatcher.targets.clone());
                if let Err(e) = client.publish(&position_command, MULTI_ARRAY_TYPE, &msg).await {
                    warn!("Failed to publish position command: {}", e);
                }
                dirty.clear();
            }
        }
    }

    client.close();
    info!("Arm teleop shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> ArmDispatcher {
        ArmDispatcher::new(ArmProfile::default(), 0.1)
    }

    #[test]
    fn set_clamps_to_joint_limits() {
        let mut d = dispatcher();
        d.profile.limits[0].max_angle = 1.0;
        assert_eq!(d.process_line("set joint_1 5.0"), ArmAction::TargetsChanged(vec![0]));
        assert_eq!(d.targets[0], 1.0);
    }

    #[test]
    fn jog_steps_by_configured_amount() {
        let mut d = dispatcher();
        d.process_line("jog joint_2 +");
        d.process_line("jog joint_2 +");
        d.process_line("jog joint_2 -");
        assert!((d.targets[1] - 0.1).abs() < 1e-9);
    }

    #[test]
    fn joints_resolve_by_number() {
        let mut d = dispatcher();
        assert_eq!(d.process_line("set 3 0.25"), ArmAction::TargetsChanged(vec![2]));
        assert_eq!(d.targets[2], 0.25);
        assert!(matches!(d.process_line("set 7 0.1"), ArmAction::Unknown(_)));
    }

    #[test]
    fn preset_sets_all_joints() {
        let mut d = dispatcher();
        let action = d.process_line("preset ready");
        assert_eq!(action, ArmAction::TargetsChanged(vec![0, 1, 2, 3, 4, 5]));
        assert!((d.targets[0] - std::f64::consts::FRAC_PI_4).abs() < 1e-9);
        assert!((d.targets[3] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn unknown_preset_is_reported() {
        let mut d = dispatcher();
        assert!(matches!(d.process_line("preset fly"), ArmAction::Unknown(_)));
    }

    #[test]
    fn malformed_set_is_reported_not_applied() {
        let mut d = dispatcher();
        assert!(matches!(d.process_line("set joint_1"), ArmAction::Unknown(_)));
        assert!(matches!(d.process_line("set joint_1 fast"), ArmAction::Unknown(_)));
        assert_eq!(d.targets[0], 0.0);
    }
}
