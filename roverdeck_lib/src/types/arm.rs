use eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Arm description: joint names, limits and preset postures. Loaded as part
/// of the deck configuration; the defaults describe a 6-DOF arm with
/// unrestricted revolute joints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmProfile {
    pub name: String,
    pub joints: Vec<String>,
    pub limits: Vec<JointLimit>,
    pub presets: BTreeMap<String, Vec<f64>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JointLimit {
    pub min_angle: f64,
    pub max_angle: f64,
}

impl Default for ArmProfile {
    fn default() -> Self {
        use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

        let joints: Vec<String> = (1..=6).map(|i| format!("joint_{}", i)).collect();
        let limits = vec![
            JointLimit {
                min_angle: -PI,
                max_angle: PI,
            };
            6
        ];

        let mut presets = BTreeMap::new();
        presets.insert("home".to_string(), vec![0.0; 6]);
        presets.insert(
            "ready".to_string(),
            vec![FRAC_PI_4, -FRAC_PI_4, 0.0, 0.5, 0.0, 0.0],
        );
        presets.insert(
            "extended".to_string(),
            vec![FRAC_PI_2, -FRAC_PI_2, FRAC_PI_4, 1.0, 0.0, 0.0],
        );

        Self {
            name: "arm_6dof".to_string(),
            joints,
            limits,
            presets,
        }
    }
}

impl ArmProfile {
    pub fn dof(&self) -> usize {
        self.joints.len()
    }

    pub fn joint_index(&self, joint: &str) -> Option<usize> {
        self.joints.iter().position(|name| name == joint)
    }

    /// Clamp an angle into the joint's configured limits.
    pub fn clamp(&self, index: usize, angle: f64) -> f64 {
        match self.limits.get(index) {
            Some(limit) => angle.clamp(limit.min_angle, limit.max_angle),
            None => angle,
        }
    }

    pub fn preset(&self, name: &str) -> Option<&[f64]> {
        self.presets.get(name).map(|angles| angles.as_slice())
    }

    pub fn validate(&self) -> Result<()> {
        if self.limits.len() != self.joints.len() {
            eyre::bail!(
                "Joint limits count ({}) doesn't match joint count ({})",
                self.limits.len(),
                self.joints.len()
            );
        }
        for (i, limit) in self.limits.iter().enumerate() {
            if limit.min_angle >= limit.max_angle {
                eyre::bail!(
                    "Joint {} has inverted limits [{:.3}, {:.3}]",
                    self.joints[i],
                    limit.min_angle,
                    limit.max_angle
                );
            }
        }
        for (name, angles) in &self.presets {
            if angles.len() != self.joints.len() {
                eyre::bail!(
                    "Preset '{}' has {} angles for {} joints",
                    name,
                    angles.len(),
                    self.joints.len()
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_is_valid() {
        ArmProfile::default().validate().unwrap();
    }

    #[test]
    fn clamp_respects_limits() {
        let mut profile = ArmProfile::default();
        profile.limits[0] = JointLimit {
            min_angle: -1.0,
            max_angle: 1.0,
        };
        assert_eq!(profile.clamp(0, 2.5), 1.0);
        assert_eq!(profile.clamp(0, -2.5), -1.0);
        assert_eq!(profile.clamp(0, 0.3), 0.3);
    }

    #[test]
    fn validate_rejects_mismatched_preset() {
        let mut profile = ArmProfile::default();
        profile
            .presets
            .insert("bad".to_string(), vec![0.0, 0.0]);
        assert!(profile.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_limits() {
        let mut profile = ArmProfile::default();
        profile.limits[2] = JointLimit {
            min_angle: 1.0,
            max_angle: -1.0,
        };
        assert!(profile.validate().is_err());
    }

    #[test]
    fn joint_index_finds_named_joint() {
        let profile = ArmProfile::default();
        assert_eq!(profile.joint_index("joint_3"), Some(2));
        assert_eq!(profile.joint_index("gripper"), None);
    }
}
