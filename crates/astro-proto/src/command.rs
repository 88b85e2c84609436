use serde::{Deserialize, Serialize};
use std::fmt;

/// Magnitude used for every held movement key.
pub const SPEED: i32 = 100;

/// One tick of intended motion. Axes are always within `-SPEED..=SPEED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VelocityCommand {
    pub lateral: i32,
    pub longitudinal: i32,
    pub vertical: i32,
    pub yaw: i32,
}

impl VelocityCommand {
    /// Zero on every axis; used to stabilize after takeoff and before landing.
    pub const HOVER: Self = Self { lateral: 0, longitudinal: 0, vertical: 0, yaw: 0 };

    pub fn new(lateral: i32, longitudinal: i32, vertical: i32, yaw: i32) -> Self {
        Self {
            lateral: clamp_axis(lateral),
            longitudinal: clamp_axis(longitudinal),
            vertical: clamp_axis(vertical),
            yaw: clamp_axis(yaw),
        }
    }

    pub fn is_hover(&self) -> bool {
        *self == Self::HOVER
    }

    pub fn axes(&self) -> [i32; 4] {
        [self.lateral, self.longitudinal, self.vertical, self.yaw]
    }
}

fn clamp_axis(v: i32) -> i32 {
    v.clamp(-SPEED, SPEED)
}

impl fmt::Display for VelocityCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lateral: {} | longitudinal: {} | vertical: {} | yaw: {}",
            self.lateral, self.longitudinal, self.vertical, self.yaw
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_every_axis() {
        let cmd = VelocityCommand::new(250, -101, 100, -100);
        assert_eq!(cmd.axes(), [SPEED, -SPEED, 100, -100]);
    }

    #[test]
    fn hover_is_default() {
        assert!(VelocityCommand::default().is_hover());
        assert!(!VelocityCommand::new(0, 100, 0, 0).is_hover());
    }
}
