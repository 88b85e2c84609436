use serde::Deserialize;

pub const CRITICAL_BATTERY: u8 = 15;
pub const WARNING_BATTERY: u8 = 35;

/// Battery limits in percent. Below `critical` the vehicle must not fly;
/// at or below `warning` the operator is told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BatteryThresholds {
    #[serde(default = "default_critical")]
    pub critical: u8,
    #[serde(default = "default_warning")]
    pub warning: u8,
}

fn default_critical() -> u8 { CRITICAL_BATTERY }
fn default_warning() -> u8 { WARNING_BATTERY }

impl Default for BatteryThresholds {
    fn default() -> Self {
        Self { critical: CRITICAL_BATTERY, warning: WARNING_BATTERY }
    }
}

impl BatteryThresholds {
    pub fn classify(&self, percent: u8) -> BatteryLevel {
        if percent < self.critical {
            BatteryLevel::Critical
        } else if percent <= self.warning {
            BatteryLevel::Low
        } else {
            BatteryLevel::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryLevel {
    Normal,
    Low,
    Critical,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_uses_strict_critical_and_inclusive_warning() {
        let t = BatteryThresholds::default();
        assert_eq!(t.classify(14), BatteryLevel::Critical);
        assert_eq!(t.classify(15), BatteryLevel::Low);
        assert_eq!(t.classify(35), BatteryLevel::Low);
        assert_eq!(t.classify(36), BatteryLevel::Normal);
    }
}
