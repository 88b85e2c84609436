use std::collections::BTreeMap;

use anyhow::Result;
use astro_link::safety::BatteryThresholds;
use astro_proto::Key;

use crate::keymap::{Action, KeyMap};

pub fn check_battery_thresholds(t: &BatteryThresholds) -> Result<()> {
    anyhow::ensure!(t.critical > 0, "battery.critical must be above 0%");
    anyhow::ensure!(t.critical < t.warning, "battery.critical must be below battery.warning");
    anyhow::ensure!(t.warning <= 100, "battery.warning is a percentage (<= 100)");
    Ok(())
}

/// Keys bound to more than one action. Not an error: holding such a key
/// fires every bound action in the same tick.
pub fn keymap_conflicts(map: &KeyMap) -> Vec<(Key, Vec<Action>)> {
    let mut by_key: BTreeMap<Key, Vec<Action>> = BTreeMap::new();
    for (action, key) in map.bindings() {
        by_key.entry(key.clone()).or_default().push(action);
    }
    by_key.into_iter().filter(|(_, actions)| actions.len() > 1).collect()
}
