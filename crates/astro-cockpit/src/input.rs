use astro_proto::command::SPEED;
use astro_proto::{KeySnapshot, VelocityCommand};

use crate::keymap::{Action, FuncAction, KeyMap, MoveAction};

/// True iff the key bound to `action` is held in `keys`.
pub fn resolve(keys: &KeySnapshot, map: &KeyMap, action: Action) -> bool {
    keys.is_held(map.key(action))
}

/// Positive member is checked first, so holding both yields `+SPEED`.
fn axis(keys: &KeySnapshot, map: &KeyMap, positive: MoveAction, negative: MoveAction) -> i32 {
    if resolve(keys, map, Action::Move(positive)) {
        SPEED
    } else if resolve(keys, map, Action::Move(negative)) {
        -SPEED
    } else {
        0
    }
}

/// Maps held movement keys to a velocity command. The clock keys turn the
/// vehicle; the `move.takeoff` / `move.landing` bindings climb and descend.
pub fn decode_movement(keys: &KeySnapshot, map: &KeyMap) -> VelocityCommand {
    VelocityCommand::new(
        axis(keys, map, MoveAction::RightYaw, MoveAction::LeftYaw),
        axis(keys, map, MoveAction::Forward, MoveAction::Backward),
        axis(keys, map, MoveAction::Takeoff, MoveAction::Landing),
        axis(keys, map, MoveAction::RightClock, MoveAction::LeftClock),
    )
}

/// Every action for one tick, resolved from a single snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickInput {
    pub takeoff: bool,
    pub landing: bool,
    pub stream: bool,
    pub capture: bool,
    pub record: bool,
    pub follow_path: bool,
    pub return_home: bool,
    pub movement: VelocityCommand,
}

impl TickInput {
    pub fn read(keys: &KeySnapshot, map: &KeyMap) -> Self {
        let func = |a| resolve(keys, map, Action::Func(a));
        Self {
            takeoff: func(FuncAction::Takeoff),
            landing: func(FuncAction::Landing),
            stream: func(FuncAction::Stream),
            capture: func(FuncAction::SaveImg),
            record: func(FuncAction::RecordingPath),
            follow_path: func(FuncAction::FollowPath),
            return_home: func(FuncAction::Return),
            movement: decode_movement(keys, map),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::tests::sample;

    fn held(keys: &[&str]) -> KeySnapshot {
        keys.iter().copied().collect()
    }

    #[test]
    fn forward_alone() {
        let cmd = decode_movement(&held(&["W"]), &sample());
        assert_eq!(cmd, VelocityCommand::new(0, 100, 0, 0));
    }

    #[test]
    fn both_members_held_positive_wins() {
        let map = sample();
        assert_eq!(decode_movement(&held(&["W", "S"]), &map), VelocityCommand::new(0, 100, 0, 0));
        assert_eq!(
            decode_movement(&held(&["d", "a", "e", "q", "up", "down", "w", "s"]), &map),
            VelocityCommand::new(SPEED, SPEED, SPEED, SPEED)
        );
    }

    #[test]
    fn negative_members() {
        let cmd = decode_movement(&held(&["a", "s", "q", "down"]), &sample());
        assert_eq!(cmd.axes(), [-SPEED; 4]);
    }

    #[test]
    fn clock_keys_turn_and_up_down_keys_climb() {
        let map = sample();
        assert_eq!(decode_movement(&held(&["e"]), &map), VelocityCommand { yaw: SPEED, ..VelocityCommand::HOVER });
        assert_eq!(decode_movement(&held(&["q"]), &map), VelocityCommand { yaw: -SPEED, ..VelocityCommand::HOVER });
        assert_eq!(decode_movement(&held(&["up"]), &map), VelocityCommand { vertical: SPEED, ..VelocityCommand::HOVER });
        assert_eq!(decode_movement(&held(&["down"]), &map), VelocityCommand { vertical: -SPEED, ..VelocityCommand::HOVER });
    }

    #[test]
    fn nothing_held_is_hover() {
        let map = sample();
        assert!(decode_movement(&KeySnapshot::new(), &map).is_hover());
        // unrelated keys leave every axis at zero
        assert!(decode_movement(&held(&["t", "x", "space"]), &map).is_hover());
    }

    #[test]
    fn tick_input_reads_func_group() {
        let input = TickInput::read(&held(&["t", "r", "w"]), &sample());
        assert!(input.takeoff && input.record);
        assert!(!input.landing && !input.stream && !input.capture);
        assert!(!input.follow_path && !input.return_home);
        assert_eq!(input.movement, VelocityCommand::new(0, 100, 0, 0));
    }

    #[test]
    fn resolve_single_action() {
        let map = sample();
        let keys = held(&["h"]);
        assert!(resolve(&keys, &map, Action::Func(FuncAction::Return)));
        assert!(!resolve(&keys, &map, Action::Move(MoveAction::Forward)));
    }
}
