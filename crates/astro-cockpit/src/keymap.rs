use std::fmt;
use std::path::Path;

use astro_proto::Key;
use serde::{Deserialize, Serialize};

use crate::error::FlightError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveAction {
    RightYaw,
    LeftYaw,
    Forward,
    Backward,
    RightClock,
    LeftClock,
    Takeoff,
    Landing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuncAction {
    Takeoff,
    Landing,
    Stream,
    SaveImg,
    RecordingPath,
    FollowPath,
    Return,
}

/// A logical action a key can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Move(MoveAction),
    Func(FuncAction),
}

impl MoveAction {
    pub const ALL: [MoveAction; 8] = [
        MoveAction::RightYaw,
        MoveAction::LeftYaw,
        MoveAction::Forward,
        MoveAction::Backward,
        MoveAction::RightClock,
        MoveAction::LeftClock,
        MoveAction::Takeoff,
        MoveAction::Landing,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MoveAction::RightYaw => "right_yaw",
            MoveAction::LeftYaw => "left_yaw",
            MoveAction::Forward => "forward",
            MoveAction::Backward => "backward",
            MoveAction::RightClock => "right_clock",
            MoveAction::LeftClock => "left_clock",
            MoveAction::Takeoff => "takeoff",
            MoveAction::Landing => "landing",
        }
    }
}

impl FuncAction {
    pub const ALL: [FuncAction; 7] = [
        FuncAction::Takeoff,
        FuncAction::Landing,
        FuncAction::Stream,
        FuncAction::SaveImg,
        FuncAction::RecordingPath,
        FuncAction::FollowPath,
        FuncAction::Return,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FuncAction::Takeoff => "takeoff",
            FuncAction::Landing => "landing",
            FuncAction::Stream => "stream",
            FuncAction::SaveImg => "save_img",
            FuncAction::RecordingPath => "recording_path",
            FuncAction::FollowPath => "follow_path",
            FuncAction::Return => "return",
        }
    }
}

impl Action {
    pub fn all() -> impl Iterator<Item = Action> {
        MoveAction::ALL
            .into_iter()
            .map(Action::Move)
            .chain(FuncAction::ALL.into_iter().map(Action::Func))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Move(a) => write!(f, "move.{}", a.name()),
            Action::Func(a) => write!(f, "func.{}", a.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveBindings {
    pub right_yaw: Key,
    pub left_yaw: Key,
    pub forward: Key,
    pub backward: Key,
    pub right_clock: Key,
    pub left_clock: Key,
    pub takeoff: Key,
    pub landing: Key,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncBindings {
    pub takeoff: Key,
    pub landing: Key,
    pub stream: Key,
    pub save_img: Key,
    pub recording_path: Key,
    pub follow_path: Key,
    #[serde(rename = "return")]
    pub return_home: Key,
}

/// Logical action -> physical key. Loaded once; read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMap {
    #[serde(rename = "move")]
    moves: MoveBindings,
    #[serde(rename = "func")]
    funcs: FuncBindings,
}

impl KeyMap {
    /// Loads a `.json` or `.toml` key map; the format follows the extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FlightError> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .map_err(|e| FlightError::Config(format!("read {}: {}", path.display(), e)))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&s),
            _ => Self::from_toml_str(&s),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, FlightError> {
        let map: KeyMap = toml::from_str(s).map_err(|e| FlightError::Config(format!("parse toml: {}", e)))?;
        map.validate()
    }

    /// JSON documents may wrap the groups in a top-level `kb_map` object.
    pub fn from_json_str(s: &str) -> Result<Self, FlightError> {
        let mut doc: serde_json::Value =
            serde_json::from_str(s).map_err(|e| FlightError::Config(format!("parse json: {}", e)))?;
        if let Some(inner) = doc.get_mut("kb_map") {
            doc = inner.take();
        }
        let map: KeyMap =
            serde_json::from_value(doc).map_err(|e| FlightError::Config(format!("parse json: {}", e)))?;
        map.validate()
    }

    fn validate(self) -> Result<Self, FlightError> {
        if let Some(action) = Action::all().find(|a| self.key(*a).is_empty()) {
            return Err(FlightError::Config(format!("{} has no key bound", action)));
        }
        Ok(self)
    }

    pub fn key(&self, action: Action) -> &Key {
        match action {
            Action::Move(a) => match a {
                MoveAction::RightYaw => &self.moves.right_yaw,
                MoveAction::LeftYaw => &self.moves.left_yaw,
                MoveAction::Forward => &self.moves.forward,
                MoveAction::Backward => &self.moves.backward,
                MoveAction::RightClock => &self.moves.right_clock,
                MoveAction::LeftClock => &self.moves.left_clock,
                MoveAction::Takeoff => &self.moves.takeoff,
                MoveAction::Landing => &self.moves.landing,
            },
            Action::Func(a) => match a {
                FuncAction::Takeoff => &self.funcs.takeoff,
                FuncAction::Landing => &self.funcs.landing,
                FuncAction::Stream => &self.funcs.stream,
                FuncAction::SaveImg => &self.funcs.save_img,
                FuncAction::RecordingPath => &self.funcs.recording_path,
                FuncAction::FollowPath => &self.funcs.follow_path,
                FuncAction::Return => &self.funcs.return_home,
            },
        }
    }

    pub fn bindings(&self) -> impl Iterator<Item = (Action, &Key)> {
        Action::all().map(move |a| (a, self.key(a)))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE_TOML: &str = r#"
[move]
right_yaw = "d"
left_yaw = "a"
forward = "w"
backward = "s"
right_clock = "e"
left_clock = "q"
takeoff = "up"
landing = "down"

[func]
takeoff = "t"
landing = "l"
stream = "v"
save_img = "c"
recording_path = "r"
follow_path = "f"
return = "h"
"#;

    pub(crate) fn sample() -> KeyMap {
        KeyMap::from_toml_str(SAMPLE_TOML).unwrap()
    }

    #[test]
    fn toml_bindings_are_normalised() {
        let map = sample();
        assert_eq!(map.key(Action::Move(MoveAction::Forward)), &Key::new("W"));
        assert_eq!(map.key(Action::Func(FuncAction::Return)), &Key::new("H"));
        assert_eq!(map.bindings().count(), 15);
    }

    #[test]
    fn json_accepts_kb_map_wrapper() {
        let json = r#"{"kb_map": {
            "move": {"right_yaw": "d", "left_yaw": "a", "forward": "w", "backward": "s",
                     "right_clock": "e", "left_clock": "q", "takeoff": "up", "landing": "down"},
            "func": {"takeoff": "t", "landing": "l", "stream": "v", "save_img": "c",
                     "recording_path": "r", "follow_path": "f", "return": "h"}
        }}"#;
        assert_eq!(KeyMap::from_json_str(json).unwrap(), sample());
    }

    #[test]
    fn missing_action_is_config_error() {
        let broken = SAMPLE_TOML.replace("follow_path = \"f\"", "");
        let err = KeyMap::from_toml_str(&broken).unwrap_err();
        assert!(matches!(err, FlightError::Config(ref m) if m.contains("follow_path")));
    }

    #[test]
    fn empty_binding_is_config_error() {
        let broken = SAMPLE_TOML.replace("stream = \"v\"", "stream = \"  \"");
        let err = KeyMap::from_toml_str(&broken).unwrap_err();
        assert!(matches!(err, FlightError::Config(ref m) if m.contains("func.stream")));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = KeyMap::load("/nonexistent/kb_map.toml").unwrap_err();
        assert!(matches!(err, FlightError::Config(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn actions_display_with_group() {
        assert_eq!(Action::Move(MoveAction::Takeoff).to_string(), "move.takeoff");
        assert_eq!(Action::Func(FuncAction::Return).to_string(), "func.return");
        assert_eq!(Action::all().count(), 15);
    }
}
