use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlightState {
    #[default]
    Grounded,
    Flying,
}

/// Point-in-time view of the cockpit for display surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightStatus {
    pub state: FlightState,
    pub recording: bool,
    pub streaming: bool,
    pub battery: Option<u8>, // percent, None when unreadable
    pub ledger_len: usize,
    pub path_len: usize,
}
