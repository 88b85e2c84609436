use astro_link::LinkError;

#[derive(Debug, thiserror::Error)]
pub enum FlightError {
    #[error("key map: {0}")]
    Config(String),

    #[error("connection refused")]
    Connection(#[source] LinkError),

    #[error("battery level too low to take off: {percent}% (critical < {critical}%)")]
    BatteryTooLowAtStartup { percent: u8, critical: u8 },

    #[error("battery critical in flight: {percent}% (critical < {critical}%), emergency landing issued")]
    BatteryCriticalInFlight { percent: u8, critical: u8 },

    #[error("unable to capture frame: {0}")]
    Capture(String),

    /// Action does not apply in the current state (stream already on, not
    /// flying, ...). Logged as a warning.
    #[error("{0}")]
    Ignored(&'static str),

    #[error("vehicle link")]
    Link(#[from] LinkError),

    #[error("image store")]
    Store(#[from] std::io::Error),
}

impl FlightError {
    /// Fatal errors end the session; everything else is logged and survived.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FlightError::Config(_)
                | FlightError::Connection(_)
                | FlightError::BatteryTooLowAtStartup { .. }
                | FlightError::BatteryCriticalInFlight { .. }
        )
    }
}
