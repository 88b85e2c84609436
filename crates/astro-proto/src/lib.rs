pub mod command;
pub mod keys;
pub mod status;

pub use command::VelocityCommand;
pub use keys::{Key, KeySnapshot};
pub use status::{FlightState, FlightStatus};
