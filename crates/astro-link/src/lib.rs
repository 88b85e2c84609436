pub mod safety;
pub mod sim;
pub mod state;
pub mod tello;

use astro_proto::VelocityCommand;
use serde::Deserialize;

/// Decoded video frame handed out by a link.
pub type Frame = image::RgbImage;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("vehicle unreachable: {0}")]
    Unreachable(String),
    #[error("no response to `{command}` within {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },
    #[error("vehicle rejected `{command}`: {response}")]
    Rejected { command: String, response: String },
    #[error("link not connected")]
    NotConnected,
    #[error("link io")]
    Io(#[from] std::io::Error),
}

/// Capabilities the cockpit needs from a vehicle. Implemented by the real
/// Tello driver and by the simulator.
pub trait VehicleLink {
    fn connect(&mut self) -> Result<(), LinkError>;
    /// Battery charge in percent.
    fn battery(&mut self) -> Result<u8, LinkError>;
    fn takeoff(&mut self) -> Result<(), LinkError>;
    fn land(&mut self) -> Result<(), LinkError>;
    fn send_velocity(&mut self, cmd: VelocityCommand) -> Result<(), LinkError>;
    fn start_stream(&mut self) -> Result<(), LinkError>;
    fn stop_stream(&mut self) -> Result<(), LinkError>;
    fn is_streaming(&self) -> bool;
    fn latest_frame(&mut self) -> Option<Frame>;
}

impl<T: VehicleLink + ?Sized> VehicleLink for Box<T> {
    fn connect(&mut self) -> Result<(), LinkError> { (**self).connect() }
    fn battery(&mut self) -> Result<u8, LinkError> { (**self).battery() }
    fn takeoff(&mut self) -> Result<(), LinkError> { (**self).takeoff() }
    fn land(&mut self) -> Result<(), LinkError> { (**self).land() }
    fn send_velocity(&mut self, cmd: VelocityCommand) -> Result<(), LinkError> { (**self).send_velocity(cmd) }
    fn start_stream(&mut self) -> Result<(), LinkError> { (**self).start_stream() }
    fn stop_stream(&mut self) -> Result<(), LinkError> { (**self).stop_stream() }
    fn is_streaming(&self) -> bool { (**self).is_streaming() }
    fn latest_frame(&mut self) -> Option<Frame> { (**self).latest_frame() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleKind {
    Tello,
    Sim,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleConfig {
    pub kind: VehicleKind,

    /// Tello command endpoint. Default 192.168.10.1:8889.
    pub address: Option<String>,
    /// Local UDP bind address. Default 0.0.0.0:8889.
    pub bind: Option<String>,
    /// How long to wait for an SDK reply. Default 7000ms.
    pub response_timeout_ms: Option<u64>,

    /// Simulator only: starting charge and drain per velocity command.
    pub sim_battery: Option<u8>,
    pub sim_drain_per_command: Option<u8>,
}

impl VehicleConfig {
    pub fn tello_config(&self) -> tello::TelloConfig {
        tello::TelloConfig {
            address: self.address.clone().unwrap_or_else(|| tello::DEFAULT_ADDRESS.into()),
            bind: self.bind.clone().unwrap_or_else(|| tello::DEFAULT_BIND.into()),
            response_timeout: std::time::Duration::from_millis(self.response_timeout_ms.unwrap_or(7000)),
        }
    }

    pub fn sim(&self) -> sim::SimLink {
        let mut sim = sim::SimLink::new(self.sim_battery.unwrap_or(100));
        sim.set_drain_per_command(self.sim_drain_per_command.unwrap_or(0));
        sim
    }

    /// Builds the configured driver. Nothing is sent until `connect()`.
    pub fn open(&self) -> Result<Box<dyn VehicleLink>, LinkError> {
        match self.kind {
            VehicleKind::Tello => Ok(Box::new(tello::TelloLink::open(&self.tello_config())?)),
            VehicleKind::Sim => Ok(Box::new(self.sim())),
        }
    }
}
