use std::collections::HashSet;

use astro_proto::VelocityCommand;
use tracing::debug;

use crate::{Frame, LinkError, VehicleLink};

const FRAME_W: u32 = 320;
const FRAME_H: u32 = 240;

/// Commands the simulator has accepted, in order. Queries (battery,
/// streaming flag, frames) are not journaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkCall {
    Connect,
    Takeoff,
    Land,
    Velocity(VelocityCommand),
    StartStream,
    StopStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimOp {
    Connect,
    Battery,
    Takeoff,
    Land,
    Velocity,
    StartStream,
    StopStream,
}

/// In-memory vehicle. Flies nowhere, but keeps battery, streaming and an
/// ordered journal so a session can be inspected afterwards.
#[derive(Debug, Clone)]
pub struct SimLink {
    battery: u8,
    drain_per_command: u8,
    connected: bool,
    airborne: bool,
    streaming: bool,
    frames_served: u32,
    failing: HashSet<SimOp>,
    journal: Vec<LinkCall>,
}

impl SimLink {
    pub fn new(battery: u8) -> Self {
        Self {
            battery: battery.min(100),
            drain_per_command: 0,
            connected: false,
            airborne: false,
            streaming: false,
            frames_served: 0,
            failing: HashSet::new(),
            journal: Vec::new(),
        }
    }

    pub fn set_battery(&mut self, percent: u8) {
        self.battery = percent.min(100);
    }

    pub fn set_drain_per_command(&mut self, drain: u8) {
        self.drain_per_command = drain;
    }

    /// Makes `op` fail until `heal` is called.
    pub fn fail(&mut self, op: SimOp) {
        self.failing.insert(op);
    }

    pub fn heal(&mut self, op: SimOp) {
        self.failing.remove(&op);
    }

    pub fn journal(&self) -> &[LinkCall] {
        &self.journal
    }

    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    pub fn is_airborne(&self) -> bool {
        self.airborne
    }

    pub fn velocities(&self) -> Vec<VelocityCommand> {
        self.journal
            .iter()
            .filter_map(|c| match c {
                LinkCall::Velocity(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    fn check(&self, op: SimOp, command: &str) -> Result<(), LinkError> {
        if self.failing.contains(&op) {
            return Err(LinkError::Rejected { command: command.into(), response: "error (simulated)".into() });
        }
        if op != SimOp::Connect && !self.connected {
            return Err(LinkError::NotConnected);
        }
        Ok(())
    }
}

impl VehicleLink for SimLink {
    fn connect(&mut self) -> Result<(), LinkError> {
        if self.failing.contains(&SimOp::Connect) {
            return Err(LinkError::Unreachable("simulated vehicle offline".into()));
        }
        self.connected = true;
        self.journal.push(LinkCall::Connect);
        Ok(())
    }

    fn battery(&mut self) -> Result<u8, LinkError> {
        self.check(SimOp::Battery, "battery?")?;
        Ok(self.battery)
    }

    fn takeoff(&mut self) -> Result<(), LinkError> {
        self.check(SimOp::Takeoff, "takeoff")?;
        self.airborne = true;
        self.journal.push(LinkCall::Takeoff);
        Ok(())
    }

    fn land(&mut self) -> Result<(), LinkError> {
        self.check(SimOp::Land, "land")?;
        self.airborne = false;
        self.journal.push(LinkCall::Land);
        Ok(())
    }

    fn send_velocity(&mut self, cmd: VelocityCommand) -> Result<(), LinkError> {
        self.check(SimOp::Velocity, "rc")?;
        self.battery = self.battery.saturating_sub(self.drain_per_command);
        self.journal.push(LinkCall::Velocity(cmd));
        Ok(())
    }

    fn start_stream(&mut self) -> Result<(), LinkError> {
        self.check(SimOp::StartStream, "streamon")?;
        self.streaming = true;
        self.journal.push(LinkCall::StartStream);
        Ok(())
    }

    fn stop_stream(&mut self) -> Result<(), LinkError> {
        self.check(SimOp::StopStream, "streamoff")?;
        self.streaming = false;
        self.journal.push(LinkCall::StopStream);
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn latest_frame(&mut self) -> Option<Frame> {
        if !self.streaming {
            return None;
        }
        self.frames_served += 1;
        let shift = self.frames_served;
        debug!("sim: serving frame {}", shift);
        Some(Frame::from_fn(FRAME_W, FRAME_H, |x, y| {
            image::Rgb([(x + shift) as u8, y as u8, ((x + y) / 2) as u8])
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_connect_and_journals_commands() {
        let mut sim = SimLink::new(80);
        assert!(matches!(sim.takeoff(), Err(LinkError::NotConnected)));

        sim.connect().unwrap();
        sim.takeoff().unwrap();
        sim.send_velocity(VelocityCommand::new(0, 100, 0, 0)).unwrap();
        sim.land().unwrap();

        assert_eq!(
            sim.journal(),
            &[
                LinkCall::Connect,
                LinkCall::Takeoff,
                LinkCall::Velocity(VelocityCommand::new(0, 100, 0, 0)),
                LinkCall::Land,
            ]
        );
        assert!(!sim.is_airborne());
    }

    #[test]
    fn drains_battery_per_velocity_command() {
        let mut sim = SimLink::new(20);
        sim.set_drain_per_command(8);
        sim.connect().unwrap();
        sim.send_velocity(VelocityCommand::HOVER).unwrap();
        sim.send_velocity(VelocityCommand::HOVER).unwrap();
        sim.send_velocity(VelocityCommand::HOVER).unwrap();
        assert_eq!(sim.battery().unwrap(), 0);
    }

    #[test]
    fn frames_only_while_streaming() {
        let mut sim = SimLink::new(90);
        sim.connect().unwrap();
        assert!(sim.latest_frame().is_none());
        sim.start_stream().unwrap();
        let frame = sim.latest_frame().unwrap();
        assert_eq!(frame.dimensions(), (FRAME_W, FRAME_H));
    }

    #[test]
    fn injected_failure_is_rejected_until_healed() {
        let mut sim = SimLink::new(90);
        sim.connect().unwrap();
        sim.fail(SimOp::Takeoff);
        assert!(matches!(sim.takeoff(), Err(LinkError::Rejected { .. })));
        sim.heal(SimOp::Takeoff);
        sim.takeoff().unwrap();
    }
}
