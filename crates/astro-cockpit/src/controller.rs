use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use astro_link::safety::{BatteryLevel, BatteryThresholds};
use astro_link::VehicleLink;
use astro_proto::{FlightState, FlightStatus, KeySnapshot, VelocityCommand};
use serde::Deserialize;

use crate::capture::ImageStore;
use crate::error::FlightError;
use crate::input::TickInput;
use crate::keymap::KeyMap;
use crate::ledger::MovementLedger;
use crate::logbook::LogBook;

/// Blocking pauses used to let the airframe settle. Zero skips the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FlightTiming {
    /// After every forwarded velocity command, replays included.
    #[serde(default = "default_dwell")]
    pub command_dwell_ms: u64,
    /// Zero-velocity hold after takeoff and before landing.
    #[serde(default = "default_stabilize")]
    pub stabilize_ms: u64,
    /// After the video stream is switched on or off.
    #[serde(default = "default_settle")]
    pub stream_settle_ms: u64,
}

fn default_dwell() -> u64 { 50 }
fn default_stabilize() -> u64 { 2000 }
fn default_settle() -> u64 { 300 }

impl Default for FlightTiming {
    fn default() -> Self {
        Self {
            command_dwell_ms: default_dwell(),
            stabilize_ms: default_stabilize(),
            stream_settle_ms: default_settle(),
        }
    }
}

impl FlightTiming {
    pub fn immediate() -> Self {
        Self { command_dwell_ms: 0, stabilize_ms: 0, stream_settle_ms: 0 }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CockpitConfig {
    #[serde(default)]
    pub battery: BatteryThresholds,
    #[serde(default)]
    pub timing: FlightTiming,
}

fn pause(ms: u64) {
    if ms > 0 {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

fn describe(e: &dyn Error) -> String {
    let mut out = e.to_string();
    let mut src = e.source();
    while let Some(s) = src {
        out.push_str(": ");
        out.push_str(&s.to_string());
        src = s.source();
    }
    out
}

/// Flight state machine. Owns the vehicle link, the key map and the movement
/// ledger; one `step()` per input tick.
pub struct FlightController<V: VehicleLink, S: ImageStore> {
    link: V,
    store: S,
    keymap: KeyMap,
    ledger: MovementLedger,
    state: FlightState,
    cfg: CockpitConfig,
    log: LogBook,

    last_battery: Option<u8>,
    battery_warned: bool,
}

impl<V: VehicleLink, S: ImageStore> FlightController<V, S> {
    /// Connects the vehicle and checks it can fly. No controller is returned
    /// unless both succeed.
    pub fn connect(
        mut link: V,
        store: S,
        keymap: KeyMap,
        cfg: CockpitConfig,
        log: LogBook,
    ) -> Result<Self, FlightError> {
        log.info("Initialization...");
        log.info("Connecting to vehicle...");
        if let Err(e) = link.connect() {
            log.critical(format!("Connection refused: {}", describe(&e)));
            return Err(FlightError::Connection(e));
        }

        let percent = match link.battery() {
            Ok(p) => p,
            Err(e) => {
                log.critical(format!("Connection refused: battery unreadable: {}", describe(&e)));
                return Err(FlightError::Connection(e));
            }
        };
        log.info("Successfully connected!");
        log.info(format!("Battery level: {}%", percent));

        let mut battery_warned = false;
        match cfg.battery.classify(percent) {
            BatteryLevel::Critical => {
                log.error("Battery level too low: unable to take off");
                return Err(FlightError::BatteryTooLowAtStartup { percent, critical: cfg.battery.critical });
            }
            BatteryLevel::Low => {
                log.warning("Low battery level");
                battery_warned = true;
            }
            BatteryLevel::Normal => {}
        }
        log.info("Ready to fly!");

        Ok(Self {
            link,
            store,
            keymap,
            ledger: MovementLedger::new(),
            state: FlightState::Grounded,
            cfg,
            log,
            last_battery: Some(percent),
            battery_warned,
        })
    }

    /// Runs one tick against a single key snapshot. Returns `Ok(false)` when a
    /// landing was completed this tick. Only fatal errors are returned; the
    /// rest are logged.
    pub fn step(&mut self, keys: &KeySnapshot) -> Result<bool, FlightError> {
        let input = TickInput::read(keys, &self.keymap);
        let mut keep_going = true;

        if input.takeoff && self.state == FlightState::Grounded {
            let r = self.takeoff();
            self.recover("take-off failed", r)?;
        }

        if input.landing && self.state == FlightState::Flying {
            let r = self.land();
            if self.recover("landing failed", r)?.is_some() {
                keep_going = false;
            }
        }

        if input.stream {
            let r = self.toggle_stream();
            self.recover("stream toggle failed", r)?;
        }

        if input.capture {
            let r = self.capture();
            self.recover("unable to save image", r)?;
        }

        if self.state == FlightState::Flying {
            let r = self.fly(input.movement);
            self.recover("movement not sent", r)?;

            if input.record {
                self.toggle_recording();
            }
            if input.follow_path {
                let r = self.follow_path();
                self.recover("path replay interrupted", r)?;
            }
            if input.return_home {
                let r = self.return_home();
                self.recover("return home interrupted", r)?;
            }
        }

        Ok(keep_going)
    }

    fn recover<T>(&self, what: &str, r: Result<T, FlightError>) -> Result<Option<T>, FlightError> {
        match r {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_fatal() => Err(e),
            Err(FlightError::Ignored(msg)) => {
                self.log.warning(msg);
                Ok(None)
            }
            Err(e) => {
                self.log.error(format!("{}: {}", what, describe(&e)));
                Ok(None)
            }
        }
    }

    /// Starts the video feed, lifts off and holds still for the stabilize time.
    pub fn takeoff(&mut self) -> Result<(), FlightError> {
        if self.state == FlightState::Flying {
            return Err(FlightError::Ignored("Already flying"));
        }
        let r = self.start_stream();
        self.recover("stream not started", r)?;

        self.log.info("Starting take-off");
        self.link.takeoff()?;
        self.state = FlightState::Flying;
        self.battery_warned = false;
        self.stabilize()?;
        self.log.info("Take-off completed");
        Ok(())
    }

    /// Holds still, lands, stops the feed and forgets the flight.
    pub fn land(&mut self) -> Result<(), FlightError> {
        if self.state == FlightState::Grounded {
            return Err(FlightError::Ignored("Not flying: landing ignored"));
        }
        self.log.info("Starting landing");
        let r = self.stabilize();
        self.recover("stabilization not sent", r)?;
        self.link.land()?;

        let r = self.stop_stream();
        self.recover("stream not stopped", r)?;
        self.touch_down();
        self.log.info("Landing completed");
        Ok(())
    }

    /// Lands from any state. Safe to call repeatedly; never fails.
    pub fn emergency_land(&mut self) {
        self.log.critical("Emergency landing");
        if let Err(e) = self.link.land() {
            self.log.error(format!("land command failed: {}", describe(&e)));
        }
        let r = self.stop_stream();
        // only fatal errors escape recover, and stop_stream has none
        let _ = self.recover("stream not stopped", r);
        self.touch_down();
    }

    fn touch_down(&mut self) {
        self.ledger.stop_recording();
        self.ledger.clear_ledger();
        self.state = FlightState::Grounded;
    }

    fn stabilize(&mut self) -> Result<(), FlightError> {
        self.issue(VelocityCommand::HOVER, self.cfg.timing.stabilize_ms)
    }

    /// Sends one command to the vehicle, behind the battery interlock.
    fn issue(&mut self, cmd: VelocityCommand, dwell_ms: u64) -> Result<(), FlightError> {
        self.interlock()?;
        self.link.send_velocity(cmd)?;
        if !cmd.is_hover() {
            self.log.debug(format!("Movement -> | {} | dwell: {}ms", cmd, dwell_ms));
        }
        pause(dwell_ms);
        Ok(())
    }

    fn interlock(&mut self) -> Result<(), FlightError> {
        let percent = match self.link.battery() {
            Ok(p) => p,
            Err(e) => {
                self.last_battery = None;
                self.log.error(format!("battery unreadable, command sent unchecked: {}", describe(&e)));
                return Ok(());
            }
        };
        self.last_battery = Some(percent);

        match self.cfg.battery.classify(percent) {
            BatteryLevel::Critical => {
                self.log.critical(format!("Battery level too low ({}%): starting emergency landing", percent));
                self.emergency_land();
                Err(FlightError::BatteryCriticalInFlight { percent, critical: self.cfg.battery.critical })
            }
            BatteryLevel::Low if !self.battery_warned => {
                self.battery_warned = true;
                self.log.warning(format!("Low battery level: {}%", percent));
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Forwards one movement and records it.
    pub fn fly(&mut self, cmd: VelocityCommand) -> Result<(), FlightError> {
        if self.state != FlightState::Flying {
            return Err(FlightError::Ignored("Not flying: movement ignored"));
        }
        self.issue(cmd, self.cfg.timing.command_dwell_ms)?;
        self.ledger.record(cmd);
        Ok(())
    }

    pub fn toggle_stream(&mut self) -> Result<(), FlightError> {
        if self.link.is_streaming() { self.stop_stream() } else { self.start_stream() }
    }

    pub fn start_stream(&mut self) -> Result<(), FlightError> {
        if self.link.is_streaming() {
            return Err(FlightError::Ignored("Streaming already ON"));
        }
        self.link.start_stream()?;
        pause(self.cfg.timing.stream_settle_ms);
        self.log.info("Streaming: ON");
        Ok(())
    }

    pub fn stop_stream(&mut self) -> Result<(), FlightError> {
        if !self.link.is_streaming() {
            return Err(FlightError::Ignored("Streaming already OFF"));
        }
        self.link.stop_stream()?;
        pause(self.cfg.timing.stream_settle_ms);
        self.log.info("Streaming: OFF");
        Ok(())
    }

    /// Saves the newest video frame.
    pub fn capture(&mut self) -> Result<PathBuf, FlightError> {
        if !self.link.is_streaming() {
            return Err(FlightError::Capture("streaming is OFF".into()));
        }
        let frame = self
            .link
            .latest_frame()
            .ok_or_else(|| FlightError::Capture("no frame captured".into()))?;
        let path = self.store.save(&frame)?;
        self.log.info(format!("Frame captured: {}", path.display()));
        Ok(path)
    }

    /// Flips path recording. Returns the new flag; always false on the ground.
    pub fn toggle_recording(&mut self) -> bool {
        if self.state != FlightState::Flying {
            self.log.warning("Not flying: path recording ignored");
            return false;
        }
        if self.ledger.is_recording() {
            self.ledger.stop_recording();
            self.log.info(format!("Recording path: OFF ({} commands)", self.ledger.path().len()));
        } else {
            self.ledger.start_recording();
            self.log.info("Recording path: ON");
        }
        self.ledger.is_recording()
    }

    /// Replays the recorded path in order, then drops it. Returns how many
    /// commands were sent; an empty path sends nothing.
    pub fn follow_path(&mut self) -> Result<usize, FlightError> {
        if self.state != FlightState::Flying {
            return Err(FlightError::Ignored("Not flying: follow path ignored"));
        }
        if self.ledger.path().is_empty() {
            self.log.warning("No recorded path to follow");
            return Ok(0);
        }

        self.ledger.stop_recording();
        let path = self.ledger.path().to_vec();
        self.log.info(format!("Following recorded path ({} commands)", path.len()));
        for cmd in &path {
            self.issue(*cmd, self.cfg.timing.command_dwell_ms)?;
            self.ledger.record(*cmd);
        }
        self.ledger.clear_path();
        self.log.info("Recorded path completed");
        Ok(path.len())
    }

    /// Replays the whole flight history in the order it was flown (not
    /// reversed), then clears it.
    pub fn return_home(&mut self) -> Result<usize, FlightError> {
        if self.state != FlightState::Flying {
            return Err(FlightError::Ignored("Not flying: return home ignored"));
        }
        if self.ledger.history().is_empty() {
            self.log.warning("No movements to return home");
            return Ok(0);
        }

        let history = self.ledger.history().to_vec();
        self.log.info(format!("Returning home ({} commands)", history.len()));
        for cmd in &history {
            self.issue(*cmd, self.cfg.timing.command_dwell_ms)?;
        }
        self.ledger.clear_ledger();
        self.log.info("Return home completed");
        Ok(history.len())
    }

    pub fn state(&self) -> FlightState {
        self.state
    }

    pub fn ledger(&self) -> &MovementLedger {
        &self.ledger
    }

    pub fn log(&self) -> &LogBook {
        &self.log
    }

    pub fn link(&self) -> &V {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut V {
        &mut self.link
    }

    pub fn status(&self) -> FlightStatus {
        FlightStatus {
            state: self.state,
            recording: self.ledger.is_recording(),
            streaming: self.link.is_streaming(),
            battery: self.last_battery,
            ledger_len: self.ledger.history().len(),
            path_len: self.ledger.path().len(),
        }
    }
}
