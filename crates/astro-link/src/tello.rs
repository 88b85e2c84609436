use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use astro_proto::VelocityCommand;
use tracing::{debug, info, warn};

use crate::state::LinkStatus;
use crate::{Frame, LinkError, VehicleLink};

pub const DEFAULT_ADDRESS: &str = "192.168.10.1:8889";
pub const DEFAULT_BIND: &str = "0.0.0.0:8889";

#[derive(Debug, Clone)]
pub struct TelloConfig {
    pub address: String,
    pub bind: String,
    pub response_timeout: Duration,
}

/// Tello SDK driver: one text command per UDP datagram, answered by `ok`,
/// `error ...` or a value (for queries such as `battery?`).
pub struct TelloLink {
    sock: UdpSocket,
    peer: SocketAddr,
    timeout: Duration,
    streaming: bool,
    status: LinkStatus,
}

impl TelloLink {
    pub fn open(cfg: &TelloConfig) -> Result<Self, LinkError> {
        let peer = cfg
            .address
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| LinkError::Unreachable(format!("cannot resolve {}", cfg.address)))?;
        let sock = UdpSocket::bind(&cfg.bind)?;

        Ok(Self {
            sock,
            peer,
            timeout: cfg.response_timeout,
            streaming: false,
            status: LinkStatus::default(),
        })
    }

    pub fn status(&self) -> &LinkStatus {
        &self.status
    }

    fn send(&mut self, command: &str) -> Result<(), LinkError> {
        self.sock.send_to(command.as_bytes(), self.peer)?;
        self.status.commands_sent += 1;
        Ok(())
    }

    /// Sends `command` and waits for a reply that `fits` it. Replies to
    /// earlier commands that timed out are dropped, both those already queued
    /// and those that arrive while waiting.
    fn request(&mut self, command: &str, fits: fn(&str) -> bool) -> Result<String, LinkError> {
        self.drain_stale()?;
        self.send(command)?;

        let deadline = Instant::now() + self.timeout;
        let mut buf = [0u8; 1518];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.timed_out(command));
            }
            self.sock.set_read_timeout(Some(remaining))?;
            match self.sock.recv_from(&mut buf) {
                Ok((n, from)) if from == self.peer => {
                    let response = String::from_utf8_lossy(&buf[..n]).trim().to_string();
                    if fits(&response) {
                        self.status.on_response(&response);
                        debug!("tello: `{}` -> `{}`", command, response);
                        return Ok(response);
                    }
                    debug!("tello: `{}` skipping stale reply `{}`", command, response);
                }
                Ok((_, from)) => {
                    debug!("tello: ignoring datagram from {}", from);
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(self.timed_out(command));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Discards every datagram already queued on the socket.
    fn drain_stale(&mut self) -> Result<(), LinkError> {
        self.sock.set_nonblocking(true)?;
        let mut buf = [0u8; 1518];
        let drained = loop {
            match self.sock.recv_from(&mut buf) {
                Ok((n, from)) => {
                    debug!("tello: dropping late reply `{}` from {}", String::from_utf8_lossy(&buf[..n]).trim(), from);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.sock.set_nonblocking(false)?;
        Ok(drained?)
    }

    fn timed_out(&self, command: &str) -> LinkError {
        LinkError::Timeout { command: command.to_string(), timeout_ms: self.timeout.as_millis() as u64 }
    }

    fn expect_ok(&mut self, command: &str) -> Result<(), LinkError> {
        let response = self.request(command, is_ack)?;
        if response.eq_ignore_ascii_case("ok") {
            Ok(())
        } else {
            Err(LinkError::Rejected { command: command.to_string(), response })
        }
    }

    fn ensure_connected(&self) -> Result<(), LinkError> {
        if self.status.connected { Ok(()) } else { Err(LinkError::NotConnected) }
    }
}

fn is_error(response: &str) -> bool {
    response.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("error"))
}

/// Reply to a control command: `ok` or `error ...`.
fn is_ack(response: &str) -> bool {
    response.eq_ignore_ascii_case("ok") || is_error(response)
}

/// Reply to a query such as `battery?`: a number or `error ...`.
fn is_value(response: &str) -> bool {
    response.parse::<u32>().is_ok() || is_error(response)
}

impl VehicleLink for TelloLink {
    fn connect(&mut self) -> Result<(), LinkError> {
        info!("tello: entering SDK mode at {}", self.peer);
        self.expect_ok("command").map_err(|e| match e {
            LinkError::Timeout { .. } | LinkError::Io(_) => LinkError::Unreachable(e.to_string()),
            other => other,
        })?;
        self.status.connected = true;
        Ok(())
    }

    fn battery(&mut self) -> Result<u8, LinkError> {
        self.ensure_connected()?;
        let response = self.request("battery?", is_value)?;
        let pct = response
            .parse::<u8>()
            .map_err(|_| LinkError::Rejected { command: "battery?".into(), response: response.clone() })?;
        self.status.battery = Some(pct);
        Ok(pct)
    }

    fn takeoff(&mut self) -> Result<(), LinkError> {
        self.ensure_connected()?;
        self.expect_ok("takeoff")
    }

    fn land(&mut self) -> Result<(), LinkError> {
        self.ensure_connected()?;
        self.expect_ok("land")
    }

    fn send_velocity(&mut self, cmd: VelocityCommand) -> Result<(), LinkError> {
        self.ensure_connected()?;
        // rc is fire-and-forget in the SDK
        let [a, b, c, d] = cmd.axes();
        self.send(&format!("rc {} {} {} {}", a, b, c, d))
    }

    fn start_stream(&mut self) -> Result<(), LinkError> {
        self.ensure_connected()?;
        self.expect_ok("streamon")?;
        self.streaming = true;
        Ok(())
    }

    fn stop_stream(&mut self) -> Result<(), LinkError> {
        self.ensure_connected()?;
        self.expect_ok("streamoff")?;
        self.streaming = false;
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn latest_frame(&mut self) -> Option<Frame> {
        // The H.264 feed on udp/11111 is decoded outside this driver.
        if self.streaming {
            warn!("tello: no frame decoder attached");
        }
        None
    }
}
