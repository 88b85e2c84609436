use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct LinkStatus {
    pub connected: bool,
    pub battery: Option<u8>,
    pub last_response: Option<String>,
    pub last_response_at: Option<Instant>,
    pub commands_sent: u64,
}

impl LinkStatus {
    pub fn response_age(&self) -> Option<Duration> {
        self.last_response_at.map(|t| t.elapsed())
    }

    pub(crate) fn on_response(&mut self, response: &str) {
        self.last_response = Some(response.to_string());
        self.last_response_at = Some(Instant::now());
    }
}
