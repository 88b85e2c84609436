use astro_proto::VelocityCommand;

/// Commands forwarded during the current flight, plus the path captured while
/// recording is on. Entries are only added after the vehicle accepted them.
#[derive(Debug, Clone, Default)]
pub struct MovementLedger {
    history: Vec<VelocityCommand>,
    path: Vec<VelocityCommand>,
    recording: bool,
}

impl MovementLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, cmd: VelocityCommand) {
        self.history.push(cmd);
        if self.recording {
            self.path.push(cmd);
        }
    }

    pub fn clear_ledger(&mut self) {
        self.history.clear();
    }

    pub fn clear_path(&mut self) {
        self.path.clear();
    }

    /// Restarts the path from empty.
    pub fn start_recording(&mut self) {
        self.recording = true;
        self.path.clear();
    }

    /// Keeps the path until it is replayed.
    pub fn stop_recording(&mut self) {
        self.recording = false;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn history(&self) -> &[VelocityCommand] {
        &self.history
    }

    pub fn path(&self) -> &[VelocityCommand] {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(fb: i32) -> VelocityCommand {
        VelocityCommand::new(0, fb, 0, 0)
    }

    #[test]
    fn records_into_path_only_while_recording() {
        let mut l = MovementLedger::new();
        l.record(cmd(100));
        l.start_recording();
        l.record(cmd(-100));
        l.stop_recording();
        l.record(cmd(0));

        assert_eq!(l.history(), &[cmd(100), cmd(-100), cmd(0)]);
        assert_eq!(l.path(), &[cmd(-100)]);
    }

    #[test]
    fn start_recording_discards_previous_path() {
        let mut l = MovementLedger::new();
        l.start_recording();
        l.record(cmd(100));
        l.stop_recording();
        assert_eq!(l.path().len(), 1);

        l.start_recording();
        assert!(l.path().is_empty());
        assert!(l.is_recording());
    }

    #[test]
    fn clears_are_independent() {
        let mut l = MovementLedger::new();
        l.start_recording();
        l.record(cmd(100));
        l.clear_ledger();
        assert!(l.history().is_empty());
        assert_eq!(l.path(), &[cmd(100)]);
        l.clear_path();
        assert!(l.path().is_empty());
    }
}
