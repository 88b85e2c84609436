pub mod capture;
pub mod controller;
pub mod doctor;
pub mod error;
pub mod input;
pub mod keymap;
pub mod ledger;
pub mod logbook;

pub use capture::{DiskImageStore, ImageStore};
pub use controller::{CockpitConfig, FlightController, FlightTiming};
pub use error::FlightError;
pub use keymap::{Action, KeyMap};
pub use logbook::{LogBook, LogEntry, Severity};
