mod keyboard;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use astro_cockpit::doctor as cockpit_doctor;
use astro_cockpit::{CockpitConfig, DiskImageStore, FlightController, FlightTiming, KeyMap, LogBook, Severity};
use astro_link::safety::{BatteryLevel, BatteryThresholds};
use astro_link::tello::TelloLink;
use astro_link::{VehicleConfig, VehicleKind, VehicleLink};
use astro_proto::Key;

use keyboard::{KeySource, Poll, ScriptKeys, TerminalKeys};

#[derive(Debug, Parser)]
#[command(name = "astro", version, about = "Astro-Tello - keyboard cockpit for a Tello quadcopter")]
struct Cli {
    #[arg(long)]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check config, battery thresholds and key bindings without flying.
    Doctor,
    /// Connect the vehicle and report battery and link state.
    Probe,
    /// Fly from the terminal keyboard.
    Fly,
    /// Fly a pre-recorded key script, one line per tick.
    Replay {
        #[arg(long)]
        script: PathBuf,
    },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    cockpit: CockpitCfg,
    #[serde(default)]
    battery: BatteryThresholds,
    #[serde(default)]
    timing: FlightTiming,
    vehicle: VehicleConfig,
    #[serde(default)]
    input: InputCfg,
    #[serde(default)]
    log: LogCfg,
}

#[derive(Debug, serde::Deserialize)]
struct CockpitCfg {
    keymap: String,
    capture_dir: String,
}

#[derive(Debug, Default, serde::Deserialize)]
struct InputCfg {
    tick_ms: Option<u64>,
    hold_ms: Option<u64>,
    quit_key: Option<String>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct LogCfg {
    journal: Option<String>,
    /// Print cockpit log entries (info and above) to the terminal. Default true.
    echo: Option<bool>,
}

/// Config plus the directory relative paths in it are resolved against.
struct Loaded {
    cfg: Config,
    base: PathBuf,
}

impl Loaded {
    fn path(&self, p: &str) -> PathBuf {
        let p = Path::new(p);
        if p.is_absolute() { p.to_path_buf() } else { self.base.join(p) }
    }

    fn cockpit_config(&self) -> CockpitConfig {
        CockpitConfig { battery: self.cfg.battery, timing: self.cfg.timing }
    }
}

fn load_config(path: &Path) -> Result<Loaded> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let cfg = toml::from_str(&s).context("parse config toml")?;
    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(Loaded { cfg, base })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(|| keyboard::TermStderr)
        .init();

    let cli = Cli::parse();
    let loaded = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&loaded),
        Command::Probe => probe(&loaded),
        Command::Fly => {
            let input = &loaded.cfg.input;
            let quit = Key::new(input.quit_key.as_deref().unwrap_or("ESCAPE"));
            let mut keys = TerminalKeys::open(Duration::from_millis(input.hold_ms.unwrap_or(150)), quit)?;
            let r = session(&loaded, &mut keys);
            drop(keys);
            r
        }
        Command::Replay { script } => {
            let mut keys = ScriptKeys::load(&script)?;
            session(&loaded, &mut keys)
        }
    }
}

fn doctor(loaded: &Loaded) -> Result<()> {
    info!("doctor: starting");
    let cfg = &loaded.cfg;

    cockpit_doctor::check_battery_thresholds(&cfg.battery)?;
    anyhow::ensure!(cfg.input.tick_ms.unwrap_or(50) > 0, "input.tick_ms must be > 0");

    let keymap = KeyMap::load(loaded.path(&cfg.cockpit.keymap)).context("load key map")?;
    for (key, actions) in cockpit_doctor::keymap_conflicts(&keymap) {
        let names: Vec<String> = actions.iter().map(ToString::to_string).collect();
        warn!("doctor: key {} is bound to {}", key, names.join(", "));
    }

    let capture_dir = loaded.path(&cfg.cockpit.capture_dir);
    if capture_dir.exists() {
        anyhow::ensure!(capture_dir.is_dir(), "cockpit.capture_dir is not a dir: {}", capture_dir.display());
    }

    info!("doctor: OK");
    Ok(())
}

fn probe(loaded: &Loaded) -> Result<()> {
    let vehicle = &loaded.cfg.vehicle;
    let percent = match vehicle.kind {
        VehicleKind::Tello => {
            let mut link = TelloLink::open(&vehicle.tello_config()).context("open tello link")?;
            link.connect().context("connect")?;
            let percent = link.battery().context("read battery")?;
            let st = link.status();
            println!("connected={}", st.connected);
            println!("commands_sent={}", st.commands_sent);
            println!("last_response={:?} age={:?}", st.last_response, st.response_age());
            percent
        }
        VehicleKind::Sim => {
            let mut link = vehicle.sim();
            link.connect().context("connect")?;
            link.battery().context("read battery")?
        }
    };

    let level = match loaded.cfg.battery.classify(percent) {
        BatteryLevel::Normal => "ok",
        BatteryLevel::Low => "low",
        BatteryLevel::Critical => "critical (take-off refused)",
    };
    println!("battery={}% {}", percent, level);
    Ok(())
}

/// Caller-owned tick loop: poll one snapshot, step, sleep out the tick.
fn session(loaded: &Loaded, keys: &mut dyn KeySource) -> Result<()> {
    let cfg = &loaded.cfg;
    let keymap = KeyMap::load(loaded.path(&cfg.cockpit.keymap)).context("load key map")?;
    let link = cfg.vehicle.open().context("open vehicle link")?;
    let store = DiskImageStore::new(loaded.path(&cfg.cockpit.capture_dir));
    info!("session: captures go to {}", store.dir().display());
    let log = LogBook::new();
    let mut echo = LogEcho::new(cfg.log.echo.unwrap_or(true));

    let connected = FlightController::connect(link, store, keymap, loaded.cockpit_config(), log.clone());
    echo.flush(&log);
    let mut cockpit = connected.context("cockpit start-up")?;

    let tick = Duration::from_millis(cfg.input.tick_ms.unwrap_or(50).max(1));
    let mut ticks: u64 = 0;
    let outcome: Result<()> = loop {
        let started = Instant::now();
        let poll = match keys.poll() {
            Ok(p) => p,
            Err(e) => {
                cockpit.emergency_land();
                break Err(e);
            }
        };
        match poll {
            Poll::Abort => {
                info!("session: abort requested after {} ticks", ticks);
                cockpit.emergency_land();
                break Ok(());
            }
            Poll::Keys(snapshot) => match cockpit.step(&snapshot) {
                Ok(true) => {}
                Ok(false) => break Ok(()),
                Err(e) => break Err(e).context("flight aborted"),
            },
        }
        echo.flush(&log);
        ticks += 1;
        if let Some(rest) = tick.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    };

    echo.flush(&log);
    let st = cockpit.status();
    info!(
        "session: ended {:?} after {} ticks, battery={:?}, {} log entries",
        st.state, ticks, st.battery, log.len()
    );
    if let Some(journal) = &cfg.log.journal {
        if let Err(e) = write_journal(&loaded.path(journal), &log) {
            warn!("session: journal not written: {:#}", e);
        }
    }
    outcome
}

/// Prints log entries the operator has not seen yet.
struct LogEcho {
    enabled: bool,
    cursor: usize,
}

impl LogEcho {
    fn new(enabled: bool) -> Self {
        Self { enabled, cursor: 0 }
    }

    fn flush(&mut self, log: &LogBook) {
        if !self.enabled {
            return;
        }
        let (fresh, next) = log.since(self.cursor);
        self.cursor = next;
        let mut out = keyboard::TermStderr;
        for entry in fresh.iter().filter(|e| e.severity >= Severity::Info) {
            let _ = writeln!(out, "{}", entry);
        }
    }
}

fn write_journal(path: &Path, log: &LogBook) -> Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = std::io::BufWriter::new(file);
    for entry in log.entries() {
        serde_json::to_writer(&mut w, &entry).context("encode log entry")?;
        w.write_all(b"\n")?;
    }
    w.flush()?;
    info!("session: journal written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[cockpit]
keymap = "kb_map.toml"
capture_dir = "captures"

[battery]
critical = 20

[timing]
stabilize_ms = 0
stream_settle_ms = 0
command_dwell_ms = 0

[vehicle]
kind = "sim"
sim_battery = 80

[input]
tick_ms = 1

[log]
journal = "journal.jsonl"
echo = false
"#;

    const KEYMAP: &str = r#"
[move]
right_yaw = "d"
left_yaw = "a"
forward = "w"
backward = "s"
right_clock = "e"
left_clock = "q"
takeoff = "up"
landing = "down"

[func]
takeoff = "t"
landing = "l"
stream = "v"
save_img = "c"
recording_path = "r"
follow_path = "f"
return = "h"
"#;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("astro-cli-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("astro.toml"), CONFIG).unwrap();
        std::fs::write(dir.join("kb_map.toml"), KEYMAP).unwrap();
        dir
    }

    #[test]
    fn config_defaults_and_relative_paths() {
        let dir = scratch("config");
        let loaded = load_config(&dir.join("astro.toml")).unwrap();
        assert_eq!(loaded.cfg.battery.critical, 20);
        assert_eq!(loaded.cfg.battery.warning, 35);
        assert_eq!(loaded.cfg.timing.command_dwell_ms, 0);
        assert_eq!(loaded.cfg.vehicle.kind, VehicleKind::Sim);
        assert_eq!(loaded.path("kb_map.toml"), dir.join("kb_map.toml"));
        assert!(doctor(&loaded).is_ok());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn echo_prints_each_entry_once() {
        let log = LogBook::new();
        let mut echo = LogEcho::new(true);
        log.info("one");
        log.debug("hidden");
        echo.flush(&log);
        assert_eq!(echo.cursor, 2);
        log.warning("two");
        echo.flush(&log);
        assert_eq!(echo.cursor, 3);

        let mut off = LogEcho::new(false);
        off.flush(&log);
        assert_eq!(off.cursor, 0);
    }

    #[test]
    fn scripted_session_lands_and_writes_journal() {
        let dir = scratch("replay");
        let loaded = load_config(&dir.join("astro.toml")).unwrap();
        let mut keys = ScriptKeys::parse("t\nc\nw *3\nl\nw\n").unwrap();
        session(&loaded, &mut keys).unwrap();

        let journal = std::fs::read_to_string(dir.join("journal.jsonl")).unwrap();
        assert!(journal.contains("Take-off completed"));
        assert!(journal.contains("Landing completed"));
        assert_eq!(std::fs::read_dir(dir.join("captures")).unwrap().count(), 1);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn script_end_triggers_emergency_landing() {
        let dir = scratch("abort");
        let loaded = load_config(&dir.join("astro.toml")).unwrap();
        let mut keys = ScriptKeys::parse("t\nw\n").unwrap();
        session(&loaded, &mut keys).unwrap();

        let journal = std::fs::read_to_string(dir.join("journal.jsonl")).unwrap();
        assert!(journal.contains("Emergency landing"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
