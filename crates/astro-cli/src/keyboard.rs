use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use astro_proto::{Key, KeySnapshot};
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use tracing::{debug, info};

pub enum Poll {
    Keys(KeySnapshot),
    /// Operator asked to end the session (window closed, quit key, end of script).
    Abort,
}

pub trait KeySource {
    fn poll(&mut self) -> Result<Poll>;
}

/// SDL-style key names: letters as typed, `UP`, `SPACE`, `RETURN`, `ESCAPE`, `F1`.
fn key_name(code: KeyCode) -> Option<Key> {
    let name = match code {
        KeyCode::Char(' ') => "SPACE".to_string(),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Up => "UP".into(),
        KeyCode::Down => "DOWN".into(),
        KeyCode::Left => "LEFT".into(),
        KeyCode::Right => "RIGHT".into(),
        KeyCode::Enter => "RETURN".into(),
        KeyCode::Esc => "ESCAPE".into(),
        KeyCode::Tab => "TAB".into(),
        KeyCode::Backspace => "BACKSPACE".into(),
        KeyCode::Home => "HOME".into(),
        KeyCode::End => "END".into(),
        KeyCode::PageUp => "PAGEUP".into(),
        KeyCode::PageDown => "PAGEDOWN".into(),
        KeyCode::Insert => "INSERT".into(),
        KeyCode::Delete => "DELETE".into(),
        KeyCode::F(n) => format!("F{}", n),
        _ => return None,
    };
    Some(Key::new(&name))
}

fn is_ctrl_c(k: &KeyEvent) -> bool {
    k.modifiers.contains(KeyModifiers::CONTROL) && matches!(k.code, KeyCode::Char('c') | KeyCode::Char('C'))
}

/// Live keyboard in raw mode. Terminals that report key releases give exact
/// held state; elsewhere a key counts as held for `hold` after its last
/// press or auto-repeat.
pub struct TerminalKeys {
    held: HashMap<Key, Instant>,
    hold: Duration,
    quit: Key,
    enhanced: bool,
}

impl TerminalKeys {
    pub fn open(hold: Duration, quit: Key) -> Result<Self> {
        terminal::enable_raw_mode().context("enable raw mode")?;
        let enhanced = terminal::supports_keyboard_enhancement().unwrap_or(false);
        if enhanced {
            execute!(io::stdout(), PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES))
                .context("enable key release events")?;
        }
        info!("keyboard: raw mode on (release events: {}), {} quits", enhanced, quit);
        Ok(Self { held: HashMap::new(), hold, quit, enhanced })
    }

    fn on_key(&mut self, k: KeyEvent, now: Instant) -> bool {
        if is_ctrl_c(&k) {
            return true;
        }
        let Some(key) = key_name(k.code) else { return false; };
        if key == self.quit && k.kind != KeyEventKind::Release {
            return true;
        }
        match k.kind {
            KeyEventKind::Press | KeyEventKind::Repeat => { self.held.insert(key, now); }
            KeyEventKind::Release => { self.held.remove(&key); }
        }
        false
    }
}

impl KeySource for TerminalKeys {
    fn poll(&mut self) -> Result<Poll> {
        let now = Instant::now();
        while event::poll(Duration::ZERO).context("poll terminal")? {
            match event::read().context("read terminal")? {
                Event::Key(k) => {
                    if self.on_key(k, now) {
                        return Ok(Poll::Abort);
                    }
                }
                Event::FocusLost => self.held.clear(),
                _ => {}
            }
        }
        if !self.enhanced {
            let hold = self.hold;
            self.held.retain(|_, seen| now.duration_since(*seen) < hold);
        }
        Ok(Poll::Keys(self.held.keys().cloned().collect()))
    }
}

impl Drop for TerminalKeys {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
        }
        let _ = terminal::disable_raw_mode();
    }
}

/// Pre-recorded ticks, one line each: whitespace separated key names, an
/// optional trailing `*N` repeat, `#` comments. A blank line is a tick with
/// nothing held. The end of the script aborts the session.
pub struct ScriptKeys {
    ticks: std::vec::IntoIter<KeySnapshot>,
}

impl ScriptKeys {
    pub fn load(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read key script {}", path.display()))?;
        Self::parse(&s)
    }

    pub fn parse(s: &str) -> Result<Self> {
        let mut ticks = Vec::new();
        for (n, raw) in s.lines().enumerate() {
            if raw.trim_start().starts_with('#') {
                continue;
            }
            let line = raw.split('#').next().unwrap_or_default();
            let mut tokens: Vec<&str> = line.split_whitespace().collect();

            let repeat = match tokens.last().copied().and_then(|t| t.strip_prefix('*')) {
                Some(count) => {
                    let r = count
                        .parse::<usize>()
                        .with_context(|| format!("line {}: bad repeat `*{}`", n + 1, count))?;
                    tokens.pop();
                    r
                }
                None => 1,
            };
            let snap: KeySnapshot = tokens.into_iter().collect();
            ticks.extend(std::iter::repeat(snap).take(repeat));
        }
        debug!("keyboard: script with {} ticks", ticks.len());
        Ok(Self { ticks: ticks.into_iter() })
    }
}

impl KeySource for ScriptKeys {
    fn poll(&mut self) -> Result<Poll> {
        Ok(self.ticks.next().map(Poll::Keys).unwrap_or(Poll::Abort))
    }
}

/// stderr writer for tracing that keeps lines aligned while raw mode is on.
pub struct TermStderr;

impl Write for TermStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut err = io::stderr().lock();
        if terminal::is_raw_mode_enabled().unwrap_or(false) {
            for chunk in buf.split_inclusive(|b| *b == b'\n') {
                match chunk.strip_suffix(b"\n") {
                    Some(line) => {
                        err.write_all(line)?;
                        err.write_all(b"\r\n")?;
                    }
                    None => err.write_all(chunk)?,
                }
            }
        } else {
            err.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn next_keys(src: &mut ScriptKeys) -> Option<KeySnapshot> {
        match src.poll().unwrap() {
            Poll::Keys(k) => Some(k),
            Poll::Abort => None,
        }
    }

    #[test]
    fn script_lines_become_ticks() {
        let mut src = ScriptKeys::parse("# takeoff then forward\nt\nw s  # both held\n\nw *2\n").unwrap();

        assert!(next_keys(&mut src).unwrap().is_held(&Key::new("T")));
        let both = next_keys(&mut src).unwrap();
        assert!(both.is_held(&Key::new("W")) && both.is_held(&Key::new("S")));
        assert!(next_keys(&mut src).unwrap().is_empty());
        assert!(next_keys(&mut src).unwrap().is_held(&Key::new("w")));
        assert!(next_keys(&mut src).unwrap().is_held(&Key::new("w")));
        assert!(next_keys(&mut src).is_none());
    }

    #[test]
    fn bad_repeat_is_rejected() {
        assert!(ScriptKeys::parse("w *x").is_err());
    }

    #[test]
    fn key_names_are_sdl_style() {
        assert_eq!(key_name(KeyCode::Char(' ')), Some(Key::new("SPACE")));
        assert_eq!(key_name(KeyCode::Char('w')), Some(Key::new("W")));
        assert_eq!(key_name(KeyCode::Esc), Some(Key::new("ESCAPE")));
        assert_eq!(key_name(KeyCode::F(5)), Some(Key::new("F5")));
        assert_eq!(key_name(KeyCode::Null), None);
    }

    #[test]
    fn press_and_release_track_held_keys() {
        let mut keys = TerminalKeys {
            held: HashMap::new(),
            hold: Duration::from_millis(150),
            quit: Key::new("ESCAPE"),
            enhanced: true,
        };
        let now = Instant::now();
        let mut ev = KeyEvent::new(KeyCode::Char('w'), KeyModifiers::NONE);
        assert!(!keys.on_key(ev, now));
        assert!(keys.held.contains_key(&Key::new("W")));

        ev.kind = KeyEventKind::Release;
        assert!(!keys.on_key(ev, now));
        assert!(keys.held.is_empty());

        assert!(keys.on_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE), now));
        assert!(keys.on_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), now));
        // dropping restores the terminal; never entered raw mode here
        std::mem::forget(keys);
    }
}
