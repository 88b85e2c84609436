use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Physical key identifier, e.g. `W`, `UP`, `SPACE`.
/// Stored upper-cased so bindings and snapshots compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Key(String);

impl Key {
    pub fn new(name: &str) -> Self {
        Self(name.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Key> for String {
    fn from(k: Key) -> Self {
        k.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keys held during one tick. Taken once per tick and never re-polled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySnapshot {
    held: BTreeSet<Key>,
}

impl KeySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, key: &Key) -> bool {
        self.held.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

impl<K: Into<Key>> FromIterator<K> for KeySnapshot {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self { held: iter.into_iter().map(Into::into).collect() }
    }
}
