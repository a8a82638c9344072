//! Version identifiers for versioned stores
//!
//! A [`VersionId`] is opaque to callers. The only promises are that an id
//! is stable once issued and that a store's `versions()` listing yields ids
//! most-recent-first.
//!
//! ## Encoding
//!
//! Ids are issued by a [`VersionClock`]: a strictly increasing `u64`
//! derived from the wall clock in nanoseconds. The integer is written in
//! base 62 over the ASCII-ordered alphabet `0-9A-Za-z`, left padded to
//! [`VERSION_ID_WIDTH`] characters, so lexicographic order of the ids is
//! numeric order of the clock readings. Directory listings can therefore be
//! sorted as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Base-62 digits in ascending ASCII order
const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Width of an encoded id; 62^11 exceeds `u64::MAX`
pub const VERSION_ID_WIDTH: usize = 11;

/// Encode `n` as fixed-width base 62
pub fn encode_base62(mut n: u64) -> String {
    let mut buf = [b'0'; VERSION_ID_WIDTH];
    let mut i = VERSION_ID_WIDTH;
    while n > 0 {
        i -= 1;
        buf[i] = ALPHABET[(n % 62) as usize];
        n /= 62;
    }
    // Only ALPHABET bytes are written
    buf.iter().map(|&b| b as char).collect()
}

/// Decode a base-62 string produced by [`encode_base62`]
///
/// Returns `None` for foreign characters or overflow.
pub fn decode_base62(s: &str) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    s.bytes().try_fold(0u64, |acc, b| {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'A'..=b'Z' => b - b'A' + 10,
            b'a'..=b'z' => b - b'a' + 36,
            _ => return None,
        };
        acc.checked_mul(62)?.checked_add(digit as u64)
    })
}

/// Opaque, sortable identifier of one generation of a key's value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    /// Wrap an id read back from a backend
    pub fn new(id: impl Into<String>) -> Self {
        VersionId(id.into())
    }

    /// Id for a clock reading
    pub fn from_sequence(seq: u64) -> Self {
        VersionId(encode_base62(seq))
    }

    /// The id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Clock reading behind the id, if it was issued by a [`VersionClock`]
    pub fn sequence(&self) -> Option<u64> {
        decode_base62(&self.0)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VersionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VersionId {
    fn from(s: &str) -> Self {
        VersionId::new(s)
    }
}

impl From<String> for VersionId {
    fn from(s: String) -> Self {
        VersionId(s)
    }
}

static GLOBAL_CLOCK: VersionClock = VersionClock::new();

/// Monotonic high-resolution clock issuing version sequence numbers
///
/// Readings follow wall-clock nanoseconds; when the wall clock stalls or
/// steps backwards the previous reading is bumped by one instead, so every
/// call returns a value strictly greater than the one before.
#[derive(Debug)]
pub struct VersionClock {
    last: AtomicU64,
}

impl VersionClock {
    /// Create a clock that has issued nothing yet
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Process-wide clock shared by all versioned backends
    pub fn global() -> &'static VersionClock {
        &GLOBAL_CLOCK
    }

    /// Issue the next sequence number
    pub fn next(&self) -> u64 {
        let now = wall_clock_nanos();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(prev, candidate, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }

    /// Issue the next version id
    pub fn next_id(&self) -> VersionId {
        VersionId::from_sequence(self.next())
    }
}

impl Default for VersionClock {
    fn default() -> Self {
        Self::new()
    }
}

fn wall_clock_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
