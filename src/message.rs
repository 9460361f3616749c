//! Module dedicated to messages as reported by store drivers.
//!
//! A [`Message`] is the engine's view of one message inside the
//! currently selected mailbox: its store-assigned UID, flags, size
//! and optional internal date. The message body only exists
//! transiently, inside [`MessageData`], while a copy is in flight.

use std::fmt;

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, Rng};
use thiserror::Error;

use crate::flag::Flags;

/// The length of a tracking id, in characters.
pub const TUID_LEN: usize = 12;

const TUID_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Errors related to messages.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot parse tracking id {0:?}")]
    ParseTuidError(String),
}

bitflags! {
    /// Unsynchronizable per-message status bits.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct MessageStatus: u8 {
        /// The message is recent, in the IMAP sense.
        const RECENT = 1 << 0;
        /// The message has been expunged from the live set but is
        /// kept in memory as a tombstone.
        const DEAD = 1 << 1;
        /// Flags have been fetched from the store.
        const FLAGS_FETCHED = 1 << 2;
        /// The internal date has been fetched from the store.
        const TIME_FETCHED = 1 << 3;
    }
}

/// The tracking id injected into copied messages.
///
/// A tracking id is a short random tag written as an `X-TUID` header
/// into the body of a copied message, so that the engine can
/// rediscover the destination UID when the store could not report it
/// at append time. Uniqueness is only probabilistic, which is enough
/// within one mailbox generation.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct Tuid([u8; TUID_LEN]);

impl Tuid {
    /// Draws a fresh random tracking id.
    pub fn generate() -> Self {
        let mut raw = [0u8; TUID_LEN];
        for byte in raw.iter_mut() {
            *byte = TUID_ALPHABET[OsRng.gen_range(0..TUID_ALPHABET.len())];
        }
        Self(raw)
    }

    pub fn as_bytes(&self) -> &[u8; TUID_LEN] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // the alphabet is pure ASCII
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for Tuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Debug for Tuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tuid({})", self.as_str())
    }
}

impl TryFrom<&str> for Tuid {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Error> {
        Self::try_from(s.as_bytes())
    }
}

impl TryFrom<&[u8]> for Tuid {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != TUID_LEN || !bytes.iter().all(|b| TUID_ALPHABET.contains(b)) {
            let lossy = String::from_utf8_lossy(bytes).into_owned();
            return Err(Error::ParseTuidError(lossy));
        }
        let mut raw = [0u8; TUID_LEN];
        raw.copy_from_slice(bytes);
        Ok(Self(raw))
    }
}

/// One message of the currently selected mailbox.
#[derive(Clone, Debug)]
pub struct Message {
    /// The store-assigned UID, unique among non-dead messages of the
    /// selected mailbox.
    pub uid: u32,

    /// The byte size. Zero means not fetched.
    pub size: usize,

    /// The synchronizable flags.
    pub flags: Flags,

    /// The unsynchronizable status bits.
    pub status: MessageStatus,

    /// The internal (received) date, when fetched.
    pub time: Option<DateTime<Utc>>,

    /// The tracking id found in the body, when the driver was asked
    /// to look for one.
    pub tuid: Option<Tuid>,

    /// Index of the sync record claiming this message, if any.
    pub(crate) srec: Option<usize>,
}

impl Message {
    /// Creates a message carrying only a UID and flags, the minimum
    /// a driver has to report.
    pub fn new(uid: u32, flags: Flags) -> Self {
        Self {
            uid,
            size: 0,
            flags,
            status: MessageStatus::FLAGS_FETCHED,
            time: None,
            tuid: None,
            srec: None,
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status |= status;
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self.status |= MessageStatus::TIME_FETCHED;
        self
    }

    pub fn with_tuid(mut self, tuid: Tuid) -> Self {
        self.tuid = Some(tuid);
        self
    }

    pub fn is_dead(&self) -> bool {
        self.status.contains(MessageStatus::DEAD)
    }
}

/// The transient payload of a message being copied.
#[derive(Clone, Debug, Default)]
pub struct MessageData {
    /// The raw body, headers included.
    pub data: Vec<u8>,

    /// The flags travelling with the copy.
    pub flags: Flags,

    /// The internal date travelling with the copy.
    pub time: Option<DateTime<Utc>>,
}
