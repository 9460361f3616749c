//! Module dedicated to sync records.
//!
//! A sync record is the persistent pairing unit: it links at most
//! one message on each side and remembers the flags last
//! successfully synchronized, which is the ground truth for delta
//! detection.

use std::fmt;

use bitflags::bitflags;
use thiserror::Error;

use crate::flag::Flags;
use crate::message::Tuid;
use crate::side::{BySide, Side};

/// Errors related to sync records.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot interpret {0} as a message UID slot")]
    ParseUidSlotError(i64),
}

/// What a record knows about one side of the pair.
///
/// On disk this is a single integer: positive for a bound UID, `0`
/// for a vanished message, `-1` for a refused placement and `-2` for
/// a copy in flight.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum UidSlot {
    /// The pair is bound to this UID.
    Bound(u32),
    /// The message vanished on this side; the record is kept as an
    /// orphan because the partner still exists.
    #[default]
    Gone,
    /// A prior copy attempt gave up on this side for good.
    Refused,
    /// A copy towards this side is in flight; the record's tracking
    /// id is the lookup key.
    Pending,
}

impl UidSlot {
    /// Decodes the on-disk integer encoding.
    pub fn from_raw(raw: i64) -> Result<Self, Error> {
        match raw {
            uid if uid > 0 && uid <= i64::from(u32::MAX) => Ok(Self::Bound(uid as u32)),
            0 => Ok(Self::Gone),
            -1 => Ok(Self::Refused),
            -2 => Ok(Self::Pending),
            other => Err(Error::ParseUidSlotError(other)),
        }
    }

    /// Encodes back to the on-disk integer.
    pub fn raw(self) -> i64 {
        match self {
            Self::Bound(uid) => i64::from(uid),
            Self::Gone => 0,
            Self::Refused => -1,
            Self::Pending => -2,
        }
    }

    pub fn uid(self) -> Option<u32> {
        match self {
            Self::Bound(uid) => Some(uid),
            _ => None,
        }
    }

    pub fn is_bound(self) -> bool {
        matches!(self, Self::Bound(_))
    }
}

impl fmt::Display for UidSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw())
    }
}

bitflags! {
    /// Per-record status bits.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct RecordStatus: u8 {
        /// Tombstoned for this run; purged at state flush.
        const DEAD = 1 << 0;
        /// Already handled by the new-messages pass.
        const DONE = 1 << 1;
        /// The master message carries the deleted flag.
        const DEL_MASTER = 1 << 2;
        /// The slave message carries the deleted flag.
        const DEL_SLAVE = 1 << 3;
        /// The slave message was expired by the message-cap policy.
        const EXPIRED = 1 << 4;
        /// An expiration decision is journaled but not committed.
        const EXPIRE = 1 << 5;
        /// Transient: expired and the slave message is gone, so the
        /// second master load may drop or orphan the record.
        const EXPIRED_ORPHAN = 1 << 6;
    }
}

impl RecordStatus {
    /// The deleted-flag marker of the given side.
    pub fn del(side: Side) -> Self {
        match side {
            Side::Master => Self::DEL_MASTER,
            Side::Slave => Self::DEL_SLAVE,
        }
    }
}

/// One logical pairing between a master-side and a slave-side
/// message.
#[derive(Clone, Debug, Default)]
pub struct SyncRecord {
    /// The two UID slots.
    pub uid: BySide<UidSlot>,

    /// Flags last successfully synchronized.
    pub flags: Flags,

    /// Status bits.
    pub status: RecordStatus,

    /// Flags to add during this run, per side. Transient.
    pub aflags: BySide<Flags>,

    /// Flags to delete during this run, per side. Transient.
    pub dflags: BySide<Flags>,

    /// The expiration decision of this run, when the message-cap
    /// pass reconsidered the record. Transient.
    pub new_expire: Option<bool>,

    /// The tracking id of the in-flight copy, if any.
    pub tuid: Option<Tuid>,

    /// Index of the resolved message on each side, when loaded.
    pub(crate) msg: BySide<Option<usize>>,
}

impl SyncRecord {
    pub fn new(master: UidSlot, slave: UidSlot) -> Self {
        Self {
            uid: BySide::new(master, slave),
            ..Default::default()
        }
    }

    pub fn is_dead(&self) -> bool {
        self.status.contains(RecordStatus::DEAD)
    }

    pub fn is_expired(&self) -> bool {
        self.status.contains(RecordStatus::EXPIRED)
    }

    /// Whether an expiration transition is journaled but not yet
    /// committed.
    pub fn expire_pending(&self) -> bool {
        self.status.contains(RecordStatus::EXPIRE) != self.status.contains(RecordStatus::EXPIRED)
    }

    pub(crate) fn set_status(&mut self, status: RecordStatus, on: bool) {
        self.status.set(status, on);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_slot_raw_round_trip() {
        for raw in [-2i64, -1, 0, 1, 42, i64::from(u32::MAX)] {
            assert_eq!(UidSlot::from_raw(raw).unwrap().raw(), raw);
        }
        assert!(UidSlot::from_raw(-3).is_err());
        assert!(UidSlot::from_raw(i64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn expire_pending_detection() {
        let mut rec = SyncRecord::new(UidSlot::Bound(1), UidSlot::Bound(2));
        assert!(!rec.expire_pending());
        rec.status |= RecordStatus::EXPIRE;
        assert!(rec.expire_pending());
        rec.status |= RecordStatus::EXPIRED;
        assert!(!rec.expire_pending());
    }
}
