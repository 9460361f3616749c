//! Module dedicated to the journal codec.
//!
//! The journal is an append-only, line-oriented log of every
//! sync-state mutation of the current run. Each entry is written
//! *before* the driver call that makes the change observable, so
//! that an interrupted run can be replayed from the last state file.
//! The format is a one-letter opcode followed by whitespace-separated
//! integer arguments; record-touching opcodes are keyed by the
//! `(master, slave)` UID pair of the record at the time of writing.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use log::warn;
use thiserror::Error;

use crate::channel::FsyncLevel;
use crate::flag::Flags;
use crate::message::Tuid;
use crate::side::Side;

use super::die_on_disk_error;

/// The journal format version. A mismatch is corruption.
pub const VERSION: &str = "2";

/// Errors related to journal decoding.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read journal {0}: incomplete header")]
    IncompleteHeaderError(String),
    #[error("cannot read journal: incompatible version (got {0:?}, expected {VERSION:?})")]
    IncompatibleVersionError(String),
    #[error("cannot read journal entry at line {0}: malformed entry {1:?}")]
    MalformedEntryError(usize, String),
    #[error("cannot read journal entry at line {0}: unrecognized opcode {1:?}")]
    UnrecognizedOpcodeError(usize, char),
    #[error("cannot apply journal entry at line {0}: no sync record ({1},{2})")]
    UnknownRecordError(usize, i64, i64),
}

/// One journal entry.
///
/// Record keys are carried as raw on-disk UID slots, since a record
/// may be keyed by a sentinel (`-2` while a copy is in flight).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Entry {
    /// `|`: the UID validity baseline of both sides.
    UidValidity { master: u32, slave: u32 },
    /// `(` and `)`: highest UID already considered for propagation.
    MaxUid(Side, u32),
    /// `{` and `}`: smallest UID at which tracking-id matching is
    /// still meaningful.
    NewUid(Side, u32),
    /// `+`: a new record was appended.
    Create { master: i64, slave: i64 },
    /// `-`: the record was tombstoned.
    Kill { master: i64, slave: i64 },
    /// `#`: the record's tracking id was chosen.
    SetTuid { master: i64, slave: i64, tuid: Tuid },
    /// `&`: the tracking id was lost; flags reset with it.
    LoseTuid { master: i64, slave: i64 },
    /// `<` and `>`: the UID slot of one side was bound.
    Bind {
        side: Side,
        master: i64,
        slave: i64,
        uid: i64,
    },
    /// `*`: the record's flags were committed.
    CommitFlags { master: i64, slave: i64, flags: Flags },
    /// `~`: a pending expiration decision was taken or revoked.
    SetExpire {
        master: i64,
        slave: i64,
        expire: bool,
    },
    /// `\`: the pending decision was reverted to the committed one.
    RevertExpire { master: i64, slave: i64 },
    /// `/`: the pending decision was committed.
    CommitExpire { master: i64, slave: i64 },
}

impl Entry {
    /// The record key, for entries addressing a record.
    pub fn record_key(&self) -> Option<(i64, i64)> {
        match *self {
            Self::Kill { master, slave }
            | Self::SetTuid { master, slave, .. }
            | Self::LoseTuid { master, slave }
            | Self::Bind { master, slave, .. }
            | Self::CommitFlags { master, slave, .. }
            | Self::SetExpire { master, slave, .. }
            | Self::RevertExpire { master, slave }
            | Self::CommitExpire { master, slave } => Some((master, slave)),
            _ => None,
        }
    }

    /// Decodes one journal line.
    pub fn parse(line: &str, line_no: usize) -> Result<Self, Error> {
        let malformed = || Error::MalformedEntryError(line_no, line.to_owned());
        let mut chars = line.chars();
        let op = chars.next().ok_or_else(malformed)?;
        let mut args = chars.as_str().split_whitespace();
        let int = |args: &mut dyn Iterator<Item = &str>| -> Result<i64, Error> {
            args.next()
                .and_then(|arg| arg.parse().ok())
                .ok_or_else(malformed)
        };
        let uid = |args: &mut dyn Iterator<Item = &str>| -> Result<u32, Error> {
            args.next()
                .and_then(|arg| arg.parse().ok())
                .ok_or_else(malformed)
        };

        let entry = match op {
            '|' => Self::UidValidity {
                master: uid(&mut args)?,
                slave: uid(&mut args)?,
            },
            '(' => Self::MaxUid(Side::Master, uid(&mut args)?),
            ')' => Self::MaxUid(Side::Slave, uid(&mut args)?),
            '{' => Self::NewUid(Side::Master, uid(&mut args)?),
            '}' => Self::NewUid(Side::Slave, uid(&mut args)?),
            '+' => Self::Create {
                master: int(&mut args)?,
                slave: int(&mut args)?,
            },
            '-' => Self::Kill {
                master: int(&mut args)?,
                slave: int(&mut args)?,
            },
            '#' => {
                let master = int(&mut args)?;
                let slave = int(&mut args)?;
                let tuid = args
                    .next()
                    .and_then(|arg| Tuid::try_from(arg).ok())
                    .ok_or_else(malformed)?;
                Self::SetTuid {
                    master,
                    slave,
                    tuid,
                }
            }
            '&' => Self::LoseTuid {
                master: int(&mut args)?,
                slave: int(&mut args)?,
            },
            '<' => Self::Bind {
                side: Side::Master,
                master: int(&mut args)?,
                slave: int(&mut args)?,
                uid: int(&mut args)?,
            },
            '>' => Self::Bind {
                side: Side::Slave,
                master: int(&mut args)?,
                slave: int(&mut args)?,
                uid: int(&mut args)?,
            },
            '*' => Self::CommitFlags {
                master: int(&mut args)?,
                slave: int(&mut args)?,
                flags: Flags::from_bits(int(&mut args)?.try_into().map_err(|_| malformed())?)
                    .ok_or_else(malformed)?,
            },
            '~' => Self::SetExpire {
                master: int(&mut args)?,
                slave: int(&mut args)?,
                expire: match int(&mut args)? {
                    0 => false,
                    1 => true,
                    _ => return Err(malformed()),
                },
            },
            '\\' => Self::RevertExpire {
                master: int(&mut args)?,
                slave: int(&mut args)?,
            },
            '/' => Self::CommitExpire {
                master: int(&mut args)?,
                slave: int(&mut args)?,
            },
            other => return Err(Error::UnrecognizedOpcodeError(line_no, other)),
        };
        if args.next().is_some() {
            return Err(malformed());
        }
        Ok(entry)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UidValidity { master, slave } => write!(f, "| {master} {slave}"),
            Self::MaxUid(Side::Master, uid) => write!(f, "( {uid}"),
            Self::MaxUid(Side::Slave, uid) => write!(f, ") {uid}"),
            Self::NewUid(Side::Master, uid) => write!(f, "{{ {uid}"),
            Self::NewUid(Side::Slave, uid) => write!(f, "}} {uid}"),
            Self::Create { master, slave } => write!(f, "+ {master} {slave}"),
            Self::Kill { master, slave } => write!(f, "- {master} {slave}"),
            Self::SetTuid {
                master,
                slave,
                tuid,
            } => write!(f, "# {master} {slave} {tuid}"),
            Self::LoseTuid { master, slave } => write!(f, "& {master} {slave}"),
            Self::Bind {
                side: Side::Master,
                master,
                slave,
                uid,
            } => write!(f, "< {master} {slave} {uid}"),
            Self::Bind {
                side: Side::Slave,
                master,
                slave,
                uid,
            } => write!(f, "> {master} {slave} {uid}"),
            Self::CommitFlags {
                master,
                slave,
                flags,
            } => write!(f, "* {master} {slave} {}", flags.bits()),
            Self::SetExpire {
                master,
                slave,
                expire,
            } => write!(f, "~ {master} {slave} {}", expire as u8),
            Self::RevertExpire { master, slave } => write!(f, "\\ {master} {slave}"),
            Self::CommitExpire { master, slave } => write!(f, "/ {master} {slave}"),
        }
    }
}

/// The line-buffered journal appender.
///
/// Write errors on the journal are fatal for the whole process:
/// continuing to mutate stores without a durable log would break the
/// recovery contract.
pub struct JournalWriter {
    file: File,
    fsync: FsyncLevel,
}

impl JournalWriter {
    /// Opens the journal for a run.
    ///
    /// A recovered run appends below the replayed entries; a fresh
    /// run truncates whatever stale journal was left behind and
    /// starts with the version line.
    pub fn open(path: &Path, recovered: bool, fsync: FsyncLevel) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(recovered)
            .truncate(!recovered)
            .open(path)?;
        let mut writer = Self { file, fsync };
        if !recovered {
            writer.write_line(VERSION);
        }
        Ok(writer)
    }

    /// Appends one entry and flushes it to the kernel.
    pub fn log(&mut self, entry: &Entry) {
        self.write_line(&entry.to_string());
    }

    /// Forces the journal to stable storage when the thorough fsync
    /// level asks for it. Issued right before a message copy.
    pub fn sync_for_copy(&mut self) {
        if self.fsync >= FsyncLevel::Thorough {
            if let Err(err) = self.file.sync_data() {
                warn!("cannot sync journal: {err}");
            }
        }
    }

    fn write_line(&mut self, line: &str) {
        if let Err(err) = writeln!(self.file, "{line}").and_then(|()| self.file.flush()) {
            die_on_disk_error("journal", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(entry: Entry) {
        let line = entry.to_string();
        assert_eq!(Entry::parse(&line, 1).unwrap(), entry, "line {line:?}");
    }

    #[test]
    fn entries_round_trip() {
        let tuid = Tuid::generate();
        round_trip(Entry::UidValidity {
            master: 7,
            slave: 9,
        });
        round_trip(Entry::MaxUid(Side::Master, 12));
        round_trip(Entry::MaxUid(Side::Slave, 13));
        round_trip(Entry::NewUid(Side::Master, 4));
        round_trip(Entry::NewUid(Side::Slave, 5));
        round_trip(Entry::Create {
            master: 3,
            slave: -2,
        });
        round_trip(Entry::Kill {
            master: 3,
            slave: 0,
        });
        round_trip(Entry::SetTuid {
            master: 3,
            slave: -2,
            tuid,
        });
        round_trip(Entry::LoseTuid {
            master: 3,
            slave: -2,
        });
        round_trip(Entry::Bind {
            side: Side::Slave,
            master: 3,
            slave: -2,
            uid: 8,
        });
        round_trip(Entry::CommitFlags {
            master: 3,
            slave: 8,
            flags: Flags::SEEN | Flags::FLAGGED,
        });
        round_trip(Entry::SetExpire {
            master: 3,
            slave: 8,
            expire: true,
        });
        round_trip(Entry::RevertExpire {
            master: 3,
            slave: 8,
        });
        round_trip(Entry::CommitExpire {
            master: 3,
            slave: 8,
        });
    }

    #[test]
    fn wire_form_matches_the_format() {
        assert_eq!(
            Entry::UidValidity {
                master: 1,
                slave: 2
            }
            .to_string(),
            "| 1 2"
        );
        assert_eq!(
            Entry::Bind {
                side: Side::Master,
                master: -2,
                slave: 5,
                uid: 9
            }
            .to_string(),
            "< -2 5 9"
        );
        assert_eq!(
            Entry::CommitFlags {
                master: 1,
                slave: 2,
                flags: Flags::SEEN
            }
            .to_string(),
            "* 1 2 8"
        );
    }

    #[test]
    fn malformed_entries_are_rejected() {
        assert!(Entry::parse("", 1).is_err());
        assert!(Entry::parse("? 1 2", 1).is_err());
        assert!(Entry::parse("+ 1", 1).is_err());
        assert!(Entry::parse("+ 1 2 3", 1).is_err());
        assert!(Entry::parse("| x y", 1).is_err());
        assert!(Entry::parse("# 1 2 shorttuid", 1).is_err());
        assert!(Entry::parse("~ 1 2 7", 1).is_err());
        assert!(Entry::parse("* 1 2 255", 1).is_err());
    }
}
