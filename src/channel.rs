//! Module dedicated to channel configuration.
//!
//! A channel pairs one mailbox of a master store with one mailbox of
//! a slave store and says which operations propagate in which
//! direction. Parsing configuration files is the embedding
//! application's concern; this module only defines the semantic
//! types the engine consumes.

use std::path::PathBuf;

use bitflags::bitflags;
use thiserror::Error;

use crate::side::{BySide, Side};

/// Errors related to channel configuration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot use mailbox {0}: canonical name contains the flattened hierarchy delimiter {1:?}")]
    FlattenedDelimiterConflictError(String, char),
}

bitflags! {
    /// The operations a channel performs on one side.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct SyncOps: u8 {
        /// Propagate newly appeared messages to this side.
        const NEW = 1 << 0;
        /// Retry messages a prior run refused to place on this side.
        const RENEW = 1 << 1;
        /// Propagate deletions to this side.
        const DELETE = 1 << 2;
        /// Propagate flag changes to this side.
        const FLAGS = 1 << 3;
        /// Expunge deleted messages from this side on close.
        const EXPUNGE = 1 << 4;
        /// Create the mailbox on this side when missing.
        const CREATE = 1 << 5;
    }
}

/// How thoroughly state and journal writes are flushed to stable
/// storage.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum FsyncLevel {
    /// Rely on the kernel alone.
    None,
    /// Sync the new state file before the rename that publishes it.
    #[default]
    Normal,
    /// Additionally sync the journal before every message copy.
    Thorough,
}

/// The per-side store parameters the engine consumes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub struct StoreConfig {
    /// The store name, used in the default sync-state file name.
    pub name: String,

    /// The on-disk root of the store, when it has one. Required for
    /// in-box sync state.
    pub path: Option<PathBuf>,

    /// Mailbox name to present as `INBOX`.
    pub map_inbox: Option<String>,

    /// Character standing in for the `/` hierarchy delimiter in
    /// flattened mailbox names.
    pub flat_delim: Option<char>,

    /// Trash mailbox of this store, when configured.
    pub trash: Option<String>,

    /// Restrict trashing to messages which were never paired.
    pub trash_only_new: bool,

    /// Trash new messages of the opposite store into this one.
    pub trash_remote_new: bool,

    /// Upper bound on the size of messages copied to this store.
    /// Bigger unflagged messages are refused.
    pub max_size: Option<usize>,
}

impl StoreConfig {
    /// Whether a message of the given size may be placed on this
    /// store.
    pub(crate) fn accepts_size(&self, size: usize) -> bool {
        match self.max_size {
            Some(max) => size <= max,
            None => true,
        }
    }

    /// Computes the canonical mailbox name: applies the `INBOX`
    /// mapping, then flattens the hierarchy.
    pub fn canonical_name(&self, given: Option<&str>) -> Result<String, Error> {
        let name = match given {
            None => "INBOX",
            Some(given) if self.map_inbox.as_deref() == Some(given) => "INBOX",
            Some(given) => given,
        };
        match self.flat_delim {
            None => Ok(name.to_owned()),
            Some(delim) if name.contains(delim) => Err(
                Error::FlattenedDelimiterConflictError(name.to_owned(), delim),
            ),
            Some(delim) => Ok(name.replace('/', &delim.to_string())),
        }
    }
}

/// One channel: a mailbox pair plus the propagation policy.
#[derive(Clone, Debug, Default)]
pub struct ChannelConfig {
    /// The channel name, for diagnostics.
    pub name: String,

    /// The two store configurations.
    pub stores: BySide<StoreConfig>,

    /// The mailbox names as configured. `None` means `INBOX`.
    pub boxes: BySide<Option<String>>,

    /// The operations to perform, per target side.
    pub ops: BySide<SyncOps>,

    /// Upper bound on the number of messages kept on the slave.
    /// Zero means unlimited; excess messages are expired.
    pub max_messages: u32,

    /// Where the sync state lives: `None` for the global template,
    /// `"*"` for in-box state under the slave store path, anything
    /// else as a channel-local path prefix.
    pub sync_state: Option<String>,
}

impl ChannelConfig {
    pub fn ops(&self, side: Side) -> SyncOps {
        self.ops[side]
    }
}

/// Engine-wide knobs, passed explicitly instead of living in global
/// state.
#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    /// The global sync-state directory template.
    pub sync_state_dir: PathBuf,

    /// Flush thoroughness for state and journal writes.
    pub fsync: FsyncLevel,

    /// Keep the journal and staged state after a successful run,
    /// for inspection. The next run will replay them.
    pub keep_journal: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_name_defaults_to_inbox() {
        let store = StoreConfig::default();
        assert_eq!(store.canonical_name(None).unwrap(), "INBOX");
    }

    #[test]
    fn canonical_name_applies_inbox_mapping() {
        let store = StoreConfig {
            map_inbox: Some("mail/in".into()),
            ..Default::default()
        };
        assert_eq!(store.canonical_name(Some("mail/in")).unwrap(), "INBOX");
        assert_eq!(store.canonical_name(Some("mail/out")).unwrap(), "mail/out");
    }

    #[test]
    fn canonical_name_flattens_hierarchy() {
        let store = StoreConfig {
            flat_delim: Some('.'),
            ..Default::default()
        };
        assert_eq!(store.canonical_name(Some("a/b/c")).unwrap(), "a.b.c");
    }

    #[test]
    fn canonical_name_rejects_delimiter_conflicts() {
        let store = StoreConfig {
            flat_delim: Some('.'),
            ..Default::default()
        };
        assert!(store.canonical_name(Some("a.b")).is_err());
    }
}
