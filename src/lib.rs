//! Interruption-safe bidirectional mailbox synchronization engine.
//!
//! This library synchronizes one mailbox pair (a *channel*) between
//! two stores, conventionally called master and slave, propagating
//! message creations, deletions and flag changes in either or both
//! directions. Stores are driven through the asynchronous
//! [`Driver`] contract; concrete maildir or IMAP drivers live in the
//! embedding application.
//!
//! Runs are interruption-safe: every state mutation is journaled
//! before the stores are touched, so a crash leaves a journal the
//! next run replays to converge with at-most-once message copies,
//! even against stores which cannot report UIDs at append time (the
//! engine then tags copies with an `X-TUID` tracking header and
//! rediscovers them).

pub mod channel;
pub mod driver;
pub mod error;
pub mod flag;
pub mod message;
pub mod side;
pub mod state;
pub mod sync;

#[doc(inline)]
pub use channel::{ChannelConfig, EngineConfig, FsyncLevel, StoreConfig, SyncOps};
#[doc(inline)]
pub use driver::{Driver, OpenOptions, SelectedMailbox};
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use flag::Flags;
#[doc(inline)]
pub use message::{Message, MessageData, MessageStatus, Tuid};
#[doc(inline)]
pub use side::{BySide, Side};
#[doc(inline)]
pub use sync::report::{Progress, SyncEvent, SyncEventHandler, SyncOutcome, SyncReport};
#[doc(inline)]
pub use sync::SyncBuilder;
