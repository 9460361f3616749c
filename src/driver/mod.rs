//! Module dedicated to the store driver contract.
//!
//! The engine never talks to a mailbox directly: every store (local
//! maildir layout, IMAP server, in-memory test double…) is driven
//! through the [`Driver`] trait. The contract is deliberately small:
//! the engine announces which message columns it needs via
//! [`OpenOptions`], then issues select/load/fetch/store/flag/trash
//! operations, each of which resolves exactly once.

use async_trait::async_trait;
use thiserror::Error;

use crate::flag::Flags;
use crate::message::{Message, MessageData};

/// Errors a driver operation can resolve with.
///
/// The classification drives the engine's failure policy: a bad
/// message degrades to a record mutation and a warning, a bad
/// mailbox fails the whole run.
#[derive(Debug, Error)]
pub enum Error {
    /// The message went missing, was rejected, or the mailbox is
    /// full. The run continues.
    #[error("cannot operate on message: {0}")]
    MessageBad(String),

    /// The mailbox is unusable. The run is aborted and the other
    /// side canceled.
    #[error("cannot operate on mailbox: {0}")]
    MailboxBad(String),

    /// A cancel overtook the operation.
    #[error("operation canceled")]
    Canceled,
}

pub type Result<T> = std::result::Result<T, Error>;

bitflags::bitflags! {
    /// The message columns and capabilities the engine will need
    /// from the next [`Driver::select`].
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct OpenOptions: u16 {
        /// Messages already known to the sync state are needed.
        const OLD = 1 << 0;
        /// Messages beyond the last propagated UID are needed.
        const NEW = 1 << 1;
        /// Flags must be reported at load time.
        const FLAGS = 1 << 2;
        /// Sizes must be reported at load time.
        const SIZE = 1 << 3;
        /// The mailbox will be expunged on close.
        const EXPUNGE = 1 << 5;
        /// Flag mutations will be issued.
        const SET_FLAGS = 1 << 6;
        /// Messages will be appended.
        const APPEND = 1 << 7;
        /// Tracking ids must be extracted from message bodies.
        const FIND = 1 << 8;
        /// Internal dates must be reported at load time.
        const TIME = 1 << 9;
    }
}

/// What a driver reports after selecting a mailbox.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SelectedMailbox {
    /// The UID validity cookie. A change invalidates every
    /// previously known UID of this mailbox.
    pub uidvalidity: u32,

    /// The UID the next appended message will get, or a lower bound
    /// thereof.
    pub uidnext: u32,

    /// Total number of messages.
    pub count: u32,

    /// Number of recent messages. Only trustworthy right after
    /// select.
    pub recent: u32,
}

/// The uniform asynchronous interface a store must implement to be
/// synchronized.
///
/// Operations issued serially by the engine must be serviced in
/// issue order. Memory of returned messages belongs to the caller.
#[async_trait]
pub trait Driver: Send {
    /// Whether the store keeps literal CR-LF line endings. CR-LF is
    /// the canonical wire form; the engine converts when two sides
    /// disagree.
    fn stores_crlf(&self) -> bool {
        false
    }

    /// Announces the columns the engine needs. The driver may widen
    /// the set with implicitly needed columns; the effective set is
    /// returned.
    fn prepare(&mut self, opts: OpenOptions) -> OpenOptions;

    /// Opens the named mailbox, optionally creating it.
    async fn select(&mut self, mailbox: &str, create: bool) -> Result<SelectedMailbox>;

    /// Loads every non-dead message whose UID lies in
    /// `[min_uid, max_uid]` or appears in `excs`, with the columns
    /// announced by [`Driver::prepare`]. Messages below `new_uid` do
    /// not need a tracking id even when [`OpenOptions::FIND`] was
    /// requested. Messages are returned in ascending UID order.
    async fn load(
        &mut self,
        min_uid: u32,
        max_uid: u32,
        new_uid: u32,
        excs: Vec<u32>,
    ) -> Result<Vec<Message>>;

    /// Fetches body, flags and internal date of one message.
    async fn fetch_message(&mut self, uid: u32) -> Result<MessageData>;

    /// Appends a message to the mailbox, or to the trash folder.
    /// Returns the new UID when it can be determined immediately,
    /// `None` otherwise (the engine then falls back to tracking-id
    /// matching).
    async fn store_message(&mut self, data: MessageData, to_trash: bool) -> Result<Option<u32>>;

    /// Indexes the messages appended since `new_uid`, including
    /// their tracking ids. Idempotence under concurrent appenders is
    /// the driver's responsibility.
    async fn find_new_messages(&mut self, new_uid: u32) -> Result<Vec<Message>>;

    /// Adds and removes flags on one message. The mutation may be
    /// deferred until [`Driver::commit`].
    async fn set_flags(&mut self, uid: u32, add: Flags, remove: Flags) -> Result<()>;

    /// Moves one message to the trash folder. The original may or
    /// may not be expunged immediately.
    async fn trash_message(&mut self, uid: u32) -> Result<()>;

    /// Flushes deferred flag mutations.
    async fn commit(&mut self) -> Result<()>;

    /// Expunges messages flagged deleted and closes the mailbox.
    async fn close(&mut self) -> Result<()>;

    /// Drops queued operations which are not in flight yet and
    /// waits for in-flight ones to complete.
    async fn cancel(&mut self);

    /// Hard-disposes of the store after a fatal failure. No further
    /// operation will be issued.
    fn dispose(&mut self) {}
}
