//! Module dedicated to synchronization outcome and progress.
//!
//! The engine reports progress through an optional asynchronous
//! event handler and summarizes the run in a [`SyncReport`]. Events
//! carry enough to rebuild the classic one-line progress display
//! without the engine ever printing anything itself.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bitflags::bitflags;
use log::debug;

use crate::side::{BySide, Side, SIDES};

bitflags! {
    /// The accumulated, OR-able outcome of a run.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct SyncOutcome: u8 {
        /// The run failed before converging.
        const FAIL = 1 << 0;
        /// The failure affects every channel of the group.
        const FAIL_ALL = 1 << 1;
        /// The master store died mid-run.
        const BAD_MASTER = 1 << 2;
        /// The slave store died mid-run.
        const BAD_SLAVE = 1 << 3;
        /// A message could not be placed and was given up on.
        const NO_GOOD = 1 << 4;
        /// The run was canceled.
        const CANCELED = 1 << 5;
    }
}

impl SyncOutcome {
    /// The bad-store marker of the given side.
    pub fn bad(side: Side) -> Self {
        match side {
            Side::Master => Self::BAD_MASTER,
            Side::Slave => Self::BAD_SLAVE,
        }
    }

    pub fn is_ok(self) -> bool {
        self.is_empty()
    }
}

/// One done/total progress counter.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Counter {
    pub done: u32,
    pub total: u32,
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.done, self.total)
    }
}

/// Progress counters of a run, per side.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Progress {
    /// Messages copied towards each side.
    pub new: BySide<Counter>,
    /// Flag updates applied on each side.
    pub flags: BySide<Counter>,
    /// Messages trashed from each side.
    pub trash: BySide<Counter>,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for side in SIDES {
            if side == Side::Slave {
                write!(f, "  ")?;
            }
            write!(
                f,
                "{}: +{} *{} #{}",
                if side == Side::Master { "M" } else { "S" },
                self.new[side],
                self.flags[side],
                self.trash[side],
            )?;
        }
        Ok(())
    }
}

/// The summary returned once per run.
#[derive(Clone, Copy, Debug, Default)]
pub struct SyncReport {
    /// The accumulated outcome. Empty means fully converged.
    pub outcome: SyncOutcome,

    /// The final progress counters.
    pub progress: Progress,

    /// In-flight copies whose tracking id could not be recovered,
    /// per destination side.
    pub lost_tuids: BySide<u32>,
}

/// The synchronization progress event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SyncEvent {
    /// A mailbox was selected.
    SelectedMailbox(Side),
    /// A mailbox finished loading.
    LoadedMailbox { side: Side, count: u32, recent: u32 },
    /// Both sides are loaded, propagation starts.
    Synchronizing,
    /// A progress counter changed.
    Progressed(Progress),
    /// Delete propagation met flag changes which will be lost.
    ConflictingChanges { master: i64, slave: i64 },
    /// A mailbox was expunged.
    ExpungedMailbox(Side),
}

impl SyncEvent {
    pub async fn emit(&self, handler: &Option<Arc<SyncEventHandler>>) {
        if let Some(handler) = handler.as_ref() {
            if let Err(err) = handler(self.clone()).await {
                debug!("error while emitting sync event: {err:?}");
            } else {
                debug!("emitted sync event {self:?}");
            }
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncEvent::SelectedMailbox(side) => {
                write!(f, "Selected {side} mailbox")
            }
            SyncEvent::LoadedMailbox {
                side,
                count,
                recent,
            } => {
                write!(f, "Loaded {side}: {count} messages, {recent} recent")
            }
            SyncEvent::Synchronizing => {
                write!(f, "Synchronizing")
            }
            SyncEvent::Progressed(progress) => {
                write!(f, "{progress}")
            }
            SyncEvent::ConflictingChanges { master, slave } => {
                write!(f, "Conflicting changes in ({master},{slave})")
            }
            SyncEvent::ExpungedMailbox(side) => {
                write!(f, "Expunged {side} mailbox")
            }
        }
    }
}

pub type SyncEventHandler =
    dyn Fn(SyncEvent) -> Pin<Box<dyn Future<Output = crate::Result<()>> + Send>> + Send + Sync;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_renders_the_stats_line() {
        let mut progress = Progress::default();
        progress.new[Side::Slave] = Counter { done: 1, total: 2 };
        progress.flags[Side::Master] = Counter { done: 3, total: 3 };
        assert_eq!(
            progress.to_string(),
            "M: +0/0 *3/3 #0/0  S: +1/2 *0/0 #0/0",
        );
    }

    #[test]
    fn outcome_accumulates() {
        let mut outcome = SyncOutcome::default();
        assert!(outcome.is_ok());
        outcome |= SyncOutcome::FAIL | SyncOutcome::bad(Side::Slave);
        assert!(!outcome.is_ok());
        assert_eq!(outcome.bits(), 1 | 8);
    }
}
