//! Module dedicated to the synchronization engine.
//!
//! [`SyncBuilder::sync`] runs one channel to convergence: it selects
//! both mailboxes, loads the persistent sync state and replays the
//! journal of an interrupted run, loads and pairs messages with sync
//! records, then propagates new messages, flag changes, deletions,
//! expirations and trashing according to the channel operations, and
//! finally publishes the new state atomically.
//!
//! Every state mutation is journaled before the driver call that
//! makes it observable, so a crash at any point leaves a recoverable
//! journal and copies keep their at-most-once semantics.

pub mod copy;
pub(crate) mod expire;
pub mod report;

use std::collections::HashMap;
use std::fs::File;
use std::sync::Arc;

use bitflags::bitflags;
use futures::future;
use log::{debug, info, warn};
use thiserror::Error;

use crate::channel::{ChannelConfig, EngineConfig, SyncOps};
use crate::driver::{self, Driver, OpenOptions, SelectedMailbox};
use crate::flag::Flags;
use crate::message::{Message, MessageData, Tuid};
use crate::side::{BySide, Side, SIDES};
use crate::state::journal::{Entry, JournalWriter};
use crate::state::record::{RecordStatus, SyncRecord, UidSlot};
use crate::state::{ChannelLock, StatePaths, SyncState};

use self::report::{Progress, SyncEvent, SyncEventHandler, SyncOutcome, SyncReport};

/// Errors related to the synchronization engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot select {1} mailbox")]
    SelectMailboxError(#[source] driver::Error, Side),
    #[error("cannot load {1} mailbox")]
    LoadMailboxError(#[source] driver::Error, Side),
    #[error("cannot copy message {2} from {1}")]
    CopyMessageError(#[source] driver::Error, Side, u32),
    #[error("cannot set flags of message {2} on {1}")]
    SetFlagsError(#[source] driver::Error, Side, u32),
    #[error("cannot trash message {2} on {1}")]
    TrashMessageError(#[source] driver::Error, Side, u32),
    #[error("cannot commit flag changes on {1}")]
    CommitError(#[source] driver::Error, Side),
    #[error("cannot expunge and close {1} mailbox")]
    CloseMailboxError(#[source] driver::Error, Side),
    #[error("cannot sync channel: UID validity of {0} changed (got {1}, expected {2})")]
    UidValidityChangedError(Side, u32, u32),
}

impl Error {
    /// The store the error originated from, when side-specific.
    pub fn side(&self) -> Option<Side> {
        match self {
            Self::SelectMailboxError(_, side)
            | Self::LoadMailboxError(_, side)
            | Self::CopyMessageError(_, side, _)
            | Self::SetFlagsError(_, side, _)
            | Self::TrashMessageError(_, side, _)
            | Self::CommitError(_, side)
            | Self::CloseMailboxError(_, side)
            | Self::UidValidityChangedError(side, _, _) => Some(*side),
        }
    }

    fn source_driver(&self) -> Option<&driver::Error> {
        match self {
            Self::SelectMailboxError(err, _)
            | Self::LoadMailboxError(err, _)
            | Self::CopyMessageError(err, _, _)
            | Self::SetFlagsError(err, _, _)
            | Self::TrashMessageError(err, _, _)
            | Self::CommitError(err, _)
            | Self::CloseMailboxError(err, _) => Some(err),
            Self::UidValidityChangedError(..) => None,
        }
    }

    /// The OR-able outcome bits this error terminates the run with.
    pub fn outcome(&self) -> SyncOutcome {
        match self.source_driver() {
            Some(driver::Error::Canceled) => SyncOutcome::FAIL | SyncOutcome::CANCELED,
            Some(driver::Error::MailboxBad(_)) => {
                let side = self.side().map(SyncOutcome::bad).unwrap_or_default();
                SyncOutcome::FAIL | side
            }
            _ => SyncOutcome::FAIL,
        }
    }
}

bitflags! {
    /// Monotonic per-side engine state. Bits are set once; only the
    /// transient find marker is cleared after use.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    struct SideState: u16 {
        const SELECTED = 1 << 0;
        const LOADED = 1 << 1;
        const SENT_NEW = 1 << 2;
        const FOUND_NEW = 1 << 3;
        const SENT_FLAGS = 1 << 4;
        const SENT_TRASH = 1 << 5;
        const CLOSED = 1 << 6;
        const SENT_CANCEL = 1 << 7;
        const CANCELED = 1 << 8;
        const DID_EXPUNGE = 1 << 9;
        /// Tracking-id matching is pending on this side.
        const FIND = 1 << 10;
    }
}

/// The synchronization engine builder for one channel.
#[derive(Clone, Default)]
pub struct SyncBuilder {
    channel: ChannelConfig,
    engine: EngineConfig,
    handler: Option<Arc<SyncEventHandler>>,
}

impl SyncBuilder {
    pub fn new(channel: ChannelConfig, engine: EngineConfig) -> Self {
        Self {
            channel,
            engine,
            handler: None,
        }
    }

    pub fn set_some_handler<F>(
        &mut self,
        handler: Option<impl Fn(SyncEvent) -> F + Send + Sync + 'static>,
    ) where
        F: std::future::Future<Output = crate::Result<()>> + Send + 'static,
    {
        self.handler = match handler {
            Some(handler) => Some(Arc::new(move |evt| Box::pin(handler(evt)))),
            None => None,
        };
    }

    pub fn set_handler<F>(&mut self, handler: impl Fn(SyncEvent) -> F + Send + Sync + 'static)
    where
        F: std::future::Future<Output = crate::Result<()>> + Send + 'static,
    {
        self.set_some_handler(Some(handler));
    }

    pub fn with_handler<F>(mut self, handler: impl Fn(SyncEvent) -> F + Send + Sync + 'static) -> Self
    where
        F: std::future::Future<Output = crate::Result<()>> + Send + 'static,
    {
        self.set_handler(handler);
        self
    }

    /// Synchronizes the channel's mailbox pair to convergence.
    ///
    /// The report is returned exactly once; on failure both drivers
    /// are canceled and drained before the error surfaces. The
    /// journal and staged state are left behind on failure so the
    /// next run can resume.
    pub async fn sync(
        self,
        master: Box<dyn Driver>,
        slave: Box<dyn Driver>,
    ) -> crate::Result<SyncReport> {
        let mut task = SyncTask {
            chan: &self.channel,
            engine: &self.engine,
            handler: self.handler.clone(),
            drv: BySide::new(master, slave),
            names: BySide::default(),
            boxes: BySide::default(),
            msgs: BySide::default(),
            opts: BySide::default(),
            side_state: BySide::default(),
            state: SyncState::default(),
            paths: None,
            lock: None,
            journal: None,
            staged: None,
            progress: Progress::default(),
            outcome: SyncOutcome::default(),
            lost_tuids: BySide::default(),
            first_new_rec: 0,
        };
        match task.run().await {
            Ok(()) => {
                task.release_lock();
                Ok(SyncReport {
                    outcome: task.outcome,
                    progress: task.progress,
                    lost_tuids: task.lost_tuids,
                })
            }
            Err(err) => {
                task.cancel(&err).await;
                Err(err)
            }
        }
    }
}

/// The per-run context, owned by the engine future for the whole
/// run.
struct SyncTask<'a> {
    chan: &'a ChannelConfig,
    engine: &'a EngineConfig,
    handler: Option<Arc<SyncEventHandler>>,
    drv: BySide<Box<dyn Driver>>,
    names: BySide<String>,
    boxes: BySide<SelectedMailbox>,
    msgs: BySide<Vec<Message>>,
    opts: BySide<OpenOptions>,
    side_state: BySide<SideState>,
    state: SyncState,
    paths: Option<StatePaths>,
    lock: Option<ChannelLock>,
    journal: Option<JournalWriter>,
    staged: Option<File>,
    progress: Progress,
    outcome: SyncOutcome,
    lost_tuids: BySide<u32>,
    /// Index of the first record created by this run; the old-record
    /// passes stop there.
    first_new_rec: usize,
}

/// How a message copy resolved, short of a hard failure.
enum CopyOutcome {
    /// Stored; the new UID when immediately known.
    Stored(Option<u32>),
    /// Given up on: incomplete header or refused by the store.
    NoGood,
}

impl SyncTask<'_> {
    async fn run(&mut self) -> crate::Result<()> {
        self.canonicalize()?;
        self.select_boxes().await?;
        self.setup_state()?;
        self.prepare_opts();
        self.load_boxes().await?;
        self.record_uid_validity();
        info!("synchronizing channel {}", self.chan.name);
        self.emit(SyncEvent::Synchronizing).await;
        self.sync_new().await?;
        self.sync_old().await?;
        self.schedule_expiration().await?;
        self.sync_flags().await?;
        self.sync_trash().await?;
        self.close_boxes().await?;
        self.prune_records();
        self.commit_state();
        Ok(())
    }

    async fn emit(&self, event: SyncEvent) {
        event.emit(&self.handler).await;
    }

    async fn progressed(&self) {
        self.emit(SyncEvent::Progressed(self.progress)).await;
    }

    fn log_entry(&mut self, entry: Entry) {
        debug_assert!(self.journal.is_some(), "journaling before setup");
        if let Some(journal) = &mut self.journal {
            journal.log(&entry);
        }
    }

    fn record_key(&self, ridx: usize) -> (i64, i64) {
        let record = &self.state.records[ridx];
        (record.uid.master.raw(), record.uid.slave.raw())
    }

    fn release_lock(&mut self) {
        if let Some(lock) = self.lock.take() {
            lock.release();
        }
    }

    /// Tears both sides down after a failure: the bad store is
    /// disposed of, queued operations are dropped and in-flight ones
    /// drained. Journal and staged state are deliberately left on
    /// disk for the next run to replay.
    async fn cancel(&mut self, err: &crate::Error) {
        self.outcome |= err.outcome();
        if let crate::Error::SyncError(err) = err {
            if let (Some(side), Some(driver::Error::MailboxBad(_))) =
                (err.side(), err.source_driver())
            {
                self.drv[side].dispose();
            }
        }
        for side in SIDES {
            if !self.side_state[side].contains(SideState::SENT_CANCEL) {
                self.side_state[side] |= SideState::SENT_CANCEL;
                self.drv[side].cancel().await;
            }
            self.side_state[side] |= SideState::CANCELED;
        }
        self.journal = None;
        self.staged = None;
        self.release_lock();
    }

    fn canonicalize(&mut self) -> crate::Result<()> {
        for side in SIDES {
            self.names[side] = self.chan.stores[side]
                .canonical_name(self.chan.boxes[side].as_deref())?;
        }
        Ok(())
    }

    async fn select_boxes(&mut self) -> crate::Result<()> {
        for side in SIDES {
            info!("selecting {side} {}", self.names[side]);
        }
        let create = BySide::from_fn(|side| self.chan.ops(side).contains(SyncOps::CREATE));
        let (master, slave) = self.drv.both_mut();
        let (m, s) = future::join(
            master.select(&self.names.master, create.master),
            slave.select(&self.names.slave, create.slave),
        )
        .await;
        self.boxes.master =
            m.map_err(|err| Error::SelectMailboxError(err, Side::Master))?;
        self.boxes.slave = s.map_err(|err| Error::SelectMailboxError(err, Side::Slave))?;
        for side in SIDES {
            self.side_state[side] |= SideState::SELECTED;
            self.emit(SyncEvent::SelectedMailbox(side)).await;
        }
        Ok(())
    }

    /// Locates and locks the sync state, loads it, replays the
    /// journal of an interrupted run, verifies UID validity and
    /// opens the journal and staged state of this run.
    fn setup_state(&mut self) -> crate::Result<()> {
        let paths = StatePaths::locate(
            self.engine,
            self.chan,
            &self.names,
            self.chan.stores.slave.path.as_deref(),
        )?;
        self.lock = Some(ChannelLock::acquire(&paths.lock)?);

        self.state = SyncState::load(&paths.state)?;
        // only a journal paired with a staged state witnesses an
        // interrupted run; a journal alone is a leftover of a
        // completed one
        let recovered = paths.journal.exists() && paths.staged.exists();
        if recovered {
            self.state.replay_journal(&paths.journal)?;
        }

        for side in SIDES {
            if let Some(expected) = self.state.uidval[side] {
                let got = self.boxes[side].uidvalidity;
                if got != expected {
                    return Err(Error::UidValidityChangedError(side, got, expected).into());
                }
            }
        }

        let staged = File::create(&paths.staged)
            .map_err(|err| crate::state::Error::CreateStagedStateError(err, paths.staged.clone()))?;
        let journal = JournalWriter::open(&paths.journal, recovered, self.engine.fsync)
            .map_err(|err| crate::state::Error::CreateJournalError(err, paths.journal.clone()))?;
        self.staged = Some(staged);
        self.journal = Some(journal);
        self.paths = Some(paths);
        Ok(())
    }

    /// Computes the per-side open options from the channel
    /// operations and the loaded records, then hands them to the
    /// drivers, which may widen them.
    fn prepare_opts(&mut self) {
        let mut opts = compute_opts(self.chan);
        for record in self.state.live_records() {
            if record.expire_pending() {
                opts.slave |= OpenOptions::OLD | OpenOptions::FLAGS;
            }
            if record.tuid.is_some() {
                if record.uid.master == UidSlot::Pending {
                    opts.master |= OpenOptions::NEW | OpenOptions::FIND;
                    self.side_state.master |= SideState::FIND;
                } else if record.uid.slave == UidSlot::Pending {
                    opts.slave |= OpenOptions::NEW | OpenOptions::FIND;
                    self.side_state.slave |= SideState::FIND;
                }
            }
        }
        for side in SIDES {
            self.opts[side] = self.drv[side].prepare(opts[side]);
        }
    }

    /// Loads both mailboxes. When slave messages were ever expired,
    /// the master load is deferred until the slave is paired, so
    /// that a reduced range plus an explicit exception list can be
    /// requested instead of the full history.
    async fn load_boxes(&mut self) -> crate::Result<()> {
        let minwuid = BySide::from_fn(|side| {
            if self.opts[side].contains(OpenOptions::OLD) {
                1
            } else {
                u32::MAX
            }
        });
        if self.state.smaxxuid == 0 {
            let bounds = BySide::from_fn(|side| self.load_bounds(side, minwuid[side]));
            let newuid = self.state.newuid;
            let (master, slave) = self.drv.both_mut();
            let (m, s) = future::join(
                master.load(bounds.master.0, bounds.master.1, newuid.master, Vec::new()),
                slave.load(bounds.slave.0, bounds.slave.1, newuid.slave, Vec::new()),
            )
            .await;
            self.msgs.master = m.map_err(|err| Error::LoadMailboxError(err, Side::Master))?;
            self.msgs.slave = s.map_err(|err| Error::LoadMailboxError(err, Side::Slave))?;
            self.loaded(Side::Master).await;
            self.loaded(Side::Slave).await;
        } else {
            self.msgs.slave = self
                .load_one(Side::Slave, minwuid.slave, Vec::new())
                .await?;
            self.loaded(Side::Slave).await;
            let (minwuid, excs) = self.prepare_master_reload();
            self.msgs.master = self.load_one(Side::Master, minwuid, excs).await?;
            self.loaded(Side::Master).await;
        }
        Ok(())
    }

    /// The `[min, max]` load range for one side.
    fn load_bounds(&self, side: Side, mut minwuid: u32) -> (u32, u32) {
        let maxwuid = if self.opts[side].contains(OpenOptions::NEW) {
            minwuid = minwuid.min(self.state.maxuid[side].saturating_add(1));
            u32::MAX
        } else if self.opts[side].contains(OpenOptions::OLD) {
            self.state
                .live_records()
                .filter_map(|record| record.uid[side].uid())
                .max()
                .unwrap_or(0)
        } else {
            0
        };
        (minwuid, maxwuid)
    }

    async fn load_one(
        &mut self,
        side: Side,
        minwuid: u32,
        excs: Vec<u32>,
    ) -> crate::Result<Vec<Message>> {
        let (min, max) = self.load_bounds(side, minwuid);
        info!("loading {side}");
        debug!("loading {side} [{min},{max}] + {} exceptions", excs.len());
        let newuid = self.state.newuid[side];
        self.drv[side]
            .load(min, max, newuid, excs)
            .await
            .map_err(|err| Error::LoadMailboxError(err, side).into())
    }

    /// Post-load bookkeeping of one side: resolve pending
    /// tracking-id lookups, then pair messages with records by UID.
    async fn loaded(&mut self, side: Side) {
        self.side_state[side] |= SideState::LOADED;
        let (count, recent) = (self.boxes[side].count, self.boxes[side].recent);
        info!("{side}: {count} messages, {recent} recent");
        self.emit(SyncEvent::LoadedMailbox {
            side,
            count,
            recent,
        })
        .await;

        if self.side_state[side].contains(SideState::FIND) {
            self.side_state[side] -= SideState::FIND;
            debug!("matching previously copied messages on {side}");
            self.match_tuids(side);
        }
        debug!("matching messages on {side} against sync records");
        self.match_records(side);
    }

    /// Binds records with an in-flight copy to the message carrying
    /// their tracking id, or records the loss.
    fn match_tuids(&mut self, side: Side) {
        let mut num_lost = 0u32;
        let mut next_match = 0;
        for ridx in 0..self.state.records.len() {
            let record = &self.state.records[ridx];
            if record.is_dead() || record.uid[side] != UidSlot::Pending {
                continue;
            }
            let Some(tuid) = record.tuid else {
                continue;
            };
            debug!(
                "pair ({},{}): looking up {side}, TUID {tuid}",
                record.uid.master, record.uid.slave,
            );
            let scan = (next_match..self.msgs[side].len()).chain(0..next_match);
            let found = scan
                .filter(|&midx| {
                    let msg = &self.msgs[side][midx];
                    !msg.is_dead() && msg.srec.is_none() && msg.tuid == Some(tuid)
                })
                .next();
            match found {
                Some(midx) => {
                    let uid = self.msgs[side][midx].uid;
                    debug!("  -> new UID {uid}");
                    self.bind_uid(ridx, side, UidSlot::Bound(uid));
                    self.msgs[side][midx].srec = Some(ridx);
                    self.state.records[ridx].msg[side] = Some(midx);
                    next_match = midx + 1;
                }
                None => {
                    debug!("  -> TUID lost");
                    let key = self.record_key(ridx);
                    self.log_entry(Entry::LoseTuid {
                        master: key.0,
                        slave: key.1,
                    });
                    let record = &mut self.state.records[ridx];
                    record.flags = Flags::empty();
                    record.tuid = None;
                    num_lost += 1;
                }
            }
        }
        if num_lost > 0 {
            warn!(
                "lost track of {num_lost} {}ed message(s)",
                side.direction()
            );
            self.lost_tuids[side] += num_lost;
        }
    }

    /// Pairs loaded messages with records by UID.
    fn match_records(&mut self, side: Side) {
        let by_uid: HashMap<u32, usize> = self
            .state
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| !record.is_dead())
            .filter_map(|(ridx, record)| record.uid[side].uid().map(|uid| (uid, ridx)))
            .collect();
        for midx in 0..self.msgs[side].len() {
            let msg = &self.msgs[side][midx];
            if msg.srec.is_some() {
                // already claimed through its tracking id
                continue;
            }
            match by_uid.get(&msg.uid) {
                Some(&ridx) => {
                    debug!(
                        "  message {:5} pairs {}",
                        msg.uid,
                        self.state.records[ridx].uid[side.other()],
                    );
                    self.msgs[side][midx].srec = Some(ridx);
                    self.state.records[ridx].msg[side] = Some(midx);
                }
                None => debug!("  message {:5} is new", msg.uid),
            }
        }
    }

    /// Computes the reduced master load range plus the exception
    /// list of master UIDs which must be fetched although they lie
    /// below it, because their slave partner is still relevant.
    fn prepare_master_reload(&mut self) -> (u32, Vec<u32>) {
        debug!(
            "preparing master selection - max expired slave uid is {}",
            self.state.smaxxuid
        );
        let smaxxuid = i64::from(self.state.smaxxuid);
        let slave_old = self.opts.slave.contains(OpenOptions::OLD);
        let mut minwuid = i64::MAX;
        for record in &mut self.state.records {
            if record.is_dead() {
                continue;
            }
            if record.is_expired() {
                if record.uid.slave.raw() == 0 || (slave_old && record.msg.slave.is_none()) {
                    record.status |= RecordStatus::EXPIRED_ORPHAN;
                    continue;
                }
            } else if smaxxuid >= record.uid.slave.raw() {
                continue;
            }
            minwuid = minwuid.min(record.uid.master.raw());
        }
        debug!("  min non-orphaned master uid is {minwuid}");

        let master_old = self.opts.master.contains(OpenOptions::OLD);
        let master_new = self.opts.master.contains(OpenOptions::NEW);
        let maxuid_master = i64::from(self.state.maxuid.master);
        let mut excs = Vec::new();
        let mut kills = Vec::new();
        let mut orphans = Vec::new();
        for (ridx, record) in self.state.records.iter_mut().enumerate() {
            if record.is_dead() {
                continue;
            }
            if record.status.contains(RecordStatus::EXPIRED_ORPHAN) {
                record.status -= RecordStatus::EXPIRED_ORPHAN;
                if minwuid > record.uid.master.raw() && maxuid_master >= record.uid.master.raw() {
                    kills.push(ridx);
                } else if record.uid.slave.raw() != 0 {
                    orphans.push(ridx);
                }
            } else if minwuid > record.uid.master.raw() {
                if record.uid.slave.raw() < 0 {
                    if maxuid_master >= record.uid.master.raw() {
                        kills.push(ridx);
                    }
                } else if record.uid.master.raw() > 0
                    && record.uid.slave.raw() != 0
                    && master_old
                    && (!master_new || maxuid_master >= record.uid.master.raw())
                {
                    if let Some(uid) = record.uid.master.uid() {
                        excs.push(uid);
                    }
                }
            }
        }
        for ridx in kills {
            debug!("  -> killing {:?}", self.record_key(ridx));
            self.kill_record(ridx);
        }
        for ridx in orphans {
            debug!("  -> orphaning {:?}", self.record_key(ridx));
            self.bind_uid(ridx, Side::Slave, UidSlot::Gone);
        }
        excs.sort_unstable();
        debug!("  exception list is {excs:?}");
        let minwuid = minwuid.clamp(1, i64::from(u32::MAX)) as u32;
        (minwuid, excs)
    }

    /// Journals the UID validity baseline on the first run of a
    /// channel.
    fn record_uid_validity(&mut self) {
        if self.state.uidval.master.is_none() || self.state.uidval.slave.is_none() {
            let master = self.boxes.master.uidvalidity;
            let slave = self.boxes.slave.uidvalidity;
            self.state.uidval = BySide::new(Some(master), Some(slave));
            self.log_entry(Entry::UidValidity { master, slave });
        }
    }

    /// Kills a record: journals the tombstone and marks it dead.
    fn kill_record(&mut self, ridx: usize) {
        let (master, slave) = self.record_key(ridx);
        self.log_entry(Entry::Kill { master, slave });
        self.state.records[ridx].status = RecordStatus::DEAD;
    }

    /// Binds one UID slot of a record: journals the change under the
    /// current key, applies it, drops the tracking id and pushes the
    /// propagation frontier of the bound side forward.
    fn bind_uid(&mut self, ridx: usize, side: Side, slot: UidSlot) {
        let (master, slave) = self.record_key(ridx);
        self.log_entry(Entry::Bind {
            side,
            master,
            slave,
            uid: slot.raw(),
        });
        let record = &mut self.state.records[ridx];
        record.uid[side] = slot;
        record.tuid = None;
        if let Some(uid) = slot.uid() {
            if self.state.maxuid[side] < uid {
                self.state.maxuid[side] = uid;
                self.log_entry(Entry::MaxUid(side, uid));
            }
        }
    }

    /// Claims the source message for a record and pushes the source
    /// propagation frontier forward.
    fn note_propagated(&mut self, src: Side, midx: usize, ridx: usize) {
        if self.msgs[src][midx].srec.is_some() {
            return;
        }
        self.msgs[src][midx].srec = Some(ridx);
        self.state.records[ridx].msg[src] = Some(midx);
        let uid = self.msgs[src][midx].uid;
        if self.state.maxuid[src] < uid {
            self.state.maxuid[src] = uid;
            self.log_entry(Entry::MaxUid(src, uid));
        }
    }

    /// Fetches a message from `src`, prepares the body (tracking
    /// header, line endings) and stores it on the other side.
    async fn copy_message(
        &mut self,
        src: Side,
        midx: usize,
        tuid: Option<Tuid>,
        to_trash: bool,
    ) -> crate::Result<CopyOutcome> {
        let dst = src.other();
        let uid = self.msgs[src][midx].uid;
        let data = match self.drv[src].fetch_message(uid).await {
            Ok(data) => data,
            Err(driver::Error::MessageBad(err)) => {
                warn!("message {uid} disappeared from {src}: {err}");
                return Ok(CopyOutcome::NoGood);
            }
            Err(err) => return Err(Error::CopyMessageError(err, src, uid).into()),
        };
        {
            let msg = &mut self.msgs[src][midx];
            msg.flags = data.flags;
            msg.time = data.time.or(msg.time);
        }

        let src_crlf = self.drv[src].stores_crlf();
        let dst_crlf = self.drv[dst].stores_crlf();
        let body = match copy::prepare_copy(data.data, tuid.as_ref(), src_crlf, dst_crlf) {
            Ok(body) => body,
            Err(copy::Error::IncompleteHeaderError) => {
                warn!("message {uid} from {src} has an incomplete header");
                return Ok(CopyOutcome::NoGood);
            }
        };
        let outgoing = MessageData {
            data: body,
            flags: self.msgs[src][midx].flags,
            time: self.msgs[src][midx].time,
        };
        match self.drv[dst].store_message(outgoing, to_trash).await {
            Ok(new_uid) => Ok(CopyOutcome::Stored(new_uid)),
            Err(driver::Error::MessageBad(err)) => {
                warn!("{dst} refuses to store message {uid} from {src}: {err}");
                Ok(CopyOutcome::NoGood)
            }
            Err(err) => Err(Error::CopyMessageError(err, dst, uid).into()),
        }
    }

    /// The new-messages pass: propagates source messages without a
    /// binding on the target side, creating records and copying
    /// bodies. Pending placements of an interrupted run are resumed
    /// here with a fresh tracking id when their old one was lost.
    async fn sync_new(&mut self) -> crate::Result<()> {
        debug!("synchronizing new entries");
        self.first_new_rec = self.state.records.len();
        for t in SIDES {
            self.log_entry(Entry::NewUid(t, self.boxes[t].uidnext));
            let src = t.other();
            let ops = self.chan.ops(t);
            for midx in 0..self.msgs[src].len() {
                let (uid, flags, size, srec) = {
                    let msg = &self.msgs[src][midx];
                    (msg.uid, msg.flags, msg.size, msg.srec)
                };
                let wanted = match srec {
                    Some(ridx) => match self.state.records[ridx].uid[t] {
                        UidSlot::Refused => ops.contains(SyncOps::RENEW),
                        UidSlot::Pending => ops.contains(SyncOps::NEW),
                        _ => false,
                    },
                    None => ops.contains(SyncOps::NEW),
                };
                if !wanted {
                    continue;
                }
                debug!("new message {uid} on {src}");
                if ops.contains(SyncOps::EXPUNGE) && flags.contains(Flags::DELETED) {
                    debug!("  -> not {}ing - would be expunged anyway", t.direction());
                    continue;
                }
                let ridx = match srec {
                    Some(ridx) => {
                        self.state.records[ridx].status |= RecordStatus::DONE;
                        debug!("  -> pair {:?} exists", self.record_key(ridx));
                        ridx
                    }
                    None => {
                        let mut record = SyncRecord::default();
                        record.uid[src] = UidSlot::Bound(uid);
                        record.uid[t] = UidSlot::Pending;
                        record.status = RecordStatus::DONE;
                        self.state.records.push(record);
                        let ridx = self.state.records.len() - 1;
                        let (master, slave) = self.record_key(ridx);
                        self.log_entry(Entry::Create { master, slave });
                        debug!("  -> pair ({master},{slave}) created");
                        ridx
                    }
                };

                if !flags.contains(Flags::FLAGGED) && !self.chan.stores[t].accepts_size(size) {
                    if srec.is_some() {
                        debug!("  -> not {}ing - still too big", t.direction());
                    } else {
                        debug!("  -> not {}ing - too big", t.direction());
                        self.bind_uid(ridx, t, UidSlot::Refused);
                        self.note_propagated(src, midx, ridx);
                    }
                    continue;
                }

                if !flags.is_empty() {
                    let (master, slave) = self.record_key(ridx);
                    self.state.records[ridx].flags = flags;
                    self.log_entry(Entry::CommitFlags {
                        master,
                        slave,
                        flags,
                    });
                    debug!("  -> updated flags to {flags}");
                }
                let tuid = Tuid::generate();
                let (master, slave) = self.record_key(ridx);
                self.state.records[ridx].tuid = Some(tuid);
                self.log_entry(Entry::SetTuid {
                    master,
                    slave,
                    tuid,
                });
                if let Some(journal) = &mut self.journal {
                    journal.sync_for_copy();
                }
                debug!("  -> {}ing message, TUID {tuid}", t.direction());

                self.progress.new[t].total += 1;
                self.progressed().await;
                match self.copy_message(src, midx, Some(tuid), false).await? {
                    CopyOutcome::Stored(Some(new_uid)) => {
                        debug!("  -> new UID {new_uid}");
                        self.bind_uid(ridx, t, UidSlot::Bound(new_uid));
                        self.note_propagated(src, midx, ridx);
                    }
                    CopyOutcome::Stored(None) => {
                        self.side_state[t] |= SideState::FIND;
                        self.note_propagated(src, midx, ridx);
                    }
                    CopyOutcome::NoGood => {
                        debug!("  -> killing {:?}", self.record_key(ridx));
                        self.kill_record(ridx);
                        self.outcome |= SyncOutcome::NO_GOOD;
                    }
                }
                self.progress.new[t].done += 1;
                self.progressed().await;
            }
            self.side_state[t] |= SideState::SENT_NEW;

            if self.side_state[t].contains(SideState::FIND) {
                self.side_state[t] -= SideState::FIND;
                debug!("finding just copied messages on {t}");
                match self.drv[t].find_new_messages(self.boxes[t].uidnext).await {
                    Ok(found) => self.msgs[t].extend(found),
                    Err(driver::Error::MessageBad(err)) => {
                        warn!("cannot find newly stored messages on {t}: {err}");
                    }
                    Err(err) => return Err(Error::LoadMailboxError(err, t).into()),
                }
                debug!("matching just copied messages on {t}");
                self.match_tuids(t);
            }
            self.side_state[t] |= SideState::FOUND_NEW;
        }
        Ok(())
    }

    /// The old-records pass: detects vanished messages, propagates
    /// deletions, and computes the flag deltas of surviving pairs.
    async fn sync_old(&mut self) -> crate::Result<()> {
        debug!("synchronizing old entries");
        for ridx in 0..self.first_new_rec {
            if self.state.records[ridx]
                .status
                .intersects(RecordStatus::DEAD | RecordStatus::DONE)
            {
                continue;
            }
            let key = self.record_key(ridx);
            debug!("pair ({},{})", key.0, key.1);
            let no = BySide::from_fn(|side| {
                self.state.records[ridx].msg[side].is_none()
                    && self.opts[side].contains(OpenOptions::OLD)
            });
            if no.master && no.slave {
                debug!("  vanished");
                self.kill_record(ridx);
                continue;
            }
            let del =
                BySide::from_fn(|side| no[side] && self.state.records[ridx].uid[side].raw() > 0);

            for t in SIDES {
                {
                    let record = &mut self.state.records[ridx];
                    record.aflags[t] = Flags::empty();
                    record.dflags[t] = Flags::empty();
                }
                let msg_flags = self.state.records[ridx].msg[t].map(|midx| {
                    let msg = &self.msgs[t][midx];
                    (msg.flags, msg.status)
                });
                if let Some((flags, _)) = msg_flags {
                    if flags.contains(Flags::DELETED) {
                        self.state.records[ridx].status |= RecordStatus::del(t);
                    }
                }

                let record = &self.state.records[ridx];
                if record.uid[t] == UidSlot::Gone {
                    debug!("  no more {t}");
                } else if del[t.other()] {
                    // the partner was bound but is gone for good
                    if let Some((flags, status)) = msg_flags {
                        if status.contains(crate::message::MessageStatus::FLAGS_FETCHED)
                            && flags != record.flags
                        {
                            info!("conflicting changes in ({},{})", key.0, key.1);
                            self.emit(SyncEvent::ConflictingChanges {
                                master: key.0,
                                slave: key.1,
                            })
                            .await;
                        }
                    }
                    if self.chan.ops(t).contains(SyncOps::DELETE) {
                        debug!("  {}ing delete", t.direction());
                        self.progress.flags[t].total += 1;
                        self.progressed().await;
                        let uid = self.state.records[ridx].uid[t].uid().unwrap_or(0);
                        match self.drv[t]
                            .set_flags(uid, Flags::DELETED, Flags::empty())
                            .await
                        {
                            Ok(()) => {
                                self.state.records[ridx].status |= RecordStatus::del(t);
                                self.apply_msg_flags(ridx, t, Flags::DELETED, Flags::empty());
                                self.bind_uid(ridx, t.other(), UidSlot::Gone);
                            }
                            Err(driver::Error::MessageBad(err)) => {
                                debug!("cannot delete message {uid} on {t}: {err}");
                            }
                            Err(err) => {
                                return Err(Error::SetFlagsError(err, t, uid).into());
                            }
                        }
                        self.progress.flags[t].done += 1;
                        self.progressed().await;
                    } else {
                        debug!("  not {}ing delete", t.direction());
                    }
                } else if record.msg[t.other()].is_none() {
                    // partner not loaded, or placement never succeeded
                } else if record.uid[t].raw() < 0 {
                    // handled by the new-messages pass
                } else if !del[t] {
                    // both sides are grounded here: bound uid, live
                    // partner message
                    debug_assert!(record.uid[t].is_bound());
                    if self.chan.ops(t).contains(SyncOps::FLAGS) {
                        let omidx = record.msg[t.other()].unwrap_or_default();
                        let mut sflags = self.msgs[t.other()][omidx].flags;
                        if t == Side::Master
                            && record
                                .status
                                .intersects(RecordStatus::EXPIRE | RecordStatus::EXPIRED)
                        {
                            // expiry-driven deletion must not travel
                            sflags -= Flags::DELETED;
                        }
                        let record = &mut self.state.records[ridx];
                        record.aflags[t] = sflags - record.flags;
                        record.dflags[t] = record.flags - sflags;
                        debug!(
                            "  {}ing flags: +{} -{}",
                            t.direction(),
                            record.aflags[t],
                            record.dflags[t],
                        );
                    } else {
                        debug!("  not {}ing flags", t.direction());
                    }
                }
            }
        }
        Ok(())
    }

    /// The expiration pass: selects excess slave messages under the
    /// message-cap policy and journals the pending decisions.
    async fn schedule_expiration(&mut self) -> crate::Result<()> {
        if self.chan.max_messages == 0
            || !self
                .chan
                .ops(Side::Slave)
                .intersects(SyncOps::NEW | SyncOps::RENEW | SyncOps::FLAGS)
        {
            return Ok(());
        }
        expire::plan(
            &mut self.state.records,
            &self.msgs.slave,
            self.boxes.slave.count,
            self.progress.new.slave.total,
            self.chan.max_messages,
        );
        for ridx in 0..self.state.records.len() {
            let record = &self.state.records[ridx];
            if record
                .status
                .intersects(RecordStatus::DEAD | RecordStatus::DONE)
                || record.msg.slave.is_none()
            {
                continue;
            }
            let nex = record.new_expire.unwrap_or(false);
            if nex == record.status.contains(RecordStatus::EXPIRED) {
                continue;
            }
            let key = self.record_key(ridx);
            if nex != record.status.contains(RecordStatus::EXPIRE) {
                self.log_entry(Entry::SetExpire {
                    master: key.0,
                    slave: key.1,
                    expire: nex,
                });
                debug!("  pair ({},{}): expire {nex} (pre)", key.0, key.1);
                self.state.records[ridx].set_status(RecordStatus::EXPIRE, nex);
            } else {
                debug!("  pair ({},{}): expire {nex} (pending)", key.0, key.1);
            }
        }
        Ok(())
    }

    /// The flags pass: applies the computed per-side flag deltas,
    /// asserting or deasserting the deleted flag of expiring slave
    /// messages on the way, then commits flags and expiration state
    /// to the journal.
    async fn sync_flags(&mut self) -> crate::Result<()> {
        debug!("synchronizing flags");
        for ridx in 0..self.first_new_rec {
            if self.state.records[ridx]
                .status
                .intersects(RecordStatus::DEAD | RecordStatus::DONE)
            {
                continue;
            }
            for t in SIDES {
                let record = &self.state.records[ridx];
                let mut aflags = record.aflags[t];
                let mut dflags = record.dflags[t];
                if t == Side::Slave && record.expire_pending() {
                    if record.new_expire.unwrap_or(false) {
                        aflags |= Flags::DELETED;
                    } else {
                        dflags |= Flags::DELETED;
                    }
                }

                let msg_flags = record.msg[t].map(|midx| {
                    let msg = &self.msgs[t][midx];
                    (msg.flags, msg.status)
                });
                let current = msg_flags.map(|(flags, _)| flags).unwrap_or_default();
                let store = &self.chan.stores[t];
                if self.chan.ops(t).contains(SyncOps::EXPUNGE)
                    && ((current | aflags) - dflags).contains(Flags::DELETED)
                    && (store.trash.is_none() || store.trash_only_new)
                {
                    // flag sync on a doomed message is moot
                    let record = &mut self.state.records[ridx];
                    record.aflags[t] &= Flags::DELETED;
                    aflags &= Flags::DELETED;
                    record.dflags[t] = Flags::empty();
                    dflags = Flags::empty();
                }
                if let Some((flags, status)) = msg_flags {
                    if status.contains(crate::message::MessageStatus::FLAGS_FETCHED) {
                        aflags -= flags;
                        dflags &= flags;
                    }
                }

                if !aflags.is_empty() || !dflags.is_empty() {
                    self.progress.flags[t].total += 1;
                    self.progressed().await;
                    let uid = self.state.records[ridx].uid[t].uid().unwrap_or(0);
                    match self.drv[t].set_flags(uid, aflags, dflags).await {
                        Ok(()) => {
                            let record = &mut self.state.records[ridx];
                            if aflags.contains(Flags::DELETED) {
                                record.status |= RecordStatus::del(t);
                            } else if dflags.contains(Flags::DELETED) {
                                record.status -= RecordStatus::del(t);
                            }
                            self.apply_msg_flags(ridx, t, aflags, dflags);
                            self.commit_record_flags(ridx, t);
                        }
                        Err(driver::Error::MessageBad(err)) => {
                            debug!("cannot set flags of message {uid} on {t}: {err}");
                        }
                        Err(err) => return Err(Error::SetFlagsError(err, t, uid).into()),
                    }
                    self.progress.flags[t].done += 1;
                    self.progressed().await;
                } else {
                    self.commit_record_flags(ridx, t);
                }
            }
        }
        for t in SIDES {
            if let Err(err) = self.drv[t].commit().await {
                match err {
                    driver::Error::MessageBad(err) => {
                        warn!("cannot commit flag changes on {t}: {err}")
                    }
                    err => return Err(Error::CommitError(err, t).into()),
                }
            }
            self.side_state[t] |= SideState::SENT_FLAGS;
        }
        Ok(())
    }

    /// Reflects an applied flag mutation on the in-memory message,
    /// the way a driver updates a message it was handed directly.
    fn apply_msg_flags(&mut self, ridx: usize, t: Side, add: Flags, remove: Flags) {
        if let Some(midx) = self.state.records[ridx].msg[t] {
            let msg = &mut self.msgs[t][midx];
            msg.flags = (msg.flags | add) - remove;
        }
    }

    /// Journals the record's new flag ground truth, and on the slave
    /// the commit or cancellation of its expiration transition.
    fn commit_record_flags(&mut self, ridx: usize, t: Side) {
        let key = self.record_key(ridx);
        let record = &self.state.records[ridx];
        let nflags = (record.flags | record.aflags[t]) - record.dflags[t];
        if record.flags != nflags {
            debug!(
                "  pair ({},{}): updating flags ({} -> {nflags})",
                key.0, key.1, record.flags,
            );
            self.state.records[ridx].flags = nflags;
            self.log_entry(Entry::CommitFlags {
                master: key.0,
                slave: key.1,
                flags: nflags,
            });
        }
        if t != Side::Slave {
            return;
        }
        let record = &self.state.records[ridx];
        let nex = record.new_expire.unwrap_or(false);
        if nex != record.status.contains(RecordStatus::EXPIRED) {
            if nex && i64::from(self.state.smaxxuid) < record.uid.slave.raw() {
                self.state.smaxxuid = record.uid.slave.raw() as u32;
            }
            debug!("  pair ({},{}): expired {nex} (commit)", key.0, key.1);
            self.state.records[ridx].set_status(RecordStatus::EXPIRED, nex);
            self.log_entry(Entry::CommitExpire {
                master: key.0,
                slave: key.1,
            });
        } else if nex != record.status.contains(RecordStatus::EXPIRE) {
            debug!("  pair ({},{}): expire {nex} (cancel)", key.0, key.1);
            self.state.records[ridx].set_status(RecordStatus::EXPIRE, nex);
            self.log_entry(Entry::RevertExpire {
                master: key.0,
                slave: key.1,
            });
        }
    }

    /// The trash pass: moves doomed messages to the local trash, or
    /// copies them to the other side's trash when so configured.
    async fn sync_trash(&mut self) -> crate::Result<()> {
        for t in SIDES {
            let store = &self.chan.stores[t];
            let other_store = &self.chan.stores[t.other()];
            let local_trash = store.trash.is_some();
            let remote_trash = other_store.trash.is_some() && other_store.trash_remote_new;
            if self.chan.ops(t).contains(SyncOps::EXPUNGE) && (local_trash || remote_trash) {
                debug!("trashing on {t}");
                for midx in 0..self.msgs[t].len() {
                    let (uid, flags, size, srec) = {
                        let msg = &self.msgs[t][midx];
                        (msg.uid, msg.flags, msg.size, msg.srec)
                    };
                    if !flags.contains(Flags::DELETED) {
                        continue;
                    }
                    // unpaired or never placed on the other side
                    let newish = srec
                        .map(|ridx| self.state.records[ridx].uid[t.other()].raw() < 0)
                        .unwrap_or(true);
                    if local_trash {
                        if !self.chan.stores[t].trash_only_new || newish {
                            debug!("{t}: trashing message {uid}");
                            self.progress.trash[t].total += 1;
                            self.progressed().await;
                            match self.drv[t].trash_message(uid).await {
                                Ok(()) => {}
                                Err(driver::Error::MessageBad(err)) => {
                                    // a vanished message cannot stay untrashed
                                    return Err(Error::TrashMessageError(
                                        driver::Error::MailboxBad(err),
                                        t,
                                        uid,
                                    )
                                    .into());
                                }
                                Err(err) => {
                                    return Err(Error::TrashMessageError(err, t, uid).into())
                                }
                            }
                            self.progress.trash[t].done += 1;
                            self.progressed().await;
                        } else {
                            debug!("{t}: not trashing message {uid} - not new");
                        }
                    } else if newish {
                        if self.chan.stores[t.other()].accepts_size(size) {
                            debug!("{t}: remote trashing message {uid}");
                            self.progress.trash[t].total += 1;
                            self.progressed().await;
                            // raw copy: no record, no tracking header
                            self.copy_message(t, midx, None, true).await?;
                            self.progress.trash[t].done += 1;
                            self.progressed().await;
                        } else {
                            debug!("{t}: not remote trashing message {uid} - too big");
                        }
                    } else {
                        debug!("{t}: not remote trashing message {uid} - not new");
                    }
                }
            }
            self.side_state[t] |= SideState::SENT_TRASH;
        }
        Ok(())
    }

    /// The close pass: expunges and closes the sides the channel
    /// wants expunged.
    async fn close_boxes(&mut self) -> crate::Result<()> {
        for t in SIDES {
            if self.chan.ops(t).contains(SyncOps::EXPUNGE) {
                debug!("expunging {t}");
                self.drv[t]
                    .close()
                    .await
                    .map_err(|err| Error::CloseMailboxError(err, t))?;
                self.side_state[t] |= SideState::DID_EXPUNGE;
                self.emit(SyncEvent::ExpungedMailbox(t)).await;
            }
            self.side_state[t] |= SideState::CLOSED;
        }
        Ok(())
    }

    /// The record-pruning pass after expunging: tombstones records
    /// whose messages are gone on both sides, orphans the expunged
    /// side of the others.
    fn prune_records(&mut self) {
        let expunged =
            BySide::from_fn(|side| self.side_state[side].contains(SideState::DID_EXPUNGE));
        if !expunged.master && !expunged.slave {
            return;
        }

        let gone = |record: &SyncRecord, side: Side| {
            record.uid[side].raw() <= 0
                || (record.status.contains(RecordStatus::del(side)) && expunged[side])
        };

        let mut minwuid = i64::MAX;
        if self.state.smaxxuid > 0 {
            debug!(
                "preparing entry purge - max expired slave uid is {}",
                self.state.smaxxuid
            );
            let smaxxuid = i64::from(self.state.smaxxuid);
            for record in self.state.live_records() {
                let keepable = !(gone(record, Side::Slave)
                    && (gone(record, Side::Master) || record.is_expired()));
                if keepable
                    && smaxxuid < record.uid.slave.raw()
                    && minwuid > record.uid.master.raw()
                {
                    minwuid = record.uid.master.raw();
                }
            }
            debug!("  min non-orphaned master uid is {minwuid}");
        }

        let maxuid_master = i64::from(self.state.maxuid.master);
        for ridx in 0..self.state.records.len() {
            let record = &self.state.records[ridx];
            if record.is_dead() {
                continue;
            }
            if gone(record, Side::Slave) {
                if gone(record, Side::Master)
                    || (record.is_expired()
                        && maxuid_master >= record.uid.master.raw()
                        && minwuid > record.uid.master.raw())
                {
                    debug!("  -> killing {:?}", self.record_key(ridx));
                    self.kill_record(ridx);
                } else if record.uid.slave.raw() > 0 {
                    debug!("  -> orphaning {:?}", self.record_key(ridx));
                    self.bind_uid(ridx, Side::Slave, UidSlot::Gone);
                }
            } else if record.uid.master.raw() > 0
                && record.status.contains(RecordStatus::DEL_MASTER)
                && expunged.master
            {
                debug!("  -> orphaning {:?}", self.record_key(ridx));
                self.bind_uid(ridx, Side::Master, UidSlot::Gone);
            }
        }
    }

    /// Publishes the new state file and drops the journal.
    fn commit_state(&mut self) {
        let (Some(paths), Some(staged), Some(journal)) =
            (self.paths.take(), self.staged.take(), self.journal.take())
        else {
            debug_assert!(false, "committing before setup");
            return;
        };
        self.state.commit(&paths, staged, journal, self.engine);
    }
}

/// Computes the base per-side open options from the channel
/// operations alone.
fn compute_opts(chan: &ChannelConfig) -> BySide<OpenOptions> {
    let mut opts = BySide::<OpenOptions>::default();
    for t in SIDES {
        let ops = chan.ops(t);
        if ops.intersects(SyncOps::DELETE | SyncOps::FLAGS) {
            opts[t] |= OpenOptions::SET_FLAGS;
            opts[t.other()] |= OpenOptions::OLD;
            if ops.contains(SyncOps::FLAGS) {
                opts[t.other()] |= OpenOptions::FLAGS;
            }
        }
        if ops.intersects(SyncOps::NEW | SyncOps::RENEW) {
            opts[t] |= OpenOptions::APPEND;
            if ops.contains(SyncOps::RENEW) {
                opts[t.other()] |= OpenOptions::OLD;
            }
            if ops.contains(SyncOps::NEW) {
                opts[t.other()] |= OpenOptions::NEW;
            }
            if ops.contains(SyncOps::EXPUNGE) {
                opts[t.other()] |= OpenOptions::FLAGS;
            }
            if chan.stores[t].max_size.is_some() {
                opts[t.other()] |= OpenOptions::SIZE;
            }
        }
        if ops.contains(SyncOps::EXPUNGE) {
            opts[t] |= OpenOptions::EXPUNGE;
            let store = &chan.stores[t];
            let other_store = &chan.stores[t.other()];
            if store.trash.is_some() {
                if !store.trash_only_new {
                    opts[t] |= OpenOptions::OLD;
                }
                opts[t] |= OpenOptions::NEW | OpenOptions::FLAGS;
            } else if other_store.trash.is_some() && other_store.trash_remote_new {
                opts[t] |= OpenOptions::NEW | OpenOptions::FLAGS;
            }
        }
    }
    if chan
        .ops(Side::Slave)
        .intersects(SyncOps::NEW | SyncOps::RENEW)
        && chan.max_messages > 0
    {
        opts.slave |=
            OpenOptions::OLD | OpenOptions::NEW | OpenOptions::FLAGS | OpenOptions::TIME;
    }
    opts
}

#[cfg(test)]
mod tests {
    use crate::channel::StoreConfig;

    use super::*;

    fn channel(master_ops: SyncOps, slave_ops: SyncOps) -> ChannelConfig {
        ChannelConfig {
            ops: BySide::new(master_ops, slave_ops),
            ..Default::default()
        }
    }

    #[test]
    fn flags_ops_open_the_other_side() {
        let opts = compute_opts(&channel(SyncOps::FLAGS, SyncOps::empty()));
        assert_eq!(opts.master, OpenOptions::SET_FLAGS);
        assert_eq!(opts.slave, OpenOptions::OLD | OpenOptions::FLAGS);
    }

    #[test]
    fn new_ops_open_append_and_new() {
        let opts = compute_opts(&channel(SyncOps::empty(), SyncOps::NEW));
        assert_eq!(opts.slave, OpenOptions::APPEND);
        assert_eq!(opts.master, OpenOptions::NEW);
    }

    #[test]
    fn max_size_requests_sizes() {
        let mut chan = channel(SyncOps::empty(), SyncOps::NEW);
        chan.stores.slave = StoreConfig {
            max_size: Some(1024),
            ..Default::default()
        };
        let opts = compute_opts(&chan);
        assert!(opts.master.contains(OpenOptions::SIZE));
    }

    #[test]
    fn expunge_with_local_trash_loads_everything() {
        let mut chan = channel(SyncOps::empty(), SyncOps::EXPUNGE);
        chan.stores.slave = StoreConfig {
            trash: Some("Trash".into()),
            ..Default::default()
        };
        let opts = compute_opts(&chan);
        assert!(opts.slave.contains(
            OpenOptions::EXPUNGE | OpenOptions::OLD | OpenOptions::NEW | OpenOptions::FLAGS
        ));
    }

    #[test]
    fn max_messages_loads_the_whole_slave() {
        let mut chan = channel(SyncOps::empty(), SyncOps::NEW);
        chan.max_messages = 50;
        let opts = compute_opts(&chan);
        assert!(opts.slave.contains(
            OpenOptions::OLD | OpenOptions::NEW | OpenOptions::FLAGS | OpenOptions::TIME
        ));
    }
}
