//! Module dedicated to the persistent sync state.
//!
//! Every channel owns a small set of files on the local filesystem:
//! the authoritative *state file*, an append-only *journal* of the
//! current run, a *staged state file* the next state is written to,
//! and an advisory *lock file*. A run mutates stores only after the
//! corresponding journal entry is durable, writes the staged file at
//! the end, then publishes it with a rename, the linearization
//! point, and finally unlinks the journal.

pub mod journal;
pub mod record;

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use advisory_lock::{AdvisoryFileLock, FileLockError, FileLockMode};
use log::{debug, error, warn};
use thiserror::Error;

use crate::channel::{ChannelConfig, EngineConfig};
use crate::flag::Flags;
use crate::side::BySide;

use self::journal::{Entry, JournalWriter};
use self::record::{RecordStatus, SyncRecord, UidSlot};

/// The file name of in-box sync state, relative to the slave store
/// path.
const IN_BOX_STATE_FILE: &str = ".mbsyncstate";

/// Errors related to the sync-state store.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read sync state {1}")]
    ReadStateError(#[source] io::Error, PathBuf),
    #[error("cannot read sync state {0}: incomplete header")]
    IncompleteStateHeaderError(PathBuf),
    #[error("cannot read sync state {0}: invalid header")]
    InvalidStateHeaderError(PathBuf),
    #[error("cannot read sync state entry at {0}:{1}")]
    InvalidStateEntryError(PathBuf, usize),
    #[error("cannot use store {0} for in-box sync state: store has no path")]
    MissingStorePathError(String),
    #[error("cannot use sync state location {0}: no directory part")]
    InvalidStateLocationError(String),
    #[error("cannot create sync state directory {1}")]
    CreateStateDirError(#[source] io::Error, PathBuf),
    #[error("cannot create lock file {1}")]
    CreateLockFileError(#[source] io::Error, PathBuf),
    #[error("cannot lock channel: {1} is locked by another run")]
    ChannelLockedError(#[source] FileLockError, PathBuf),
    #[error("cannot read journal {1}")]
    ReadJournalError(#[source] io::Error, PathBuf),
    #[error(transparent)]
    JournalError(#[from] journal::Error),
    #[error("cannot create staged sync state {1}")]
    CreateStagedStateError(#[source] io::Error, PathBuf),
    #[error("cannot create journal {1}")]
    CreateJournalError(#[source] io::Error, PathBuf),
}

/// Aborts the process on a state or journal write failure.
///
/// The stores have not been touched for the entry that failed to
/// persist, so the on-disk state is still consistent at this point.
pub(crate) fn die_on_disk_error(target: &str, err: io::Error) -> ! {
    error!("cannot write {target}: {err} (disk full?)");
    std::process::exit(1);
}

/// The four per-channel file paths.
#[derive(Clone, Debug)]
pub struct StatePaths {
    /// The authoritative state file.
    pub state: PathBuf,
    /// The append-only journal.
    pub journal: PathBuf,
    /// The staged replacement state file.
    pub staged: PathBuf,
    /// The advisory lock file.
    pub lock: PathBuf,
}

impl StatePaths {
    pub fn new(state: PathBuf) -> Self {
        let mut journal = state.clone().into_os_string();
        journal.push(".journal");
        let mut staged = state.clone().into_os_string();
        staged.push(".new");
        let mut lock = state.clone().into_os_string();
        lock.push(".lock");
        Self {
            state,
            journal: journal.into(),
            staged: staged.into(),
            lock: lock.into(),
        }
    }

    /// Computes the channel's state file location and creates its
    /// directory when missing.
    pub fn locate(
        engine: &EngineConfig,
        chan: &ChannelConfig,
        names: &BySide<String>,
        slave_path: Option<&Path>,
    ) -> Result<Self, Error> {
        let state = match chan.sync_state.as_deref() {
            Some("*") => {
                let path = slave_path
                    .ok_or_else(|| Error::MissingStorePathError(chan.stores.slave.name.clone()))?;
                path.join(IN_BOX_STATE_FILE)
            }
            Some(prefix) => {
                let location = format!("{prefix}{}", clean_name(&names.slave));
                create_parent_dir(&location)?;
                PathBuf::from(location)
            }
            None => {
                let file = format!(
                    ":{}:{}_:{}:{}",
                    chan.stores.master.name,
                    clean_name(&names.master),
                    chan.stores.slave.name,
                    clean_name(&names.slave),
                );
                let location = engine.sync_state_dir.join(file);
                create_state_dir(&engine.sync_state_dir)?;
                location
            }
        };
        Ok(Self::new(state))
    }
}

/// Replaces the path separator in mailbox names used inside state
/// file names.
fn clean_name(name: &str) -> String {
    name.replace('/', "!")
}

fn create_parent_dir(location: &str) -> Result<(), Error> {
    let (dir, _) = location
        .rsplit_once('/')
        .ok_or_else(|| Error::InvalidStateLocationError(location.to_owned()))?;
    create_state_dir(Path::new(dir))
}

fn create_state_dir(dir: &Path) -> Result<(), Error> {
    let mut builder = fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    match builder.create(dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(err) => Err(Error::CreateStateDirError(err, dir.to_owned())),
    }
}

/// The advisory, per-channel exclusive lock.
///
/// Exactly one engine instance may operate on a channel at a time;
/// a held lock aborts the run before any side effect.
pub struct ChannelLock {
    file: File,
    path: PathBuf,
}

impl ChannelLock {
    pub fn acquire(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(path)
            .map_err(|err| Error::CreateLockFileError(err, path.to_owned()))?;
        AdvisoryFileLock::try_lock(&file, FileLockMode::Exclusive)
            .map_err(|err| Error::ChannelLockedError(err, path.to_owned()))?;
        Ok(Self {
            file,
            path: path.to_owned(),
        })
    }

    /// Removes the lock file and releases the lock.
    pub fn release(self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!("cannot remove lock file {}: {err}", self.path.display());
        }
        drop(self.file);
    }
}

/// The in-memory sync state of one channel.
#[derive(Debug, Default)]
pub struct SyncState {
    /// The sync records, in insertion order. New records go to the
    /// tail.
    pub records: Vec<SyncRecord>,

    /// UID validity of the last successful run, per side.
    pub uidval: BySide<Option<u32>>,

    /// Highest UID already considered for propagation, per side.
    pub maxuid: BySide<u32>,

    /// Smallest UID at which tracking-id matching is still
    /// meaningful, per side.
    pub newuid: BySide<u32>,

    /// Highest slave UID ever expired by the message-cap policy.
    pub smaxxuid: u32,

    /// Most recently used record, where journal replay resumes its
    /// key search.
    mru: usize,
}

impl SyncState {
    /// Loads the state file, or returns an empty state when the
    /// channel was never synchronized.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(Error::ReadStateError(err, path.to_owned())),
        };
        debug!("reading sync state {}", path.display());

        let mut state = Self::default();
        let mut lines = LineReader::new(&content);
        let header = lines
            .next()
            .ok_or_else(|| Error::IncompleteStateHeaderError(path.to_owned()))?
            .map_err(|()| Error::IncompleteStateHeaderError(path.to_owned()))?;
        state
            .parse_header(header)
            .ok_or_else(|| Error::InvalidStateHeaderError(path.to_owned()))?;

        let mut line_no = 1;
        for line in lines {
            line_no += 1;
            let line =
                line.map_err(|()| Error::InvalidStateEntryError(path.to_owned(), line_no))?;
            let record = parse_record_line(line)
                .ok_or_else(|| Error::InvalidStateEntryError(path.to_owned(), line_no))?;
            if !record.uid.master.is_bound()
                && !record.uid.slave.is_bound()
                && record.uid.master != UidSlot::Pending
                && record.uid.slave != UidSlot::Pending
            {
                // groundless entry, e.g. from a hand-edited file
                warn!(
                    "dropping sync state entry ({},{}) with no message on either side",
                    record.uid.master, record.uid.slave
                );
                continue;
            }
            debug!(
                "  entry ({},{},{},{})",
                record.uid.master,
                record.uid.slave,
                record.flags,
                if record.is_expired() { "X" } else { "" },
            );
            state.records.push(record);
        }
        Ok(state)
    }

    fn parse_header(&mut self, header: &str) -> Option<()> {
        let (master, slave) = header.split_once(' ')?;
        let (uv_m, max_m) = master.split_once(':')?;
        self.uidval.master = Some(uv_m.parse().ok()?);
        self.maxuid.master = max_m.parse().ok()?;
        let mut slave = slave.splitn(3, ':');
        self.uidval.slave = Some(slave.next()?.parse().ok()?);
        self.smaxxuid = slave.next()?.parse().ok()?;
        self.maxuid.slave = slave.next()?.parse().ok()?;
        Some(())
    }

    /// Replays the journal of an interrupted run on top of the
    /// loaded state.
    pub fn replay_journal(&mut self, path: &Path) -> Result<(), Error> {
        let content =
            fs::read_to_string(path).map_err(|err| Error::ReadJournalError(err, path.to_owned()))?;
        debug!("recovering journal {}", path.display());

        let mut lines = LineReader::new(&content);
        let version = lines
            .next()
            .ok_or_else(|| journal::Error::IncompleteHeaderError(path.display().to_string()))?
            .map_err(|()| journal::Error::IncompleteHeaderError(path.display().to_string()))?;
        if version != journal::VERSION {
            return Err(journal::Error::IncompatibleVersionError(version.to_owned()).into());
        }

        let mut line_no = 1;
        for line in lines {
            line_no += 1;
            let line = line.map_err(|()| {
                journal::Error::MalformedEntryError(line_no, "<unterminated>".into())
            })?;
            let entry = Entry::parse(line, line_no)?;
            self.apply(&entry, line_no)?;
        }
        Ok(())
    }

    /// Applies one journal entry.
    pub fn apply(&mut self, entry: &Entry, line_no: usize) -> Result<(), Error> {
        match *entry {
            Entry::UidValidity { master, slave } => {
                self.uidval = BySide::new(Some(master), Some(slave));
            }
            Entry::MaxUid(side, uid) => self.maxuid[side] = uid,
            Entry::NewUid(side, uid) => self.newuid[side] = uid,
            Entry::Create { master, slave } => {
                let malformed =
                    || journal::Error::MalformedEntryError(line_no, entry.to_string());
                let record = SyncRecord::new(
                    UidSlot::from_raw(master).map_err(|_| malformed())?,
                    UidSlot::from_raw(slave).map_err(|_| malformed())?,
                );
                debug!("  new entry ({master},{slave})");
                self.records.push(record);
                self.mru = self.records.len() - 1;
            }
            _ => {
                let Some((master, slave)) = entry.record_key() else {
                    debug_assert!(false, "non-record opcode fell through");
                    return Ok(());
                };
                let idx = self
                    .find_record(master, slave)
                    .ok_or(journal::Error::UnknownRecordError(line_no, master, slave))?;
                let record = &mut self.records[idx];
                match *entry {
                    Entry::Kill { .. } => {
                        debug!("  entry ({master},{slave}) killed");
                        record.status = RecordStatus::DEAD;
                    }
                    Entry::SetTuid { tuid, .. } => {
                        debug!("  entry ({master},{slave}) TUID now {tuid}");
                        record.tuid = Some(tuid);
                    }
                    Entry::LoseTuid { .. } => {
                        debug!("  entry ({master},{slave}) TUID lost");
                        record.flags = Flags::empty();
                        record.tuid = None;
                    }
                    Entry::Bind { side, uid, .. } => {
                        debug!("  entry ({master},{slave}) {side} now {uid}");
                        let malformed =
                            || journal::Error::MalformedEntryError(line_no, entry.to_string());
                        record.uid[side] = UidSlot::from_raw(uid).map_err(|_| malformed())?;
                        record.tuid = None;
                    }
                    Entry::CommitFlags { flags, .. } => {
                        debug!("  entry ({master},{slave}) flags now {flags}");
                        record.flags = flags;
                    }
                    Entry::SetExpire { expire, .. } => {
                        debug!("  entry ({master},{slave}) expire now {expire}");
                        record.set_status(RecordStatus::EXPIRE, expire);
                    }
                    Entry::RevertExpire { .. } => {
                        let expired = record.status.contains(RecordStatus::EXPIRED);
                        debug!("  entry ({master},{slave}) expire back to {expired}");
                        record.set_status(RecordStatus::EXPIRE, expired);
                    }
                    Entry::CommitExpire { .. } => {
                        let expire = record.status.contains(RecordStatus::EXPIRE);
                        debug!("  entry ({master},{slave}) expired now {expire}");
                        if expire {
                            if i64::from(self.smaxxuid) < record.uid.slave.raw() {
                                self.smaxxuid = record.uid.slave.raw() as u32;
                            }
                            record.status |= RecordStatus::EXPIRED;
                        } else {
                            record.status -= RecordStatus::EXPIRED;
                        }
                    }
                    _ => unreachable!("handled above"),
                }
            }
        }
        Ok(())
    }

    /// Finds the record with the given raw UID pair, starting at the
    /// most recently used one and wrapping around once.
    fn find_record(&mut self, master: i64, slave: i64) -> Option<usize> {
        let len = self.records.len();
        for offset in 0..len {
            let idx = (self.mru + offset) % len;
            let record = &self.records[idx];
            if record.uid.master.raw() == master && record.uid.slave.raw() == slave {
                self.mru = idx;
                return Some(idx);
            }
        }
        None
    }

    /// Serializes the state, skipping tombstoned records.
    pub fn serialize(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}:{} {}:{}:{}",
            self.uidval.master.map(i64::from).unwrap_or(-1),
            self.maxuid.master,
            self.uidval.slave.map(i64::from).unwrap_or(-1),
            self.smaxxuid,
            self.maxuid.slave,
        )?;
        for record in self.records.iter().filter(|record| !record.is_dead()) {
            writeln!(
                w,
                "{} {} {}{}",
                record.uid.master,
                record.uid.slave,
                if record.is_expired() { "X" } else { "" },
                record.flags,
            )?;
        }
        Ok(())
    }

    /// Writes the staged state file, flushing it per the configured
    /// fsync level, then publishes it over the authoritative state
    /// and drops the journal. The rename is the linearization point.
    pub fn commit(
        &self,
        paths: &StatePaths,
        staged: File,
        journal: JournalWriter,
        engine: &EngineConfig,
    ) {
        let mut staged = staged;
        if let Err(err) = self.serialize(&mut staged) {
            die_on_disk_error("sync state", err);
        }
        if let Err(err) = staged.flush() {
            die_on_disk_error("sync state", err);
        }
        if engine.fsync >= crate::channel::FsyncLevel::Normal {
            if let Err(err) = staged.sync_data() {
                die_on_disk_error("sync state", err);
            }
        }
        drop(staged);
        drop(journal);
        if engine.keep_journal {
            return;
        }
        // order is important: publish first, forget second
        if let Err(err) = fs::rename(&paths.staged, &paths.state) {
            die_on_disk_error("sync state", err);
        }
        if let Err(err) = fs::remove_file(&paths.journal) {
            warn!("cannot remove journal {}: {err}", paths.journal.display());
        }
    }

    /// Whether a record survives compaction, i.e. will appear in the
    /// next state file.
    pub fn live_records(&self) -> impl Iterator<Item = &SyncRecord> {
        self.records.iter().filter(|record| !record.is_dead())
    }
}

fn parse_record_line(line: &str) -> Option<SyncRecord> {
    let mut tokens = line.split_whitespace();
    let master: i64 = tokens.next()?.parse().ok()?;
    let slave: i64 = tokens.next()?.parse().ok()?;
    let mut record = SyncRecord::new(
        UidSlot::from_raw(master).ok()?,
        UidSlot::from_raw(slave).ok()?,
    );
    if let Some(mut flags) = tokens.next() {
        if let Some(rest) = flags.strip_prefix('X') {
            record.status = RecordStatus::EXPIRE | RecordStatus::EXPIRED;
            flags = rest;
        }
        record.flags = Flags::from_letters(flags).ok()?;
    }
    if tokens.next().is_some() {
        return None;
    }
    Some(record)
}

/// Iterates over `\n`-terminated lines, yielding `Err(())` for an
/// unterminated trailing fragment, which means the file was torn
/// mid-write.
struct LineReader<'a> {
    rest: &'a str,
}

impl<'a> LineReader<'a> {
    fn new(content: &'a str) -> Self {
        Self { rest: content }
    }
}

impl<'a> Iterator for LineReader<'a> {
    type Item = Result<&'a str, ()>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        match self.rest.split_once('\n') {
            Some((line, rest)) => {
                self.rest = rest;
                Some(Ok(line))
            }
            None => {
                self.rest = "";
                Some(Err(()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::message::Tuid;
    use crate::side::Side;

    use super::*;

    fn write_state(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("state");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn load_missing_state_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = SyncState::load(&dir.path().join("none")).unwrap();
        assert!(state.records.is_empty());
        assert_eq!(state.uidval.master, None);
    }

    #[test]
    fn load_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_state(dir.path(), "41:7 42:3:9\n1 1 S\n5 6 XFS\n-1 7 \n");
        let state = SyncState::load(&path).unwrap();
        assert_eq!(state.uidval, BySide::new(Some(41), Some(42)));
        assert_eq!(state.maxuid, BySide::new(7, 9));
        assert_eq!(state.smaxxuid, 3);
        assert_eq!(state.records.len(), 3);
        assert_eq!(state.records[0].flags, Flags::SEEN);
        assert!(state.records[1].is_expired());
        assert_eq!(state.records[2].uid.master, UidSlot::Refused);
        assert_eq!(state.records[2].flags, Flags::empty());
    }

    #[test]
    fn load_rejects_corrupt_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_state(dir.path(), "garbage\n");
        assert!(SyncState::load(&path).is_err());
        let path = write_state(dir.path(), "1:2 3:4\n");
        assert!(SyncState::load(&path).is_err());
    }

    #[test]
    fn load_rejects_torn_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_state(dir.path(), "1:2 3:0:4\n1 1 S");
        assert!(SyncState::load(&path).is_err());
    }

    #[test]
    fn load_drops_groundless_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_state(dir.path(), "1:2 3:0:4\n0 0 \n0 -1 \n1 0 S\n");
        let state = SyncState::load(&path).unwrap();
        assert_eq!(state.records.len(), 1);
        assert_eq!(state.records[0].uid.master, UidSlot::Bound(1));
    }

    #[test]
    fn serialize_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let content = "41:7 42:3:9\n1 1 S\n5 6 XFS\n-1 7 \n0 9 DT\n";
        let path = write_state(dir.path(), content);
        let state = SyncState::load(&path).unwrap();
        let mut out = Vec::new();
        state.serialize(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), content);
    }

    #[test]
    fn serialize_skips_dead_records() {
        let mut state = SyncState {
            uidval: BySide::new(Some(1), Some(1)),
            ..Default::default()
        };
        state
            .records
            .push(SyncRecord::new(UidSlot::Bound(1), UidSlot::Bound(2)));
        state
            .records
            .push(SyncRecord::new(UidSlot::Bound(3), UidSlot::Bound(4)));
        state.records[1].status = RecordStatus::DEAD;
        let mut out = Vec::new();
        state.serialize(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1:0 1:0:0\n1 2 \n");
    }

    fn journal_fixture() -> (SyncState, Vec<Entry>) {
        let dir = tempfile::tempdir().unwrap();
        let path = write_state(dir.path(), "1:4 1:0:6\n1 1 S\n2 2 FS\n4 6 S\n");
        let state = SyncState::load(&path).unwrap();
        let tuid = Tuid::try_from("AAAABBBBCCCC").unwrap();
        let entries = vec![
            Entry::NewUid(Side::Master, 5),
            Entry::NewUid(Side::Slave, 7),
            Entry::Create {
                master: 5,
                slave: -2,
            },
            Entry::CommitFlags {
                master: 5,
                slave: -2,
                flags: Flags::SEEN,
            },
            Entry::SetTuid {
                master: 5,
                slave: -2,
                tuid,
            },
            Entry::Bind {
                side: Side::Slave,
                master: 5,
                slave: -2,
                uid: 7,
            },
            Entry::MaxUid(Side::Master, 5),
            Entry::MaxUid(Side::Slave, 7),
            Entry::CommitFlags {
                master: 1,
                slave: 1,
                flags: Flags::SEEN | Flags::ANSWERED,
            },
            Entry::SetExpire {
                master: 2,
                slave: 2,
                expire: true,
            },
            Entry::CommitExpire {
                master: 2,
                slave: 2,
            },
            Entry::Kill {
                master: 4,
                slave: 6,
            },
        ];
        (state, entries)
    }

    fn live_pairs(state: &SyncState) -> Vec<(i64, i64, Flags, bool)> {
        state
            .live_records()
            .map(|record| {
                (
                    record.uid.master.raw(),
                    record.uid.slave.raw(),
                    record.flags,
                    record.is_expired(),
                )
            })
            .collect()
    }

    #[test]
    fn journal_replay_applies_every_opcode() {
        let (mut state, entries) = journal_fixture();
        for (line_no, entry) in entries.iter().enumerate() {
            state.apply(entry, line_no + 2).unwrap();
        }
        assert_eq!(state.newuid, BySide::new(5, 7));
        assert_eq!(state.maxuid, BySide::new(5, 7));
        assert_eq!(state.smaxxuid, 2);
        assert_eq!(
            live_pairs(&state),
            vec![
                (1, 1, Flags::SEEN | Flags::ANSWERED, false),
                (2, 2, Flags::FLAGGED | Flags::SEEN, true),
                (5, 7, Flags::SEEN, false),
            ],
        );
    }

    #[test]
    fn journal_replay_rejects_unknown_records() {
        let (mut state, _) = journal_fixture();
        let err = state
            .apply(
                &Entry::Kill {
                    master: 9,
                    slave: 9,
                },
                2,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::JournalError(journal::Error::UnknownRecordError(2, 9, 9))
        ));
    }

    proptest! {
        /// Replay is resumable: applying a prefix, then the rest,
        /// always converges on the same live record set as applying
        /// the whole journal in one go.
        #[test]
        fn journal_replay_prefixes_converge(split in 0usize..=12) {
            let (mut whole, entries) = journal_fixture();
            for (line_no, entry) in entries.iter().enumerate() {
                whole.apply(entry, line_no + 2).unwrap();
            }

            let (mut resumed, _) = journal_fixture();
            let split = split.min(entries.len());
            for (line_no, entry) in entries[..split].iter().enumerate() {
                resumed.apply(entry, line_no + 2).unwrap();
            }
            for (line_no, entry) in entries[split..].iter().enumerate() {
                resumed.apply(entry, split + line_no + 2).unwrap();
            }

            prop_assert_eq!(live_pairs(&resumed), live_pairs(&whole));
            prop_assert_eq!(resumed.maxuid, whole.maxuid);
            prop_assert_eq!(resumed.newuid, whole.newuid);
            prop_assert_eq!(resumed.smaxxuid, whole.smaxxuid);
        }
    }
}
