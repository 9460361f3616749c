//! In-memory store driver used by the end-to-end tests.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use mailbox_sync::driver::{self, Driver, OpenOptions, SelectedMailbox};
use mailbox_sync::{
    BySide, ChannelConfig, EngineConfig, Flags, Message, MessageData, MessageStatus, StoreConfig,
    SyncOps, Tuid,
};

/// One message at rest in a [`MemStore`].
#[derive(Clone, Debug)]
pub struct StoredMessage {
    pub uid: u32,
    pub flags: Flags,
    pub body: Vec<u8>,
    pub recent: bool,
}

impl StoredMessage {
    /// The tracking id carried in the body's header section, if any.
    pub fn tuid(&self) -> Option<Tuid> {
        for line in self.body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.is_empty() {
                return None;
            }
            if let Some(rest) = line.strip_prefix(b"X-TUID: ".as_ref()) {
                return Tuid::try_from(rest).ok();
            }
        }
        None
    }
}

/// A trivially simple in-memory mailbox.
#[derive(Debug, Default)]
pub struct MemStore {
    pub msgs: Vec<StoredMessage>,
    pub trash: Vec<StoredMessage>,
    pub next_uid: u32,
    pub uidvalidity: u32,
    pub crlf: bool,
    /// Whether the store can report UIDs at append time.
    pub uid_on_store: bool,
}

impl MemStore {
    pub fn new(uidvalidity: u32) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            next_uid: 1,
            uidvalidity,
            uid_on_store: true,
            ..Default::default()
        }))
    }

    pub fn add(&mut self, flags: Flags, body: &[u8]) -> u32 {
        let uid = self.next_uid;
        self.next_uid += 1;
        self.msgs.push(StoredMessage {
            uid,
            flags,
            body: body.to_vec(),
            recent: false,
        });
        uid
    }

    /// Seeds a message with a fixed UID, for scenarios starting
    /// from existing sync state.
    pub fn add_at(&mut self, uid: u32, flags: Flags, body: &[u8]) {
        self.msgs.push(StoredMessage {
            uid,
            flags,
            body: body.to_vec(),
            recent: false,
        });
        self.next_uid = self.next_uid.max(uid + 1);
    }

    pub fn flags_by_uid(&self, uid: u32) -> Option<Flags> {
        self.msgs.iter().find(|m| m.uid == uid).map(|m| m.flags)
    }
}

/// The driver half: every operation works on the shared store.
pub struct MemDriver {
    store: Arc<Mutex<MemStore>>,
    opts: OpenOptions,
}

impl MemDriver {
    pub fn new(store: &Arc<Mutex<MemStore>>) -> Box<dyn Driver> {
        Box::new(Self {
            store: store.clone(),
            opts: OpenOptions::default(),
        })
    }
}

#[async_trait]
impl Driver for MemDriver {
    fn stores_crlf(&self) -> bool {
        self.store.lock().unwrap().crlf
    }

    fn prepare(&mut self, opts: OpenOptions) -> OpenOptions {
        self.opts = opts;
        opts
    }

    async fn select(&mut self, _mailbox: &str, _create: bool) -> driver::Result<SelectedMailbox> {
        let store = self.store.lock().unwrap();
        Ok(SelectedMailbox {
            uidvalidity: store.uidvalidity,
            uidnext: store.next_uid,
            count: store.msgs.len() as u32,
            recent: store.msgs.iter().filter(|m| m.recent).count() as u32,
        })
    }

    async fn load(
        &mut self,
        min_uid: u32,
        max_uid: u32,
        new_uid: u32,
        excs: Vec<u32>,
    ) -> driver::Result<Vec<Message>> {
        let store = self.store.lock().unwrap();
        let mut out = Vec::new();
        for stored in &store.msgs {
            if !(stored.uid >= min_uid && stored.uid <= max_uid) && !excs.contains(&stored.uid) {
                continue;
            }
            let mut msg = Message::new(stored.uid, stored.flags).with_size(stored.body.len());
            if stored.recent {
                msg = msg.with_status(MessageStatus::RECENT);
            }
            if self.opts.contains(OpenOptions::FIND) && stored.uid >= new_uid {
                if let Some(tuid) = stored.tuid() {
                    msg = msg.with_tuid(tuid);
                }
            }
            out.push(msg);
        }
        out.sort_by_key(|msg| msg.uid);
        Ok(out)
    }

    async fn fetch_message(&mut self, uid: u32) -> driver::Result<MessageData> {
        let store = self.store.lock().unwrap();
        let stored = store
            .msgs
            .iter()
            .find(|m| m.uid == uid)
            .ok_or_else(|| driver::Error::MessageBad(format!("no message {uid}")))?;
        Ok(MessageData {
            data: stored.body.clone(),
            flags: stored.flags,
            time: None,
        })
    }

    async fn store_message(
        &mut self,
        data: MessageData,
        to_trash: bool,
    ) -> driver::Result<Option<u32>> {
        let mut store = self.store.lock().unwrap();
        let uid = store.next_uid;
        store.next_uid += 1;
        let stored = StoredMessage {
            uid,
            flags: data.flags,
            body: data.data,
            recent: true,
        };
        if to_trash {
            store.trash.push(stored);
        } else {
            store.msgs.push(stored);
        }
        Ok(store.uid_on_store.then_some(uid))
    }

    async fn find_new_messages(&mut self, new_uid: u32) -> driver::Result<Vec<Message>> {
        let store = self.store.lock().unwrap();
        let mut out = Vec::new();
        for stored in &store.msgs {
            if stored.uid < new_uid {
                continue;
            }
            let mut msg = Message::new(stored.uid, stored.flags).with_size(stored.body.len());
            if let Some(tuid) = stored.tuid() {
                msg = msg.with_tuid(tuid);
            }
            out.push(msg);
        }
        out.sort_by_key(|msg| msg.uid);
        Ok(out)
    }

    async fn set_flags(&mut self, uid: u32, add: Flags, remove: Flags) -> driver::Result<()> {
        let mut store = self.store.lock().unwrap();
        let stored = store
            .msgs
            .iter_mut()
            .find(|m| m.uid == uid)
            .ok_or_else(|| driver::Error::MessageBad(format!("no message {uid}")))?;
        stored.flags = (stored.flags | add) - remove;
        Ok(())
    }

    async fn trash_message(&mut self, uid: u32) -> driver::Result<()> {
        let mut store = self.store.lock().unwrap();
        let pos = store
            .msgs
            .iter()
            .position(|m| m.uid == uid)
            .ok_or_else(|| driver::Error::MessageBad(format!("no message {uid}")))?;
        let stored = store.msgs.remove(pos);
        store.trash.push(stored);
        Ok(())
    }

    async fn commit(&mut self) -> driver::Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> driver::Result<()> {
        let mut store = self.store.lock().unwrap();
        store.msgs.retain(|m| !m.flags.contains(Flags::DELETED));
        Ok(())
    }

    async fn cancel(&mut self) {}
}

/// A channel over two in-memory stores, with the state directory
/// rooted under the given temporary path.
pub fn channel(master_ops: SyncOps, slave_ops: SyncOps) -> ChannelConfig {
    ChannelConfig {
        name: "test".into(),
        stores: BySide::new(
            StoreConfig {
                name: "master".into(),
                ..Default::default()
            },
            StoreConfig {
                name: "slave".into(),
                ..Default::default()
            },
        ),
        boxes: BySide::new(None, None),
        ops: BySide::new(master_ops, slave_ops),
        max_messages: 0,
        sync_state: None,
    }
}

pub fn engine(tmp: &Path) -> EngineConfig {
    EngineConfig {
        sync_state_dir: tmp.join("sync-state"),
        ..Default::default()
    }
}

/// The state file path [`engine`] and [`channel`] resolve to.
pub fn state_path(tmp: &Path) -> std::path::PathBuf {
    tmp.join("sync-state").join(":master:INBOX_:slave:INBOX")
}
