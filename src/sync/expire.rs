//! Module dedicated to message-cap expiration.
//!
//! When a channel caps the number of slave messages, excess messages
//! are *expired*: flagged deleted on the slave while their record is
//! kept, so they are never copied again. Selection walks the slave
//! mailbox oldest-first and spares flagged, unread and unpaired
//! messages according to the rules below.

use log::debug;

use crate::flag::Flags;
use crate::message::{Message, MessageStatus};
use crate::state::record::{RecordStatus, SyncRecord};

/// Selects the slave messages to expire, marking their records with
/// a transient expiration decision.
///
/// `mailbox_count` is the slave's total at select time and
/// `new_total` the number of copies issued towards the slave this
/// run; together they give the logical message count the cap applies
/// to.
pub(crate) fn plan(
    records: &mut [SyncRecord],
    msgs: &[Message],
    mailbox_count: u32,
    new_total: u32,
    max_messages: u32,
) {
    let mut todel =
        i64::from(mailbox_count) + i64::from(new_total) - i64::from(max_messages);
    debug!("scheduling {todel} excess messages for expiration");

    // messages already headed for deletion count against the excess
    for msg in msgs {
        if todel <= 0 {
            break;
        }
        if msg.is_dead() {
            continue;
        }
        let Some(ridx) = msg.srec else {
            continue;
        };
        let record = &records[ridx];
        let nflags = (msg.flags | record.aflags.slave) - record.dflags.slave;
        if nflags.contains(Flags::DELETED)
            && !record
                .status
                .intersects(RecordStatus::EXPIRE | RecordStatus::EXPIRED)
        {
            todel -= 1;
        }
    }
    debug!("{todel} non-deleted excess messages");

    for msg in msgs {
        if msg.is_dead() {
            continue;
        }
        let ridx = match msg.srec {
            Some(ridx) if records[ridx].uid.master.raw() > 0 => ridx,
            // unpaired or master-less: the master side cleans these up
            _ => {
                todel -= 1;
                continue;
            }
        };
        let record = &mut records[ridx];
        let nflags = (msg.flags | record.aflags.slave) - record.dflags.slave;
        let expiring = record
            .status
            .intersects(RecordStatus::EXPIRE | RecordStatus::EXPIRED);
        if nflags.contains(Flags::DELETED) && !expiring {
            // already going away on its own
            continue;
        }
        if nflags.contains(Flags::FLAGGED) {
            todel -= 1;
            continue;
        }
        let seen_or_old =
            !msg.status.contains(MessageStatus::RECENT) || msg.flags.contains(Flags::SEEN);
        let already_expired = record
            .status
            .contains(RecordStatus::EXPIRE | RecordStatus::EXPIRED);
        let reverting = expiring && msg.flags.contains(Flags::DELETED);
        if seen_or_old && (todel > 0 || already_expired || reverting) {
            record.new_expire = Some(true);
            debug!("  pair ({},{})", record.uid.master, record.uid.slave);
            todel -= 1;
        }
    }
    debug!("{todel} excess messages remain");
}

#[cfg(test)]
mod tests {
    use crate::side::{BySide, Side};
    use crate::state::record::UidSlot;

    use super::*;

    fn pair(records: &mut Vec<SyncRecord>, msgs: &mut Vec<Message>, uid: u32, flags: Flags) {
        let mut msg = Message::new(uid, flags);
        msg.srec = Some(records.len());
        let mut record = SyncRecord::new(UidSlot::Bound(uid + 100), UidSlot::Bound(uid));
        record.flags = flags;
        record.msg = BySide::new(None, Some(msgs.len()));
        msgs.push(msg);
        records.push(record);
    }

    fn expirations(records: &[SyncRecord]) -> Vec<u32> {
        records
            .iter()
            .filter(|record| record.new_expire == Some(true))
            .filter_map(|record| record.uid[Side::Slave].uid())
            .collect()
    }

    #[test]
    fn oldest_seen_messages_expire_first() {
        let mut records = Vec::new();
        let mut msgs = Vec::new();
        for uid in 1..=4 {
            pair(&mut records, &mut msgs, uid, Flags::SEEN);
        }
        plan(&mut records, &msgs, 4, 0, 2);
        assert_eq!(expirations(&records), vec![1, 2]);
    }

    #[test]
    fn flagged_messages_are_spared() {
        let mut records = Vec::new();
        let mut msgs = Vec::new();
        pair(&mut records, &mut msgs, 1, Flags::SEEN | Flags::FLAGGED);
        for uid in 2..=4 {
            pair(&mut records, &mut msgs, uid, Flags::SEEN);
        }
        plan(&mut records, &msgs, 4, 0, 2);
        // the flagged message absorbs one excess slot without
        // expiring
        assert_eq!(expirations(&records), vec![2]);
    }

    #[test]
    fn recent_unseen_messages_are_spared() {
        let mut records = Vec::new();
        let mut msgs = Vec::new();
        pair(&mut records, &mut msgs, 1, Flags::empty());
        msgs[0].status |= MessageStatus::RECENT;
        for uid in 2..=4 {
            pair(&mut records, &mut msgs, uid, Flags::SEEN);
        }
        plan(&mut records, &msgs, 4, 0, 2);
        assert_eq!(expirations(&records), vec![2, 3]);
    }

    #[test]
    fn unpaired_messages_reduce_the_excess() {
        let mut records = Vec::new();
        let mut msgs = Vec::new();
        msgs.push(Message::new(1, Flags::SEEN));
        for uid in 2..=4 {
            pair(&mut records, &mut msgs, uid, Flags::SEEN);
        }
        plan(&mut records, &msgs, 4, 0, 3);
        assert_eq!(expirations(&records), vec![]);
    }

    #[test]
    fn already_expired_records_stay_expired() {
        let mut records = Vec::new();
        let mut msgs = Vec::new();
        for uid in 1..=2 {
            pair(&mut records, &mut msgs, uid, Flags::SEEN | Flags::DELETED);
        }
        records[0].status |= RecordStatus::EXPIRE | RecordStatus::EXPIRED;
        records[1].status |= RecordStatus::EXPIRE | RecordStatus::EXPIRED;
        plan(&mut records, &msgs, 2, 0, 5);
        // under the cap, but committed expirations are re-asserted
        assert_eq!(expirations(&records), vec![1, 2]);
    }

    #[test]
    fn deleted_messages_absorb_the_excess() {
        let mut records = Vec::new();
        let mut msgs = Vec::new();
        pair(&mut records, &mut msgs, 1, Flags::SEEN | Flags::DELETED);
        for uid in 2..=4 {
            pair(&mut records, &mut msgs, uid, Flags::SEEN);
        }
        plan(&mut records, &msgs, 4, 0, 3);
        assert_eq!(expirations(&records), vec![]);
    }
}
