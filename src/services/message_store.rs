//! Durable, ordered persistence of messages.
//!
//! The store is the single source of truth: writers only ever append rows or
//! flip `read_at`/`deleted`, never rewrite a body, so concurrent readers
//! cannot observe a half-written message. Authoritative order within a room
//! is `(created_at, id)` ascending; transport delivery order is only a
//! low-latency hint on top of this.

use crate::error::{AppError, AppResult};
use crate::models::message::{Attachment, AttachmentKind, Message, NewMessage, RoomSummary};
use crate::services::encryption::EncryptionCodec;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new message. The server assigns `id` and `created_at`; the
    /// body goes through the codec before it is written.
    async fn append(&self, new: NewMessage) -> AppResult<Message>;

    /// All messages of a room in ascending `(created_at, id)` order, bodies
    /// decrypted. Soft-deleted rows are included and flagged; projections
    /// that face the counterparty must filter them out.
    async fn list_by_room(
        &self,
        room_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<Message>>;

    /// Stamp `read_at` on every unread message addressed to `reader_id` in
    /// the room. Idempotent; returns the number of rows updated.
    async fn mark_read(&self, room_id: &str, reader_id: &str) -> AppResult<u64>;

    /// Soft-delete a message. Only the sender may delete their own message;
    /// anyone else gets `PermissionDenied`. The row is never removed.
    async fn mark_deleted(&self, message_id: Uuid, requester_id: &str) -> AppResult<()>;

    /// Per-room aggregates for every room pairing the operator with a
    /// counterparty: latest non-deleted message, latest activity timestamp
    /// and the unread-for-operator count.
    async fn room_summaries(&self, operator_id: &str) -> AppResult<Vec<RoomSummary>>;
}

fn attachment_from_columns(url: Option<String>, kind: Option<String>) -> Option<Attachment> {
    let url = url?;
    let kind = kind.as_deref().and_then(AttachmentKind::parse)?;
    Some(Attachment { url, kind })
}

// ---------------------------------------------------------------------------
// PostgreSQL store
// ---------------------------------------------------------------------------

pub struct PgMessageStore {
    pool: Pool,
    codec: EncryptionCodec,
}

impl PgMessageStore {
    pub fn new(pool: Pool, codec: EncryptionCodec) -> Self {
        Self { pool, codec }
    }

    fn message_from_row(&self, row: &tokio_postgres::Row) -> Message {
        let body: String = row.get("body");
        Message {
            id: row.get("id"),
            room_id: row.get("room_id"),
            sender_id: row.get("sender_id"),
            receiver_id: row.get("receiver_id"),
            body: self.codec.decrypt(&body),
            attachment: attachment_from_columns(
                row.get("attachment_url"),
                row.get("attachment_kind"),
            ),
            read_at: row.get("read_at"),
            deleted: row.get("deleted"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn append(&self, new: NewMessage) -> AppResult<Message> {
        let id = Uuid::new_v4();
        let envelope = self.codec.encrypt(&new.body);
        let attachment_url = new.attachment.as_ref().map(|a| a.url.clone());
        let attachment_kind = new.attachment.as_ref().map(|a| a.kind.as_str());

        let client = self.pool.get().await?;
        let row = client
            .query_one(
                r#"
                INSERT INTO messages (id, room_id, sender_id, receiver_id, body, attachment_url, attachment_kind)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING created_at
                "#,
                &[
                    &id,
                    &new.room_id,
                    &new.sender_id,
                    &new.receiver_id,
                    &envelope,
                    &attachment_url,
                    &attachment_kind,
                ],
            )
            .await?;

        Ok(Message {
            id,
            room_id: new.room_id,
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            body: new.body,
            attachment: new.attachment,
            read_at: None,
            deleted: false,
            created_at: row.get(0),
        })
    }

    async fn list_by_room(
        &self,
        room_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<Message>> {
        let client = self.pool.get().await?;

        let rows = match since {
            Some(since) => {
                client
                    .query(
                        r#"
                        SELECT id, room_id, sender_id, receiver_id, body,
                               attachment_url, attachment_kind, read_at, deleted, created_at
                        FROM messages
                        WHERE room_id = $1 AND created_at > $2
                        ORDER BY created_at ASC, id ASC
                        "#,
                        &[&room_id, &since],
                    )
                    .await?
            }
            None => {
                client
                    .query(
                        r#"
                        SELECT id, room_id, sender_id, receiver_id, body,
                               attachment_url, attachment_kind, read_at, deleted, created_at
                        FROM messages
                        WHERE room_id = $1
                        ORDER BY created_at ASC, id ASC
                        "#,
                        &[&room_id],
                    )
                    .await?
            }
        };

        Ok(rows.iter().map(|r| self.message_from_row(r)).collect())
    }

    async fn mark_read(&self, room_id: &str, reader_id: &str) -> AppResult<u64> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                r#"
                UPDATE messages
                SET read = TRUE, read_at = now(), updated_at = now()
                WHERE room_id = $1 AND receiver_id = $2 AND read_at IS NULL
                "#,
                &[&room_id, &reader_id],
            )
            .await?;
        Ok(updated)
    }

    async fn mark_deleted(&self, message_id: Uuid, requester_id: &str) -> AppResult<()> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                "UPDATE messages SET deleted = TRUE, updated_at = now() WHERE id = $1 AND sender_id = $2",
                &[&message_id, &requester_id],
            )
            .await?;

        if updated > 0 {
            return Ok(());
        }

        // Distinguish a missing row from a foreign one; authorization is
        // enforced here, not in the UI.
        let row = client
            .query_opt("SELECT sender_id FROM messages WHERE id = $1", &[&message_id])
            .await?;
        match row {
            None => Err(AppError::NotFound),
            Some(_) => Err(AppError::PermissionDenied),
        }
    }

    async fn room_summaries(&self, operator_id: &str) -> AppResult<Vec<RoomSummary>> {
        let client = self.pool.get().await?;
        let room_pattern = format!("{operator_id}-%");

        let aggregates = client
            .query(
                r#"
                SELECT room_id,
                       MAX(created_at) AS last_activity,
                       COUNT(*) FILTER (WHERE receiver_id = $2 AND read_at IS NULL) AS unread_count
                FROM messages
                WHERE room_id LIKE $1
                GROUP BY room_id
                "#,
                &[&room_pattern, &operator_id],
            )
            .await?;

        let heads = client
            .query(
                r#"
                SELECT DISTINCT ON (room_id)
                       id, room_id, sender_id, receiver_id, body,
                       attachment_url, attachment_kind, read_at, deleted, created_at
                FROM messages
                WHERE room_id LIKE $1 AND deleted = FALSE
                ORDER BY room_id, created_at DESC, id DESC
                "#,
                &[&room_pattern],
            )
            .await?;

        let mut head_map: HashMap<String, Message> = heads
            .iter()
            .map(|r| {
                let msg = self.message_from_row(r);
                (msg.room_id.clone(), msg)
            })
            .collect();

        let summaries = aggregates
            .iter()
            .map(|r| {
                let room_id: String = r.get("room_id");
                let last_message = head_map.remove(&room_id);
                RoomSummary {
                    last_message,
                    last_activity: r.get("last_activity"),
                    unread_count: r.get("unread_count"),
                    room_id,
                }
            })
            .collect();

        Ok(summaries)
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Row as stored: the body is kept as its envelope so the memory store
/// exercises the same codec path as the durable one.
#[derive(Debug, Clone)]
struct StoredMessage {
    id: Uuid,
    room_id: String,
    sender_id: String,
    receiver_id: String,
    envelope: String,
    attachment: Option<Attachment>,
    read_at: Option<DateTime<Utc>>,
    deleted: bool,
    created_at: DateTime<Utc>,
}

/// Lock-per-store in-memory implementation, used by tests and local runs.
pub struct MemoryMessageStore {
    codec: EncryptionCodec,
    rows: RwLock<Vec<StoredMessage>>,
}

impl MemoryMessageStore {
    pub fn new(codec: EncryptionCodec) -> Self {
        Self {
            codec,
            rows: RwLock::new(Vec::new()),
        }
    }

    fn to_message(&self, row: &StoredMessage) -> Message {
        Message {
            id: row.id,
            room_id: row.room_id.clone(),
            sender_id: row.sender_id.clone(),
            receiver_id: row.receiver_id.clone(),
            body: self.codec.decrypt(&row.envelope),
            attachment: row.attachment.clone(),
            read_at: row.read_at,
            deleted: row.deleted,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn append(&self, new: NewMessage) -> AppResult<Message> {
        let row = StoredMessage {
            id: Uuid::new_v4(),
            room_id: new.room_id,
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            envelope: self.codec.encrypt(&new.body),
            attachment: new.attachment,
            read_at: None,
            deleted: false,
            created_at: Utc::now(),
        };
        let message = self.to_message(&row);
        self.rows.write().await.push(row);
        Ok(message)
    }

    async fn list_by_room(
        &self,
        room_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<Message>> {
        let rows = self.rows.read().await;
        let mut selected: Vec<Message> = rows
            .iter()
            .filter(|r| r.room_id == room_id)
            .filter(|r| since.map_or(true, |s| r.created_at > s))
            .map(|r| self.to_message(r))
            .collect();
        selected.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(selected)
    }

    async fn mark_read(&self, room_id: &str, reader_id: &str) -> AppResult<u64> {
        let now = Utc::now();
        let mut rows = self.rows.write().await;
        let mut updated = 0;
        for row in rows.iter_mut() {
            if row.room_id == room_id && row.receiver_id == reader_id && row.read_at.is_none() {
                row.read_at = Some(now);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn mark_deleted(&self, message_id: Uuid, requester_id: &str) -> AppResult<()> {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|r| r.id == message_id) {
            None => Err(AppError::NotFound),
            Some(row) if row.sender_id != requester_id => Err(AppError::PermissionDenied),
            Some(row) => {
                row.deleted = true;
                Ok(())
            }
        }
    }

    async fn room_summaries(&self, operator_id: &str) -> AppResult<Vec<RoomSummary>> {
        let prefix = format!("{operator_id}-");
        let rows = self.rows.read().await;

        let mut by_room: HashMap<String, Vec<&StoredMessage>> = HashMap::new();
        for row in rows.iter().filter(|r| r.room_id.starts_with(&prefix)) {
            by_room.entry(row.room_id.clone()).or_default().push(row);
        }

        let summaries = by_room
            .into_iter()
            .map(|(room_id, mut room_rows)| {
                room_rows.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
                let last_activity = room_rows
                    .last()
                    .map(|r| r.created_at)
                    .unwrap_or_else(Utc::now);
                let last_message = room_rows
                    .iter()
                    .rev()
                    .find(|r| !r.deleted)
                    .map(|r| self.to_message(r));
                let unread_count = room_rows
                    .iter()
                    .filter(|r| r.receiver_id == operator_id && r.read_at.is_none())
                    .count() as i64;
                RoomSummary {
                    room_id,
                    last_message,
                    last_activity,
                    unread_count,
                }
            })
            .collect();

        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store() -> MemoryMessageStore {
        MemoryMessageStore::new(EncryptionCodec::new("unit-test-secret-key"))
    }

    fn text_message(room: &str, from: &str, to: &str, body: &str) -> NewMessage {
        NewMessage {
            room_id: room.into(),
            sender_id: from.into(),
            receiver_id: to.into(),
            body: body.into(),
            attachment: None,
        }
    }

    #[tokio::test]
    async fn append_assigns_id_and_encrypts_at_rest() {
        let store = store();
        let msg = store
            .append(text_message("admin-u1", "u1", "admin", "hello"))
            .await
            .unwrap();
        assert_eq!(msg.body, "hello");
        assert!(msg.read_at.is_none());
        assert!(!msg.deleted);

        let rows = store.rows.read().await;
        assert_eq!(rows.len(), 1);
        assert_ne!(rows[0].envelope, "hello");
        assert!(rows[0].envelope.contains(':'));
    }

    #[tokio::test]
    async fn list_orders_by_created_at_then_id() {
        let store = store();
        for i in 0..5 {
            store
                .append(text_message("admin-u1", "u1", "admin", &format!("m{i}")))
                .await
                .unwrap();
        }

        // Force equal timestamps so the id tie-break decides the order.
        let fixed = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        {
            let mut rows = store.rows.write().await;
            for row in rows.iter_mut() {
                row.created_at = fixed;
            }
        }

        let listed = store.list_by_room("admin-u1", None).await.unwrap();
        assert_eq!(listed.len(), 5);
        for pair in listed.windows(2) {
            assert!((pair[0].created_at, pair[0].id) < (pair[1].created_at, pair[1].id));
        }
    }

    #[tokio::test]
    async fn list_since_excludes_older_messages() {
        let store = store();
        let first = store
            .append(text_message("admin-u1", "u1", "admin", "old"))
            .await
            .unwrap();
        {
            let mut rows = store.rows.write().await;
            rows[0].created_at = first.created_at - chrono::Duration::seconds(60);
        }
        let cutoff = first.created_at - chrono::Duration::seconds(30);
        store
            .append(text_message("admin-u1", "admin", "u1", "new"))
            .await
            .unwrap();

        let listed = store.list_by_room("admin-u1", Some(cutoff)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].body, "new");
    }

    #[tokio::test]
    async fn mark_read_is_scoped_and_idempotent() {
        let store = store();
        store
            .append(text_message("admin-u1", "u1", "admin", "to operator"))
            .await
            .unwrap();
        store
            .append(text_message("admin-u1", "admin", "u1", "to user"))
            .await
            .unwrap();

        assert_eq!(store.mark_read("admin-u1", "admin").await.unwrap(), 1);
        assert_eq!(store.mark_read("admin-u1", "admin").await.unwrap(), 0);

        // The operator's own outbound message stays unread for the user.
        let listed = store.list_by_room("admin-u1", None).await.unwrap();
        let outbound = listed.iter().find(|m| m.body == "to user").unwrap();
        assert!(outbound.read_at.is_none());
    }

    #[tokio::test]
    async fn mark_deleted_requires_sender() {
        let store = store();
        let msg = store
            .append(text_message("admin-u1", "u1", "admin", "regret"))
            .await
            .unwrap();

        let err = store.mark_deleted(msg.id, "admin").await.unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied));

        store.mark_deleted(msg.id, "u1").await.unwrap();
        // Idempotent for the owner.
        store.mark_deleted(msg.id, "u1").await.unwrap();

        let err = store.mark_deleted(Uuid::new_v4(), "u1").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn soft_delete_keeps_row_and_body_recoverable() {
        let store = store();
        let msg = store
            .append(text_message("admin-u1", "u1", "admin", "evidence"))
            .await
            .unwrap();
        store.mark_deleted(msg.id, "u1").await.unwrap();

        let listed = store.list_by_room("admin-u1", None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].deleted);
        assert_eq!(listed[0].body, "evidence");
    }

    #[tokio::test]
    async fn summaries_skip_deleted_for_preview_and_count_unread() {
        let store = store();
        let m1 = store
            .append(text_message("admin-u1", "u1", "admin", "visible"))
            .await
            .unwrap();
        let m2 = store
            .append(text_message("admin-u1", "u1", "admin", "deleted later"))
            .await
            .unwrap();
        {
            // Ensure m2 sorts after m1 even on coarse clocks.
            let mut rows = store.rows.write().await;
            let later = m1.created_at + chrono::Duration::seconds(5);
            rows.iter_mut().find(|r| r.id == m2.id).unwrap().created_at = later;
        }
        store.mark_deleted(m2.id, "u1").await.unwrap();

        let summaries = store.room_summaries("admin").await.unwrap();
        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.unread_count, 2);
        assert_eq!(summary.last_message.as_ref().unwrap().body, "visible");
        // Activity still reflects the deleted message's timestamp.
        assert!(summary.last_activity > m1.created_at);
    }

    #[tokio::test]
    async fn summaries_only_cover_operator_rooms() {
        let store = store();
        store
            .append(text_message("admin-u1", "u1", "admin", "ours"))
            .await
            .unwrap();
        store
            .append(text_message("other-u2", "u2", "other", "not ours"))
            .await
            .unwrap();

        let summaries = store.room_summaries("admin").await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].room_id, "admin-u1");
    }
}
