//! Operator inbox projection.
//!
//! One row per room pairing the operator with a counterparty. Recomputed
//! from the message store on every request; nothing is cached, so the view
//! can never go stale relative to concurrent appends or mark-read calls.

use crate::error::AppResult;
use crate::models::identity::{IdentityKind, IdentityProfile};
use crate::models::message::{counterparty_of, Message};
use crate::services::identity_directory::{resolve_or_unknown, IdentityLookup};
use crate::services::message_store::MessageStore;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub room_id: String,
    pub counterparty_id: String,
    pub counterparty_kind: Option<IdentityKind>,
    pub counterparty: IdentityProfile,
    /// Decrypted body of the latest non-deleted message, or an attachment
    /// label; soft-deleted messages never surface here.
    pub last_message_preview: String,
    pub last_message_time: DateTime<Utc>,
    pub unread_count: i64,
}

pub struct ConversationService;

impl ConversationService {
    pub async fn list_conversations(
        store: &dyn MessageStore,
        directory: &dyn IdentityLookup,
        operator_id: &str,
    ) -> AppResult<Vec<ConversationSummary>> {
        let summaries = store.room_summaries(operator_id).await?;

        let mut out = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let counterparty_id = match counterparty_of(operator_id, &summary.room_id) {
                Some(id) => id.to_string(),
                None => {
                    tracing::warn!(room_id = %summary.room_id, "room id does not match operator pairing, skipping");
                    continue;
                }
            };

            let (counterparty_kind, counterparty) =
                resolve_or_unknown(directory, &counterparty_id).await;

            out.push(ConversationSummary {
                room_id: summary.room_id,
                counterparty_id,
                counterparty_kind,
                counterparty,
                last_message_preview: summary
                    .last_message
                    .as_ref()
                    .map(Self::preview_of)
                    .unwrap_or_default(),
                last_message_time: summary.last_activity,
                unread_count: summary.unread_count,
            });
        }

        out.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
        Ok(out)
    }

    fn preview_of(message: &Message) -> String {
        if !message.body.is_empty() {
            return message.body.clone();
        }
        message
            .attachment
            .as_ref()
            .map(|a| a.kind.preview_label().to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::{Attachment, AttachmentKind, NewMessage};
    use crate::services::encryption::EncryptionCodec;
    use crate::services::identity_directory::MemoryDirectory;
    use crate::services::message_store::MemoryMessageStore;

    fn store() -> MemoryMessageStore {
        MemoryMessageStore::new(EncryptionCodec::new("inbox-test-secret-key"))
    }

    async fn directory_with_user(id: &str, name: &str) -> MemoryDirectory {
        let dir = MemoryDirectory::new();
        dir.insert(
            IdentityKind::User,
            id,
            IdentityProfile {
                name: name.to_string(),
                image: None,
                email: None,
            },
        )
        .await;
        dir
    }

    fn text(room: &str, from: &str, to: &str, body: &str) -> NewMessage {
        NewMessage {
            room_id: room.into(),
            sender_id: from.into(),
            receiver_id: to.into(),
            body: body.into(),
            attachment: None,
        }
    }

    #[tokio::test]
    async fn deleted_message_never_appears_in_preview() {
        let store = store();
        let dir = directory_with_user("u1", "Priya").await;

        // m1 text "hi", then m2 attachment-only; the user deletes m1.
        let m1 = store.append(text("admin-u1", "u1", "admin", "hi")).await.unwrap();
        store
            .append(NewMessage {
                room_id: "admin-u1".into(),
                sender_id: "u1".into(),
                receiver_id: "admin".into(),
                body: String::new(),
                attachment: Some(Attachment {
                    url: "https://cdn.example/u1/photo.png".into(),
                    kind: AttachmentKind::Image,
                }),
            })
            .await
            .unwrap();
        store.mark_deleted(m1.id, "u1").await.unwrap();

        let inbox = ConversationService::list_conversations(&store, &dir, "admin")
            .await
            .unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].last_message_preview, "[image]");
        assert_eq!(inbox[0].counterparty.name, "Priya");
        assert_eq!(inbox[0].counterparty_kind, Some(IdentityKind::User));
    }

    #[tokio::test]
    async fn unread_count_tracks_mark_read() {
        let store = store();
        let dir = directory_with_user("u1", "Priya").await;

        store.append(text("admin-u1", "u1", "admin", "one")).await.unwrap();
        store.append(text("admin-u1", "u1", "admin", "two")).await.unwrap();
        store.append(text("admin-u1", "admin", "u1", "reply")).await.unwrap();

        let inbox = ConversationService::list_conversations(&store, &dir, "admin")
            .await
            .unwrap();
        assert_eq!(inbox[0].unread_count, 2);

        store.mark_read("admin-u1", "admin").await.unwrap();
        let inbox = ConversationService::list_conversations(&store, &dir, "admin")
            .await
            .unwrap();
        assert_eq!(inbox[0].unread_count, 0);
    }

    #[tokio::test]
    async fn unknown_counterparty_gets_placeholder_not_error() {
        let store = store();
        let dir = MemoryDirectory::new();
        store
            .append(text("admin-ghost", "ghost", "admin", "boo"))
            .await
            .unwrap();

        let inbox = ConversationService::list_conversations(&store, &dir, "admin")
            .await
            .unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].counterparty.name, "Unknown User");
        assert!(inbox[0].counterparty_kind.is_none());
    }

    #[tokio::test]
    async fn conversations_sorted_by_recency() {
        let store = store();
        let dir = MemoryDirectory::new();
        store.append(text("admin-u1", "u1", "admin", "older")).await.unwrap();
        store.append(text("admin-u2", "u2", "admin", "newer")).await.unwrap();

        // Make the ordering unambiguous regardless of clock resolution.
        {
            let inboxes = ConversationService::list_conversations(&store, &dir, "admin")
                .await
                .unwrap();
            assert_eq!(inboxes.len(), 2);
        }
        store.append(text("admin-u1", "u1", "admin", "newest")).await.unwrap();
        let inbox = ConversationService::list_conversations(&store, &dir, "admin")
            .await
            .unwrap();
        assert_eq!(inbox[0].room_id, "admin-u1");
        assert_eq!(inbox[0].last_message_preview, "newest");
    }
}
