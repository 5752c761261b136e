//! Abuse reports and their moderation evidence.
//!
//! A report optionally points at the room where the behaviour happened; the
//! evidence view reconstructs that room's full history including soft-deleted
//! messages, which stay hidden from the counterparty but visible here.

use crate::error::{AppError, AppResult};
use crate::models::identity::IdentityProfile;
use crate::models::message::Message;
use crate::models::report::{
    NewReport, PartyRef, Report, ReportCategory, ReportOutcome, ReportStatus,
};
use crate::services::identity_directory::{resolve_or_unknown, IdentityLookup};
use crate::services::message_store::MessageStore;
use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::Pool;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn create(&self, new: NewReport) -> AppResult<Report>;

    async fn get(&self, id: Uuid) -> AppResult<Option<Report>>;

    /// Reports in the given status, newest first.
    async fn list_by_status(&self, status: ReportStatus) -> AppResult<Vec<Report>>;

    /// Apply a terminal status if the report is still in a non-terminal
    /// state. Returns false when the transition did not happen (already
    /// terminal, or no such report).
    async fn try_resolve(
        &self,
        id: Uuid,
        status: ReportStatus,
        admin_notes: Option<&str>,
    ) -> AppResult<bool>;
}

/// Report joined with resolved party profiles for listing.
#[derive(Debug, Clone, Serialize)]
pub struct ReportView {
    #[serde(flatten)]
    pub report: Report,
    pub reporter_profile: IdentityProfile,
    pub reported_profile: IdentityProfile,
}

/// The operator-only evidence reconstruction.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEvidence {
    pub report: Report,
    pub reporter_profile: IdentityProfile,
    pub reported_profile: IdentityProfile,
    /// Complete room history, soft-deleted messages included and flagged.
    /// Empty when the report carries no related room.
    pub chat_history: Vec<Message>,
}

pub struct ReportService;

impl ReportService {
    pub async fn create_report(reports: &dyn ReportStore, new: NewReport) -> AppResult<Report> {
        if new.reporter == new.reported {
            return Err(AppError::BadRequest("cannot report yourself".into()));
        }
        reports.create(new).await
    }

    pub async fn list_open(
        reports: &dyn ReportStore,
        directory: &dyn IdentityLookup,
    ) -> AppResult<Vec<ReportView>> {
        let pending = reports.list_by_status(ReportStatus::Pending).await?;

        let mut out = Vec::with_capacity(pending.len());
        for report in pending {
            let (_, reporter_profile) = resolve_or_unknown(directory, &report.reporter.id).await;
            let (_, reported_profile) = resolve_or_unknown(directory, &report.reported.id).await;
            out.push(ReportView {
                report,
                reporter_profile,
                reported_profile,
            });
        }
        Ok(out)
    }

    pub async fn get_evidence(
        reports: &dyn ReportStore,
        store: &dyn MessageStore,
        directory: &dyn IdentityLookup,
        report_id: Uuid,
    ) -> AppResult<ReportEvidence> {
        let report = reports.get(report_id).await?.ok_or(AppError::NotFound)?;

        let chat_history = match &report.related_room_id {
            Some(room_id) => store.list_by_room(room_id, None).await?,
            None => Vec::new(),
        };

        let (_, reporter_profile) = resolve_or_unknown(directory, &report.reporter.id).await;
        let (_, reported_profile) = resolve_or_unknown(directory, &report.reported.id).await;

        Ok(ReportEvidence {
            report,
            reporter_profile,
            reported_profile,
            chat_history,
        })
    }

    /// One-way transition to a terminal status. Re-applying the same outcome
    /// is a no-op; a conflicting outcome is rejected.
    pub async fn resolve(
        reports: &dyn ReportStore,
        report_id: Uuid,
        outcome: ReportOutcome,
        admin_notes: Option<&str>,
    ) -> AppResult<Report> {
        let target = ReportStatus::from(outcome);
        let transitioned = reports.try_resolve(report_id, target, admin_notes).await?;

        let report = reports.get(report_id).await?.ok_or(AppError::NotFound)?;
        if transitioned {
            return Ok(report);
        }
        if report.status == target {
            // Idempotent re-resolution to the same terminal state.
            return Ok(report);
        }
        Err(AppError::AlreadyResolved)
    }
}

// ---------------------------------------------------------------------------
// PostgreSQL store
// ---------------------------------------------------------------------------

pub struct PgReportStore {
    pool: Pool,
}

impl PgReportStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    fn report_from_row(row: &tokio_postgres::Row) -> AppResult<Report> {
        let reporter_kind: String = row.get("reporter_kind");
        let reported_kind: String = row.get("reported_kind");
        let category: String = row.get("category");
        let status: String = row.get("status");

        let parse = |what: &str| AppError::StoreUnavailable(format!("corrupt report row: {what}"));

        Ok(Report {
            id: row.get("id"),
            reporter: PartyRef {
                kind: crate::models::identity::IdentityKind::parse(&reporter_kind)
                    .ok_or_else(|| parse("reporter_kind"))?,
                id: row.get("reporter_id"),
            },
            reported: PartyRef {
                kind: crate::models::identity::IdentityKind::parse(&reported_kind)
                    .ok_or_else(|| parse("reported_kind"))?,
                id: row.get("reported_id"),
            },
            category: ReportCategory::parse(&category).ok_or_else(|| parse("category"))?,
            description: row.get("description"),
            related_room_id: row.get("related_room_id"),
            status: ReportStatus::parse(&status).ok_or_else(|| parse("status"))?,
            admin_notes: row.get("admin_notes"),
            resolved_at: row.get("resolved_at"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn create(&self, new: NewReport) -> AppResult<Report> {
        let id = Uuid::new_v4();
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                r#"
                INSERT INTO reports
                    (id, reporter_kind, reporter_id, reported_kind, reported_id,
                     category, description, related_room_id, status)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending')
                RETURNING created_at
                "#,
                &[
                    &id,
                    &new.reporter.kind.as_str(),
                    &new.reporter.id,
                    &new.reported.kind.as_str(),
                    &new.reported.id,
                    &new.category.as_str(),
                    &new.description,
                    &new.related_room_id,
                ],
            )
            .await?;

        Ok(Report {
            id,
            reporter: new.reporter,
            reported: new.reported,
            category: new.category,
            description: new.description,
            related_room_id: new.related_room_id,
            status: ReportStatus::Pending,
            admin_notes: None,
            resolved_at: None,
            created_at: row.get(0),
        })
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Report>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt("SELECT * FROM reports WHERE id = $1", &[&id])
            .await?;
        row.map(|r| Self::report_from_row(&r)).transpose()
    }

    async fn list_by_status(&self, status: ReportStatus) -> AppResult<Vec<Report>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT * FROM reports WHERE status = $1 ORDER BY created_at DESC",
                &[&status.as_str()],
            )
            .await?;
        rows.iter().map(Self::report_from_row).collect()
    }

    async fn try_resolve(
        &self,
        id: Uuid,
        status: ReportStatus,
        admin_notes: Option<&str>,
    ) -> AppResult<bool> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                r#"
                UPDATE reports
                SET status = $2,
                    resolved_at = now(),
                    admin_notes = COALESCE($3, admin_notes)
                WHERE id = $1 AND status IN ('pending', 'reviewed')
                "#,
                &[&id, &status.as_str(), &admin_notes],
            )
            .await?;
        Ok(updated > 0)
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryReportStore {
    rows: RwLock<HashMap<Uuid, Report>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn create(&self, new: NewReport) -> AppResult<Report> {
        let report = Report {
            id: Uuid::new_v4(),
            reporter: new.reporter,
            reported: new.reported,
            category: new.category,
            description: new.description,
            related_room_id: new.related_room_id,
            status: ReportStatus::Pending,
            admin_notes: None,
            resolved_at: None,
            created_at: Utc::now(),
        };
        self.rows.write().await.insert(report.id, report.clone());
        Ok(report)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Report>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn list_by_status(&self, status: ReportStatus) -> AppResult<Vec<Report>> {
        let rows = self.rows.read().await;
        let mut out: Vec<Report> = rows.values().filter(|r| r.status == status).cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn try_resolve(
        &self,
        id: Uuid,
        status: ReportStatus,
        admin_notes: Option<&str>,
    ) -> AppResult<bool> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&id) {
            Some(report) if !report.status.is_terminal() => {
                report.status = status;
                report.resolved_at = Some(Utc::now());
                if let Some(notes) = admin_notes {
                    report.admin_notes = Some(notes.to_string());
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity::IdentityKind;
    use crate::models::message::NewMessage;
    use crate::services::encryption::EncryptionCodec;
    use crate::services::identity_directory::MemoryDirectory;
    use crate::services::message_store::{MemoryMessageStore, MessageStore};

    fn party(kind: IdentityKind, id: &str) -> PartyRef {
        PartyRef {
            kind,
            id: id.to_string(),
        }
    }

    fn new_report(room: Option<&str>) -> NewReport {
        NewReport {
            reporter: party(IdentityKind::User, "u1"),
            reported: party(IdentityKind::Expert, "e1"),
            category: ReportCategory::AbusiveLanguage,
            description: "sent abusive messages".into(),
            related_room_id: room.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn reports_start_pending() {
        let reports = MemoryReportStore::new();
        let report = ReportService::create_report(&reports, new_report(None))
            .await
            .unwrap();
        assert_eq!(report.status, ReportStatus::Pending);
        assert!(report.resolved_at.is_none());
    }

    #[tokio::test]
    async fn self_report_is_rejected() {
        let reports = MemoryReportStore::new();
        let mut new = new_report(None);
        new.reported = new.reporter.clone();
        let err = ReportService::create_report(&reports, new).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn resolve_is_one_way() {
        let reports = MemoryReportStore::new();
        let report = reports.create(new_report(None)).await.unwrap();

        let resolved = ReportService::resolve(&reports, report.id, ReportOutcome::Resolved, None)
            .await
            .unwrap();
        assert_eq!(resolved.status, ReportStatus::Resolved);
        assert!(resolved.resolved_at.is_some());

        // Same terminal state again: no-op.
        let again = ReportService::resolve(&reports, report.id, ReportOutcome::Resolved, None)
            .await
            .unwrap();
        assert_eq!(again.status, ReportStatus::Resolved);

        // Conflicting terminal state: rejected.
        let err = ReportService::resolve(&reports, report.id, ReportOutcome::Dismissed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyResolved));
    }

    #[tokio::test]
    async fn resolve_missing_report_is_not_found() {
        let reports = MemoryReportStore::new();
        let err = ReportService::resolve(&reports, Uuid::new_v4(), ReportOutcome::Resolved, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn evidence_includes_soft_deleted_messages() {
        let reports = MemoryReportStore::new();
        let store = MemoryMessageStore::new(EncryptionCodec::new("evidence-test-secret"));
        let dir = MemoryDirectory::new();

        let m1 = store
            .append(NewMessage {
                room_id: "admin-u1".into(),
                sender_id: "u1".into(),
                receiver_id: "admin".into(),
                body: "hi".into(),
                attachment: None,
            })
            .await
            .unwrap();
        store
            .append(NewMessage {
                room_id: "admin-u1".into(),
                sender_id: "admin".into(),
                receiver_id: "u1".into(),
                body: "hello".into(),
                attachment: None,
            })
            .await
            .unwrap();
        store.mark_deleted(m1.id, "u1").await.unwrap();

        let report = reports.create(new_report(Some("admin-u1"))).await.unwrap();
        let evidence = ReportService::get_evidence(&reports, &store, &dir, report.id)
            .await
            .unwrap();

        assert_eq!(evidence.chat_history.len(), 2);
        let deleted = evidence
            .chat_history
            .iter()
            .find(|m| m.id == m1.id)
            .unwrap();
        assert!(deleted.deleted);
        assert_eq!(deleted.body, "hi");
    }

    #[tokio::test]
    async fn evidence_without_room_is_empty_not_error() {
        let reports = MemoryReportStore::new();
        let store = MemoryMessageStore::new(EncryptionCodec::new("evidence-test-secret"));
        let dir = MemoryDirectory::new();

        let report = reports.create(new_report(None)).await.unwrap();
        let evidence = ReportService::get_evidence(&reports, &store, &dir, report.id)
            .await
            .unwrap();
        assert!(evidence.chat_history.is_empty());
    }

    #[tokio::test]
    async fn list_open_returns_pending_newest_first() {
        let reports = MemoryReportStore::new();
        let dir = MemoryDirectory::new();

        let first = reports.create(new_report(None)).await.unwrap();
        let second = reports.create(new_report(None)).await.unwrap();
        // Force distinct timestamps regardless of clock resolution.
        {
            let mut rows = reports.rows.write().await;
            rows.get_mut(&first.id).unwrap().created_at =
                second.created_at - chrono::Duration::seconds(10);
        }
        reports
            .try_resolve(first.id, ReportStatus::Dismissed, None)
            .await
            .unwrap();

        let open = ReportService::list_open(&reports, &dir).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].report.id, second.id);
        assert_eq!(open[0].reporter_profile.name, "Unknown User");
    }
}
