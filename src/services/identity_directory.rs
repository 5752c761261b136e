//! Identity lookup collaborator.
//!
//! A counterparty can live in any of three identity classes. Resolution of an
//! untagged id tries each class in a fixed precedence order instead of
//! probing types at runtime; first match wins. The ban/unban moderation
//! action lives here too because it is keyed the same way.

use crate::error::AppResult;
use crate::models::identity::{IdentityKind, IdentityProfile};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// Look up a display profile within one identity class.
    async fn lookup(&self, kind: IdentityKind, id: &str) -> AppResult<Option<IdentityProfile>>;

    /// Flip the banned flag. Returns false when no such identity exists.
    async fn set_banned(&self, kind: IdentityKind, id: &str, banned: bool) -> AppResult<bool>;

    /// Resolve an untagged id across classes: user, then expert, then
    /// organisation.
    async fn resolve_any(&self, id: &str) -> AppResult<Option<(IdentityKind, IdentityProfile)>> {
        for kind in IdentityKind::RESOLUTION_ORDER {
            if let Some(profile) = self.lookup(kind, id).await? {
                return Ok(Some((kind, profile)));
            }
        }
        Ok(None)
    }
}

pub struct PgIdentityDirectory {
    pool: Pool,
}

impl PgIdentityDirectory {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    fn table_for(kind: IdentityKind) -> &'static str {
        match kind {
            IdentityKind::User => "users",
            IdentityKind::Expert => "experts",
            IdentityKind::Organisation => "organisations",
        }
    }
}

#[async_trait]
impl IdentityLookup for PgIdentityDirectory {
    async fn lookup(&self, kind: IdentityKind, id: &str) -> AppResult<Option<IdentityProfile>> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT name, image, email FROM {} WHERE id = $1",
            Self::table_for(kind)
        );
        let row = client.query_opt(&sql, &[&id]).await?;
        Ok(row.map(|r| IdentityProfile {
            name: r.get("name"),
            image: r.get("image"),
            email: r.get("email"),
        }))
    }

    async fn set_banned(&self, kind: IdentityKind, id: &str, banned: bool) -> AppResult<bool> {
        let client = self.pool.get().await?;
        let sql = format!(
            "UPDATE {} SET banned = $2 WHERE id = $1",
            Self::table_for(kind)
        );
        let updated = client.execute(&sql, &[&id, &banned]).await?;
        Ok(updated > 0)
    }
}

/// In-memory directory for tests and local runs.
#[derive(Default)]
pub struct MemoryDirectory {
    entries: RwLock<HashMap<(IdentityKind, String), IdentityProfile>>,
    banned: RwLock<HashSet<(IdentityKind, String)>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, kind: IdentityKind, id: &str, profile: IdentityProfile) {
        self.entries
            .write()
            .await
            .insert((kind, id.to_string()), profile);
    }

    pub async fn is_banned(&self, kind: IdentityKind, id: &str) -> bool {
        self.banned.read().await.contains(&(kind, id.to_string()))
    }
}

#[async_trait]
impl IdentityLookup for MemoryDirectory {
    async fn lookup(&self, kind: IdentityKind, id: &str) -> AppResult<Option<IdentityProfile>> {
        Ok(self
            .entries
            .read()
            .await
            .get(&(kind, id.to_string()))
            .cloned())
    }

    async fn set_banned(&self, kind: IdentityKind, id: &str, banned: bool) -> AppResult<bool> {
        let key = (kind, id.to_string());
        if !self.entries.read().await.contains_key(&key) {
            return Ok(false);
        }
        let mut set = self.banned.write().await;
        if banned {
            set.insert(key);
        } else {
            set.remove(&key);
        }
        Ok(true)
    }
}

/// Convenience used by every projection that must not fail on a missing
/// counterparty: resolve or fall back to the placeholder profile.
pub async fn resolve_or_unknown(
    directory: &dyn IdentityLookup,
    id: &str,
) -> (Option<IdentityKind>, IdentityProfile) {
    match directory.resolve_any(id).await {
        Ok(Some((kind, profile))) => (Some(kind), profile),
        Ok(None) => (None, IdentityProfile::unknown()),
        Err(e) => {
            tracing::warn!(error = %e, identity = %id, "identity lookup failed, substituting placeholder");
            (None, IdentityProfile::unknown())
        }
    }
}
