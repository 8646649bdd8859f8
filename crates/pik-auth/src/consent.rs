//! Consent links: the only thing that lets a Source mutate a RootIdentity
//! (spec §4.9).

use pik_db::{DbSourceLink, IdentityRepo, SourceRepo};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

#[derive(Clone)]
pub struct Consent {
    sources: SourceRepo,
    identities: IdentityRepo,
}

pub struct ActiveLink {
    pub link_id: Uuid,
    pub scope: String,
}

impl Consent {
    pub fn new(sources: SourceRepo, identities: IdentityRepo) -> Self {
        Self { sources, identities }
    }

    /// Transactionally creates the link. Callers append `source.link_granted`
    /// in the same transaction after this returns.
    /// Pre-checks run against the pool directly (a snapshot read is
    /// sufficient — the unique index on active links is the real guard
    /// against a concurrent duplicate grant); only the insert itself needs
    /// the caller's transaction.
    pub async fn grant<'c, E>(
        &self,
        exec: E,
        root_id: Uuid,
        source_id: &str,
        granted_by: &str,
        scope: &str,
    ) -> AuthResult<DbSourceLink>
    where
        E: PgExecutor<'c>,
    {
        let identity = self
            .identities
            .find_by_id(root_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("root identity {root_id}")))?;
        if identity.status != "active" {
            return Err(AuthError::InvalidInput("root identity is not active".into()));
        }

        let source = self
            .sources
            .find_by_id(source_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("source {source_id}")))?;
        if source.status != "active" {
            return Err(AuthError::InvalidInput("source is not active".into()));
        }

        if self.sources.find_active_link(self.sources.pool(), root_id, source_id).await?.is_some() {
            return Err(AuthError::DuplicateLink);
        }

        let link = self.sources.create_link(exec, root_id, source_id, scope, granted_by).await?;
        Ok(link)
    }

    pub async fn revoke<'c, E>(
        &self,
        exec: E,
        root_id: Uuid,
        link_id: Uuid,
        revoked_by: Option<&str>,
    ) -> AuthResult<()>
    where
        E: PgExecutor<'c>,
    {
        let link = self
            .sources
            .find_link_by_id(link_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("consent link {link_id}")))?;

        if link.root_id != root_id {
            return Err(AuthError::NotFound(format!("consent link {link_id}")));
        }
        if link.status != "active" {
            return Err(AuthError::NoActiveLink);
        }

        self.sources.revoke_link(exec, link_id, revoked_by).await?;
        Ok(())
    }

    pub async fn list_for_root(&self, root_id: Uuid) -> AuthResult<Vec<DbSourceLink>> {
        Ok(self.sources.list_links_for_root(root_id).await?)
    }

    /// Called by the ingest engine before every source-originated mutation.
    pub async fn validate_active_link<'c, E>(
        &self,
        exec: E,
        root_id: Uuid,
        source_id: &str,
    ) -> AuthResult<ActiveLink>
    where
        E: PgExecutor<'c>,
    {
        let link = self
            .sources
            .find_active_link(exec, root_id, source_id)
            .await?
            .ok_or(AuthError::NoActiveLink)?;

        Ok(ActiveLink { link_id: link.id, scope: link.scope })
    }
}
