//! User repository
//!
//! Users sign up with an identity from the upstream auth provider
//! (`external_id`, exposed as `userId`) and optionally join an organization.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use smashit_core::{Email, EntityName, ExternalUserId, Username};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{ensure_exists, DbError, OrganizationRecord};

/// User record from database
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub external_id: String,
    pub is_admin: bool,
    pub organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User with its organization expanded
#[derive(Debug, Clone)]
pub struct UserWithOrganization {
    pub user: UserRecord,
    pub organization: Option<OrganizationRecord>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: EntityName,
    pub username: Username,
    pub email: Email,
    pub external_id: ExternalUserId,
    pub is_admin: bool,
    pub organization_id: Option<Uuid>,
}

/// Fields to replace; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<EntityName>,
    pub username: Option<Username>,
    pub email: Option<Email>,
    pub external_id: Option<ExternalUserId>,
    pub is_admin: Option<bool>,
    pub organization_id: Option<Uuid>,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `NotFound` when `organization_id` names a missing organization.
    async fn create(&self, new: NewUser) -> Result<UserWithOrganization, DbError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserWithOrganization>, DbError>;

    async fn find_all(&self) -> Result<Vec<UserWithOrganization>, DbError>;

    async fn update(&self, id: Uuid, patch: UserPatch)
        -> Result<Option<UserWithOrganization>, DbError>;

    /// Remove the user together with their bookings.
    async fn delete(&self, id: Uuid) -> Result<Option<UserRecord>, DbError>;
}

/// PostgreSQL user repository
pub struct PgUserRepo {
    pool: PgPool,
}

impl PgUserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn populate(&self, users: Vec<UserRecord>) -> Result<Vec<UserWithOrganization>, DbError> {
        let org_ids: Vec<Uuid> = users.iter().filter_map(|u| u.organization_id).collect();

        let organizations: Vec<OrganizationRecord> = if org_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query_as(
                r#"
                SELECT id, name, description, created_at, updated_at
                FROM organizations
                WHERE id = ANY($1)
                "#,
            )
            .bind(&org_ids)
            .fetch_all(&self.pool)
            .await?
        };

        let by_id: HashMap<Uuid, OrganizationRecord> =
            organizations.into_iter().map(|o| (o.id, o)).collect();

        Ok(users
            .into_iter()
            .map(|user| UserWithOrganization {
                organization: user.organization_id.and_then(|id| by_id.get(&id).cloned()),
                user,
            })
            .collect())
    }

    /// Expand the organization of a single user.
    async fn with_organization(&self, user: UserRecord) -> Result<UserWithOrganization, DbError> {
        let organization: Option<OrganizationRecord> = match user.organization_id {
            Some(org_id) => {
                sqlx::query_as(
                    r#"
                    SELECT id, name, description, created_at, updated_at
                    FROM organizations
                    WHERE id = $1
                    "#,
                )
                .bind(org_id)
                .fetch_optional(&self.pool)
                .await?
            }
            None => None,
        };

        Ok(UserWithOrganization { user, organization })
    }

    async fn populate_one(
        &self,
        user: Option<UserRecord>,
    ) -> Result<Option<UserWithOrganization>, DbError> {
        match user {
            Some(user) => self.with_organization(user).await.map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl UserRepository for PgUserRepo {
    async fn create(&self, new: NewUser) -> Result<UserWithOrganization, DbError> {
        let mut tx = self.pool.begin().await?;

        if let Some(org_id) = new.organization_id {
            ensure_exists(&mut *tx, "organizations", "organization", org_id).await?;
        }

        let user: UserRecord = sqlx::query_as(
            r#"
            INSERT INTO users (name, username, email, external_id, is_admin, organization_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, username, email, external_id, is_admin, organization_id,
                      created_at, updated_at
            "#,
        )
        .bind(new.name.as_str())
        .bind(new.username.as_str())
        .bind(new.email.as_str())
        .bind(new.external_id.as_str())
        .bind(new.is_admin)
        .bind(new.organization_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(DbError::on_write("user", "users"))?;

        tx.commit().await?;
        self.with_organization(user).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserWithOrganization>, DbError> {
        let user: Option<UserRecord> = sqlx::query_as(
            r#"
            SELECT id, name, username, email, external_id, is_admin, organization_id,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        self.populate_one(user).await
    }

    async fn find_all(&self) -> Result<Vec<UserWithOrganization>, DbError> {
        let users: Vec<UserRecord> = sqlx::query_as(
            r#"
            SELECT id, name, username, email, external_id, is_admin, organization_id,
                   created_at, updated_at
            FROM users
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        self.populate(users).await
    }

    async fn update(
        &self,
        id: Uuid,
        patch: UserPatch,
    ) -> Result<Option<UserWithOrganization>, DbError> {
        let mut tx = self.pool.begin().await?;

        if let Some(org_id) = patch.organization_id {
            ensure_exists(&mut *tx, "organizations", "organization", org_id).await?;
        }

        let user: Option<UserRecord> = sqlx::query_as(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                username = COALESCE($3, username),
                email = COALESCE($4, email),
                external_id = COALESCE($5, external_id),
                is_admin = COALESCE($6, is_admin),
                organization_id = COALESCE($7, organization_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, username, email, external_id, is_admin, organization_id,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(patch.name.as_ref().map(EntityName::as_str))
        .bind(patch.username.as_ref().map(Username::as_str))
        .bind(patch.email.as_ref().map(Email::as_str))
        .bind(patch.external_id.as_ref().map(ExternalUserId::as_str))
        .bind(patch.is_admin)
        .bind(patch.organization_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DbError::on_write("user", "users"))?;

        tx.commit().await?;
        self.populate_one(user).await
    }

    async fn delete(&self, id: Uuid) -> Result<Option<UserRecord>, DbError> {
        // bookings.user_id is ON DELETE CASCADE
        let user: Option<UserRecord> = sqlx::query_as(
            r#"
            DELETE FROM users
            WHERE id = $1
            RETURNING id, name, username, email, external_id, is_admin, organization_id,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
