//! Organization repository
//!
//! Organizations are the tenants. Their `spaces` and `users` lists are not
//! stored on the organization row: they are the children whose
//! `organization_id` points here, loaded in creation order.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use smashit_core::{Description, EntityName};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{DbError, SpaceRecord, UserRecord};

/// Organization record from database
#[derive(Debug, Clone, FromRow)]
pub struct OrganizationRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Organization with its spaces and users expanded
#[derive(Debug, Clone)]
pub struct OrganizationWithMembers {
    pub organization: OrganizationRecord,
    pub spaces: Vec<SpaceRecord>,
    pub users: Vec<UserRecord>,
}

#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub name: EntityName,
    pub description: Option<Description>,
}

/// Fields to replace; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct OrganizationPatch {
    pub name: Option<EntityName>,
    pub description: Option<Description>,
}

#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    async fn create(&self, new: NewOrganization) -> Result<OrganizationWithMembers, DbError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OrganizationWithMembers>, DbError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<OrganizationWithMembers>, DbError>;

    async fn find_all(&self) -> Result<Vec<OrganizationWithMembers>, DbError>;

    async fn update(
        &self,
        id: Uuid,
        patch: OrganizationPatch,
    ) -> Result<Option<OrganizationWithMembers>, DbError>;

    /// Remove the organization. Its spaces and users stay, detached.
    async fn delete(&self, id: Uuid) -> Result<Option<OrganizationRecord>, DbError>;
}

/// PostgreSQL organization repository
pub struct PgOrganizationRepo {
    pool: PgPool,
}

impl PgOrganizationRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Expand spaces and users for a batch of organizations.
    ///
    /// Two queries regardless of batch size.
    async fn populate(
        &self,
        organizations: Vec<OrganizationRecord>,
    ) -> Result<Vec<OrganizationWithMembers>, DbError> {
        if organizations.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = organizations.iter().map(|o| o.id).collect();

        let spaces: Vec<SpaceRecord> = sqlx::query_as(
            r#"
            SELECT id, name, description, max_bookings, organization_id, created_at, updated_at
            FROM spaces
            WHERE organization_id = ANY($1)
            ORDER BY created_at, id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let users: Vec<UserRecord> = sqlx::query_as(
            r#"
            SELECT id, name, username, email, external_id, is_admin, organization_id,
                   created_at, updated_at
            FROM users
            WHERE organization_id = ANY($1)
            ORDER BY created_at, id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut spaces_by_org: HashMap<Uuid, Vec<SpaceRecord>> = HashMap::new();
        for space in spaces {
            if let Some(org_id) = space.organization_id {
                spaces_by_org.entry(org_id).or_default().push(space);
            }
        }

        let mut users_by_org: HashMap<Uuid, Vec<UserRecord>> = HashMap::new();
        for user in users {
            if let Some(org_id) = user.organization_id {
                users_by_org.entry(org_id).or_default().push(user);
            }
        }

        Ok(organizations
            .into_iter()
            .map(|organization| OrganizationWithMembers {
                spaces: spaces_by_org.remove(&organization.id).unwrap_or_default(),
                users: users_by_org.remove(&organization.id).unwrap_or_default(),
                organization,
            })
            .collect())
    }

    async fn populate_one(
        &self,
        organization: Option<OrganizationRecord>,
    ) -> Result<Option<OrganizationWithMembers>, DbError> {
        match organization {
            Some(org) => Ok(self.populate(vec![org]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl OrganizationRepository for PgOrganizationRepo {
    async fn create(&self, new: NewOrganization) -> Result<OrganizationWithMembers, DbError> {
        let organization: OrganizationRecord = sqlx::query_as(
            r#"
            INSERT INTO organizations (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(new.name.as_str())
        .bind(new.description.as_ref().map(Description::as_str))
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::on_write("organization", "organizations"))?;

        // Freshly created: nothing can reference it yet.
        Ok(OrganizationWithMembers {
            organization,
            spaces: Vec::new(),
            users: Vec::new(),
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OrganizationWithMembers>, DbError> {
        let organization: Option<OrganizationRecord> = sqlx::query_as(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM organizations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        self.populate_one(organization).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<OrganizationWithMembers>, DbError> {
        let organization: Option<OrganizationRecord> = sqlx::query_as(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM organizations
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        self.populate_one(organization).await
    }

    async fn find_all(&self) -> Result<Vec<OrganizationWithMembers>, DbError> {
        let organizations: Vec<OrganizationRecord> = sqlx::query_as(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM organizations
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        self.populate(organizations).await
    }

    async fn update(
        &self,
        id: Uuid,
        patch: OrganizationPatch,
    ) -> Result<Option<OrganizationWithMembers>, DbError> {
        let organization: Option<OrganizationRecord> = sqlx::query_as(
            r#"
            UPDATE organizations
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(patch.name.as_ref().map(EntityName::as_str))
        .bind(patch.description.as_ref().map(Description::as_str))
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::on_write("organization", "organizations"))?;

        self.populate_one(organization).await
    }

    async fn delete(&self, id: Uuid) -> Result<Option<OrganizationRecord>, DbError> {
        // spaces.organization_id and users.organization_id are ON DELETE SET NULL
        let organization: Option<OrganizationRecord> = sqlx::query_as(
            r#"
            DELETE FROM organizations
            WHERE id = $1
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(organization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, migrations};

    // Integration tests - run with DATABASE_URL set
    // cargo test -p smashit-server -- --ignored

    async fn repo() -> PgOrganizationRepo {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = create_pool(&url).await.expect("pool creation failed");
        migrations::run(&pool).await.expect("migrations failed");
        PgOrganizationRepo::new(pool)
    }

    fn unique_name(prefix: &str) -> EntityName {
        EntityName::new("name", &format!("{prefix}-{}", Uuid::new_v4())).unwrap()
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn duplicate_name_is_conflict() {
        let repo = repo().await;
        let name = unique_name("dup");

        repo.create(NewOrganization {
            name: name.clone(),
            description: None,
        })
        .await
        .expect("first create");

        let err = repo
            .create(NewOrganization {
                name,
                description: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Conflict { ref field, .. } if field == "name"));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn update_keeps_unset_fields() {
        let repo = repo().await;
        let created = repo
            .create(NewOrganization {
                name: unique_name("patch"),
                description: Some(Description::new("original").unwrap()),
            })
            .await
            .unwrap();

        let new_name = unique_name("renamed");
        let updated = repo
            .update(
                created.organization.id,
                OrganizationPatch {
                    name: Some(new_name.clone()),
                    description: None,
                },
            )
            .await
            .unwrap()
            .expect("organization exists");

        assert_eq!(updated.organization.name, new_name.as_str());
        assert_eq!(updated.organization.description.as_deref(), Some("original"));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn delete_missing_returns_none() {
        let repo = repo().await;
        assert!(repo.delete(Uuid::new_v4()).await.unwrap().is_none());
    }
}
