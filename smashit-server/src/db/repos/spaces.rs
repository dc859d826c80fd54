//! Space repository
//!
//! A space's `bookings` are the bookings whose `space_id` points at it.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use smashit_core::{Description, EntityName, MaxBookings};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{ensure_exists, BookingRecord, DbError};

/// Space record from database
#[derive(Debug, Clone, FromRow)]
pub struct SpaceRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub max_bookings: i32,
    pub organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Space with its bookings expanded
#[derive(Debug, Clone)]
pub struct SpaceWithBookings {
    pub space: SpaceRecord,
    pub bookings: Vec<BookingRecord>,
}

#[derive(Debug, Clone)]
pub struct NewSpace {
    pub name: EntityName,
    pub description: Option<Description>,
    pub max_bookings: MaxBookings,
    pub organization_id: Option<Uuid>,
}

/// Fields to replace; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct SpacePatch {
    pub name: Option<EntityName>,
    pub description: Option<Description>,
    pub max_bookings: Option<MaxBookings>,
    pub organization_id: Option<Uuid>,
}

#[async_trait]
pub trait SpaceRepository: Send + Sync {
    /// Fails with `NotFound` when `organization_id` names a missing organization.
    async fn create(&self, new: NewSpace) -> Result<SpaceWithBookings, DbError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<SpaceWithBookings>, DbError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<SpaceWithBookings>, DbError>;

    async fn find_all(&self) -> Result<Vec<SpaceWithBookings>, DbError>;

    async fn update(&self, id: Uuid, patch: SpacePatch)
        -> Result<Option<SpaceWithBookings>, DbError>;

    /// Remove the space together with its bookings.
    async fn delete(&self, id: Uuid) -> Result<Option<SpaceRecord>, DbError>;

    /// Number of live (not cancelled) bookings held against the space.
    async fn count_bookings(&self, space_id: Uuid) -> Result<i64, DbError>;
}

/// PostgreSQL space repository
pub struct PgSpaceRepo {
    pool: PgPool,
}

impl PgSpaceRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn populate(&self, spaces: Vec<SpaceRecord>) -> Result<Vec<SpaceWithBookings>, DbError> {
        if spaces.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = spaces.iter().map(|s| s.id).collect();
        let bookings: Vec<BookingRecord> = sqlx::query_as(
            r#"
            SELECT id, user_id, space_id, name, date, status, created_at, updated_at
            FROM bookings
            WHERE space_id = ANY($1)
            ORDER BY created_at, id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_space: HashMap<Uuid, Vec<BookingRecord>> = HashMap::new();
        for booking in bookings {
            by_space.entry(booking.space_id).or_default().push(booking);
        }

        Ok(spaces
            .into_iter()
            .map(|space| SpaceWithBookings {
                bookings: by_space.remove(&space.id).unwrap_or_default(),
                space,
            })
            .collect())
    }

    async fn populate_one(
        &self,
        space: Option<SpaceRecord>,
    ) -> Result<Option<SpaceWithBookings>, DbError> {
        match space {
            Some(space) => Ok(self.populate(vec![space]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SpaceRepository for PgSpaceRepo {
    async fn create(&self, new: NewSpace) -> Result<SpaceWithBookings, DbError> {
        let mut tx = self.pool.begin().await?;

        if let Some(org_id) = new.organization_id {
            ensure_exists(&mut *tx, "organizations", "organization", org_id).await?;
        }

        let space: SpaceRecord = sqlx::query_as(
            r#"
            INSERT INTO spaces (name, description, max_bookings, organization_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, max_bookings, organization_id, created_at, updated_at
            "#,
        )
        .bind(new.name.as_str())
        .bind(new.description.as_ref().map(Description::as_str))
        .bind(new.max_bookings.get())
        .bind(new.organization_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(DbError::on_write("space", "spaces"))?;

        tx.commit().await?;

        Ok(SpaceWithBookings {
            space,
            bookings: Vec::new(),
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<SpaceWithBookings>, DbError> {
        let space: Option<SpaceRecord> = sqlx::query_as(
            r#"
            SELECT id, name, description, max_bookings, organization_id, created_at, updated_at
            FROM spaces
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        self.populate_one(space).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<SpaceWithBookings>, DbError> {
        let space: Option<SpaceRecord> = sqlx::query_as(
            r#"
            SELECT id, name, description, max_bookings, organization_id, created_at, updated_at
            FROM spaces
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        self.populate_one(space).await
    }

    async fn find_all(&self) -> Result<Vec<SpaceWithBookings>, DbError> {
        let spaces: Vec<SpaceRecord> = sqlx::query_as(
            r#"
            SELECT id, name, description, max_bookings, organization_id, created_at, updated_at
            FROM spaces
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        self.populate(spaces).await
    }

    async fn update(
        &self,
        id: Uuid,
        patch: SpacePatch,
    ) -> Result<Option<SpaceWithBookings>, DbError> {
        let mut tx = self.pool.begin().await?;

        if let Some(org_id) = patch.organization_id {
            ensure_exists(&mut *tx, "organizations", "organization", org_id).await?;
        }

        let space: Option<SpaceRecord> = sqlx::query_as(
            r#"
            UPDATE spaces
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                max_bookings = COALESCE($4, max_bookings),
                organization_id = COALESCE($5, organization_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, max_bookings, organization_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(patch.name.as_ref().map(EntityName::as_str))
        .bind(patch.description.as_ref().map(Description::as_str))
        .bind(patch.max_bookings.map(MaxBookings::get))
        .bind(patch.organization_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DbError::on_write("space", "spaces"))?;

        tx.commit().await?;
        self.populate_one(space).await
    }

    async fn delete(&self, id: Uuid) -> Result<Option<SpaceRecord>, DbError> {
        // bookings.space_id is ON DELETE CASCADE
        let space: Option<SpaceRecord> = sqlx::query_as(
            r#"
            DELETE FROM spaces
            WHERE id = $1
            RETURNING id, name, description, max_bookings, organization_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(space)
    }

    async fn count_bookings(&self, space_id: Uuid) -> Result<i64, DbError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bookings WHERE space_id = $1 AND status <> 'cancelled'",
        )
        .bind(space_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
