//! Booking repository
//!
//! Creation is the one place with real coordination: the space row is
//! locked, live bookings are counted, and the insert only happens while the
//! count is below `max_bookings`. All of it runs in one transaction so two
//! concurrent requests cannot both take the last slot.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use smashit_core::{BookingStatus, EntityName};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{ensure_exists, DbError, SpaceRecord, UserRecord};

/// Booking record from database
#[derive(Debug, Clone, FromRow)]
pub struct BookingRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub space_id: Uuid,
    pub name: Option<String>,
    pub date: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Booking with its user and space expanded
#[derive(Debug, Clone)]
pub struct BookingWithRefs {
    pub booking: BookingRecord,
    pub user: Option<UserRecord>,
    pub space: Option<SpaceRecord>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: Uuid,
    pub space_id: Uuid,
    pub name: Option<EntityName>,
    pub date: DateTime<Utc>,
    pub status: BookingStatus,
}

/// Fields to replace; `None` leaves the stored value untouched.
///
/// Moving a booking to another space does not re-check capacity.
#[derive(Debug, Clone, Default)]
pub struct BookingPatch {
    pub user_id: Option<Uuid>,
    pub space_id: Option<Uuid>,
    pub name: Option<EntityName>,
    pub date: Option<DateTime<Utc>>,
    pub status: Option<BookingStatus>,
}

/// Narrow `find_all` to one user and/or one space.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookingFilter {
    pub user_id: Option<Uuid>,
    pub space_id: Option<Uuid>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &BookingRecord) -> bool {
        self.user_id.map_or(true, |id| booking.user_id == id)
            && self.space_id.map_or(true, |id| booking.space_id == id)
    }
}

/// Reject a new booking when `live` bookings already fill the space.
pub(crate) fn ensure_capacity(space_id: Uuid, max_bookings: i32, live: i64) -> Result<(), DbError> {
    if live >= i64::from(max_bookings) {
        return Err(DbError::CapacityExceeded {
            space_id,
            max_bookings,
        });
    }
    Ok(())
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Fails with `NotFound` for a missing space or user and with
    /// `CapacityExceeded` when the space is full.
    async fn create(&self, new: NewBooking) -> Result<BookingWithRefs, DbError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<BookingWithRefs>, DbError>;

    async fn find_all(&self, filter: BookingFilter) -> Result<Vec<BookingWithRefs>, DbError>;

    async fn update(&self, id: Uuid, patch: BookingPatch)
        -> Result<Option<BookingWithRefs>, DbError>;

    async fn delete(&self, id: Uuid) -> Result<Option<BookingRecord>, DbError>;
}

/// PostgreSQL booking repository
pub struct PgBookingRepo {
    pool: PgPool,
}

impl PgBookingRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn populate(&self, bookings: Vec<BookingRecord>) -> Result<Vec<BookingWithRefs>, DbError> {
        if bookings.is_empty() {
            return Ok(Vec::new());
        }

        let user_ids: Vec<Uuid> = bookings.iter().map(|b| b.user_id).collect();
        let space_ids: Vec<Uuid> = bookings.iter().map(|b| b.space_id).collect();

        let users: Vec<UserRecord> = sqlx::query_as(
            r#"
            SELECT id, name, username, email, external_id, is_admin, organization_id,
                   created_at, updated_at
            FROM users
            WHERE id = ANY($1)
            "#,
        )
        .bind(&user_ids)
        .fetch_all(&self.pool)
        .await?;

        let spaces: Vec<SpaceRecord> = sqlx::query_as(
            r#"
            SELECT id, name, description, max_bookings, organization_id, created_at, updated_at
            FROM spaces
            WHERE id = ANY($1)
            "#,
        )
        .bind(&space_ids)
        .fetch_all(&self.pool)
        .await?;

        let users: HashMap<Uuid, UserRecord> = users.into_iter().map(|u| (u.id, u)).collect();
        let spaces: HashMap<Uuid, SpaceRecord> = spaces.into_iter().map(|s| (s.id, s)).collect();

        Ok(bookings
            .into_iter()
            .map(|booking| BookingWithRefs {
                user: users.get(&booking.user_id).cloned(),
                space: spaces.get(&booking.space_id).cloned(),
                booking,
            })
            .collect())
    }

    /// Expand user and space of a single booking.
    async fn with_refs(&self, booking: BookingRecord) -> Result<BookingWithRefs, DbError> {
        let user: Option<UserRecord> = sqlx::query_as(
            r#"
            SELECT id, name, username, email, external_id, is_admin, organization_id,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(booking.user_id)
        .fetch_optional(&self.pool)
        .await?;

        let space: Option<SpaceRecord> = sqlx::query_as(
            r#"
            SELECT id, name, description, max_bookings, organization_id, created_at, updated_at
            FROM spaces
            WHERE id = $1
            "#,
        )
        .bind(booking.space_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(BookingWithRefs {
            booking,
            user,
            space,
        })
    }

    async fn populate_one(
        &self,
        booking: Option<BookingRecord>,
    ) -> Result<Option<BookingWithRefs>, DbError> {
        match booking {
            Some(booking) => self.with_refs(booking).await.map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepo {
    async fn create(&self, new: NewBooking) -> Result<BookingWithRefs, DbError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serialises concurrent bookings for the same space.
        let space: Option<(i32,)> =
            sqlx::query_as("SELECT max_bookings FROM spaces WHERE id = $1 FOR UPDATE")
                .bind(new.space_id)
                .fetch_optional(&mut *tx)
                .await?;

        let (max_bookings,) = space.ok_or_else(|| DbError::not_found("space", new.space_id))?;

        ensure_exists(&mut *tx, "users", "user", new.user_id).await?;

        let (live,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bookings WHERE space_id = $1 AND status <> 'cancelled'",
        )
        .bind(new.space_id)
        .fetch_one(&mut *tx)
        .await?;

        ensure_capacity(new.space_id, max_bookings, live)?;

        let booking: BookingRecord = sqlx::query_as(
            r#"
            INSERT INTO bookings (user_id, space_id, name, date, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, space_id, name, date, status, created_at, updated_at
            "#,
        )
        .bind(new.user_id)
        .bind(new.space_id)
        .bind(new.name.as_ref().map(EntityName::as_str))
        .bind(new.date)
        .bind(new.status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            booking_id = %booking.id,
            space_id = %booking.space_id,
            live = live + 1,
            "booking created"
        );

        self.with_refs(booking).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<BookingWithRefs>, DbError> {
        let booking: Option<BookingRecord> = sqlx::query_as(
            r#"
            SELECT id, user_id, space_id, name, date, status, created_at, updated_at
            FROM bookings
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        self.populate_one(booking).await
    }

    async fn find_all(&self, filter: BookingFilter) -> Result<Vec<BookingWithRefs>, DbError> {
        let bookings: Vec<BookingRecord> = sqlx::query_as(
            r#"
            SELECT id, user_id, space_id, name, date, status, created_at, updated_at
            FROM bookings
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::uuid IS NULL OR space_id = $2)
            ORDER BY created_at, id
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.space_id)
        .fetch_all(&self.pool)
        .await?;

        self.populate(bookings).await
    }

    async fn update(
        &self,
        id: Uuid,
        patch: BookingPatch,
    ) -> Result<Option<BookingWithRefs>, DbError> {
        let mut tx = self.pool.begin().await?;

        if let Some(user_id) = patch.user_id {
            ensure_exists(&mut *tx, "users", "user", user_id).await?;
        }
        if let Some(space_id) = patch.space_id {
            ensure_exists(&mut *tx, "spaces", "space", space_id).await?;
        }

        let booking: Option<BookingRecord> = sqlx::query_as(
            r#"
            UPDATE bookings
            SET user_id = COALESCE($2, user_id),
                space_id = COALESCE($3, space_id),
                name = COALESCE($4, name),
                date = COALESCE($5, date),
                status = COALESCE($6, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, space_id, name, date, status, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(patch.user_id)
        .bind(patch.space_id)
        .bind(patch.name.as_ref().map(EntityName::as_str))
        .bind(patch.date)
        .bind(patch.status.as_ref().map(BookingStatus::as_str))
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        self.populate_one(booking).await
    }

    async fn delete(&self, id: Uuid) -> Result<Option<BookingRecord>, DbError> {
        let booking: Option<BookingRecord> = sqlx::query_as(
            r#"
            DELETE FROM bookings
            WHERE id = $1
            RETURNING id, user_id, space_id, name, date, status, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(booking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(user_id: Uuid, space_id: Uuid) -> BookingRecord {
        BookingRecord {
            id: Uuid::new_v4(),
            user_id,
            space_id,
            name: None,
            date: Utc::now(),
            status: BookingStatus::Pending.as_str().to_owned(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn capacity_allows_until_full() {
        let space = Uuid::new_v4();
        assert!(ensure_capacity(space, 2, 0).is_ok());
        assert!(ensure_capacity(space, 2, 1).is_ok());

        let err = ensure_capacity(space, 2, 2).unwrap_err();
        assert!(matches!(
            err,
            DbError::CapacityExceeded { max_bookings: 2, .. }
        ));
    }

    #[test]
    fn empty_filter_matches_everything() {
        let record = booking(Uuid::new_v4(), Uuid::new_v4());
        assert!(BookingFilter::default().matches(&record));
    }

    #[test]
    fn filter_by_user_and_space() {
        let (user, space) = (Uuid::new_v4(), Uuid::new_v4());
        let record = booking(user, space);

        let by_user = BookingFilter {
            user_id: Some(user),
            space_id: None,
        };
        let wrong_space = BookingFilter {
            user_id: Some(user),
            space_id: Some(Uuid::new_v4()),
        };

        assert!(by_user.matches(&record));
        assert!(!wrong_space.matches(&record));
    }

    // Integration test - run with DATABASE_URL set
    // cargo test -p smashit-server -- --ignored
    #[tokio::test]
    #[ignore = "requires database"]
    async fn concurrent_bookings_respect_capacity() {
        use crate::db::repos::{NewSpace, NewUser, PgSpaceRepo, PgUserRepo, SpaceRepository, UserRepository};
        use crate::db::{create_pool, migrations};
        use smashit_core::{Email, ExternalUserId, MaxBookings, Username};

        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = create_pool(&url).await.expect("pool creation failed");
        migrations::run(&pool).await.expect("migrations failed");

        let tag = Uuid::new_v4().simple().to_string();
        let space = PgSpaceRepo::new(pool.clone())
            .create(NewSpace {
                name: EntityName::new("name", &format!("room-{tag}")).unwrap(),
                description: None,
                max_bookings: MaxBookings::new(3).unwrap(),
                organization_id: None,
            })
            .await
            .unwrap();
        let user = PgUserRepo::new(pool.clone())
            .create(NewUser {
                name: EntityName::new("name", "Booker").unwrap(),
                username: Username::new(&format!("booker-{tag}")).unwrap(),
                email: Email::new(&format!("{tag}@example.com")).unwrap(),
                external_id: ExternalUserId::new(&tag).unwrap(),
                is_admin: false,
                organization_id: None,
            })
            .await
            .unwrap();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let repo = PgBookingRepo::new(pool.clone());
                let new = NewBooking {
                    user_id: user.user.id,
                    space_id: space.space.id,
                    name: None,
                    date: Utc::now(),
                    status: BookingStatus::Confirmed,
                };
                tokio::spawn(async move { repo.create(new).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.expect("task panicked").is_ok() {
                created += 1;
            }
        }

        assert_eq!(created, 3);
    }
}
