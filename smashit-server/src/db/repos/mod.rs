//! Repository traits and their PostgreSQL implementations
//!
//! Each repository follows these patterns:
//! - create / find_by_id / find_all / update return the populated record
//! - delete returns the removed flat record, `None` when absent
//! - parent existence and capacity are checked inside the write transaction
//! - unique constraint violations become `DbError::Conflict`

pub mod bookings;
pub mod organizations;
pub mod spaces;
pub mod users;

use std::sync::Arc;

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::MemoryStore;

pub use bookings::{
    BookingFilter, BookingPatch, BookingRecord, BookingRepository, BookingWithRefs, NewBooking,
    PgBookingRepo,
};
pub use organizations::{
    NewOrganization, OrganizationPatch, OrganizationRecord, OrganizationRepository,
    OrganizationWithMembers, PgOrganizationRepo,
};
pub use spaces::{NewSpace, PgSpaceRepo, SpacePatch, SpaceRecord, SpaceRepository, SpaceWithBookings};
pub use users::{NewUser, PgUserRepo, UserPatch, UserRecord, UserRepository, UserWithOrganization};

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    #[error("{resource} with this {field} already exists")]
    Conflict {
        resource: &'static str,
        field: String,
    },

    #[error("space '{space_id}' is fully booked (maxBookings = {max_bookings})")]
    CapacityExceeded { space_id: Uuid, max_bookings: i32 },
}

impl DbError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Error mapper for INSERT/UPDATE statements on `table`.
    ///
    /// Postgres names inline unique constraints `{table}_{column}_key`; the
    /// column is recovered from that name for the conflict message.
    pub(crate) fn on_write(
        resource: &'static str,
        table: &'static str,
    ) -> impl FnOnce(sqlx::Error) -> DbError {
        move |err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => DbError::Conflict {
                resource,
                field: conflict_field(table, db.constraint()),
            },
            _ => DbError::Sqlx(err),
        }
    }
}

fn conflict_field(table: &str, constraint: Option<&str>) -> String {
    constraint
        .and_then(|c| c.strip_prefix(table))
        .and_then(|c| c.strip_prefix('_'))
        .and_then(|c| c.strip_suffix("_key"))
        .map(column_to_field)
        .unwrap_or_else(|| "value".to_owned())
}

/// Translate a column name into the JSON field clients know it by.
pub(crate) fn column_to_field(column: &str) -> String {
    match column {
        "external_id" => "userId".to_owned(),
        other => {
            let mut field = String::with_capacity(other.len());
            let mut upper = false;
            for c in other.chars() {
                if c == '_' {
                    upper = true;
                } else if upper {
                    field.extend(c.to_uppercase());
                    upper = false;
                } else {
                    field.push(c);
                }
            }
            field
        }
    }
}

/// Fail with `NotFound` unless a row with `id` exists in `table`.
///
/// `table` is always one of the crate's own table names, never client input.
pub(crate) async fn ensure_exists(
    conn: &mut PgConnection,
    table: &'static str,
    resource: &'static str,
    id: Uuid,
) -> Result<(), DbError> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = $1)");
    let (exists,): (bool,) = sqlx::query_as(&sql).bind(id).fetch_one(conn).await?;

    if exists {
        Ok(())
    } else {
        Err(DbError::not_found(resource, id))
    }
}

/// Data-access objects for every entity, built once at start-up and handed
/// to the HTTP layer.
#[derive(Clone)]
pub struct Repositories {
    pub organizations: Arc<dyn OrganizationRepository>,
    pub spaces: Arc<dyn SpaceRepository>,
    pub users: Arc<dyn UserRepository>,
    pub bookings: Arc<dyn BookingRepository>,
}

impl Repositories {
    /// PostgreSQL-backed repositories sharing one pool.
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            organizations: Arc::new(PgOrganizationRepo::new(pool.clone())),
            spaces: Arc::new(PgSpaceRepo::new(pool.clone())),
            users: Arc::new(PgUserRepo::new(pool.clone())),
            bookings: Arc::new(PgBookingRepo::new(pool)),
        }
    }

    /// Process-local repositories sharing one in-memory store.
    pub fn in_memory() -> Self {
        let store = MemoryStore::new();
        Self {
            organizations: Arc::new(store.clone()),
            spaces: Arc::new(store.clone()),
            users: Arc::new(store.clone()),
            bookings: Arc::new(store),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_field_from_constraint_name() {
        assert_eq!(conflict_field("users", Some("users_email_key")), "email");
        assert_eq!(conflict_field("users", Some("users_external_id_key")), "userId");
        assert_eq!(conflict_field("spaces", Some("spaces_name_key")), "name");
    }

    #[test]
    fn conflict_field_falls_back() {
        assert_eq!(conflict_field("users", None), "value");
        assert_eq!(conflict_field("users", Some("custom_idx")), "value");
    }

    #[test]
    fn columns_become_camel_case() {
        assert_eq!(column_to_field("max_bookings"), "maxBookings");
        assert_eq!(column_to_field("name"), "name");
    }

    #[test]
    fn capacity_message_names_the_limit() {
        let err = DbError::CapacityExceeded {
            space_id: Uuid::nil(),
            max_bookings: 3,
        };
        assert!(err.to_string().contains("maxBookings = 3"));
    }
}
