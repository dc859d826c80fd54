//! Response bodies
//!
//! Flat DTOs mirror one row each; the populated responses flatten the row
//! and add the expanded relations next to it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::db::{
    BookingRecord, BookingWithRefs, OrganizationRecord, OrganizationWithMembers, SpaceRecord,
    SpaceWithBookings, UserRecord, UserWithOrganization,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationDto {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrganizationRecord> for OrganizationDto {
    fn from(o: OrganizationRecord) -> Self {
        Self {
            id: o.id,
            name: o.name,
            description: o.description,
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceDto {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub max_bookings: i32,
    pub organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SpaceRecord> for SpaceDto {
    fn from(s: SpaceRecord) -> Self {
        Self {
            id: s.id,
            name: s.name,
            description: s.description,
            max_bookings: s.max_bookings,
            organization_id: s.organization_id,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

/// `userId` here is the external identity, not the row id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub user_id: String,
    pub is_admin: bool,
    pub organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRecord> for UserDto {
    fn from(u: UserRecord) -> Self {
        Self {
            id: u.id,
            name: u.name,
            username: u.username,
            email: u.email,
            user_id: u.external_id,
            is_admin: u.is_admin,
            organization_id: u.organization_id,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub space_id: Uuid,
    pub name: Option<String>,
    pub date: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BookingRecord> for BookingDto {
    fn from(b: BookingRecord) -> Self {
        Self {
            id: b.id,
            user_id: b.user_id,
            space_id: b.space_id,
            name: b.name,
            date: b.date,
            status: b.status,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

fn convert<T, U: From<T>>(items: Vec<T>) -> Vec<U> {
    items.into_iter().map(U::from).collect()
}

#[derive(Debug, Serialize)]
pub struct OrganizationResponse {
    #[serde(flatten)]
    pub organization: OrganizationDto,
    pub spaces: Vec<SpaceDto>,
    pub users: Vec<UserDto>,
}

impl From<OrganizationWithMembers> for OrganizationResponse {
    fn from(o: OrganizationWithMembers) -> Self {
        Self {
            organization: o.organization.into(),
            spaces: convert(o.spaces),
            users: convert(o.users),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SpaceResponse {
    #[serde(flatten)]
    pub space: SpaceDto,
    pub bookings: Vec<BookingDto>,
}

impl From<SpaceWithBookings> for SpaceResponse {
    fn from(s: SpaceWithBookings) -> Self {
        Self {
            space: s.space.into(),
            bookings: convert(s.bookings),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    #[serde(flatten)]
    pub user: UserDto,
    pub organization: Option<OrganizationDto>,
}

impl From<UserWithOrganization> for UserResponse {
    fn from(u: UserWithOrganization) -> Self {
        Self {
            user: u.user.into(),
            organization: u.organization.map(Into::into),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    #[serde(flatten)]
    pub booking: BookingDto,
    pub user: Option<UserDto>,
    pub space: Option<SpaceDto>,
}

impl From<BookingWithRefs> for BookingResponse {
    fn from(b: BookingWithRefs) -> Self {
        Self {
            booking: b.booking.into(),
            user: b.user.map(Into::into),
            space: b.space.map(Into::into),
        }
    }
}

/// Capacity snapshot for one space
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub max_bookings: i32,
    pub live_bookings: i64,
    pub remaining: i64,
}

impl AvailabilityResponse {
    pub fn new(max_bookings: i32, live_bookings: i64) -> Self {
        Self {
            max_bookings,
            live_bookings,
            remaining: (i64::from(max_bookings) - live_bookings).max(0),
        }
    }
}
