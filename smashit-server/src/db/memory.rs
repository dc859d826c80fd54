//! In-memory repositories
//!
//! Same contract as the PostgreSQL repositories, held in ordered tables
//! behind one lock. Used by the router tests and by `smashit serve
//! --in-memory`; nothing survives a restart.
//!
//! The lock gives the same guarantees the database does: uniqueness, parent
//! existence and capacity are checked under the write guard, so concurrent
//! requests can neither overbook a space nor insert duplicates.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use smashit_core::{BookingStatus, Description, EntityName};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repos::bookings::ensure_capacity;
use super::repos::{
    BookingFilter, BookingPatch, BookingRecord, BookingRepository, BookingWithRefs, DbError,
    NewBooking, NewOrganization, NewSpace, NewUser, OrganizationPatch, OrganizationRecord,
    OrganizationRepository, OrganizationWithMembers, SpacePatch, SpaceRecord, SpaceRepository,
    SpaceWithBookings, UserPatch, UserRecord, UserRepository, UserWithOrganization,
};

/// Shared in-memory store. Cloning shares the tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Rows in insertion order, which is also creation order.
#[derive(Default)]
struct Tables {
    organizations: Vec<OrganizationRecord>,
    spaces: Vec<SpaceRecord>,
    users: Vec<UserRecord>,
    bookings: Vec<BookingRecord>,
}

fn unique(resource: &'static str, field: &str, taken: bool) -> Result<(), DbError> {
    if taken {
        Err(DbError::Conflict {
            resource,
            field: field.to_owned(),
        })
    } else {
        Ok(())
    }
}

impl Tables {
    fn require_organization(&self, id: Option<Uuid>) -> Result<(), DbError> {
        match id {
            Some(id) if !self.organizations.iter().any(|o| o.id == id) => {
                Err(DbError::not_found("organization", id))
            }
            _ => Ok(()),
        }
    }

    fn organization_with_members(&self, organization: &OrganizationRecord) -> OrganizationWithMembers {
        OrganizationWithMembers {
            organization: organization.clone(),
            spaces: self
                .spaces
                .iter()
                .filter(|s| s.organization_id == Some(organization.id))
                .cloned()
                .collect(),
            users: self
                .users
                .iter()
                .filter(|u| u.organization_id == Some(organization.id))
                .cloned()
                .collect(),
        }
    }

    fn space_with_bookings(&self, space: &SpaceRecord) -> SpaceWithBookings {
        SpaceWithBookings {
            space: space.clone(),
            bookings: self
                .bookings
                .iter()
                .filter(|b| b.space_id == space.id)
                .cloned()
                .collect(),
        }
    }

    fn user_with_organization(&self, user: &UserRecord) -> UserWithOrganization {
        UserWithOrganization {
            user: user.clone(),
            organization: user
                .organization_id
                .and_then(|id| self.organizations.iter().find(|o| o.id == id))
                .cloned(),
        }
    }

    fn booking_with_refs(&self, booking: &BookingRecord) -> BookingWithRefs {
        BookingWithRefs {
            booking: booking.clone(),
            user: self.users.iter().find(|u| u.id == booking.user_id).cloned(),
            space: self.spaces.iter().find(|s| s.id == booking.space_id).cloned(),
        }
    }

    fn live_bookings(&self, space_id: Uuid) -> i64 {
        let live = self
            .bookings
            .iter()
            .filter(|b| b.space_id == space_id)
            .filter(|b| b.status.parse::<BookingStatus>().map_or(true, |s| s.is_live()))
            .count();
        i64::try_from(live).unwrap_or(i64::MAX)
    }

    fn check_user_unique(
        &self,
        id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
        external_id: Option<&str>,
    ) -> Result<(), DbError> {
        let others: Vec<&UserRecord> = self.users.iter().filter(|u| Some(u.id) != id).collect();

        if let Some(username) = username {
            unique("user", "username", others.iter().any(|u| u.username == username))?;
        }
        if let Some(email) = email {
            unique("user", "email", others.iter().any(|u| u.email == email))?;
        }
        if let Some(external_id) = external_id {
            unique("user", "userId", others.iter().any(|u| u.external_id == external_id))?;
        }
        Ok(())
    }
}

#[async_trait]
impl OrganizationRepository for MemoryStore {
    async fn create(&self, new: NewOrganization) -> Result<OrganizationWithMembers, DbError> {
        let mut tables = self.tables.write().await;
        unique(
            "organization",
            "name",
            tables.organizations.iter().any(|o| o.name == new.name.as_str()),
        )?;

        let now = Utc::now();
        let organization = OrganizationRecord {
            id: Uuid::new_v4(),
            name: new.name.into_string(),
            description: new.description.map(Description::into_string),
            created_at: now,
            updated_at: now,
        };
        tables.organizations.push(organization.clone());

        Ok(OrganizationWithMembers {
            organization,
            spaces: Vec::new(),
            users: Vec::new(),
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OrganizationWithMembers>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .organizations
            .iter()
            .find(|o| o.id == id)
            .map(|o| tables.organization_with_members(o)))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<OrganizationWithMembers>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .organizations
            .iter()
            .find(|o| o.name == name)
            .map(|o| tables.organization_with_members(o)))
    }

    async fn find_all(&self) -> Result<Vec<OrganizationWithMembers>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .organizations
            .iter()
            .map(|o| tables.organization_with_members(o))
            .collect())
    }

    async fn update(
        &self,
        id: Uuid,
        patch: OrganizationPatch,
    ) -> Result<Option<OrganizationWithMembers>, DbError> {
        let mut tables = self.tables.write().await;
        if !tables.organizations.iter().any(|o| o.id == id) {
            return Ok(None);
        }

        if let Some(name) = &patch.name {
            unique(
                "organization",
                "name",
                tables
                    .organizations
                    .iter()
                    .any(|o| o.id != id && o.name == name.as_str()),
            )?;
        }

        let Some(organization) = tables.organizations.iter_mut().find(|o| o.id == id) else {
            return Ok(None);
        };

        if let Some(name) = patch.name {
            organization.name = name.into_string();
        }
        if let Some(description) = patch.description {
            organization.description = Some(description.into_string());
        }
        organization.updated_at = Utc::now();

        let organization = organization.clone();
        Ok(Some(tables.organization_with_members(&organization)))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<OrganizationRecord>, DbError> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables.organizations.iter().position(|o| o.id == id) else {
            return Ok(None);
        };

        let organization = tables.organizations.remove(index);
        for space in tables.spaces.iter_mut().filter(|s| s.organization_id == Some(id)) {
            space.organization_id = None;
        }
        for user in tables.users.iter_mut().filter(|u| u.organization_id == Some(id)) {
            user.organization_id = None;
        }

        Ok(Some(organization))
    }
}

#[async_trait]
impl SpaceRepository for MemoryStore {
    async fn create(&self, new: NewSpace) -> Result<SpaceWithBookings, DbError> {
        let mut tables = self.tables.write().await;
        tables.require_organization(new.organization_id)?;
        unique(
            "space",
            "name",
            tables.spaces.iter().any(|s| s.name == new.name.as_str()),
        )?;

        let now = Utc::now();
        let space = SpaceRecord {
            id: Uuid::new_v4(),
            name: new.name.into_string(),
            description: new.description.map(Description::into_string),
            max_bookings: new.max_bookings.get(),
            organization_id: new.organization_id,
            created_at: now,
            updated_at: now,
        };
        tables.spaces.push(space.clone());

        Ok(SpaceWithBookings {
            space,
            bookings: Vec::new(),
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<SpaceWithBookings>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .spaces
            .iter()
            .find(|s| s.id == id)
            .map(|s| tables.space_with_bookings(s)))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<SpaceWithBookings>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .spaces
            .iter()
            .find(|s| s.name == name)
            .map(|s| tables.space_with_bookings(s)))
    }

    async fn find_all(&self) -> Result<Vec<SpaceWithBookings>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .spaces
            .iter()
            .map(|s| tables.space_with_bookings(s))
            .collect())
    }

    async fn update(
        &self,
        id: Uuid,
        patch: SpacePatch,
    ) -> Result<Option<SpaceWithBookings>, DbError> {
        let mut tables = self.tables.write().await;
        if !tables.spaces.iter().any(|s| s.id == id) {
            return Ok(None);
        }
        tables.require_organization(patch.organization_id)?;

        if let Some(name) = &patch.name {
            unique(
                "space",
                "name",
                tables
                    .spaces
                    .iter()
                    .any(|s| s.id != id && s.name == name.as_str()),
            )?;
        }

        let Some(space) = tables.spaces.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };

        if let Some(name) = patch.name {
            space.name = name.into_string();
        }
        if let Some(description) = patch.description {
            space.description = Some(description.into_string());
        }
        if let Some(max_bookings) = patch.max_bookings {
            space.max_bookings = max_bookings.get();
        }
        if let Some(org_id) = patch.organization_id {
            space.organization_id = Some(org_id);
        }
        space.updated_at = Utc::now();

        let space = space.clone();
        Ok(Some(tables.space_with_bookings(&space)))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<SpaceRecord>, DbError> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables.spaces.iter().position(|s| s.id == id) else {
            return Ok(None);
        };

        let space = tables.spaces.remove(index);
        tables.bookings.retain(|b| b.space_id != id);
        Ok(Some(space))
    }

    async fn count_bookings(&self, space_id: Uuid) -> Result<i64, DbError> {
        Ok(self.tables.read().await.live_bookings(space_id))
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, new: NewUser) -> Result<UserWithOrganization, DbError> {
        let mut tables = self.tables.write().await;
        tables.require_organization(new.organization_id)?;
        tables.check_user_unique(
            None,
            Some(new.username.as_str()),
            Some(new.email.as_str()),
            Some(new.external_id.as_str()),
        )?;

        let now = Utc::now();
        let user = UserRecord {
            id: Uuid::new_v4(),
            name: new.name.into_string(),
            username: new.username.into_string(),
            email: new.email.into_string(),
            external_id: new.external_id.into_string(),
            is_admin: new.is_admin,
            organization_id: new.organization_id,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());

        Ok(tables.user_with_organization(&user))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserWithOrganization>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.id == id)
            .map(|u| tables.user_with_organization(u)))
    }

    async fn find_all(&self) -> Result<Vec<UserWithOrganization>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .map(|u| tables.user_with_organization(u))
            .collect())
    }

    async fn update(
        &self,
        id: Uuid,
        patch: UserPatch,
    ) -> Result<Option<UserWithOrganization>, DbError> {
        let mut tables = self.tables.write().await;
        if !tables.users.iter().any(|u| u.id == id) {
            return Ok(None);
        }
        tables.require_organization(patch.organization_id)?;
        tables.check_user_unique(
            Some(id),
            patch.username.as_ref().map(|u| u.as_str()),
            patch.email.as_ref().map(|e| e.as_str()),
            patch.external_id.as_ref().map(|e| e.as_str()),
        )?;

        let Some(user) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };

        if let Some(name) = patch.name {
            user.name = name.into_string();
        }
        if let Some(username) = patch.username {
            user.username = username.into_string();
        }
        if let Some(email) = patch.email {
            user.email = email.into_string();
        }
        if let Some(external_id) = patch.external_id {
            user.external_id = external_id.into_string();
        }
        if let Some(is_admin) = patch.is_admin {
            user.is_admin = is_admin;
        }
        if let Some(org_id) = patch.organization_id {
            user.organization_id = Some(org_id);
        }
        user.updated_at = Utc::now();

        let user = user.clone();
        Ok(Some(tables.user_with_organization(&user)))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<UserRecord>, DbError> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables.users.iter().position(|u| u.id == id) else {
            return Ok(None);
        };

        let user = tables.users.remove(index);
        tables.bookings.retain(|b| b.user_id != id);
        Ok(Some(user))
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn create(&self, new: NewBooking) -> Result<BookingWithRefs, DbError> {
        let mut tables = self.tables.write().await;

        let max_bookings = tables
            .spaces
            .iter()
            .find(|s| s.id == new.space_id)
            .map(|s| s.max_bookings)
            .ok_or_else(|| DbError::not_found("space", new.space_id))?;

        if !tables.users.iter().any(|u| u.id == new.user_id) {
            return Err(DbError::not_found("user", new.user_id));
        }

        ensure_capacity(new.space_id, max_bookings, tables.live_bookings(new.space_id))?;

        let now = Utc::now();
        let booking = BookingRecord {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            space_id: new.space_id,
            name: new.name.map(EntityName::into_string),
            date: new.date,
            status: new.status.as_str().to_owned(),
            created_at: now,
            updated_at: now,
        };
        tables.bookings.push(booking.clone());

        Ok(tables.booking_with_refs(&booking))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<BookingWithRefs>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .iter()
            .find(|b| b.id == id)
            .map(|b| tables.booking_with_refs(b)))
    }

    async fn find_all(&self, filter: BookingFilter) -> Result<Vec<BookingWithRefs>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .iter()
            .filter(|b| filter.matches(b))
            .map(|b| tables.booking_with_refs(b))
            .collect())
    }

    async fn update(
        &self,
        id: Uuid,
        patch: BookingPatch,
    ) -> Result<Option<BookingWithRefs>, DbError> {
        let mut tables = self.tables.write().await;
        if !tables.bookings.iter().any(|b| b.id == id) {
            return Ok(None);
        }

        if let Some(user_id) = patch.user_id {
            if !tables.users.iter().any(|u| u.id == user_id) {
                return Err(DbError::not_found("user", user_id));
            }
        }
        if let Some(space_id) = patch.space_id {
            if !tables.spaces.iter().any(|s| s.id == space_id) {
                return Err(DbError::not_found("space", space_id));
            }
        }

        let Some(booking) = tables.bookings.iter_mut().find(|b| b.id == id) else {
            return Ok(None);
        };

        if let Some(user_id) = patch.user_id {
            booking.user_id = user_id;
        }
        if let Some(space_id) = patch.space_id {
            booking.space_id = space_id;
        }
        if let Some(name) = patch.name {
            booking.name = Some(name.into_string());
        }
        if let Some(date) = patch.date {
            booking.date = date;
        }
        if let Some(status) = patch.status {
            booking.status = status.as_str().to_owned();
        }
        booking.updated_at = Utc::now();

        let booking = booking.clone();
        Ok(Some(tables.booking_with_refs(&booking)))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<BookingRecord>, DbError> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables.bookings.iter().position(|b| b.id == id) else {
            return Ok(None);
        };
        Ok(Some(tables.bookings.remove(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Repositories;
    use smashit_core::{Email, ExternalUserId, MaxBookings, Username};

    fn name(s: &str) -> EntityName {
        EntityName::new("name", s).unwrap()
    }

    fn new_user(tag: &str, organization_id: Option<Uuid>) -> NewUser {
        NewUser {
            name: name("Test User"),
            username: Username::new(tag).unwrap(),
            email: Email::new(&format!("{tag}@example.com")).unwrap(),
            external_id: ExternalUserId::new(&format!("ext-{tag}")).unwrap(),
            is_admin: false,
            organization_id,
        }
    }

    fn new_space(space_name: &str, max: i64, organization_id: Option<Uuid>) -> NewSpace {
        NewSpace {
            name: name(space_name),
            description: None,
            max_bookings: MaxBookings::new(max).unwrap(),
            organization_id,
        }
    }

    fn new_booking(user_id: Uuid, space_id: Uuid, status: BookingStatus) -> NewBooking {
        NewBooking {
            user_id,
            space_id,
            name: None,
            date: Utc::now(),
            status,
        }
    }

    #[tokio::test]
    async fn organization_lists_follow_children() {
        let repos = Repositories::in_memory();
        let org = repos
            .organizations
            .create(NewOrganization {
                name: name("Acme"),
                description: None,
            })
            .await
            .unwrap();
        let org_id = org.organization.id;

        let a = repos.spaces.create(new_space("A", 1, Some(org_id))).await.unwrap();
        repos.spaces.create(new_space("B", 1, Some(org_id))).await.unwrap();
        repos.users.create(new_user("jane", Some(org_id))).await.unwrap();

        let found = repos.organizations.find_by_id(org_id).await.unwrap().unwrap();
        let names: Vec<_> = found.spaces.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
        assert_eq!(found.users.len(), 1);

        repos.spaces.delete(a.space.id).await.unwrap();
        let found = repos.organizations.find_by_id(org_id).await.unwrap().unwrap();
        assert_eq!(found.spaces.len(), 1);
        assert_eq!(found.spaces[0].name, "B");
    }

    #[tokio::test]
    async fn deleting_organization_detaches_children() {
        let repos = Repositories::in_memory();
        let org = repos
            .organizations
            .create(NewOrganization {
                name: name("Gone"),
                description: None,
            })
            .await
            .unwrap();
        let space = repos
            .spaces
            .create(new_space("Orphan", 1, Some(org.organization.id)))
            .await
            .unwrap();

        repos.organizations.delete(org.organization.id).await.unwrap();

        let space = repos.spaces.find_by_id(space.space.id).await.unwrap().unwrap();
        assert_eq!(space.space.organization_id, None);
    }

    #[tokio::test]
    async fn capacity_ignores_cancelled_bookings() {
        let repos = Repositories::in_memory();
        let user = repos.users.create(new_user("booker", None)).await.unwrap();
        let space = repos.spaces.create(new_space("Desk", 1, None)).await.unwrap();
        let (user_id, space_id) = (user.user.id, space.space.id);

        let first = repos
            .bookings
            .create(new_booking(user_id, space_id, BookingStatus::Confirmed))
            .await
            .unwrap();

        let err = repos
            .bookings
            .create(new_booking(user_id, space_id, BookingStatus::Pending))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::CapacityExceeded { .. }));

        repos
            .bookings
            .update(
                first.booking.id,
                BookingPatch {
                    status: Some(BookingStatus::Cancelled),
                    ..BookingPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(repos.spaces.count_bookings(space_id).await.unwrap(), 0);
        repos
            .bookings
            .create(new_booking(user_id, space_id, BookingStatus::Pending))
            .await
            .expect("cancelled booking frees the slot");
    }

    #[tokio::test]
    async fn concurrent_creations_never_overbook() {
        let repos = Repositories::in_memory();
        let user = repos.users.create(new_user("rush", None)).await.unwrap();
        let space = repos.spaces.create(new_space("Hall", 4, None)).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let bookings = repos.bookings.clone();
                let new = new_booking(user.user.id, space.space.id, BookingStatus::Confirmed);
                tokio::spawn(async move { bookings.create(new).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }

        assert_eq!(created, 4);
        let space = repos.spaces.find_by_id(space.space.id).await.unwrap().unwrap();
        assert_eq!(space.bookings.len(), 4);
    }

    #[tokio::test]
    async fn duplicate_user_fields_conflict() {
        let repos = Repositories::in_memory();
        repos.users.create(new_user("taken", None)).await.unwrap();

        let mut dup = new_user("other", None);
        dup.email = Email::new("taken@example.com").unwrap();
        let err = repos.users.create(dup).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict { ref field, .. } if field == "email"));
    }

    #[tokio::test]
    async fn updating_to_own_name_is_not_a_conflict() {
        let repos = Repositories::in_memory();
        let space = repos.spaces.create(new_space("Same", 2, None)).await.unwrap();

        let updated = repos
            .spaces
            .update(
                space.space.id,
                SpacePatch {
                    name: Some(name("Same")),
                    ..SpacePatch::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.is_some());
    }

    #[tokio::test]
    async fn updating_missing_rows_is_none_even_with_taken_values() {
        let repos = Repositories::in_memory();
        repos.spaces.create(new_space("Taken", 1, None)).await.unwrap();
        repos.users.create(new_user("taken", None)).await.unwrap();

        let space = repos
            .spaces
            .update(
                Uuid::nil(),
                SpacePatch {
                    name: Some(name("Taken")),
                    ..SpacePatch::default()
                },
            )
            .await
            .unwrap();
        assert!(space.is_none());

        let user = repos
            .users
            .update(
                Uuid::nil(),
                UserPatch {
                    email: Some(Email::new("taken@example.com").unwrap()),
                    organization_id: Some(Uuid::new_v4()),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn deleting_user_removes_their_bookings() {
        let repos = Repositories::in_memory();
        let user = repos.users.create(new_user("leaver", None)).await.unwrap();
        let space = repos.spaces.create(new_space("Booth", 3, None)).await.unwrap();
        repos
            .bookings
            .create(new_booking(user.user.id, space.space.id, BookingStatus::Pending))
            .await
            .unwrap();

        repos.users.delete(user.user.id).await.unwrap();

        let bookings = repos
            .bookings
            .find_all(BookingFilter {
                space_id: Some(space.space.id),
                ..BookingFilter::default()
            })
            .await
            .unwrap();
        assert!(bookings.is_empty());
    }
}
