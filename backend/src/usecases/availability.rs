use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use parkbay::{
    domain::{
        entities::spaces::UpdateSpaceEntity,
        repositories::{
            bookings::BookingRepository, listings::ListingRepository, spaces::SpaceRepository,
            user_roles::UserRoleRepository,
        },
        value_objects::{
            availability::{
                AvailabilityWindow, ListingAvailabilityDto, ListingSpacesDto, SpaceDto,
                UpdateSpaceRequest, derive_listing_availability, derive_listing_spaces,
            },
            change_feed::TableChange,
        },
    },
    infra::realtime::change_feed::ChangeFeed,
};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Upper bound on listing ids per availability request.
pub const MAX_LISTINGS_PER_REQUEST: usize = 100;

#[derive(Debug, Error)]
pub enum AvailabilityError {
    #[error("invalid availability request: {0}")]
    InvalidRequest(String),
    #[error("listing not found")]
    ListingNotFound,
    #[error("space not found")]
    SpaceNotFound,
    #[error("admin role required")]
    Forbidden,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AvailabilityError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AvailabilityError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AvailabilityError::ListingNotFound | AvailabilityError::SpaceNotFound => {
                StatusCode::NOT_FOUND
            }
            AvailabilityError::Forbidden => StatusCode::FORBIDDEN,
            AvailabilityError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, AvailabilityError>;

/// Read-side availability. Nothing derived here is ever written back.
pub struct AvailabilityUseCase<L, S, B, R>
where
    L: ListingRepository + Send + Sync + 'static,
    S: SpaceRepository + Send + Sync + 'static,
    B: BookingRepository + Send + Sync + 'static,
    R: UserRoleRepository + Send + Sync + 'static,
{
    listing_repo: Arc<L>,
    space_repo: Arc<S>,
    booking_repo: Arc<B>,
    user_role_repo: Arc<R>,
    change_feed: ChangeFeed,
}

impl<L, S, B, R> AvailabilityUseCase<L, S, B, R>
where
    L: ListingRepository + Send + Sync + 'static,
    S: SpaceRepository + Send + Sync + 'static,
    B: BookingRepository + Send + Sync + 'static,
    R: UserRoleRepository + Send + Sync + 'static,
{
    pub fn new(
        listing_repo: Arc<L>,
        space_repo: Arc<S>,
        booking_repo: Arc<B>,
        user_role_repo: Arc<R>,
        change_feed: ChangeFeed,
    ) -> Self {
        Self {
            listing_repo,
            space_repo,
            booking_repo,
            user_role_repo,
            change_feed,
        }
    }

    pub async fn listing_availability(
        &self,
        listing_ids: Vec<Uuid>,
        at: Option<DateTime<Utc>>,
    ) -> UseCaseResult<Vec<ListingAvailabilityDto>> {
        let mut listing_ids = listing_ids;
        listing_ids.sort();
        listing_ids.dedup();

        if listing_ids.is_empty() {
            return Err(AvailabilityError::InvalidRequest(
                "at least one listing id is required".to_string(),
            ));
        }
        if listing_ids.len() > MAX_LISTINGS_PER_REQUEST {
            return Err(AvailabilityError::InvalidRequest(format!(
                "at most {MAX_LISTINGS_PER_REQUEST} listing ids per request"
            )));
        }

        let window = AvailabilityWindow::at(at.unwrap_or_else(Utc::now));

        let listings = self
            .listing_repo
            .list_by_ids(listing_ids.clone())
            .await
            .map_err(|err| {
                error!(db_error = ?err, "availability: failed to load listings");
                AvailabilityError::Internal(err)
            })?;
        let spaces = self
            .space_repo
            .list_by_listing_ids(listing_ids.clone())
            .await
            .map_err(|err| {
                error!(db_error = ?err, "availability: failed to load spaces");
                AvailabilityError::Internal(err)
            })?;
        let bookings = self
            .booking_repo
            .list_active_for_listings(listing_ids, window.start, window.end)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "availability: failed to load bookings");
                AvailabilityError::Internal(err)
            })?;

        Ok(listings
            .iter()
            .map(|listing| derive_listing_availability(listing, &spaces, &bookings, window))
            .collect())
    }

    pub async fn listing_spaces(
        &self,
        listing_id: Uuid,
        at: Option<DateTime<Utc>>,
    ) -> UseCaseResult<ListingSpacesDto> {
        let window = AvailabilityWindow::at(at.unwrap_or_else(Utc::now));

        self.listing_repo
            .find_by_id(listing_id)
            .await
            .map_err(|err| {
                error!(%listing_id, db_error = ?err, "availability: failed to load listing");
                AvailabilityError::Internal(err)
            })?
            .ok_or(AvailabilityError::ListingNotFound)?;

        let spaces = self
            .space_repo
            .list_by_listing_ids(vec![listing_id])
            .await
            .map_err(|err| {
                error!(%listing_id, db_error = ?err, "availability: failed to load spaces");
                AvailabilityError::Internal(err)
            })?;
        let bookings = self
            .booking_repo
            .list_active_for_listings(vec![listing_id], window.start, window.end)
            .await
            .map_err(|err| {
                error!(%listing_id, db_error = ?err, "availability: failed to load bookings");
                AvailabilityError::Internal(err)
            })?;

        Ok(derive_listing_spaces(listing_id, &spaces, &bookings, window))
    }

    pub async fn update_space(
        &self,
        caller_id: Uuid,
        caller_is_service: bool,
        space_id: Uuid,
        request: UpdateSpaceRequest,
    ) -> UseCaseResult<SpaceDto> {
        if !caller_is_service {
            let is_admin = self.user_role_repo.is_admin(caller_id).await.map_err(|err| {
                error!(%caller_id, db_error = ?err, "availability: failed to load roles");
                AvailabilityError::Internal(err)
            })?;
            if !is_admin {
                warn!(%caller_id, %space_id, "availability: non-admin space update rejected");
                return Err(AvailabilityError::Forbidden);
            }
        }

        if request.space_status.is_none() && request.override_status.is_none() {
            return Err(AvailabilityError::InvalidRequest(
                "space_status or override_status is required".to_string(),
            ));
        }

        let changes = UpdateSpaceEntity {
            space_status: request.space_status.map(|s| s.as_str().to_string()),
            override_status: request.override_status,
            updated_at: None,
        };

        let space = self
            .space_repo
            .update_space(space_id, changes)
            .await
            .map_err(|err| {
                error!(%space_id, db_error = ?err, "availability: failed to update space");
                AvailabilityError::Internal(err)
            })?
            .ok_or(AvailabilityError::SpaceNotFound)?;

        info!(
            %space_id,
            space_status = %space.space_status,
            override_status = space.override_status,
            "availability: space updated"
        );
        self.change_feed.publish(TableChange::ParkingSpaces);

        let now = Utc::now();
        let bookings = self
            .booking_repo
            .list_active_for_listings(vec![space.listing_id], now, now)
            .await
            .map_err(|err| {
                error!(%space_id, db_error = ?err, "availability: failed to load bookings");
                AvailabilityError::Internal(err)
            })?;

        Ok(SpaceDto::derive(&space, &bookings, AvailabilityWindow::at(now)))
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<TableChange> {
        self.change_feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use parkbay::domain::{
        entities::{bookings::BookingEntity, listings::ListingEntity, spaces::SpaceEntity},
        repositories::{
            bookings::MockBookingRepository, listings::MockListingRepository,
            spaces::MockSpaceRepository, user_roles::MockUserRoleRepository,
        },
        value_objects::enums::{
            availability_statuses::{AvailabilityLabel, SpaceAvailability},
            space_statuses::SpaceStatus,
        },
    };

    fn listing(id: Uuid) -> ListingEntity {
        let now = Utc::now();
        ListingEntity {
            id,
            owner_id: Uuid::new_v4(),
            title: "Covered bay".into(),
            address: "1 Station Road".into(),
            price_per_month_minor: 50_000,
            status: "approved".into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn space(listing_id: Uuid, status: &str) -> SpaceEntity {
        let now = Utc::now();
        SpaceEntity {
            id: Uuid::new_v4(),
            listing_id,
            space_number: "A1".into(),
            space_status: status.into(),
            override_status: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn booking_on(listing_id: Uuid, space_id: Uuid) -> BookingEntity {
        let now = Utc::now();
        BookingEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            listing_id,
            space_id: Some(space_id),
            start_time: now - Duration::days(1),
            end_time: now + Duration::days(30),
            duration_hours: 1,
            status: "confirmed".into(),
            payment_status: "confirmed".into(),
            payment_type: "one_time".into(),
            total_amount_minor: 50_000,
            renter_email: None,
            stripe_customer_id: None,
            stripe_session_id: None,
            stripe_payment_intent_id: None,
            stripe_subscription_id: None,
            pre_authorization_amount_minor: None,
            captured_amount_minor: None,
            security_deposit_minor: None,
            pre_authorization_expires_at: None,
            confirmation_deadline: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn usecase(
        listings: MockListingRepository,
        spaces: MockSpaceRepository,
        bookings: MockBookingRepository,
        roles: MockUserRoleRepository,
        feed: ChangeFeed,
    ) -> AvailabilityUseCase<
        MockListingRepository,
        MockSpaceRepository,
        MockBookingRepository,
        MockUserRoleRepository,
    > {
        AvailabilityUseCase::new(
            Arc::new(listings),
            Arc::new(spaces),
            Arc::new(bookings),
            Arc::new(roles),
            feed,
        )
    }

    #[tokio::test]
    async fn listings_are_labelled_from_spaces_and_bookings() {
        let mixed_id = Uuid::new_v4();
        let empty_id = Uuid::new_v4();

        let free = space(mixed_id, "available");
        let taken = space(mixed_id, "available");
        let booking = booking_on(mixed_id, taken.id);

        let mut listings = MockListingRepository::new();
        listings
            .expect_list_by_ids()
            .returning(move |_| Ok(vec![listing(mixed_id), listing(empty_id)]));

        let mut spaces = MockSpaceRepository::new();
        let rows = vec![free, taken];
        spaces
            .expect_list_by_listing_ids()
            .returning(move |_| Ok(rows.clone()));

        let mut bookings = MockBookingRepository::new();
        bookings
            .expect_list_active_for_listings()
            .returning(move |_, _, _| Ok(vec![booking.clone()]));

        let result = usecase(
            listings,
            spaces,
            bookings,
            MockUserRoleRepository::new(),
            ChangeFeed::new(),
        )
        .listing_availability(vec![mixed_id, empty_id, mixed_id], None)
        .await
        .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].label, AvailabilityLabel::Mixed);
        assert_eq!(result[0].summary.counts.booked, 1);
        assert_eq!(result[1].summary.status, SpaceAvailability::NoSpaces);
        assert_eq!(result[1].label, AvailabilityLabel::Available);
    }

    #[tokio::test]
    async fn empty_request_is_rejected() {
        let err = usecase(
            MockListingRepository::new(),
            MockSpaceRepository::new(),
            MockBookingRepository::new(),
            MockUserRoleRepository::new(),
            ChangeFeed::new(),
        )
        .listing_availability(Vec::new(), None)
        .await
        .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn spaces_of_missing_listing_is_not_found() {
        let mut listings = MockListingRepository::new();
        listings.expect_find_by_id().returning(|_| Ok(None));

        let err = usecase(
            listings,
            MockSpaceRepository::new(),
            MockBookingRepository::new(),
            MockUserRoleRepository::new(),
            ChangeFeed::new(),
        )
        .listing_spaces(Uuid::new_v4(), None)
        .await
        .unwrap_err();

        assert!(matches!(err, AvailabilityError::ListingNotFound));
    }

    #[tokio::test]
    async fn non_admin_cannot_update_space() {
        let mut roles = MockUserRoleRepository::new();
        roles.expect_is_admin().returning(|_| Ok(false));

        let mut spaces = MockSpaceRepository::new();
        spaces.expect_update_space().never();

        let err = usecase(
            MockListingRepository::new(),
            spaces,
            MockBookingRepository::new(),
            roles,
            ChangeFeed::new(),
        )
        .update_space(
            Uuid::new_v4(),
            false,
            Uuid::new_v4(),
            UpdateSpaceRequest {
                space_status: Some(SpaceStatus::Maintenance),
                override_status: Some(true),
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_update_publishes_space_change() {
        let listing_id = Uuid::new_v4();
        let mut updated = space(listing_id, "maintenance");
        updated.override_status = true;
        let space_id = updated.id;

        let mut roles = MockUserRoleRepository::new();
        roles.expect_is_admin().returning(|_| Ok(true));

        let mut spaces = MockSpaceRepository::new();
        spaces
            .expect_update_space()
            .withf(move |id, changes| {
                *id == space_id
                    && changes.space_status.as_deref() == Some("maintenance")
                    && changes.override_status == Some(true)
            })
            .returning(move |_, _| Ok(Some(updated.clone())));

        let mut bookings = MockBookingRepository::new();
        bookings
            .expect_list_active_for_listings()
            .returning(|_, _, _| Ok(Vec::new()));

        let feed = ChangeFeed::new();
        let mut changes = feed.subscribe();

        let dto = usecase(
            MockListingRepository::new(),
            spaces,
            bookings,
            roles,
            feed,
        )
        .update_space(
            Uuid::new_v4(),
            false,
            space_id,
            UpdateSpaceRequest {
                space_status: Some(SpaceStatus::Maintenance),
                override_status: Some(true),
            },
        )
        .await
        .unwrap();

        assert_eq!(dto.effective_status, SpaceStatus::Maintenance);
        assert_eq!(changes.try_recv().unwrap(), TableChange::ParkingSpaces);
    }
}
