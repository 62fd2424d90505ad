use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::{bookings::BookingEntity, listings::ListingEntity, spaces::SpaceEntity},
    value_objects::enums::{
        availability_statuses::{AvailabilityLabel, SpaceAvailability},
        space_statuses::SpaceStatus,
    },
};

/// Time window an availability question is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl AvailabilityWindow {
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            start: instant,
            end: instant,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpaceCounts {
    pub total: usize,
    pub available: usize,
    pub booked: usize,
    pub maintenance: usize,
    pub reserved: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpaceSummary {
    pub status: SpaceAvailability,
    #[serde(flatten)]
    pub counts: SpaceCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpaceDto {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub space_number: String,
    pub stored_status: String,
    pub override_status: bool,
    pub effective_status: SpaceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingSpacesDto {
    pub listing_id: Uuid,
    pub spaces: Vec<SpaceDto>,
    pub summary: SpaceSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingAvailabilityDto {
    pub listing_id: Uuid,
    pub label: AvailabilityLabel,
    pub summary: SpaceSummary,
}

/// Admin edit of a space. Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSpaceRequest {
    pub space_status: Option<SpaceStatus>,
    pub override_status: Option<bool>,
}

impl SpaceDto {
    /// Row as stored, with the effective status computed from `bookings`.
    pub fn derive(space: &SpaceEntity, bookings: &[BookingEntity], window: AvailabilityWindow) -> Self {
        Self {
            id: space.id,
            listing_id: space.listing_id,
            space_number: space.space_number.clone(),
            stored_status: space.space_status.clone(),
            override_status: space.override_status,
            effective_status: effective_space_status(space, bookings, window),
        }
    }
}

/// Status a space shows for the window.
///
/// An admin override pins the stored status. Otherwise an active booking on the space that
/// overlaps the window marks it booked.
pub fn effective_space_status(
    space: &SpaceEntity,
    bookings: &[BookingEntity],
    window: AvailabilityWindow,
) -> SpaceStatus {
    let stored = SpaceStatus::from_str(&space.space_status).unwrap_or(SpaceStatus::Maintenance);
    if space.override_status {
        return stored;
    }

    let occupied = bookings.iter().any(|booking| {
        booking.space_id == Some(space.id)
            && booking.booking_status().is_some_and(|s| s.is_active())
            && booking.overlaps(window.start, window.end)
    });

    if occupied { SpaceStatus::Booked } else { stored }
}

pub fn summarize_statuses(statuses: &[SpaceStatus]) -> SpaceSummary {
    let mut counts = SpaceCounts {
        total: statuses.len(),
        ..Default::default()
    };

    for status in statuses {
        match status {
            SpaceStatus::Available => counts.available += 1,
            SpaceStatus::Booked => counts.booked += 1,
            SpaceStatus::Maintenance => counts.maintenance += 1,
            SpaceStatus::Reserved => counts.reserved += 1,
        }
    }

    let status = if counts.total == 0 {
        SpaceAvailability::NoSpaces
    } else if counts.available == counts.total {
        SpaceAvailability::Available
    } else if counts.booked == counts.total {
        SpaceAvailability::Booked
    } else {
        SpaceAvailability::Mixed
    };

    SpaceSummary { status, counts }
}

pub fn derive_listing_spaces(
    listing_id: Uuid,
    spaces: &[SpaceEntity],
    bookings: &[BookingEntity],
    window: AvailabilityWindow,
) -> ListingSpacesDto {
    let spaces: Vec<SpaceDto> = spaces
        .iter()
        .filter(|space| space.listing_id == listing_id)
        .map(|space| SpaceDto::derive(space, bookings, window))
        .collect();

    let statuses: Vec<SpaceStatus> = spaces.iter().map(|s| s.effective_status).collect();

    ListingSpacesDto {
        listing_id,
        summary: summarize_statuses(&statuses),
        spaces,
    }
}

/// Availability label for a listing.
///
/// Listings that are not approved and active are unavailable. Listings without space rows
/// fall back to checking bookings placed on the listing itself.
pub fn derive_listing_availability(
    listing: &ListingEntity,
    spaces: &[SpaceEntity],
    bookings: &[BookingEntity],
    window: AvailabilityWindow,
) -> ListingAvailabilityDto {
    let derived = derive_listing_spaces(listing.id, spaces, bookings, window);

    let label = if !listing.is_bookable() {
        AvailabilityLabel::Unavailable
    } else {
        match derived.summary.status {
            SpaceAvailability::Available => AvailabilityLabel::Available,
            SpaceAvailability::Booked => AvailabilityLabel::Booked,
            SpaceAvailability::Mixed => AvailabilityLabel::Mixed,
            SpaceAvailability::NoSpaces => {
                let occupied = bookings.iter().any(|booking| {
                    booking.listing_id == listing.id
                        && booking.booking_status().is_some_and(|s| s.is_active())
                        && booking.overlaps(window.start, window.end)
                });
                if occupied {
                    AvailabilityLabel::Booked
                } else {
                    AvailabilityLabel::Available
                }
            }
        }
    };

    ListingAvailabilityDto {
        listing_id: listing.id,
        label,
        summary: derived.summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn listing(status: &str, is_active: bool) -> ListingEntity {
        ListingEntity {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: "Bay near station".to_string(),
            address: "1 Station Road".to_string(),
            price_per_month_minor: 50_000,
            status: status.to_string(),
            is_active,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn space(listing_id: Uuid, status: &str, override_status: bool) -> SpaceEntity {
        SpaceEntity {
            id: Uuid::new_v4(),
            listing_id,
            space_number: "A1".to_string(),
            space_status: status.to_string(),
            override_status,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn booking(listing_id: Uuid, space_id: Option<Uuid>, status: &str) -> BookingEntity {
        BookingEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            listing_id,
            space_id,
            start_time: now() - Duration::days(1),
            end_time: now() + Duration::days(30),
            duration_hours: 1,
            status: status.to_string(),
            payment_status: "pre_authorized".to_string(),
            payment_type: "one_time".to_string(),
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
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn zero_spaces_is_no_spaces() {
        let summary = summarize_statuses(&[]);
        assert_eq!(summary.status, SpaceAvailability::NoSpaces);
        assert_eq!(summary.counts.total, 0);
    }

    #[test]
    fn all_available_is_available() {
        let summary = summarize_statuses(&[SpaceStatus::Available, SpaceStatus::Available]);
        assert_eq!(summary.status, SpaceAvailability::Available);
        assert_eq!(summary.counts.available, 2);
    }

    #[test]
    fn all_booked_is_booked() {
        let summary = summarize_statuses(&[SpaceStatus::Booked]);
        assert_eq!(summary.status, SpaceAvailability::Booked);
    }

    #[test]
    fn mixed_statuses_are_mixed() {
        let summary = summarize_statuses(&[
            SpaceStatus::Available,
            SpaceStatus::Booked,
            SpaceStatus::Maintenance,
        ]);
        assert_eq!(summary.status, SpaceAvailability::Mixed);
        assert_eq!(
            summary.counts,
            SpaceCounts {
                total: 3,
                available: 1,
                booked: 1,
                maintenance: 1,
                reserved: 0,
            }
        );
    }

    #[test]
    fn overlapping_active_booking_marks_space_booked() {
        let listing = listing("approved", true);
        let free = space(listing.id, "available", false);
        let taken = space(listing.id, "available", false);
        let bookings = vec![booking(listing.id, Some(taken.id), "confirmed")];

        let derived = derive_listing_spaces(
            listing.id,
            &[free, taken],
            &bookings,
            AvailabilityWindow::at(now()),
        );

        assert_eq!(derived.summary.status, SpaceAvailability::Mixed);
        assert_eq!(derived.spaces[1].effective_status, SpaceStatus::Booked);
    }

    #[test]
    fn cancelled_bookings_do_not_occupy_spaces() {
        let listing = listing("approved", true);
        let bay = space(listing.id, "available", false);
        let bookings = vec![booking(listing.id, Some(bay.id), "cancelled")];

        let status = effective_space_status(&bay, &bookings, AvailabilityWindow::at(now()));
        assert_eq!(status, SpaceStatus::Available);
    }

    #[test]
    fn override_pins_stored_status() {
        let listing = listing("approved", true);
        let bay = space(listing.id, "available", true);
        let bookings = vec![booking(listing.id, Some(bay.id), "confirmed")];

        let status = effective_space_status(&bay, &bookings, AvailabilityWindow::at(now()));
        assert_eq!(status, SpaceStatus::Available);
    }

    #[test]
    fn booking_outside_window_is_ignored() {
        let listing = listing("approved", true);
        let bay = space(listing.id, "available", false);
        let bookings = vec![booking(listing.id, Some(bay.id), "confirmed")];
        let window = AvailabilityWindow::at(now() + Duration::days(60));

        assert_eq!(
            effective_space_status(&bay, &bookings, window),
            SpaceStatus::Available
        );
    }

    #[test]
    fn unapproved_listing_is_unavailable() {
        let listing = listing("pending", true);
        let spaces = vec![space(listing.id, "available", false)];

        let derived =
            derive_listing_availability(&listing, &spaces, &[], AvailabilityWindow::at(now()));
        assert_eq!(derived.label, AvailabilityLabel::Unavailable);
        assert_eq!(derived.summary.status, SpaceAvailability::Available);
    }

    #[test]
    fn listing_without_spaces_uses_listing_bookings() {
        let listing = listing("approved", true);
        let bookings = vec![booking(listing.id, None, "pending_review")];

        let derived =
            derive_listing_availability(&listing, &[], &bookings, AvailabilityWindow::at(now()));
        assert_eq!(derived.summary.status, SpaceAvailability::NoSpaces);
        assert_eq!(derived.label, AvailabilityLabel::Booked);

        let derived =
            derive_listing_availability(&listing, &[], &[], AvailabilityWindow::at(now()));
        assert_eq!(derived.label, AvailabilityLabel::Available);
    }
}
