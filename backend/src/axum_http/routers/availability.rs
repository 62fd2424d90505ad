use crate::{
    auth::AuthUser,
    axum_http::error_responses::ApiError,
    usecases::availability::AvailabilityUseCase,
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, patch},
};
use chrono::{DateTime, Utc};
use futures_util::stream;
use parkbay::{
    domain::value_objects::availability::UpdateSpaceRequest,
    infra::{
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{
                bookings::BookingPostgres, listings::ListingPostgres, spaces::SpacePostgres,
                user_roles::UserRolePostgres,
            },
        },
        realtime::change_feed::ChangeFeed,
    },
};
use serde::Deserialize;
use std::{convert::Infallible, sync::Arc};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type AvailabilityService =
    AvailabilityUseCase<ListingPostgres, SpacePostgres, BookingPostgres, UserRolePostgres>;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// Comma separated listing ids.
    listing_ids: String,
    at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SpacesQuery {
    at: Option<DateTime<Utc>>,
}

pub fn routes(db_pool: Arc<PgPoolSquad>, change_feed: ChangeFeed) -> Router {
    let usecase = AvailabilityUseCase::new(
        Arc::new(ListingPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SpacePostgres::new(Arc::clone(&db_pool))),
        Arc::new(BookingPostgres::new(Arc::clone(&db_pool))),
        Arc::new(UserRolePostgres::new(Arc::clone(&db_pool))),
        change_feed,
    );

    Router::new()
        .route("/availability", get(listing_availability))
        .route("/availability/stream", get(availability_stream))
        .route("/listings/:listing_id/spaces", get(listing_spaces))
        .route("/spaces/:space_id", patch(update_space))
        .with_state(Arc::new(usecase))
}

fn parse_listing_ids(raw: &str) -> Result<Vec<Uuid>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Uuid::parse_str(s)
                .map_err(|_| ApiError::bad_request(format!("invalid listing id: {s}")))
        })
        .collect()
}

pub async fn listing_availability(
    State(usecase): State<Arc<AvailabilityService>>,
    Query(query): Query<AvailabilityQuery>,
) -> Response {
    let listing_ids = match parse_listing_ids(&query.listing_ids) {
        Ok(ids) => ids,
        Err(err) => return err.into_response(),
    };

    match usecase.listing_availability(listing_ids, query.at).await {
        Ok(listings) => Json(listings).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

/// Emits the full derivation once on connect and again after every booking or space
/// change.
pub async fn availability_stream(
    State(usecase): State<Arc<AvailabilityService>>,
    Query(query): Query<AvailabilityQuery>,
) -> Response {
    let listing_ids = match parse_listing_ids(&query.listing_ids) {
        Ok(ids) => ids,
        Err(err) => return err.into_response(),
    };
    let receiver = usecase.subscribe_changes();
    info!(listings = listing_ids.len(), "availability: stream opened");

    let events = stream::unfold(
        (usecase, receiver, listing_ids, true),
        |(usecase, mut receiver, listing_ids, first)| async move {
            if !first {
                match receiver.recv().await {
                    Ok(change) => debug!(table = change.table_name(), "availability: change received"),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "availability: stream lagged, recomputing");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }

            let event = match usecase.listing_availability(listing_ids.clone(), None).await {
                Ok(listings) => match Event::default().event("availability").json_data(&listings) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(error = %err, "availability: failed to encode stream event");
                        Event::default().event("error").data("encoding failed")
                    }
                },
                Err(err) => {
                    warn!(error = %err, "availability: stream derivation failed");
                    Event::default().event("error").data(err.to_string())
                }
            };

            Some((
                Ok::<Event, Infallible>(event),
                (usecase, receiver, listing_ids, false),
            ))
        },
    );

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

pub async fn listing_spaces(
    State(usecase): State<Arc<AvailabilityService>>,
    Path(listing_id): Path<Uuid>,
    Query(query): Query<SpacesQuery>,
) -> Response {
    match usecase.listing_spaces(listing_id, query.at).await {
        Ok(spaces) => Json(spaces).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn update_space(
    State(usecase): State<Arc<AvailabilityService>>,
    auth: AuthUser,
    Path(space_id): Path<Uuid>,
    Json(request): Json<UpdateSpaceRequest>,
) -> Response {
    info!(user_id = %auth.user_id, %space_id, "spaces: update request received");
    match usecase
        .update_space(auth.user_id, auth.is_service_role(), space_id, request)
        .await
    {
        Ok(space) => Json(space).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_ids_are_split_and_trimmed() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ids = parse_listing_ids(&format!("{a}, {b},")).unwrap();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn malformed_listing_id_is_bad_request() {
        let err = parse_listing_ids("not-a-uuid").unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }
}
