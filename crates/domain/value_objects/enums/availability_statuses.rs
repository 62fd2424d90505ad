use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Classification of a listing from its space rows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpaceAvailability {
    NoSpaces,
    Available,
    Booked,
    Mixed,
}

/// Label shown for a listing in search results and on the listing page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityLabel {
    Available,
    Booked,
    Mixed,
    Unavailable,
}

impl Display for SpaceAvailability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            SpaceAvailability::NoSpaces => "no_spaces",
            SpaceAvailability::Available => "available",
            SpaceAvailability::Booked => "booked",
            SpaceAvailability::Mixed => "mixed",
        };
        write!(f, "{}", value)
    }
}

impl Display for AvailabilityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            AvailabilityLabel::Available => "available",
            AvailabilityLabel::Booked => "booked",
            AvailabilityLabel::Mixed => "mixed",
            AvailabilityLabel::Unavailable => "unavailable",
        };
        write!(f, "{}", value)
    }
}
