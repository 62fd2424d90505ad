use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            ListingStatus::Pending => "pending",
            ListingStatus::Approved => "approved",
            ListingStatus::Rejected => "rejected",
        };
        write!(f, "{}", status)
    }
}

impl ListingStatus {
    pub fn from_str(value: &str) -> Self {
        match value {
            "approved" => ListingStatus::Approved,
            "rejected" => ListingStatus::Rejected,
            _ => ListingStatus::Pending,
        }
    }
}
