use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpaceStatus {
    Available,
    Booked,
    Maintenance,
    Reserved,
}

impl SpaceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpaceStatus::Available => "available",
            SpaceStatus::Booked => "booked",
            SpaceStatus::Maintenance => "maintenance",
            SpaceStatus::Reserved => "reserved",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "available" => Some(SpaceStatus::Available),
            "booked" => Some(SpaceStatus::Booked),
            "maintenance" => Some(SpaceStatus::Maintenance),
            "reserved" => Some(SpaceStatus::Reserved),
            _ => None,
        }
    }
}

impl Display for SpaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
