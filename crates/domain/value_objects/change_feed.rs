use serde::Serialize;

/// Tables whose changes invalidate derived availability.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TableChange {
    ParkingBookings,
    ParkingSpaces,
}

impl TableChange {
    pub fn table_name(&self) -> &'static str {
        match self {
            TableChange::ParkingBookings => "parking_bookings",
            TableChange::ParkingSpaces => "parking_spaces",
        }
    }
}
