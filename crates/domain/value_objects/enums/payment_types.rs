use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    OneTime,
    Recurring,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::OneTime => "one_time",
            PaymentType::Recurring => "recurring",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "one_time" => Some(PaymentType::OneTime),
            "recurring" => Some(PaymentType::Recurring),
            _ => None,
        }
    }
}

impl Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
