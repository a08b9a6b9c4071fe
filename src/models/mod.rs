// src/models/mod.rs

use std::fmt;

pub mod attendance;
pub mod contact;
pub mod course;
pub mod demo_booking;
pub mod enrollment;
pub mod fee_status;
pub mod payment;
pub mod review;
pub mod study_material;
pub mod test;
pub mod test_result;
pub mod user;

/// Raised when a TEXT column or request field holds a value outside a closed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}
