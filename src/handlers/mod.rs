// src/handlers/mod.rs

pub mod admin;
pub mod attendance;
pub mod auth;
pub mod contacts;
pub mod courses;
pub mod demo_bookings;
pub mod enrollments;
pub mod fee_status;
pub mod health;
pub mod materials;
pub mod payments;
pub mod reviews;
pub mod tests;
