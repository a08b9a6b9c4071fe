// src/services/mod.rs

pub mod attendance;
pub mod evaluator;
pub mod grading;
pub mod payment;
