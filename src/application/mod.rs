//! Application layer wiring DTOs and services.

pub mod dtos;
pub mod services;

pub use dtos::{AskRequest, AskResponse, AskStatus, HealthStatusResponse};
pub use services::ComplaintService;
