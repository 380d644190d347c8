//! Client-side KPSP developmental screening for Posyandu Digital.
//!
//! The crate models the screening wizard that walks a caregiver from child
//! selection to a backend-assigned classification, together with the REST
//! adapter for the Posyandu backend and an axum router exposing the wizard as
//! a JSON view-model API.

pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
