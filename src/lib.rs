//! Brand compliance analysis for creative assets.
//!
//! A queued worker claims one asset at a time, runs it through the vision,
//! transcription and vocabulary services, folds their output into a fixed
//! set of compliance checks, and persists a pass/warn/fail report.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
