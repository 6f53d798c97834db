//! Lead Qualification Library
//!
//! Scores prospective accounts against a configurable Ideal Customer Profile,
//! classifies them into priority tiers, runs staged discovery with progressive
//! delivery, and serves filter/sort/aggregate queries over the results.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `integrations`: Handoffs to external collaborators.
//! - `candidates`: Synthetic candidate pool and injectable signal sources.
//! - `config`: Configuration management.
//! - `discovery`: Staged, cancellable discovery runs.
//! - `errors`: Error handling types.
//! - `export`: Spreadsheet export handoff.
//! - `fingerprint`: ICP snapshot fingerprints.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `scoring`: Five-factor scoring and tier classification.
//! - `views`: Filter, sort and aggregate operations.

pub mod api;
pub mod core;
pub mod integrations;

pub mod candidates;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod export;
pub mod fingerprint;
pub mod handlers;
pub mod models;
pub mod scoring;
pub mod views;
