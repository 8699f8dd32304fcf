//! Dashnote: annotation synchronization and dashboard bootstrap.
//!
//! The workspace is split into:
//!
//! * `dashnote-protocol`: wire types for dashboards, annotation events and time ranges
//! * `dashnote-core`: configuration, logging, backend client, notifications, dashboard model
//! * `dashnote-annotations`: fetch, merge and write routing across annotation stores
//! * `dashnote-cli`: the `dashnote` command line tool
//!
//! This crate ties them together through [`bootstrap::DashboardBootstrap`].

pub mod bootstrap;
pub mod error;

pub use bootstrap::{
    BootstrapOutcome, DashboardBootstrap, DashboardLoader, DashboardRoute, DashboardServices,
    InitDashboardArgs, InitPhase, LoadingState, LocationUpdate, NoopServices,
};
pub use error::BootstrapError;

pub use dashnote_annotations as annotations;
pub use dashnote_core as core;
pub use dashnote_protocol as protocol;
