// Shared infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;
pub mod telemetry;

// Domain
pub mod expiry;
pub mod notification;
pub mod notifier;
pub mod registry;
pub mod workflow;

// Application layer
pub mod api;
pub mod auth;
pub mod server;
