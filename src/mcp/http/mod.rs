//! HTTP client and API communication layer for Tableau Server.
//!
//! This module handles all HTTP communication with the Tableau REST API,
//! including configuration, sign-in, request construction, and response handling.

mod client;
mod config;

// Re-export the public API
pub use client::RestClient;
pub use config::TableauConfig;
