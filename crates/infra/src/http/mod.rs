//! HTTP client for portal and provider endpoints

mod client;

pub use client::{HttpClientBuilder, PortalHttpClient};
