//! Isolated browsing without a browser

mod engine;

pub use engine::HttpBrowsingEngine;
