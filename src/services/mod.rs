//! Service layer for the notifier.
//!
//! This module contains the board-facing logic:
//! - Per-layout extraction rules (`layouts`)
//! - Listing and detail page extraction (`SiteAdapter`)
//! - Concurrent detail enrichment (`DetailFetcher`)

mod adapter;
mod details;
pub mod layouts;

pub use adapter::SiteAdapter;
pub use details::{DetailFetcher, DetailOutcome};
