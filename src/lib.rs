// src/lib.rs

//! Notice board notifier library.
//!
//! Polls university notice boards, detects notices published since the last
//! observation, enriches them with their detail pages and forwards them to a
//! notification sink.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod sink;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod testing;
