//! Archiver Core Library
//!
//! This library provides the core functionality for the archiver tool, which
//! fetches media from video platforms by driving an external downloader
//! (yt-dlp) and supplying it with working login sessions.
//!
//! The centerpiece is the browser-session authentication bridge: a
//! hand-rolled WebSocket + Chrome DevTools Protocol client that extracts
//! session cookies from a real browser process, and the fallback
//! orchestration that decides which credential source to try next.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`platform`] - per-platform configuration (hosts, cookie domains, auth signals)
//! - [`bridge`] - browser launching, DevTools discovery, raw WebSocket + CDP
//! - [`auth`] - cookie jar codec, credential sources, fallback orchestrator
//! - [`downloader`] - the yt-dlp process boundary and failure classification
//! - [`commands`] - CLI command handlers

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod bridge;
pub mod cli;
pub mod commands;
pub mod downloader;
pub mod exit;
pub mod platform;
pub mod state;

// Re-export commonly used types
pub use auth::{
    AttemptOutcome, AttemptRunner, AuthSource, BrowserId, Cookie, build_auth_sources,
    run_with_fallback,
};
pub use bridge::BridgeError;
pub use platform::{Platform, platform_by_id, platform_for_url, supported_platforms};
