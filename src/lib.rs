//! Kiosk screenshotter library.
//!
//! A service that captures a screenshot of every site in a URL list at the
//! top of each hour, uploads the images to Cloudinary, and records each
//! upload in a Supabase table.

// Allow raw string hashes for safety - they're harmless and prevent issues if content changes
#![allow(clippy::needless_raw_string_hashes)]

pub mod capture;
pub mod cloudinary;
pub mod config;
pub mod constants;
pub mod cycle;
pub mod fs_utils;
pub mod recorder;
pub mod scheduler;
pub mod store;
pub mod supabase;
pub mod urls;
