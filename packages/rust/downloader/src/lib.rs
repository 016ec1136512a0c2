//! Sequential paper downloader.
//!
//! This crate provides:
//! - [`Downloader`]: streams one candidate URL at a time into the destination
//!   directory, skipping files that already exist and removing partial files
//!   on failure
//! - [`filename_from_url`]: the local name a candidate is saved under

pub mod engine;

pub use engine::{CHUNK_SIZE, Downloader, filename_from_url};
