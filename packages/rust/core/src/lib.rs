//! Pipeline orchestration for nimefetch.
//!
//! Ties directory preparation, index discovery, and sequential downloading
//! into a single run (`fetch_papers`).

pub mod destination;
pub mod pipeline;
