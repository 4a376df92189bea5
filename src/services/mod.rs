//! Abstractions over remote segment data providers.

pub mod segment_api;
