//! Effort validation, consolidation and curve smoothing.
//!
//! Raw streams go through [`validator`] into a [`dataset::Dataset`], which is
//! sorted by total time, cached by [`cache`], and sliced into percentile
//! bands that [`aggregate`] smooths into grade/speed curves.

pub mod aggregate;
pub mod analyzer;
pub mod cache;
pub mod dataset;
pub mod smoothing;
pub mod streams;
pub mod types;
pub mod utility;
pub mod validator;
