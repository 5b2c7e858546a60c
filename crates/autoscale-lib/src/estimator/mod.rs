//! Capacity estimation from merged telemetry
//!
//! A [`Sample`] is one aligned point in time; a [`Series`] merges the three
//! raw telemetry series into samples and derives the smoothed efficiency
//! that every capacity forecast is based on.

mod sample;
mod series;

pub use sample::Sample;
pub use series::{Series, RECENT_EFFICIENCY_WINDOW};
