//! Domain models

pub mod tracker;

pub use tracker::{tracker_id, TrackType, Tracker, TrackerKey, TrackerSpec, TrackerSummary};
