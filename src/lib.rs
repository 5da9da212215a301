//! Personal time tracking: a single running timer per user, tagged activity history,
//! and day/tag analytics with streaks and daily goals.

pub mod analyzer;
pub mod config;
pub mod db;
pub mod error;
pub mod tracker;

pub use error::{Result, TrackerError};
