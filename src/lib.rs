//! Analytics core for the SMILE question-driven learning platform.
//!
//! - [`tiers`]: point totals to achievement tiers
//! - [`performance`], [`engagement`], [`risk`], [`timing`], [`insights`]:
//!   statistics over timestamped, scored question submissions
//! - [`source`], [`db`]: where those submissions are read from
//!
//! Every computation is a pure function of its input rows and an injected [`clock::Clock`].

pub mod clock;
pub mod config;
pub mod db;
pub mod engagement;
pub mod error;
pub mod insights;
pub mod llm;
pub mod models;
pub mod performance;
pub mod regression;
pub mod report;
pub mod risk;
pub mod source;
pub mod telemetry;
pub mod tiers;
pub mod timing;

pub use error::{AnalyticsError, Result};
