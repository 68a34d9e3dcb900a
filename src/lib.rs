//! geodelta - Survey-point comparison from photographed GNSS displays
//!
//! Reads latitude, longitude, ellipsoidal height and antenna height from the
//! OCR text of two instrument photographs, projects both points into UTM and
//! reports their horizontal distance and height differences.

pub mod config;
pub mod extraction;
pub mod geodesy;
pub mod pipeline;
pub mod report;
pub mod shared;
pub mod vision;

pub use extraction::{extract_parameters, ExtractedParameters, Extraction};
pub use geodesy::{resolve_zone, ComparisonResult, UtmZoneCode};
pub use pipeline::{ComparisonPipeline, ImageReading, PipelineError, PipelineSettings};
pub use shared::{CapabilityState, ImageSlot, Readiness};
