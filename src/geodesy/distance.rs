//! Horizontal distance and height differences between two survey points

use serde::Serialize;

use super::projection::ProjectedPoint;
use super::zone::UtmZoneCode;
use crate::extraction::{DiagnosticEvent, ExtractedParameters};
use crate::shared::ImageSlot;

/// Absolute ellipsoidal-height difference
///
/// A side without an ellipsoidal height counts as 0 m and is flagged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeightDifference {
    pub meters: f64,
    pub first_defaulted: bool,
    pub second_defaulted: bool,
}

impl HeightDifference {
    /// Whether either side used the 0 m default
    pub fn used_default(&self) -> bool {
        self.first_defaulted || self.second_defaulted
    }
}

/// One image's contribution to a comparison
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurveyPoint {
    pub parameters: ExtractedParameters,
    pub projected: ProjectedPoint,
}

/// Diagnostic attributed to one image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageDiagnostic {
    pub image: ImageSlot,
    #[serde(flatten)]
    pub event: DiagnosticEvent,
}

/// Final result of comparing two survey readings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    /// Zone both points were projected into (resolved from image 1)
    pub zone: UtmZoneCode,
    pub first: SurveyPoint,
    pub second: SurveyPoint,
    /// Planar distance in meters
    pub horizontal_distance: f64,
    pub ellipsoidal_height: HeightDifference,
    /// Present only when both images supplied an antenna height
    #[serde(skip_serializing_if = "Option::is_none")]
    pub antenna_height_difference: Option<f64>,
    pub diagnostics: Vec<ImageDiagnostic>,
}

impl ComparisonResult {
    /// Prepend diagnostics gathered before the computation
    pub fn with_diagnostics(mut self, earlier: Vec<ImageDiagnostic>) -> Self {
        let computed = std::mem::take(&mut self.diagnostics);
        self.diagnostics = earlier;
        self.diagnostics.extend(computed);
        self
    }

    pub fn point(&self, slot: ImageSlot) -> &SurveyPoint {
        match slot {
            ImageSlot::First => &self.first,
            ImageSlot::Second => &self.second,
        }
    }
}

/// Compute distance and height differences for two projected readings
pub fn compute(
    first: &ExtractedParameters,
    second: &ExtractedParameters,
    first_point: ProjectedPoint,
    second_point: ProjectedPoint,
    zone: UtmZoneCode,
) -> ComparisonResult {
    let mut diagnostics = Vec::new();

    let mut height_or_default = |slot: ImageSlot, params: &ExtractedParameters| match params
        .ellipsoidal_height
    {
        Some(height) => (height, false),
        None => {
            diagnostics.push(ImageDiagnostic {
                image: slot,
                event: DiagnosticEvent::warning(
                    "Ellipsoidal height missing, using 0 m for the height difference",
                ),
            });
            (0.0, true)
        }
    };

    let (first_height, first_defaulted) = height_or_default(ImageSlot::First, first);
    let (second_height, second_defaulted) = height_or_default(ImageSlot::Second, second);

    let antenna_height_difference = match (first.antenna_height, second.antenna_height) {
        (Some(a), Some(b)) => Some((a - b).abs()),
        _ => None,
    };

    ComparisonResult {
        zone,
        first: SurveyPoint {
            parameters: *first,
            projected: first_point,
        },
        second: SurveyPoint {
            parameters: *second,
            projected: second_point,
        },
        horizontal_distance: first_point.distance_to(&second_point),
        ellipsoidal_height: HeightDifference {
            meters: (first_height - second_height).abs(),
            first_defaulted,
            second_defaulted,
        },
        antenna_height_difference,
        diagnostics,
    }
}
