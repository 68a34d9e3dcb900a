//! Geodesy Layer
//!
//! UTM zone resolution, projection of WGS84 coordinates, and the distance and
//! height computation between two survey points.

pub mod distance;
pub mod projection;
pub mod zone;

pub use distance::{compute, ComparisonResult, HeightDifference, ImageDiagnostic, SurveyPoint};
pub use projection::{
    project, Proj4Factory, ProjectedPoint, ProjectionError, Transformer, TransformerFactory,
};
pub use zone::{resolve_zone, UtmZoneCode};
