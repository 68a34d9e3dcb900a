//! WGS84 to UTM projection
//!
//! The transformation engine is an external capability: the pipeline only
//! depends on [`TransformerFactory`] and [`Transformer`]. [`Proj4Factory`]
//! provides them through the pure-Rust `proj4rs` port of PROJ.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::zone::UtmZoneCode;

/// Source CRS of every transformation: geodetic WGS84
pub const WGS84_GEODETIC: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// Planar position in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub easting: f64,
    pub northing: f64,
}

impl ProjectedPoint {
    pub fn new(easting: f64, northing: f64) -> Self {
        Self { easting, northing }
    }

    /// Euclidean distance in the projection plane
    pub fn distance_to(&self, other: &ProjectedPoint) -> f64 {
        (self.easting - other.easting).hypot(self.northing - other.northing)
    }
}

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to build transformer to {target}: {reason}")]
    Build { target: UtmZoneCode, reason: String },
    #[error("failed to transform lon {lon}, lat {lat}: {reason}")]
    Transform { lon: f64, lat: f64, reason: String },
}

/// Converts geodetic coordinates into one projected CRS
pub trait Transformer {
    /// `(lon, lat)` in degrees to `(easting, northing)` in meters
    fn transform(&self, lon: f64, lat: f64) -> Result<(f64, f64), ProjectionError>;
}

/// Builds transformers from WGS84 geodetic to a UTM zone
pub trait TransformerFactory: Send + Sync {
    fn build(&self, target: UtmZoneCode) -> Result<Box<dyn Transformer>, ProjectionError>;
}

/// Project one coordinate pair through a transformer
pub fn project(
    transformer: &dyn Transformer,
    latitude: f64,
    longitude: f64,
) -> Result<ProjectedPoint, ProjectionError> {
    let (easting, northing) = transformer.transform(longitude, latitude)?;
    if !easting.is_finite() || !northing.is_finite() {
        return Err(ProjectionError::Transform {
            lon: longitude,
            lat: latitude,
            reason: "non-finite result".to_string(),
        });
    }
    Ok(ProjectedPoint::new(easting, northing))
}

/// `proj4rs`-backed transformer factory
#[derive(Debug, Clone, Copy, Default)]
pub struct Proj4Factory;

impl TransformerFactory for Proj4Factory {
    fn build(&self, target: UtmZoneCode) -> Result<Box<dyn Transformer>, ProjectionError> {
        let source = Proj::from_proj_string(WGS84_GEODETIC).map_err(build_error(target))?;
        let destination =
            Proj::from_proj_string(&target.proj_string()).map_err(build_error(target))?;
        debug!("Built transformer WGS84 -> {}", target);

        Ok(Box::new(Proj4Transformer {
            source,
            destination,
        }))
    }
}

fn build_error<E: std::fmt::Debug>(target: UtmZoneCode) -> impl Fn(E) -> ProjectionError {
    move |e| ProjectionError::Build {
        target,
        reason: format!("{e:?}"),
    }
}

struct Proj4Transformer {
    source: Proj,
    destination: Proj,
}

impl Transformer for Proj4Transformer {
    fn transform(&self, lon: f64, lat: f64) -> Result<(f64, f64), ProjectionError> {
        // Geographic input is in radians
        let mut point = (lon.to_radians(), lat.to_radians(), 0.0);
        transform(&self.source, &self.destination, &mut point).map_err(|e| {
            ProjectionError::Transform {
                lon,
                lat,
                reason: format!("{e:?}"),
            }
        })?;
        Ok((point.0, point.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::resolve_zone;

    #[test]
    fn test_project_central_europe() {
        let zone = resolve_zone(49.0, 8.0);
        let transformer = Proj4Factory.build(zone).unwrap();
        let point = project(transformer.as_ref(), 49.0, 8.0).unwrap();

        // West of the 9°E central meridian
        assert!(point.easting > 400_000.0 && point.easting < 500_000.0, "{point:?}");
        assert!(point.northing > 5_400_000.0 && point.northing < 5_450_000.0, "{point:?}");
    }

    #[test]
    fn test_central_meridian_maps_to_false_easting() {
        let zone = resolve_zone(45.0, 9.0);
        let transformer = Proj4Factory.build(zone).unwrap();
        let point = project(transformer.as_ref(), 45.0, 9.0).unwrap();
        assert!((point.easting - 500_000.0).abs() < 0.01, "{point:?}");
    }

    #[test]
    fn test_southern_false_northing() {
        let zone = resolve_zone(-33.8688, 151.2093);
        let transformer = Proj4Factory.build(zone).unwrap();
        let point = project(transformer.as_ref(), -33.8688, 151.2093).unwrap();
        assert!(point.northing > 6_000_000.0 && point.northing < 10_000_000.0, "{point:?}");
    }

    #[test]
    fn test_meridian_arc_distance() {
        let zone = resolve_zone(49.0, 8.0);
        let transformer = Proj4Factory.build(zone).unwrap();
        let a = project(transformer.as_ref(), 49.0, 8.0).unwrap();
        let b = project(transformer.as_ref(), 49.001, 8.0).unwrap();
        let distance = a.distance_to(&b);
        assert!((distance - 111.2).abs() < 1.0, "distance {distance}");
    }

    #[test]
    fn test_distance_to() {
        let a = ProjectedPoint::new(0.0, 0.0);
        let b = ProjectedPoint::new(3.0, 4.0);
        assert_eq!(a.distance_to(&b), 5.0);
    }
}
