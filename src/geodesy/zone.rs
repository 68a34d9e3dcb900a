//! UTM zone resolution

use serde::{Deserialize, Serialize};
use std::fmt;

/// EPSG code of a WGS84 / UTM zone (326xx north, 327xx south)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtmZoneCode(u32);

const NORTH_BASE: u32 = 32600;
const SOUTH_BASE: u32 = 32700;

impl UtmZoneCode {
    /// Numeric EPSG code
    pub fn epsg(&self) -> u32 {
        self.0
    }

    /// Zone number in [1, 60]
    pub fn zone(&self) -> u32 {
        self.0 % 100
    }

    pub fn is_south(&self) -> bool {
        self.0 >= SOUTH_BASE
    }

    /// PROJ definition of this zone on the WGS84 datum
    pub fn proj_string(&self) -> String {
        format!(
            "+proj=utm +zone={}{} +datum=WGS84 +units=m +no_defs",
            self.zone(),
            if self.is_south() { " +south" } else { "" }
        )
    }
}

impl fmt::Display for UtmZoneCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Resolve the UTM zone of a WGS84 coordinate
///
/// `zone = floor((lon + 180) / 6) + 1`, with lon = 180 kept in zone 60. The
/// equator belongs to the northern hemisphere.
pub fn resolve_zone(latitude: f64, longitude: f64) -> UtmZoneCode {
    let zone = (((longitude + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u32;
    let base = if latitude >= 0.0 { NORTH_BASE } else { SOUTH_BASE };
    UtmZoneCode(base + zone)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_central_europe() {
        let code = resolve_zone(49.0, 8.0);
        assert_eq!(code.epsg(), 32632);
        assert_eq!(code.zone(), 32);
        assert!(!code.is_south());
        assert_eq!(code.to_string(), "EPSG:32632");
    }

    #[test]
    fn test_southern_hemisphere() {
        let code = resolve_zone(-33.8688, 151.2093);
        assert_eq!(code.epsg(), 32756);
        assert!(code.is_south());
        assert!(code.proj_string().contains("+south"));
    }

    #[test]
    fn test_equator_is_north() {
        assert_eq!(resolve_zone(0.0, 0.0).epsg(), 32631);
    }

    #[test]
    fn test_domain_edges() {
        assert_eq!(resolve_zone(10.0, -180.0).zone(), 1);
        assert_eq!(resolve_zone(10.0, 180.0).zone(), 60);
        assert_eq!(resolve_zone(-90.0, 179.99).epsg(), 32760);
        assert_eq!(resolve_zone(90.0, -179.99).epsg(), 32601);
    }

    #[test]
    fn test_zone_boundary() {
        // 6°E starts zone 32
        assert_eq!(resolve_zone(49.0, 5.999).zone(), 31);
        assert_eq!(resolve_zone(49.0, 6.0).zone(), 32);
    }

    #[test]
    fn test_whole_domain_is_valid_and_deterministic() {
        let mut lat = -90.0;
        while lat <= 90.0 {
            let mut lon = -180.0;
            while lon <= 180.0 {
                let code = resolve_zone(lat, lon);
                assert_eq!(code, resolve_zone(lat, lon));
                assert!((1..=60).contains(&code.zone()), "{lat}, {lon} -> {code}");
                assert!(code.epsg() / 100 == 326 || code.epsg() / 100 == 327);
                lon += 0.5;
            }
            lat += 2.5;
        }
    }

    #[test]
    fn test_proj_string() {
        assert_eq!(
            resolve_zone(49.0, 8.0).proj_string(),
            "+proj=utm +zone=32 +datum=WGS84 +units=m +no_defs"
        );
    }
}
