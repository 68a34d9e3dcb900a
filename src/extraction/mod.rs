//! Parameter Extraction
//!
//! Recovers latitude, longitude, ellipsoidal height and antenna height from the
//! OCR text of a photographed GNSS receiver display. Each field is resolved by
//! an ordered list of strategies; the first strategy that yields a value wins
//! and the remaining ones for that field are skipped.
//!
//! Extraction never fails. Parse errors, rejected candidates and missing
//! fields are reported as [`DiagnosticEvent`]s next to the partial record.

mod antenna;
mod coordinates;
mod ellipsoidal;
pub mod numbers;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use numbers::parse_decimal;

/// Survey parameter recovered from a display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Latitude,
    Longitude,
    EllipsoidalHeight,
    AntennaHeight,
}

impl Field {
    /// Order in which fields are resolved; later fields may consult earlier ones
    pub const RESOLUTION_ORDER: [Field; 4] = [
        Field::AntennaHeight,
        Field::Latitude,
        Field::Longitude,
        Field::EllipsoidalHeight,
    ];

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Field::Latitude => "Latitude",
            Field::Longitude => "Longitude",
            Field::EllipsoidalHeight => "Ellipsoidal height",
            Field::AntennaHeight => "Antenna height",
        }
    }

    /// Whether a comparison cannot proceed without this field
    pub fn is_required(&self) -> bool {
        matches!(self, Field::Latitude | Field::Longitude)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Best-effort survey record for one image
///
/// Every field is independently optional. Coordinates are in decimal degrees,
/// heights in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ellipsoidal_height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub antenna_height: Option<f64>,
}

impl ExtractedParameters {
    /// Value of a single field
    pub fn get(&self, field: Field) -> Option<f64> {
        match field {
            Field::Latitude => self.latitude,
            Field::Longitude => self.longitude,
            Field::EllipsoidalHeight => self.ellipsoidal_height,
            Field::AntennaHeight => self.antenna_height,
        }
    }

    /// `(latitude, longitude)` when both are present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }

    /// Required fields absent from this record
    pub fn missing_required(&self) -> Vec<Field> {
        [Field::Latitude, Field::Longitude]
            .into_iter()
            .filter(|field| self.get(*field).is_none())
            .collect()
    }

    fn set(&mut self, field: Field, value: Option<f64>) {
        match field {
            Field::Latitude => self.latitude = value,
            Field::Longitude => self.longitude = value,
            Field::EllipsoidalHeight => self.ellipsoidal_height = value,
            Field::AntennaHeight => self.antenna_height = value,
        }
    }
}

impl fmt::Display for ExtractedParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for field in [
            Field::Latitude,
            Field::Longitude,
            Field::EllipsoidalHeight,
            Field::AntennaHeight,
        ] {
            if let Some(value) = self.get(field) {
                if !first {
                    f.write_str(", ")?;
                }
                write!(f, "{field}={value}")?;
                first = false;
            }
        }
        if first {
            f.write_str("(no parameters)")?;
        }
        Ok(())
    }
}

/// Severity of a diagnostic event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// Troubleshooting note produced while reading one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub severity: Severity,
    pub message: String,
}

impl DiagnosticEvent {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

/// Outcome of parsing one OCR text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub parameters: ExtractedParameters,
    pub diagnostics: Vec<DiagnosticEvent>,
}

/// Ordered collector for diagnostic events
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    events: Vec<DiagnosticEvent>,
}

impl Diagnostics {
    pub(crate) fn push(&mut self, event: DiagnosticEvent) {
        debug!(severity = %event.severity, "{}", event.message);
        self.events.push(event);
    }

    pub(crate) fn info(&mut self, message: impl Into<String>) {
        self.push(DiagnosticEvent::info(message));
    }

    pub(crate) fn warning(&mut self, message: impl Into<String>) {
        self.push(DiagnosticEvent::warning(message));
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        self.push(DiagnosticEvent::error(message));
    }

    /// Parse a numeric token for `field`; a failure is recorded and yields `None`
    pub(crate) fn parse(&mut self, field: Field, token: &str) -> Option<f64> {
        match parse_decimal(token) {
            Ok(value) if value.is_finite() => Some(value),
            Ok(value) => {
                self.error(format!("Error parsing {field}: '{token}' is not finite ({value})"));
                None
            }
            Err(e) => {
                self.error(format!("Error parsing {field} from '{token}': {e}"));
                None
            }
        }
    }

    pub(crate) fn into_events(self) -> Vec<DiagnosticEvent> {
        self.events
    }
}

/// OCR text under analysis, with the fields resolved so far
pub(crate) struct Scan<'a> {
    pub(crate) text: &'a str,
    pub(crate) lines: Vec<&'a str>,
    pub(crate) resolved: ExtractedParameters,
}

impl<'a> Scan<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            lines: text.lines().collect(),
            resolved: ExtractedParameters::default(),
        }
    }
}

/// A single heuristic for one field
pub(crate) struct Strategy {
    pub(crate) name: &'static str,
    pub(crate) run: fn(&Scan<'_>, &mut Diagnostics) -> Option<f64>,
}

/// Heuristically found antenna heights must lie in (0, 3) m
pub fn is_plausible_antenna_height(value: f64) -> bool {
    value > 0.0 && value < 3.0
}

/// Heuristically found ellipsoidal heights must lie in [100, 10000) m
pub fn is_plausible_ellipsoidal_height(value: f64) -> bool {
    (100.0..10_000.0).contains(&value)
}

/// Extract survey parameters from raw OCR text
pub fn extract_parameters(raw_text: &str) -> Extraction {
    let mut scan = Scan::new(raw_text);
    let mut diagnostics = Diagnostics::default();

    for field in Field::RESOLUTION_ORDER {
        let value = resolve(field, strategies_for(field), &scan, &mut diagnostics);
        scan.resolved.set(field, value);
    }

    Extraction {
        parameters: scan.resolved,
        diagnostics: diagnostics.into_events(),
    }
}

fn strategies_for(field: Field) -> &'static [Strategy] {
    match field {
        Field::AntennaHeight => antenna::STRATEGIES,
        Field::Latitude => coordinates::LATITUDE_STRATEGIES,
        Field::Longitude => coordinates::LONGITUDE_STRATEGIES,
        Field::EllipsoidalHeight => ellipsoidal::STRATEGIES,
    }
}

fn resolve(
    field: Field,
    strategies: &[Strategy],
    scan: &Scan<'_>,
    diagnostics: &mut Diagnostics,
) -> Option<f64> {
    for strategy in strategies {
        if let Some(value) = (strategy.run)(scan, diagnostics) {
            diagnostics.info(format!("{field} = {value} (via {})", strategy.name));
            return Some(value);
        }
    }

    if field == Field::AntennaHeight {
        diagnostics.info(format!("{field} not found in OCR text"));
    } else {
        warn!("{} not found in OCR text", field);
        diagnostics.warning(format!("{field} not found in OCR text"));
    }
    None
}
