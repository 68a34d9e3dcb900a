//! Text and JSON rendering of pipeline outcomes

use serde::Serialize;
use serde_json::json;

use crate::config::OutputSettings;
use crate::extraction::{ExtractedParameters, Extraction, Field, Severity};
use crate::geodesy::ComparisonResult;
use crate::pipeline::{ImageReading, PipelineError};
use crate::shared::{Capability, ImageSlot, Readiness};

/// Render a successful comparison
pub fn render_comparison(result: &ComparisonResult, settings: &OutputSettings) -> String {
    let precision = settings.precision;
    let mut lines = vec!["---- Extracted Parameters ----".to_string()];
    for slot in ImageSlot::BOTH {
        lines.push(format!("Image {}: {}", slot.number(), result.point(slot).parameters));
    }

    lines.push(String::new());
    lines.push(format!("Detected UTM EPSG Code: {}", result.zone.epsg()));
    lines.push(String::new());
    lines.push("UTM Coordinates (meters):".to_string());
    for slot in ImageSlot::BOTH {
        let projected = result.point(slot).projected;
        lines.push(format!(
            "Image {}: X={:.2}, Y={:.2}",
            slot.number(),
            projected.easting,
            projected.northing
        ));
    }

    lines.push(String::new());
    lines.push(format!(
        "Horizontal Distance (meters): {:.precision$}",
        result.horizontal_distance
    ));

    let height = &result.ellipsoidal_height;
    let mut height_line = format!(
        "Ellipsoidal Height Difference (meters): {:.precision$}",
        height.meters
    );
    if height.used_default() {
        let defaulted: Vec<_> = [
            (ImageSlot::First, height.first_defaulted),
            (ImageSlot::Second, height.second_defaulted),
        ]
        .into_iter()
        .filter(|(_, defaulted)| *defaulted)
        .map(|(slot, _)| slot.to_string())
        .collect();
        height_line.push_str(&format!(" (0 m assumed for {})", defaulted.join(" and ")));
    }
    lines.push(height_line);

    if let Some(antenna) = result.antenna_height_difference {
        lines.push(format!(
            "Antenna Height Difference (meters): {antenna:.precision$}"
        ));
    }

    let notable: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.event.severity > Severity::Info)
        .collect();
    if !notable.is_empty() {
        lines.push(String::new());
        lines.push("---- Warnings ----".to_string());
        for diagnostic in notable {
            lines.push(format!("Image {}: {}", diagnostic.image.number(), diagnostic.event));
        }
    }

    lines.join("\n")
}

/// Render what was parsed from one text, with every diagnostic
pub fn render_extraction(extraction: &Extraction) -> String {
    let mut lines = vec!["---- Extracted Parameters ----".to_string()];
    lines.extend(parameter_lines(&extraction.parameters));

    if !extraction.diagnostics.is_empty() {
        lines.push(String::new());
        lines.push("---- Diagnostics ----".to_string());
        lines.extend(extraction.diagnostics.iter().map(ToString::to_string));
    }
    lines.join("\n")
}

/// Render the raw OCR text of a reading
pub fn render_raw_text(slot: Option<ImageSlot>, raw_text: &str) -> String {
    let heading = match slot {
        Some(slot) => format!("---- OCR Text (Image {}) ----", slot.number()),
        None => "---- OCR Text ----".to_string(),
    };
    format!("{heading}\n{}", raw_text.trim_end())
}

/// Render a failed comparison, including any text and partial records recovered
pub fn render_error(error: &PipelineError) -> String {
    let mut lines = vec![format!("Error: {error}")];

    if let PipelineError::MissingRequiredField(report) = error {
        for slot in ImageSlot::BOTH {
            lines.push(String::new());
            lines.push(format!("---- Partial Parameters (Image {}) ----", slot.number()));
            lines.extend(parameter_lines(&report.reading(slot).extraction.parameters));
        }
    } else if let Some((slot, reading)) = error.sibling() {
        lines.push(String::new());
        lines.push(format!("---- Extracted Parameters (Image {}) ----", slot.number()));
        lines.extend(parameter_lines(&reading.extraction.parameters));
    }

    for (slot, text) in error.raw_texts() {
        lines.push(String::new());
        lines.push(render_raw_text(Some(slot), text));
    }
    lines.join("\n")
}

/// Render capability readiness, one line per capability
pub fn render_readiness(readiness: &Readiness) -> String {
    [Capability::Ocr, Capability::Transformer]
        .into_iter()
        .map(|capability| format!("{capability}: {}", readiness.state(capability)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Status line for the configured OCR language
pub fn render_language_check(language: &str, missing: &[String]) -> String {
    if missing.is_empty() {
        format!("OCR language {language}: installed")
    } else {
        format!(
            "OCR language {language}: no trained data for {}; recognition falls back to no language hint",
            missing.join(", ")
        )
    }
}

/// Pretty JSON of any result type
pub fn to_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

/// JSON document describing a failed comparison
pub fn error_json(error: &PipelineError) -> serde_json::Value {
    let mut document = json!({ "error": error.to_string() });
    if let PipelineError::MissingRequiredField(report) = error {
        document["missing"] = json!(report.missing);
        document["readings"] = json!(report.readings);
    } else {
        let texts: Vec<_> = error
            .raw_texts()
            .into_iter()
            .map(|(image, raw_text)| json!({ "image": image, "raw_text": raw_text }))
            .collect();
        if !texts.is_empty() {
            document["raw_texts"] = json!(texts);
        }
        if let Some((image, reading)) = error.sibling() {
            document["other_reading"] = json!({ "image": image, "reading": reading });
        }
    }
    document
}

/// JSON of a single-image reading
pub fn reading_json(reading: &ImageReading, include_text: bool) -> serde_json::Value {
    let mut document = json!(reading.extraction);
    if include_text {
        document["raw_text"] = json!(reading.raw_text);
    }
    document
}

fn parameter_lines(parameters: &ExtractedParameters) -> Vec<String> {
    [
        Field::Latitude,
        Field::Longitude,
        Field::EllipsoidalHeight,
        Field::AntennaHeight,
    ]
    .into_iter()
    .filter(|field| field.is_required() || parameters.get(*field).is_some())
    .map(|field| match parameters.get(field) {
        Some(value) => format!("{field}: {value}"),
        None => format!("{field}: not found"),
    })
    .collect()
}
