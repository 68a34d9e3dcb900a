//! Ellipsoidal height strategies
//!
//! Unlabeled candidates are only accepted inside [100, 10000) m, which keeps
//! antenna heights and precision figures out.

use regex::Regex;
use std::sync::LazyLock;

use super::numbers::to_decimal_comma;
use super::{is_plausible_ellipsoidal_height, Diagnostics, Field, Scan, Strategy};

static LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:hauteur\s+ellipso[iï]dale|ellipsoidal\s+height)\s*:?\s*(\d+(?:[.,]\d+)?)\s*m\b")
        .expect("ellipsoidal label pattern")
});

/// A line holding nothing but `415,943 m`
static COMMA_METERS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+,\d+)\s*m\s*$").expect("comma meters line pattern")
});

/// A line holding nothing but a metric value, either separator
static METERS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+(?:[.,]\d+)?)\s*m\s*$").expect("meters line pattern")
});

static METERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)\s*m\b").expect("meters pattern"));

/// Heading that introduces the base station block on the display
const BASE_MARKER_HEADING: &str = "Marqueur de base";

/// Lines after a coordinate line that may hold its height
const ANCHOR_LOOKAHEAD: usize = 3;

pub(super) static STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "labeled ellipsoidal height",
        run: labeled,
    },
    Strategy {
        name: "coordinate anchor",
        run: coordinate_anchor,
    },
    Strategy {
        name: "base marker section",
        run: base_marker_section,
    },
    Strategy {
        name: "global meter scan",
        run: global_scan,
    },
];

fn labeled(scan: &Scan<'_>, diagnostics: &mut Diagnostics) -> Option<f64> {
    let caps = LABELED.captures(scan.text)?;
    diagnostics.parse(Field::EllipsoidalHeight, &caps[1])
}

/// Height printed just below the line that shows the known coordinates
fn coordinate_anchor(scan: &Scan<'_>, diagnostics: &mut Diagnostics) -> Option<f64> {
    let (latitude, longitude) = scan.resolved.coordinates()?;
    let anchors = [
        (to_decimal_comma(latitude), if latitude >= 0.0 { 'N' } else { 'S' }),
        (to_decimal_comma(longitude), if longitude >= 0.0 { 'E' } else { 'W' }),
    ];

    for (index, line) in scan.lines.iter().enumerate() {
        let anchored = anchors
            .iter()
            .any(|(needle, letter)| line.contains(*letter) && line.contains(needle.as_str()));
        if !anchored {
            continue;
        }

        for candidate in scan.lines.iter().skip(index + 1).take(ANCHOR_LOOKAHEAD) {
            if let Some(value) = plausible_line(&COMMA_METERS_LINE, candidate, diagnostics) {
                return Some(value);
            }
        }
    }
    None
}

fn base_marker_section(scan: &Scan<'_>, diagnostics: &mut Diagnostics) -> Option<f64> {
    let start = scan
        .lines
        .iter()
        .position(|line| line.contains(BASE_MARKER_HEADING))?;

    scan.lines[start + 1..]
        .iter()
        .find_map(|line| plausible_line(&METERS_LINE, line, diagnostics))
}

fn global_scan(scan: &Scan<'_>, diagnostics: &mut Diagnostics) -> Option<f64> {
    let antenna = scan.resolved.antenna_height;
    for caps in METERS.captures_iter(scan.text) {
        let Some(value) = diagnostics.parse(Field::EllipsoidalHeight, &caps[1]) else {
            continue;
        };
        if Some(value) == antenna {
            continue;
        }
        if is_plausible_ellipsoidal_height(value) {
            return Some(value);
        }
    }
    None
}

fn plausible_line(pattern: &Regex, line: &str, diagnostics: &mut Diagnostics) -> Option<f64> {
    let caps = pattern.captures(line)?;
    let value = diagnostics.parse(Field::EllipsoidalHeight, &caps[1])?;
    if is_plausible_ellipsoidal_height(value) {
        Some(value)
    } else {
        diagnostics.info(format!(
            "Ignoring {value} m as ellipsoidal height: outside [100, 10000) m"
        ));
        None
    }
}
