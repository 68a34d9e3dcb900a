//! Latitude and longitude strategies
//!
//! Displays print coordinates either behind a `Latitude` / `Longitude` label
//! or as `49,72201469° N` with a hemisphere letter. South and west negate the
//! value.

use regex::Regex;
use std::sync::LazyLock;

use super::{Diagnostics, Field, Scan, Strategy};

// A hemisphere letter only counts as the last token of the value's line
static LABELED_LATITUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?i:latitude)\s+(-?[0-9.,°º]+)(?:[ \t]*([NS])[ \t\r]*$)?").expect("latitude label pattern")
});

static LABELED_LONGITUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?i:longitude)\s+(-?[0-9.,°º]+)(?:[ \t]*([EW])[ \t\r]*$)?").expect("longitude label pattern")
});

static DIRECTIONAL_NORTH: LazyLock<Regex> = LazyLock::new(|| directional('N'));
static DIRECTIONAL_SOUTH: LazyLock<Regex> = LazyLock::new(|| directional('S'));
static DIRECTIONAL_EAST: LazyLock<Regex> = LazyLock::new(|| directional('E'));
static DIRECTIONAL_WEST: LazyLock<Regex> = LazyLock::new(|| directional('W'));

static COMPASS_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(-?\d+(?:[.,]\d+)?)[°º][ \t]*([NSEW])\b").expect("compass list pattern")
});

/// Minimum number of `<number>°<letter>` hits before the list strategy engages
const MIN_LIST_MATCHES: usize = 2;

fn directional(letter: char) -> Regex {
    Regex::new(&format!(r"\b(\d{{2}},\d+)[°º][ \t]*{letter}\b")).expect("directional pattern")
}

pub(super) static LATITUDE_STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "labeled latitude",
        run: labeled_latitude,
    },
    Strategy {
        name: "directional latitude",
        run: directional_latitude,
    },
    Strategy {
        name: "compass list",
        run: listed_latitude,
    },
];

pub(super) static LONGITUDE_STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "labeled longitude",
        run: labeled_longitude,
    },
    Strategy {
        name: "directional longitude",
        run: directional_longitude,
    },
    Strategy {
        name: "compass list",
        run: listed_longitude,
    },
];

#[derive(Debug, Clone, Copy)]
enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    fn field(self) -> Field {
        match self {
            Axis::Latitude => Field::Latitude,
            Axis::Longitude => Field::Longitude,
        }
    }

    fn limit(self) -> f64 {
        match self {
            Axis::Latitude => 90.0,
            Axis::Longitude => 180.0,
        }
    }

    /// (positive, negative) hemisphere letters
    fn hemispheres(self) -> (char, char) {
        match self {
            Axis::Latitude => ('N', 'S'),
            Axis::Longitude => ('E', 'W'),
        }
    }

    fn sign_of(self, letter: char) -> Option<f64> {
        let (positive, negative) = self.hemispheres();
        if letter == positive {
            Some(1.0)
        } else if letter == negative {
            Some(-1.0)
        } else {
            None
        }
    }

    /// Keep the value only when it lies inside the axis range
    fn accept(self, value: f64, diagnostics: &mut Diagnostics) -> Option<f64> {
        let limit = self.limit();
        if value.abs() <= limit {
            Some(value)
        } else {
            diagnostics.warning(format!(
                "{} {value} outside [-{limit}, {limit}], ignored",
                self.field()
            ));
            None
        }
    }
}

fn labeled_latitude(scan: &Scan<'_>, diagnostics: &mut Diagnostics) -> Option<f64> {
    labeled(Axis::Latitude, &LABELED_LATITUDE, scan, diagnostics)
}

fn labeled_longitude(scan: &Scan<'_>, diagnostics: &mut Diagnostics) -> Option<f64> {
    labeled(Axis::Longitude, &LABELED_LONGITUDE, scan, diagnostics)
}

fn directional_latitude(scan: &Scan<'_>, diagnostics: &mut Diagnostics) -> Option<f64> {
    directional_pair(Axis::Latitude, &DIRECTIONAL_NORTH, &DIRECTIONAL_SOUTH, scan, diagnostics)
}

fn directional_longitude(scan: &Scan<'_>, diagnostics: &mut Diagnostics) -> Option<f64> {
    directional_pair(Axis::Longitude, &DIRECTIONAL_EAST, &DIRECTIONAL_WEST, scan, diagnostics)
}

fn listed_latitude(scan: &Scan<'_>, diagnostics: &mut Diagnostics) -> Option<f64> {
    listed(Axis::Latitude, scan, diagnostics)
}

fn listed_longitude(scan: &Scan<'_>, diagnostics: &mut Diagnostics) -> Option<f64> {
    listed(Axis::Longitude, scan, diagnostics)
}

fn labeled(
    axis: Axis,
    pattern: &Regex,
    scan: &Scan<'_>,
    diagnostics: &mut Diagnostics,
) -> Option<f64> {
    let caps = pattern.captures(scan.text)?;
    let value = diagnostics.parse(axis.field(), &caps[1])?;
    let value = match caps.get(2).and_then(|m| m.as_str().chars().next()) {
        Some(letter) if axis.sign_of(letter) == Some(-1.0) => -value.abs(),
        _ => value,
    };
    axis.accept(value, diagnostics)
}

fn directional_pair(
    axis: Axis,
    positive: &Regex,
    negative: &Regex,
    scan: &Scan<'_>,
    diagnostics: &mut Diagnostics,
) -> Option<f64> {
    for (pattern, sign) in [(positive, 1.0), (negative, -1.0)] {
        if let Some(caps) = pattern.captures(scan.text) {
            let value = diagnostics.parse(axis.field(), &caps[1])?;
            return axis.accept(sign * value, diagnostics);
        }
    }
    None
}

fn listed(axis: Axis, scan: &Scan<'_>, diagnostics: &mut Diagnostics) -> Option<f64> {
    let hits: Vec<(&str, char)> = COMPASS_LIST
        .captures_iter(scan.text)
        .filter_map(|caps| {
            let number = caps.get(1)?.as_str();
            let letter = caps.get(2)?.as_str().chars().next()?;
            Some((number, letter))
        })
        .collect();

    if hits.len() < MIN_LIST_MATCHES {
        return None;
    }

    for (number, letter) in hits {
        let Some(sign) = axis.sign_of(letter) else {
            continue;
        };
        let Some(value) = diagnostics.parse(axis.field(), number) else {
            continue;
        };
        if let Some(value) = axis.accept(sign * value.abs(), diagnostics) {
            return Some(value);
        }
    }
    None
}
