//! Antenna height strategies

use regex::Regex;
use std::sync::LazyLock;

use super::{is_plausible_antenna_height, Diagnostics, Field, Scan, Strategy};

/// French and English labels, each with a decimal comma then a decimal dot
static LABELED: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        r"(?i)hauteur\s+d['’]\s*antenne\s*:?\s*(\d+,\d+)\s*m\b",
        r"(?i)hauteur\s+d['’]\s*antenne\s*:?\s*(\d+\.\d+)\s*m\b",
        r"(?i)antenna\s+height\s*:?\s*(\d+,\d+)\s*m\b",
        r"(?i)antenna\s+height\s*:?\s*(\d+\.\d+)\s*m\b",
    ]
    .map(|pattern| Regex::new(pattern).expect("antenna label pattern"))
});

static COMMA_METERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+,\d+)\s*m\b").expect("comma meters pattern"));

pub(super) static STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "labeled antenna height",
        run: labeled,
    },
    Strategy {
        name: "antenna line scan",
        run: line_scan,
    },
];

fn labeled(scan: &Scan<'_>, diagnostics: &mut Diagnostics) -> Option<f64> {
    LABELED.iter().find_map(|pattern| {
        let token = pattern.captures(scan.text)?.get(1)?.as_str();
        diagnostics.parse(Field::AntennaHeight, token)
    })
}

fn line_scan(scan: &Scan<'_>, diagnostics: &mut Diagnostics) -> Option<f64> {
    for line in scan.lines.iter().filter(|line| mentions_antenna(line)) {
        for caps in COMMA_METERS.captures_iter(line) {
            let Some(value) = diagnostics.parse(Field::AntennaHeight, &caps[1]) else {
                continue;
            };
            if is_plausible_antenna_height(value) {
                return Some(value);
            }
            diagnostics.info(format!(
                "Ignoring {value} m on antenna line: outside (0, 3) m"
            ));
        }
    }
    None
}

fn mentions_antenna(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("antenne") || lower.contains("antenna")
}
