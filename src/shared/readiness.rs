//! Capability readiness
//!
//! The OCR engine and the geodetic transformer are probed once at startup.
//! The resulting [`Readiness`] is handed to the pipeline constructor instead of
//! being read from global state.

use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

use crate::geodesy::{resolve_zone, TransformerFactory};

/// Heavy collaborator the pipeline depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Ocr,
    Transformer,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::Ocr => "OCR engine",
            Capability::Transformer => "geodetic transformer",
        })
    }
}

/// Lifecycle of a capability: probed once, then fixed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum CapabilityState {
    #[default]
    NotReady,
    Ready,
    Failed(String),
}

impl CapabilityState {
    pub fn is_ready(&self) -> bool {
        matches!(self, CapabilityState::Ready)
    }
}

impl fmt::Display for CapabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityState::NotReady => f.write_str("not ready"),
            CapabilityState::Ready => f.write_str("ready"),
            CapabilityState::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// Readiness of every capability the pipeline needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Readiness {
    pub ocr: CapabilityState,
    pub transformer: CapabilityState,
}

impl Readiness {
    pub fn new(ocr: CapabilityState, transformer: CapabilityState) -> Self {
        Self { ocr, transformer }
    }

    /// Every capability marked ready (useful with injected fakes)
    pub fn all_ready() -> Self {
        Self::new(CapabilityState::Ready, CapabilityState::Ready)
    }

    pub fn state(&self, capability: Capability) -> &CapabilityState {
        match capability {
            Capability::Ocr => &self.ocr,
            Capability::Transformer => &self.transformer,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ocr.is_ready() && self.transformer.is_ready()
    }

    /// Capabilities that are not ready, with their state
    pub fn unavailable(&self) -> Vec<(Capability, &CapabilityState)> {
        [Capability::Ocr, Capability::Transformer]
            .into_iter()
            .map(|capability| (capability, self.state(capability)))
            .filter(|(_, state)| !state.is_ready())
            .collect()
    }
}

/// Build a transformer for a known zone and project one point through it
pub fn probe_transformer(factory: &dyn TransformerFactory) -> CapabilityState {
    let zone = resolve_zone(49.0, 8.0);
    let outcome = factory
        .build(zone)
        .and_then(|transformer| transformer.transform(8.0, 49.0));

    match outcome {
        Ok(_) => {
            info!("Geodetic transformer ready");
            CapabilityState::Ready
        }
        Err(e) => {
            warn!("Geodetic transformer unavailable: {}", e);
            CapabilityState::Failed(e.to_string())
        }
    }
}
