//! Types shared between the pipeline, its collaborators and the CLI

pub mod readiness;

pub use readiness::{Capability, CapabilityState, Readiness};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two compared images a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSlot {
    First,
    Second,
}

impl ImageSlot {
    pub const BOTH: [ImageSlot; 2] = [ImageSlot::First, ImageSlot::Second];

    /// The slot compared against this one
    pub fn other(&self) -> ImageSlot {
        match self {
            ImageSlot::First => ImageSlot::Second,
            ImageSlot::Second => ImageSlot::First,
        }
    }

    /// 1-based index as shown to users
    pub fn number(&self) -> u8 {
        match self {
            ImageSlot::First => 1,
            ImageSlot::Second => 2,
        }
    }
}

impl fmt::Display for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "image {}", self.number())
    }
}
