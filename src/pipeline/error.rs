//! Typed failures of the comparison pipeline

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use super::ImageReading;
use crate::extraction::Field;
use crate::geodesy::ProjectionError;
use crate::shared::{Capability, CapabilityState, ImageSlot};
use crate::vision::{ImageLoadError, OcrError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to load {image}: {source}")]
    ImageLoad {
        image: ImageSlot,
        #[source]
        source: ImageLoadError,
        /// Reading of the other image, when it succeeded
        sibling: Option<Box<ImageReading>>,
    },
    #[error("OCR failed for {image}: {source}")]
    Ocr {
        image: ImageSlot,
        #[source]
        source: OcrError,
        /// Reading of the other image, when it succeeded
        sibling: Option<Box<ImageReading>>,
    },
    #[error("{0}")]
    MissingRequiredField(Box<MissingFieldReport>),
    #[error("projection failed: {0}")]
    Projection(#[from] ProjectionError),
    #[error("{capability} unavailable: {state}")]
    CapabilityUnavailable {
        capability: Capability,
        state: CapabilityState,
    },
    #[error("comparison cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn image_load(image: ImageSlot, source: ImageLoadError) -> Self {
        PipelineError::ImageLoad {
            image,
            source,
            sibling: None,
        }
    }

    pub fn ocr(image: ImageSlot, source: OcrError) -> Self {
        PipelineError::Ocr {
            image,
            source,
            sibling: None,
        }
    }

    /// Attach the reading of the image that did not fail
    pub fn with_sibling(mut self, reading: ImageReading) -> Self {
        if let PipelineError::ImageLoad { sibling, .. } | PipelineError::Ocr { sibling, .. } =
            &mut self
        {
            *sibling = Some(Box::new(reading));
        }
        self
    }

    /// Reading of the other image attached to a per-image failure
    pub fn sibling(&self) -> Option<(ImageSlot, &ImageReading)> {
        match self {
            PipelineError::ImageLoad { image, sibling, .. }
            | PipelineError::Ocr { image, sibling, .. } => sibling
                .as_deref()
                .map(|reading| (image.other(), reading)),
            _ => None,
        }
    }

    /// Raw OCR text recovered before the failure, per image in image order
    pub fn raw_texts(&self) -> Vec<(ImageSlot, &str)> {
        match self {
            PipelineError::ImageLoad { .. } | PipelineError::Ocr { .. } => {
                let mut texts = Vec::new();
                if let PipelineError::Ocr { image, source, .. } = self {
                    if let Some(text) = source.recovered_text() {
                        texts.push((*image, text));
                    }
                }
                if let Some((slot, reading)) = self.sibling() {
                    texts.push((slot, reading.raw_text.as_str()));
                }
                texts.sort_by_key(|(slot, _)| slot.number());
                texts
            }
            PipelineError::MissingRequiredField(report) => ImageSlot::BOTH
                .into_iter()
                .zip(report.readings.iter())
                .map(|(slot, reading)| (slot, reading.raw_text.as_str()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Required fields absent from one or both readings
///
/// Carries both partial readings so the caller can show what was recovered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingFieldReport {
    /// Every image that lacks a required field, in image order
    pub missing: Vec<(ImageSlot, Vec<Field>)>,
    pub readings: [ImageReading; 2],
}

impl MissingFieldReport {
    pub fn reading(&self, slot: ImageSlot) -> &ImageReading {
        match slot {
            ImageSlot::First => &self.readings[0],
            ImageSlot::Second => &self.readings[1],
        }
    }
}

impl fmt::Display for MissingFieldReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("required fields missing: ")?;
        for (index, (slot, fields)) in self.missing.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            let names: Vec<_> = fields.iter().map(Field::display_name).collect();
            write!(f, "{slot}: {}", names.join(", "))?;
        }
        Ok(())
    }
}
