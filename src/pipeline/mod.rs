//! Comparison Pipeline
//!
//! Reads two instrument photographs concurrently, validates the extracted
//! records, projects both points into the UTM zone of image 1 and computes
//! their distance and height differences.

mod error;

pub use error::{MissingFieldReport, PipelineError};

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::OcrSettings;
use crate::extraction::{extract_parameters, DiagnosticEvent, Extraction, Field};
use crate::geodesy::{
    compute, project, resolve_zone, ComparisonResult, ImageDiagnostic, ProjectionError,
    TransformerFactory,
};
use crate::shared::{Capability, ImageSlot, Readiness};
use crate::vision::{ImageHandle, ImageLoadError, ImageLoader, OcrEngine, OcrError};

/// OCR text of one image and what was extracted from it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageReading {
    pub raw_text: String,
    pub extraction: Extraction,
}

/// Pipeline tuning taken from the configuration
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    /// Language for the first OCR attempt
    pub language_hint: Option<String>,
}

impl From<&OcrSettings> for PipelineSettings {
    fn from(settings: &OcrSettings) -> Self {
        Self {
            language_hint: settings.language.clone(),
        }
    }
}

/// Two-image comparison over injected collaborators
pub struct ComparisonPipeline {
    loader: Arc<dyn ImageLoader>,
    ocr: Arc<dyn OcrEngine>,
    transformers: Arc<dyn TransformerFactory>,
    readiness: Readiness,
    settings: PipelineSettings,
}

impl ComparisonPipeline {
    pub fn new(
        loader: Arc<dyn ImageLoader>,
        ocr: Arc<dyn OcrEngine>,
        transformers: Arc<dyn TransformerFactory>,
        readiness: Readiness,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            loader,
            ocr,
            transformers,
            readiness,
            settings,
        }
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    /// Compare the survey readings shown in two photographs
    pub async fn compare_images(
        &self,
        first: &Path,
        second: &Path,
        cancel: &CancellationToken,
    ) -> Result<ComparisonResult, PipelineError> {
        self.ensure_ready(&[Capability::Ocr, Capability::Transformer])?;
        let readings = self.read_pair(first, second, cancel).await?;
        self.compare_readings(readings)
    }

    /// OCR and parse both photographs concurrently
    pub async fn read_pair(
        &self,
        first: &Path,
        second: &Path,
        cancel: &CancellationToken,
    ) -> Result<[ImageReading; 2], PipelineError> {
        self.ensure_ready(&[Capability::Ocr])?;
        info!("Reading {} and {}", first.display(), second.display());

        let (first_reading, second_reading) = tokio::join!(
            self.read_image(ImageSlot::First, first, cancel),
            self.read_image(ImageSlot::Second, second, cancel),
        );
        match (first_reading, second_reading) {
            (Ok(first), Ok(second)) => Ok([first, second]),
            (Err(e), Ok(other)) | (Ok(other), Err(e)) => Err(e.with_sibling(other)),
            // Image 1's failure wins when both fail
            (Err(e), Err(_)) => Err(e),
        }
    }

    /// Validate two readings and measure the offset between them
    pub fn compare_readings(
        &self,
        readings: [ImageReading; 2],
    ) -> Result<ComparisonResult, PipelineError> {
        self.ensure_ready(&[Capability::Transformer])?;

        let coordinates = match required_coordinates(&readings) {
            Ok(coordinates) => coordinates,
            Err(missing) => {
                let report = MissingFieldReport { missing, readings };
                warn!("{}", report);
                return Err(PipelineError::MissingRequiredField(Box::new(report)));
            }
        };

        let result = self.measure(&readings, coordinates)?;
        info!(
            "{}: horizontal distance {:.3} m, height difference {:.3} m",
            result.zone, result.horizontal_distance, result.ellipsoidal_height.meters
        );
        Ok(result)
    }

    /// OCR and parse a single photograph
    pub async fn extract_from_image(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<ImageReading, PipelineError> {
        self.ensure_ready(&[Capability::Ocr])?;
        self.read_image(ImageSlot::First, path, cancel).await
    }

    fn ensure_ready(&self, capabilities: &[Capability]) -> Result<(), PipelineError> {
        for capability in capabilities {
            let state = self.readiness.state(*capability);
            if !state.is_ready() {
                return Err(PipelineError::CapabilityUnavailable {
                    capability: *capability,
                    state: state.clone(),
                });
            }
        }
        Ok(())
    }

    async fn read_image(
        &self,
        slot: ImageSlot,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<ImageReading, PipelineError> {
        let handle = self.load(slot, path).await?;
        let raw_text = self.recognize(slot, &handle, cancel).await?;
        debug!("{} OCR text:\n{}", slot, raw_text);

        let extraction = extract_parameters(&raw_text);
        info!("{}: {}", slot, extraction.parameters);
        Ok(ImageReading {
            raw_text,
            extraction,
        })
    }

    async fn load(&self, slot: ImageSlot, path: &Path) -> Result<ImageHandle, PipelineError> {
        let loader = Arc::clone(&self.loader);
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || loader.load(&owned))
            .await
            .unwrap_or_else(|e| Err(ImageLoadError::Interrupted(e.to_string())))
            .map_err(|source| PipelineError::image_load(slot, source))
    }

    /// OCR with the language hint, then once more without it
    async fn recognize(
        &self,
        slot: ImageSlot,
        handle: &ImageHandle,
        cancel: &CancellationToken,
    ) -> Result<String, PipelineError> {
        let hint = self.settings.language_hint.as_deref();
        let first_error = match self.recognize_once(handle, hint, cancel).await? {
            Ok(text) => return Ok(text),
            Err(source) if hint.is_none() => return Err(PipelineError::ocr(slot, source)),
            Err(e) => e,
        };

        warn!(
            "{}: {} failed with language {:?} ({}), retrying without hint",
            slot,
            self.ocr.name(),
            hint,
            first_error
        );
        match self.recognize_once(handle, None, cancel).await? {
            Ok(text) => Ok(text),
            Err(retry_error) => {
                // Keep whichever attempt recovered some text
                let source = if retry_error.recovered_text().is_none()
                    && first_error.recovered_text().is_some()
                {
                    first_error
                } else {
                    retry_error
                };
                Err(PipelineError::ocr(slot, source))
            }
        }
    }

    async fn recognize_once(
        &self,
        handle: &ImageHandle,
        language: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Result<String, OcrError>, PipelineError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            result = self.ocr.recognize(handle, language) => Ok(result),
        }
    }

    /// Resolve the zone, project both points and compute differences
    ///
    /// Kept synchronous: the transformer never lives across an await.
    fn measure(
        &self,
        readings: &[ImageReading; 2],
        coordinates: [(f64, f64); 2],
    ) -> Result<ComparisonResult, ProjectionError> {
        let [(first_lat, first_lon), (second_lat, second_lon)] = coordinates;
        let mut diagnostics: Vec<ImageDiagnostic> = ImageSlot::BOTH
            .into_iter()
            .zip(readings.iter())
            .flat_map(|(image, reading)| {
                reading
                    .extraction
                    .diagnostics
                    .iter()
                    .cloned()
                    .map(move |event| ImageDiagnostic { image, event })
            })
            .collect();

        let zone = resolve_zone(first_lat, first_lon);
        let second_zone = resolve_zone(second_lat, second_lon);
        if second_zone != zone {
            warn!(
                "Image 2 lies in {}, projecting into {} of image 1",
                second_zone, zone
            );
            diagnostics.push(ImageDiagnostic {
                image: ImageSlot::Second,
                event: DiagnosticEvent::warning(format!(
                    "Point lies in {second_zone}; projected into {zone} of image 1"
                )),
            });
        }

        let transformer = self.transformers.build(zone)?;
        let first_point = project(transformer.as_ref(), first_lat, first_lon)?;
        let second_point = project(transformer.as_ref(), second_lat, second_lon)?;

        let [first, second] = readings;
        Ok(compute(
            &first.extraction.parameters,
            &second.extraction.parameters,
            first_point,
            second_point,
            zone,
        )
        .with_diagnostics(diagnostics))
    }
}

/// Latitude and longitude of both readings, or every missing required field
fn required_coordinates(
    readings: &[ImageReading; 2],
) -> Result<[(f64, f64); 2], Vec<(ImageSlot, Vec<Field>)>> {
    let [first, second] = readings;
    match (
        first.extraction.parameters.coordinates(),
        second.extraction.parameters.coordinates(),
    ) {
        (Some(a), Some(b)) => Ok([a, b]),
        _ => Err(ImageSlot::BOTH
            .into_iter()
            .zip(readings.iter())
            .map(|(slot, reading)| (slot, reading.extraction.parameters.missing_required()))
            .filter(|(_, fields)| !fields.is_empty())
            .collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::Severity;
    use crate::geodesy::{Proj4Factory, Transformer, UtmZoneCode};
    use crate::shared::CapabilityState;
    use async_trait::async_trait;
    use image::{DynamicImage, RgbaImage};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    const FIRST_TEXT: &str = "Point GNSS\nLatitude 49,0000\nLongitude 8,0000\nHauteur ellipsoïdale 400,000 m\nHauteur d'antenne 1,500 m";
    const SECOND_TEXT: &str = "Point GNSS\nLatitude 49,0010\nLongitude 8,0000\nHauteur ellipsoïdale 401,000 m\nHauteur d'antenne 1,800 m";

    /// Returns a blank image for any path, or `NotFound` for paths named "missing"
    struct FakeLoader;

    impl ImageLoader for FakeLoader {
        fn load(&self, path: &Path) -> Result<ImageHandle, ImageLoadError> {
            if path.file_stem().is_some_and(|stem| stem == "missing") {
                return Err(ImageLoadError::NotFound(path.to_path_buf()));
            }
            Ok(ImageHandle::new(
                path,
                DynamicImage::ImageRgba8(RgbaImage::new(1, 1)),
            ))
        }
    }

    /// Serves canned text per image path and records every call
    #[derive(Default)]
    struct ScriptedOcr {
        texts: HashMap<PathBuf, String>,
        reject_hints: bool,
        crashing: Vec<PathBuf>,
        calls: Mutex<Vec<(PathBuf, Option<String>)>>,
    }

    impl ScriptedOcr {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                texts: pages
                    .iter()
                    .map(|(path, text)| (PathBuf::from(path), text.to_string()))
                    .collect(),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<(PathBuf, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OcrEngine for ScriptedOcr {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn recognize(
            &self,
            image: &ImageHandle,
            language: Option<&str>,
        ) -> Result<String, OcrError> {
            self.calls
                .lock()
                .unwrap()
                .push((image.path.clone(), language.map(str::to_string)));
            if self.crashing.contains(&image.path) {
                return Err(OcrError::Failed {
                    status: "exit status: 1".to_string(),
                    stderr: "segmentation fault".to_string(),
                });
            }
            if self.reject_hints && language.is_some() {
                return Err(OcrError::Failed {
                    status: "exit status: 1".to_string(),
                    stderr: "Failed loading language 'fra'".to_string(),
                });
            }
            match self.texts.get(&image.path) {
                Some(text) if !text.trim().is_empty() => Ok(text.clone()),
                Some(text) => Err(OcrError::NoText {
                    raw_text: text.clone(),
                }),
                None => Err(OcrError::NoText {
                    raw_text: String::new(),
                }),
            }
        }
    }

    /// Never finishes
    struct PendingOcr;

    #[async_trait]
    impl OcrEngine for PendingOcr {
        fn name(&self) -> &str {
            "pending"
        }

        async fn recognize(
            &self,
            _image: &ImageHandle,
            _language: Option<&str>,
        ) -> Result<String, OcrError> {
            std::future::pending().await
        }
    }

    struct FailingFactory;

    impl TransformerFactory for FailingFactory {
        fn build(&self, target: UtmZoneCode) -> Result<Box<dyn Transformer>, ProjectionError> {
            Err(ProjectionError::Build {
                target,
                reason: "unknown projection".to_string(),
            })
        }
    }

    fn pipeline_with(
        ocr: Arc<dyn OcrEngine>,
        transformers: Arc<dyn TransformerFactory>,
        readiness: Readiness,
        language_hint: Option<&str>,
    ) -> ComparisonPipeline {
        ComparisonPipeline::new(
            Arc::new(FakeLoader),
            ocr,
            transformers,
            readiness,
            PipelineSettings {
                language_hint: language_hint.map(str::to_string),
            },
        )
    }

    fn pipeline(ocr: Arc<dyn OcrEngine>) -> ComparisonPipeline {
        pipeline_with(ocr, Arc::new(Proj4Factory), Readiness::all_ready(), Some("fra"))
    }

    #[tokio::test]
    async fn test_compare_end_to_end() {
        let ocr = Arc::new(ScriptedOcr::new(&[("a.png", FIRST_TEXT), ("b.png", SECOND_TEXT)]));
        let result = pipeline(ocr)
            .compare_images(Path::new("a.png"), Path::new("b.png"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.zone.epsg(), 32632);
        assert!(
            (result.horizontal_distance - 111.2).abs() < 1.0,
            "distance {}",
            result.horizontal_distance
        );
        assert!((result.ellipsoidal_height.meters - 1.0).abs() < 1e-9);
        assert!(!result.ellipsoidal_height.used_default());
        assert!((result.antenna_height_difference.unwrap() - 0.3).abs() < 1e-9);

        // Extraction notes are attributed to their image
        assert!(result.diagnostics.iter().any(|d| d.image == ImageSlot::First));
        assert!(result.diagnostics.iter().any(|d| d.image == ImageSlot::Second));
        assert!(result
            .diagnostics
            .iter()
            .all(|d| d.event.severity == Severity::Info));
    }

    #[tokio::test]
    async fn test_missing_longitude_in_second_image() {
        let second = "Latitude 49,0010\nHauteur ellipsoïdale 401,000 m";
        let ocr = Arc::new(ScriptedOcr::new(&[("a.png", FIRST_TEXT), ("b.png", second)]));
        let error = pipeline(ocr)
            .compare_images(Path::new("a.png"), Path::new("b.png"), &CancellationToken::new())
            .await
            .unwrap_err();

        let PipelineError::MissingRequiredField(report) = &error else {
            panic!("unexpected error: {error}");
        };
        assert_eq!(report.missing, vec![(ImageSlot::Second, vec![Field::Longitude])]);
        assert_eq!(report.reading(ImageSlot::First).raw_text, FIRST_TEXT);
        assert_eq!(report.reading(ImageSlot::Second).raw_text, second);
        assert_eq!(
            report.reading(ImageSlot::Second).extraction.parameters.latitude,
            Some(49.001)
        );
        assert_eq!(error.raw_texts().len(), 2);
        assert!(error.to_string().contains("image 2: Longitude"));
    }

    #[tokio::test]
    async fn test_missing_fields_in_both_images_reported_together() {
        let ocr = Arc::new(ScriptedOcr::new(&[
            ("a.png", "Longitude 8,0000"),
            ("b.png", "Hauteur ellipsoïdale 401,000 m"),
        ]));
        let error = pipeline(ocr)
            .compare_images(Path::new("a.png"), Path::new("b.png"), &CancellationToken::new())
            .await
            .unwrap_err();

        let PipelineError::MissingRequiredField(report) = error else {
            panic!("expected missing fields");
        };
        assert_eq!(
            report.missing,
            vec![
                (ImageSlot::First, vec![Field::Latitude]),
                (ImageSlot::Second, vec![Field::Latitude, Field::Longitude]),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_ellipsoidal_height_does_not_abort() {
        let first = "Latitude 49,0000\nLongitude 8,0000";
        let ocr = Arc::new(ScriptedOcr::new(&[("a.png", first), ("b.png", SECOND_TEXT)]));
        let result = pipeline(ocr)
            .compare_images(Path::new("a.png"), Path::new("b.png"), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.ellipsoidal_height.first_defaulted);
        assert!((result.ellipsoidal_height.meters - 401.0).abs() < 1e-9);
        assert!(result.antenna_height_difference.is_none());
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.image == ImageSlot::First && d.event.severity == Severity::Warning));
    }

    #[tokio::test]
    async fn test_ocr_retried_without_language_hint() {
        let ocr = Arc::new(ScriptedOcr {
            reject_hints: true,
            ..ScriptedOcr::new(&[("a.png", FIRST_TEXT), ("b.png", SECOND_TEXT)])
        });
        let result = pipeline(ocr.clone())
            .compare_images(Path::new("a.png"), Path::new("b.png"), &CancellationToken::new())
            .await;

        assert!(result.is_ok());
        let calls = ocr.calls();
        assert_eq!(calls.len(), 4);
        for path in ["a.png", "b.png"] {
            let languages: Vec<_> = calls
                .iter()
                .filter(|(p, _)| p == Path::new(path))
                .map(|(_, language)| language.clone())
                .collect();
            assert_eq!(languages, vec![Some("fra".to_string()), None]);
        }
    }

    #[tokio::test]
    async fn test_no_retry_without_hint() {
        let ocr = Arc::new(ScriptedOcr::new(&[("a.png", FIRST_TEXT)]));
        let pipeline = pipeline_with(
            ocr.clone(),
            Arc::new(Proj4Factory),
            Readiness::all_ready(),
            None,
        );
        let error = pipeline
            .compare_images(Path::new("a.png"), Path::new("b.png"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            PipelineError::Ocr {
                image: ImageSlot::Second,
                ..
            }
        ));
        assert_eq!(ocr.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_blank_ocr_keeps_recovered_text() {
        let ocr = Arc::new(ScriptedOcr::new(&[("a.png", FIRST_TEXT), ("b.png", " \n ")]));
        let error = pipeline(ocr)
            .compare_images(Path::new("a.png"), Path::new("b.png"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            error.raw_texts(),
            vec![(ImageSlot::First, FIRST_TEXT), (ImageSlot::Second, " \n ")]
        );
    }

    #[tokio::test]
    async fn test_ocr_failure_keeps_other_reading() {
        let ocr = Arc::new(ScriptedOcr {
            crashing: vec![PathBuf::from("b.png")],
            ..ScriptedOcr::new(&[("a.png", FIRST_TEXT)])
        });
        let error = pipeline(ocr)
            .compare_images(Path::new("a.png"), Path::new("b.png"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            PipelineError::Ocr {
                image: ImageSlot::Second,
                source: OcrError::Failed { .. },
                ..
            }
        ));
        let (slot, reading) = error.sibling().unwrap();
        assert_eq!(slot, ImageSlot::First);
        assert_eq!(reading.extraction.parameters.latitude, Some(49.0));
        assert_eq!(error.raw_texts(), vec![(ImageSlot::First, FIRST_TEXT)]);
    }

    #[tokio::test]
    async fn test_load_failure_keeps_other_reading() {
        let ocr = Arc::new(ScriptedOcr::new(&[("b.png", SECOND_TEXT)]));
        let error = pipeline(ocr)
            .compare_images(
                Path::new("missing.png"),
                Path::new("b.png"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            PipelineError::ImageLoad {
                image: ImageSlot::First,
                ..
            }
        ));
        assert_eq!(error.raw_texts(), vec![(ImageSlot::Second, SECOND_TEXT)]);
    }

    #[tokio::test]
    async fn test_first_image_error_reported_first() {
        let ocr = Arc::new(ScriptedOcr::new(&[]));
        let error = pipeline(ocr)
            .compare_images(
                Path::new("missing.png"),
                Path::new("b.png"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            PipelineError::ImageLoad {
                image: ImageSlot::First,
                source: ImageLoadError::NotFound(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cancellation_during_ocr() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let error = pipeline(Arc::new(PendingOcr))
            .compare_images(Path::new("a.png"), Path::new("b.png"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(error, PipelineError::Cancelled));
    }

    #[tokio::test]
    async fn test_readiness_gating() {
        let ocr = Arc::new(ScriptedOcr::new(&[("a.png", FIRST_TEXT), ("b.png", SECOND_TEXT)]));
        let readiness = Readiness::new(
            CapabilityState::Ready,
            CapabilityState::Failed("proj unavailable".to_string()),
        );
        let pipeline = pipeline_with(ocr.clone(), Arc::new(Proj4Factory), readiness, Some("fra"));

        let error = pipeline
            .compare_images(Path::new("a.png"), Path::new("b.png"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            PipelineError::CapabilityUnavailable {
                capability: Capability::Transformer,
                ..
            }
        ));
        assert!(ocr.calls().is_empty());

        // Single-image extraction only needs OCR
        let reading = pipeline
            .extract_from_image(Path::new("a.png"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reading.extraction.parameters.latitude, Some(49.0));
    }

    #[tokio::test]
    async fn test_projection_failure_leaves_pipeline_usable() {
        let ocr = Arc::new(ScriptedOcr::new(&[("a.png", FIRST_TEXT), ("b.png", SECOND_TEXT)]));
        let pipeline = pipeline_with(
            ocr,
            Arc::new(FailingFactory),
            Readiness::all_ready(),
            Some("fra"),
        );

        for _ in 0..2 {
            let error = pipeline
                .compare_images(Path::new("a.png"), Path::new("b.png"), &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(error, PipelineError::Projection(_)));
        }
    }

    #[tokio::test]
    async fn test_cross_zone_points_use_first_zone() {
        let first = "Latitude 49,0000\nLongitude 11,9990";
        let second = "Latitude 49,0000\nLongitude 12,0010";
        let ocr = Arc::new(ScriptedOcr::new(&[("a.png", first), ("b.png", second)]));
        let result = pipeline(ocr)
            .compare_images(Path::new("a.png"), Path::new("b.png"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.zone.epsg(), 32632);
        // 0.002° of longitude at 49°N
        assert!(
            (result.horizontal_distance - 146.0).abs() < 2.0,
            "distance {}",
            result.horizontal_distance
        );
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.image == ImageSlot::Second && d.event.message.contains("EPSG:32633")));
    }
}
