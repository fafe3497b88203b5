use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, GenericImageView};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A detected face, in source image pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl FaceBox {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Result of a best-effort detection pass.
///
/// Detection failure is not an upload failure, so it is a value here and
/// never an `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    Faces(Vec<FaceBox>),
    Unavailable { reason: String },
}

impl DetectionOutcome {
    /// Detected boxes; empty when detection was unavailable.
    pub fn faces(&self) -> &[FaceBox] {
        match self {
            DetectionOutcome::Faces(faces) => faces,
            DetectionOutcome::Unavailable { .. } => &[],
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, DetectionOutcome::Faces(_))
    }
}

/// Pluggable face detection backend.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, img: &DynamicImage) -> Result<Vec<FaceBox>>;
}

/// Run `detector` on a blocking task, giving up after `limit`.
///
/// A pass that overruns is abandoned rather than cancelled; its thread
/// finishes in the background and the result is dropped.
pub async fn detect_with_timeout(
    detector: Arc<dyn FaceDetector>,
    img: Arc<DynamicImage>,
    limit: Duration,
) -> DetectionOutcome {
    let task = tokio::task::spawn_blocking(move || detector.detect(&img));

    match tokio::time::timeout(limit, task).await {
        Ok(Ok(Ok(faces))) => {
            tracing::debug!(count = faces.len(), "Face detection finished");
            DetectionOutcome::Faces(faces)
        }
        Ok(Ok(Err(e))) => {
            tracing::warn!(error = %e, "Face detection failed");
            DetectionOutcome::Unavailable {
                reason: e.to_string(),
            }
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Face detection task died");
            DetectionOutcome::Unavailable {
                reason: format!("detection task failed: {}", e),
            }
        }
        Err(_) => {
            tracing::warn!(limit = ?limit, "Face detection timed out");
            DetectionOutcome::Unavailable {
                reason: format!("timed out after {:?}", limit),
            }
        }
    }
}

const ULTRAFACE_FILE: &str = "ultraface-320.onnx";
const ULTRAFACE_URL: &str =
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/ultraface/models/version-RFB-320.onnx";

/// UltraFace (RFB-320) over ONNX Runtime. Lightweight enough to run inline
/// with an upload.
pub struct UltraFaceDetector {
    session: Mutex<Session>,
    confidence_threshold: f32,
}

impl UltraFaceDetector {
    /// Load the model from `models_dir`, downloading it on first use.
    pub fn load(models_dir: &Path, confidence_threshold: f32) -> Result<Self> {
        let model_path = ensure_model(models_dir, ULTRAFACE_FILE, ULTRAFACE_URL)?;

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&model_path)?;

        Ok(Self {
            session: Mutex::new(session),
            confidence_threshold,
        })
    }
}

fn ensure_model(models_dir: &Path, filename: &str, url: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(models_dir)
        .with_context(|| format!("Failed to create models directory {:?}", models_dir))?;
    let model_path = models_dir.join(filename);

    if !model_path.exists() {
        tracing::info!(model = %filename, "Downloading model...");
        let response = ureq::get(url)
            .call()
            .map_err(|e| anyhow!("Failed to download model: {}", e))?;

        // Download to a temporary name so an interrupted fetch is not
        // mistaken for a model next time.
        let partial = model_path.with_extension("part");
        let mut file = std::fs::File::create(&partial)?;
        std::io::copy(&mut response.into_reader(), &mut file)?;
        std::fs::rename(&partial, &model_path)?;
        tracing::info!(model = %filename, path = ?model_path, "Model downloaded");
    }

    Ok(model_path)
}

impl FaceDetector for UltraFaceDetector {
    fn detect(&self, img: &DynamicImage) -> Result<Vec<FaceBox>> {
        const INPUT_WIDTH: u32 = 320;
        const INPUT_HEIGHT: u32 = 240;
        const NMS_THRESHOLD: f32 = 0.3;

        let (orig_width, orig_height) = img.dimensions();

        let resized = img.resize_exact(INPUT_WIDTH, INPUT_HEIGHT, image::imageops::FilterType::Triangle);
        let rgb = resized.to_rgb8();

        // NCHW, normalized to roughly [-1, 1]
        let plane = (INPUT_HEIGHT * INPUT_WIDTH) as usize;
        let mut input_data = vec![0.0f32; 3 * plane];
        for (idx, pixel) in rgb.pixels().enumerate() {
            input_data[idx] = (pixel[0] as f32 - 127.0) / 128.0;
            input_data[plane + idx] = (pixel[1] as f32 - 127.0) / 128.0;
            input_data[2 * plane + idx] = (pixel[2] as f32 - 127.0) / 128.0;
        }

        let input_tensor = Tensor::from_array((
            [1usize, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize],
            input_data.into_boxed_slice(),
        ))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("Failed to lock detection model: {}", e))?;
        let outputs = session.run(ort::inputs!["input" => input_tensor])?;

        let scores_value = outputs.get("scores").ok_or_else(|| anyhow!("No scores output"))?;
        let boxes_value = outputs.get("boxes").ok_or_else(|| anyhow!("No boxes output"))?;

        let (scores_shape, scores_data) = scores_value.try_extract_tensor::<f32>()?;
        let (_boxes_shape, boxes_data) = boxes_value.try_extract_tensor::<f32>()?;

        // scores: [1, anchors, 2] (background, face)
        // boxes:  [1, anchors, 4] (x1, y1, x2, y2 normalized)
        let num_anchors = scores_shape[1] as usize;
        let mut faces = Vec::new();
        for i in 0..num_anchors {
            let confidence = scores_data[i * 2 + 1];
            if confidence <= self.confidence_threshold {
                continue;
            }

            let x1 = (boxes_data[i * 4] * orig_width as f32).max(0.0);
            let y1 = (boxes_data[i * 4 + 1] * orig_height as f32).max(0.0);
            let x2 = (boxes_data[i * 4 + 2] * orig_width as f32).min(orig_width as f32);
            let y2 = (boxes_data[i * 4 + 3] * orig_height as f32).min(orig_height as f32);
            if x2 <= x1 || y2 <= y1 {
                continue;
            }

            faces.push(FaceBox {
                x: x1,
                y: y1,
                width: x2 - x1,
                height: y2 - y1,
                confidence,
            });
        }

        Ok(nms(faces, NMS_THRESHOLD))
    }
}

/// Non-maximum suppression: drop boxes overlapping a more confident one.
pub fn nms(mut boxes: Vec<FaceBox>, threshold: f32) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<FaceBox> = Vec::new();
    for candidate in boxes {
        if keep.iter().all(|kept| compute_iou(kept, &candidate) <= threshold) {
            keep.push(candidate);
        }
    }
    keep
}

/// Intersection over union of two boxes
fn compute_iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = a.right().min(b.right());
    let y2 = a.bottom().min(b.bottom());

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}
