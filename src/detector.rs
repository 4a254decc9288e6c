//! Object detection capability.
//!
//! The scanner only needs "labels and confidences for this image", so the
//! model sits behind [`ObjectDetector`]. [`CommandDetector`] runs inference
//! out of process and reads a JSON array of `{label, confidence}` objects
//! from the command's stdout.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::models::Detection;

/// Placeholder replaced with the model weights reference
pub const MODEL_PLACEHOLDER: &str = "{model}";
/// Placeholder replaced with the image path
pub const IMAGE_PLACEHOLDER: &str = "{image}";

/// Runs a detection model over one image
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    /// Detected objects in `image`, in model order
    async fn detect(&self, image: &Path) -> Result<Vec<Detection>>;
}

/// Out-of-process detector driven by a command template
#[derive(Debug, Clone)]
pub struct CommandDetector {
    program: String,
    args: Vec<String>,
    model: String,
}

impl CommandDetector {
    /// Build from a whitespace-separated command template such as
    /// `yolo-detect --model {model} --json {image}`.
    pub fn from_template(template: &str, model: &str) -> Result<Self> {
        let mut parts = template.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| PipelineError::Config("detection command is empty".to_string()))?;
        let args: Vec<String> = parts.collect();
        if !args.iter().any(|arg| arg.contains(IMAGE_PLACEHOLDER)) {
            return Err(PipelineError::Config(format!(
                "detection command must reference {IMAGE_PLACEHOLDER}: {template}"
            )));
        }

        Ok(Self {
            program,
            args,
            model: model.to_string(),
        })
    }

    /// Arguments with placeholders substituted for `image`
    #[must_use]
    pub fn args_for(&self, image: &Path) -> Vec<String> {
        let image = image.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace(MODEL_PLACEHOLDER, &self.model).replace(IMAGE_PLACEHOLDER, &image))
            .collect()
    }
}

#[async_trait]
impl ObjectDetector for CommandDetector {
    async fn detect(&self, image: &Path) -> Result<Vec<Detection>> {
        let args = self.args_for(image);
        debug!(program = %self.program, ?args, "Running detector");

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| detection_error(image, format!("failed to start {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(detection_error(
                image,
                format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            ));
        }

        parse_detections(&output.stdout).map_err(|e| detection_error(image, e))
    }
}

fn detection_error(path: &Path, message: String) -> PipelineError {
    PipelineError::Detection {
        path: PathBuf::from(path),
        message,
    }
}

/// Parse the detector's stdout.
pub fn parse_detections(stdout: &[u8]) -> std::result::Result<Vec<Detection>, String> {
    let detections: Vec<Detection> =
        serde_json::from_slice(stdout).map_err(|e| format!("unparseable detector output: {e}"))?;
    if let Some(bad) = detections.iter().find(|d| !d.confidence.is_finite()) {
        return Err(format!("non-finite confidence for {}", bad.label));
    }
    Ok(detections)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_substitution() {
        let detector = CommandDetector::from_template("yolo-detect --model {model} --json {image}", "yolov8n.pt").unwrap();
        assert_eq!(
            detector.args_for(Path::new("data/raw/images/chemed/42.jpg")),
            vec!["--model", "yolov8n.pt", "--json", "data/raw/images/chemed/42.jpg"]
        );
    }

    #[test]
    fn test_template_requires_image() {
        assert!(CommandDetector::from_template("yolo-detect --model {model}", "m").is_err());
        assert!(CommandDetector::from_template("   ", "m").is_err());
    }

    #[test]
    fn test_parse_detections() {
        let parsed = parse_detections(br#"[{"label":"person","confidence":0.4},{"label":"bottle","confidence":0.9}]"#).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].label, "bottle");
        assert!(parse_detections(b"[]").unwrap().is_empty());
        assert!(parse_detections(b"not json").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_detector_reads_stdout() {
        let detector = CommandDetector::from_template(
            r#"sh -c echo${IFS}'[{"label":"cup","confidence":0.75}]' {image}"#,
            "unused",
        )
        .unwrap();
        let detections = detector.detect(Path::new("1.jpg")).await.unwrap();
        assert_eq!(detections, vec![Detection { label: "cup".to_string(), confidence: 0.75 }]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_detector_nonzero_exit_fails() {
        let detector = CommandDetector::from_template("false {image}", "unused").unwrap();
        let err = detector.detect(Path::new("1.jpg")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Detection { .. }));
    }
}
