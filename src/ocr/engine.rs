use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::preprocess::encode_png;
use crate::error::RecognitionError;

/// Common interface for text recognition backends.
///
/// One call recognizes one cropped region. An empty string is a valid
/// result and means the region held no legible text.
pub trait TextRecognizer: Send + Sync {
    fn name(&self) -> &'static str;

    fn recognize(&self, region: &GrayImage) -> Result<String, RecognitionError>;
}

pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateRequest<'a> {
    requests: [AnnotateImageRequest<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageRequest<'a> {
    image: ImageContent,
    features: [Feature; 1],
    image_context: ImageContext<'a>,
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageContext<'a> {
    language_hints: &'a [String],
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    error: Option<Status>,
}

#[derive(Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct Status {
    #[serde(default)]
    message: String,
}

/// Google Cloud Vision `TEXT_DETECTION` over the REST API.
pub struct CloudVisionRecognizer {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    language_hints: Vec<String>,
    timeout: Duration,
}

impl CloudVisionRecognizer {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        language_hints: Vec<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            language_hints,
            timeout,
        })
    }

    fn build_request(&self, png: &[u8]) -> AnnotateRequest<'_> {
        AnnotateRequest {
            requests: [AnnotateImageRequest {
                image: ImageContent {
                    content: BASE64.encode(png),
                },
                features: [Feature {
                    kind: "TEXT_DETECTION",
                }],
                image_context: ImageContext {
                    language_hints: &self.language_hints,
                },
            }],
        }
    }
}

impl TextRecognizer for CloudVisionRecognizer {
    fn name(&self) -> &'static str {
        "cloud-vision"
    }

    fn recognize(&self, region: &GrayImage) -> Result<String, RecognitionError> {
        let png = encode_png(region)?;
        let body = self.build_request(&png);

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .header("User-Agent", "iidx-result-reader")
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    RecognitionError::Timeout {
                        after_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    RecognitionError::transport(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| RecognitionError::transport(e.to_string()))?;

        // Error bodies carry a Status payload too, so parse before checking the code
        let parsed: AnnotateResponse = serde_json::from_str(&text).unwrap_or_default();
        if !status.is_success() {
            return Err(RecognitionError::backend(format!("HTTP {}: {}", status, text.trim())));
        }

        parse_annotate_response(parsed)
    }
}

fn parse_annotate_response(parsed: AnnotateResponse) -> Result<String, RecognitionError> {
    let Some(first) = parsed.responses.into_iter().next() else {
        return Ok(String::new());
    };

    if let Some(status) = first.error {
        if !status.message.is_empty() {
            return Err(RecognitionError::backend(status.message));
        }
    }

    // The first annotation is the full text of the region
    Ok(first
        .text_annotations
        .into_iter()
        .next()
        .map(|t| t.description)
        .unwrap_or_default())
}

/// Local Tesseract CLI backend.
pub struct TesseractRecognizer {
    executable: PathBuf,
    languages: String,
    timeout: Duration,
}

impl TesseractRecognizer {
    pub fn new(executable: PathBuf, language_hints: &[String], timeout: Duration) -> Self {
        Self {
            executable,
            languages: tesseract_languages(language_hints),
            timeout,
        }
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }
}

/// Maps ISO 639-1 hints to Tesseract traineddata names, e.g. `ja` → `jpn`.
pub fn tesseract_languages(hints: &[String]) -> String {
    let langs: Vec<&str> = hints
        .iter()
        .map(|h| match h.as_str() {
            "ja" => "jpn",
            "en" => "eng",
            "zh" => "chi_sim",
            "ko" => "kor",
            other => other,
        })
        .collect();

    if langs.is_empty() {
        "eng".to_string()
    } else {
        langs.join("+")
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&self, region: &GrayImage) -> Result<String, RecognitionError> {
        // Scoped to this call: the file is removed when `temp_input` drops
        let temp_input = NamedTempFile::with_suffix(".png")
            .map_err(|e| RecognitionError::Encode { message: e.to_string() })?;
        region
            .save(temp_input.path())
            .map_err(|e| RecognitionError::Encode { message: e.to_string() })?;

        let mut child = Command::new(&self.executable)
            .arg(temp_input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .arg("--psm")
            .arg("6") // Assume single uniform block of text
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RecognitionError::backend(format!("failed to start tesseract: {}", e)))?;

        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) if started.elapsed() >= self.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(RecognitionError::Timeout {
                        after_ms: self.timeout.as_millis() as u64,
                    });
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(20)),
                Err(e) => return Err(RecognitionError::backend(e.to_string())),
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| RecognitionError::backend(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognitionError::backend(format!(
                "tesseract failed: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}

/// Finds the Tesseract executable: explicit override first, then PATH,
/// then common install locations.
pub fn find_tesseract_executable(override_path: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(path) = override_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(anyhow::anyhow!(
            "Configured tesseract not found: {}",
            path.display()
        ));
    }

    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    let common_paths = [
        "/usr/bin/tesseract",
        "/usr/local/bin/tesseract",
        "/opt/homebrew/bin/tesseract",
        r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    ];

    for path in &common_paths {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow::anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints() -> Vec<String> {
        vec!["ja".to_string(), "en".to_string()]
    }

    #[test]
    fn test_tesseract_languages() {
        assert_eq!(tesseract_languages(&hints()), "jpn+eng");
        assert_eq!(tesseract_languages(&[]), "eng");
        assert_eq!(tesseract_languages(&["kor".to_string()]), "kor");
    }

    #[test]
    fn test_request_body_shape() {
        let recognizer = CloudVisionRecognizer::new(
            DEFAULT_VISION_ENDPOINT,
            "key",
            hints(),
            Duration::from_secs(1),
        )
        .unwrap();

        let body = serde_json::to_value(recognizer.build_request(b"abc")).unwrap();
        let request = &body["requests"][0];

        assert_eq!(request["image"]["content"], "YWJj");
        assert_eq!(request["features"][0]["type"], "TEXT_DETECTION");
        assert_eq!(request["imageContext"]["languageHints"][0], "ja");
        assert_eq!(request["imageContext"]["languageHints"][1], "en");
    }

    #[test]
    fn test_parse_response_full_text() {
        let json = r#"{"responses":[{"textAnnotations":[
            {"description":"2025-12-23 21:04\nSTANDARD"},
            {"description":"2025-12-23"}
        ]}]}"#;
        let parsed: AnnotateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parse_annotate_response(parsed).unwrap(),
            "2025-12-23 21:04\nSTANDARD"
        );
    }

    #[test]
    fn test_parse_response_empty_is_not_error() {
        let parsed: AnnotateResponse = serde_json::from_str(r#"{"responses":[{}]}"#).unwrap();
        assert_eq!(parse_annotate_response(parsed).unwrap(), "");

        let parsed: AnnotateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(parse_annotate_response(parsed).unwrap(), "");
    }

    #[test]
    fn test_parse_response_error_message() {
        let json = r#"{"responses":[{"error":{"code":3,"message":"Bad image data."}}]}"#;
        let parsed: AnnotateResponse = serde_json::from_str(json).unwrap();
        let err = parse_annotate_response(parsed).unwrap_err();
        assert!(matches!(err, RecognitionError::Backend { message } if message == "Bad image data."));
    }

    /// Writes an executable shell script standing in for tesseract.
    #[cfg(unix)]
    fn fake_tesseract(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("tesseract");
        std::fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn test_tesseract_reads_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_tesseract(dir.path(), "echo '2025-12-23 21:04'");

        let recognizer = TesseractRecognizer::new(exe, &hints(), Duration::from_secs(10));
        let text = recognizer.recognize(&GrayImage::new(8, 8)).unwrap();
        assert_eq!(text, "2025-12-23 21:04");
    }

    #[cfg(unix)]
    #[test]
    fn test_tesseract_timeout_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_tesseract(dir.path(), "exec sleep 5");

        let recognizer = TesseractRecognizer::new(exe, &hints(), Duration::from_millis(50));
        let started = Instant::now();
        let err = recognizer.recognize(&GrayImage::new(8, 8)).unwrap_err();

        assert!(matches!(err, RecognitionError::Timeout { after_ms: 50 }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_tesseract_failure_is_backend_error() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_tesseract(dir.path(), "echo 'Error opening data file' >&2; exit 1");

        let recognizer = TesseractRecognizer::new(exe, &hints(), Duration::from_secs(10));
        let err = recognizer.recognize(&GrayImage::new(8, 8)).unwrap_err();
        assert!(matches!(err, RecognitionError::Backend { message } if message.contains("Error opening data file")));
    }

    #[test]
    fn test_missing_tesseract_override_is_error() {
        let missing = Path::new("/definitely/not/here/tesseract");
        assert!(find_tesseract_executable(Some(missing)).is_err());
    }
}
