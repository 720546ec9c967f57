//! HTTP client for the recognition pipeline agent
//!
//! The agent owns the pipeline definition and screen access for one device.
//! Wire protocol (JSON):
//! - `POST {endpoint}/run` `{serial, node, params}` →
//!   `{matched, box?, boxes?, text?}`
//! - `POST {endpoint}/detect` `{serial, image}` (base64 JPEG) →
//!   `{detections: [{box, label, score}]}`
//!
//! Boxes are `[x, y, w, h]` arrays.

use super::{
    encode_jpeg, ActionId, ActionParams, CollaboratorError, CollaboratorResult, ContentClass,
    Detection, Detector, Frame, Recognition, Recognizer, Region,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default agent address
pub const DEFAULT_PIPELINE_ENDPOINT: &str = "http://127.0.0.1:8011";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    serial: &'a str,
    node: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a ActionParams>,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    matched: bool,
    #[serde(default, rename = "box")]
    best: Option<[i32; 4]>,
    #[serde(default)]
    boxes: Vec<[i32; 4]>,
    #[serde(default)]
    text: Option<String>,
}

impl From<RunResponse> for Recognition {
    fn from(resp: RunResponse) -> Self {
        let mut regions: Vec<Region> = resp.boxes.into_iter().map(Region::from).collect();
        let region = resp.best.map(Region::from).or_else(|| regions.first().copied());
        if regions.is_empty() {
            regions.extend(region);
        }
        Recognition {
            matched: resp.matched,
            region: if resp.matched { region } else { None },
            regions: if resp.matched { regions } else { Vec::new() },
            text: resp.text,
        }
    }
}

#[derive(Debug, Serialize)]
struct DetectRequest<'a> {
    serial: &'a str,
    image: String,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<WireDetection>,
}

#[derive(Debug, Deserialize)]
struct WireDetection {
    #[serde(rename = "box")]
    bbox: [i32; 4],
    label: ContentClass,
    #[serde(default)]
    score: f32,
}

/// Recognizer + Detector backed by the pipeline agent
#[derive(Debug, Clone)]
pub struct RemotePipeline {
    http: reqwest::Client,
    endpoint: String,
    serial: String,
}

impl RemotePipeline {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>, serial: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            serial: serial.into(),
        }
    }

    /// HTTP client with the agent's connect/request timeouts
    pub fn http_client() -> CollaboratorResult<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?)
    }

    async fn post<Req: Serialize + Sync, Resp: DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> CollaboratorResult<Resp> {
        let url = format!("{}{}", self.endpoint, path);
        let response = self.http.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Pipeline(format!(
                "{} returned {}: {}",
                url, status, text
            )));
        }

        Ok(response.json::<Resp>().await?)
    }
}

#[async_trait::async_trait]
impl Recognizer for RemotePipeline {
    async fn run(
        &self,
        action: ActionId,
        params: Option<ActionParams>,
    ) -> CollaboratorResult<Recognition> {
        let request = RunRequest {
            serial: &self.serial,
            node: action.pipeline_name(),
            params: params.as_ref(),
        };
        let response: RunResponse = self.post("/run", &request).await?;
        debug!(node = action.pipeline_name(), matched = response.matched, "Pipeline node ran");
        Ok(response.into())
    }
}

#[async_trait::async_trait]
impl Detector for RemotePipeline {
    async fn detect(&self, frame: &Frame) -> CollaboratorResult<Vec<Detection>> {
        let jpeg = encode_jpeg(frame)?;
        let request = DetectRequest {
            serial: &self.serial,
            image: STANDARD.encode(jpeg),
        };
        let response: DetectResponse = self.post("/detect", &request).await?;

        Ok(response
            .detections
            .into_iter()
            .map(|d| Detection {
                region: Region::from(d.bbox),
                label: d.label,
                confidence: d.score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_response_conversion() {
        let resp: RunResponse =
            serde_json::from_str(r#"{"matched":true,"box":[10,20,30,40],"text":"answer"}"#)
                .unwrap();
        let recognition = Recognition::from(resp);

        assert!(recognition.matched);
        assert_eq!(recognition.region, Some(Region::new(10, 20, 30, 40)));
        assert_eq!(recognition.regions.len(), 1);
        assert_eq!(recognition.text.as_deref(), Some("answer"));
    }

    #[test]
    fn test_unmatched_response_drops_boxes() {
        let resp: RunResponse =
            serde_json::from_str(r#"{"matched":false,"boxes":[[1,2,3,4]]}"#).unwrap();
        let recognition = Recognition::from(resp);

        assert!(!recognition.matched);
        assert!(recognition.region.is_none());
        assert!(recognition.regions.is_empty());
    }

    #[test]
    fn test_run_request_serialization() {
        let params = ActionParams::roi(Region::new(1, 2, 3, 4));
        let request = RunRequest {
            serial: "emulator-5554",
            node: ActionId::ExtractText.pipeline_name(),
            params: Some(&params),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["node"], "extract_text");
        assert_eq!(json["params"]["roi"]["w"], 3);
    }
}
