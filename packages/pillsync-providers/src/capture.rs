use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use uuid::Uuid;

use crate::{Error, Result};

/// A photo handed over by the capture collaborator. The URL is an opaque
/// reference owned by that collaborator; the bytes feed the OCR call.
#[derive(Clone, Debug)]
pub struct CapturedPhoto {
	pub photo_url: String,
	pub bytes: Vec<u8>,
}

/// Asks the capture collaborator for the photo belonging to one reminder
/// occurrence, then fetches the image bytes it points at. The call blocks
/// until the collaborator has a photo or the configured timeout elapses;
/// the pipeline treats a timeout as a missed capture.
pub async fn request(cfg: &pillsync_config::ProviderConfig, reminder_id: Uuid) -> Result<CapturedPhoto> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({ "reminder_id": reminder_id });
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let photo_url = parse_capture_response(json)?;
	let bytes = client.get(&photo_url).send().await?.error_for_status()?.bytes().await?.to_vec();

	Ok(CapturedPhoto { photo_url, bytes })
}

fn parse_capture_response(json: Value) -> Result<String> {
	let photo_url = json
		.get("photo_url")
		.or_else(|| json.get("photoUrl"))
		.and_then(|v| v.as_str())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Capture response is missing photo_url.".to_string(),
		})?;

	if photo_url.trim().is_empty() {
		return Err(Error::InvalidResponse {
			message: "Capture response photo_url is empty.".to_string(),
		});
	}

	Ok(photo_url.to_string())
}
