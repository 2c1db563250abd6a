use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// Extracts label text from a captured photo. The OCR service is failure
/// prone; malformed payloads are retried a few times before giving up. The
/// caller decides what an error means (the pipeline degrades to empty text).
pub async fn extract_text(cfg: &pillsync_config::ProviderConfig, photo: &[u8]) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);

	for _ in 0..3 {
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
			.body(photo.to_vec())
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;
		if let Ok(text) = parse_ocr_response(json) {
			return Ok(text);
		}
	}

	Err(Error::InvalidResponse { message: "OCR response is missing extracted text.".to_string() })
}

fn parse_ocr_response(json: Value) -> Result<String> {
	if let Some(text) = json.get("text").and_then(|v| v.as_str()) {
		return Ok(clean_text(text));
	}

	// Some OCR gateways wrap the output in a chat-completion envelope.
	if let Some(content) = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
	{
		return Ok(clean_text(content));
	}

	Err(Error::InvalidResponse { message: "OCR response is missing extracted text.".to_string() })
}

/// Collapses runs of whitespace; OCR output is full of stray line breaks.
fn clean_text(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ")
}
