use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, Time};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
	Match,
	Mismatch,
}
impl MatchStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Match => "match",
			Self::Mismatch => "mismatch",
		}
	}
}

/// One due occurrence of a scheduled medicine. Ephemeral; the durable log is
/// the verification record written at the end of the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct VerificationTask {
	pub reminder_id: Uuid,
	pub user_id: String,
	pub medicine_name: String,
	pub scheduled_time: Time,
	pub due_at: OffsetDateTime,
}

/// The immutable outcome of one reminder occurrence. `reminder_id` is the
/// natural key; backends deduplicate on it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct VerificationRecord {
	pub reminder_id: Uuid,
	pub user_id: String,
	pub medicine_name: String,
	pub photo_url: Option<String>,
	pub ocr_text: String,
	pub match_status: MatchStatus,
	pub confidence: f32,
	pub scheduled_time: Time,
	#[serde(with = "time::serde::rfc3339")]
	pub evaluated_at: OffsetDateTime,
}
