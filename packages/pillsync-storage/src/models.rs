use serde_json::Value;
use time::{OffsetDateTime, Time};
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct ScheduleRow {
	pub user_id: String,
	pub medicine_name: String,
	/// JSON array of `HH:MM` strings, as the schedule UI writes them.
	pub times: Value,
	pub recurrence: String,
	pub active: bool,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct VerificationRecordRow {
	pub reminder_id: Uuid,
	pub user_id: String,
	pub medicine_name: String,
	pub photo_url: Option<String>,
	pub ocr_text: String,
	pub match_status: String,
	pub confidence: f32,
	pub scheduled_time: Time,
	pub evaluated_at: OffsetDateTime,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct MedCardRow {
	pub token: String,
	pub owner_user_id: String,
	pub generated_by: String,
	pub profile: Value,
	pub medicines: Value,
	pub read_only: bool,
	pub created_at: OffsetDateTime,
	pub expires_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct SosEventRow {
	pub sos_id: Uuid,
	pub user_id: String,
	pub location: String,
	pub note: Option<String>,
	pub status: String,
	pub created_at: OffsetDateTime,
}
