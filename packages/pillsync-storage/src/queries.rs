use serde_json::Value;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::{
	Error, Result,
	models::{MedCardRow, ScheduleRow, SosEventRow, VerificationRecordRow},
};
use pillsync_domain::{MedicationSchedule, Recurrence, schedule};

/// Loads every active schedule. Rows the schedule UI left malformed are
/// skipped with a warning rather than failing the whole tick.
pub async fn list_active_schedules(pool: &PgPool) -> Result<Vec<MedicationSchedule>> {
	let rows: Vec<ScheduleRow> = sqlx::query_as(
		"\
SELECT user_id, medicine_name, times, recurrence, active, updated_at
FROM medication_schedules
WHERE active = TRUE
ORDER BY user_id, medicine_name",
	)
	.fetch_all(pool)
	.await?;

	let mut schedules = Vec::with_capacity(rows.len());

	for row in rows {
		match schedule_from_row(&row) {
			Ok(parsed) => schedules.push(parsed),
			Err(err) => {
				tracing::warn!(
					user_id = row.user_id.as_str(),
					medicine_name = row.medicine_name.as_str(),
					error = %err,
					"Skipping malformed medication schedule."
				);
			},
		}
	}

	Ok(schedules)
}

pub fn schedule_from_row(row: &ScheduleRow) -> Result<MedicationSchedule> {
	let recurrence = match row.recurrence.as_str() {
		"daily" => Recurrence::Daily,
		other => {
			return Err(Error::InvalidArgument(format!("Unknown recurrence {other:?}.")));
		},
	};
	let raw_times = row
		.times
		.as_array()
		.ok_or_else(|| Error::InvalidArgument("Schedule times must be a JSON array.".to_string()))?;
	let mut times = Vec::with_capacity(raw_times.len());

	for raw in raw_times {
		let Some(text) = raw.as_str() else {
			return Err(Error::InvalidArgument("Schedule times must be strings.".to_string()));
		};

		let parsed = schedule::parse_time_of_day(text)
			.map_err(|_| Error::InvalidArgument(format!("Invalid time of day {text:?}.")))?;

		times.push(parsed);
	}

	let parsed = MedicationSchedule {
		user_id: row.user_id.clone(),
		medicine_name: row.medicine_name.clone(),
		times,
		recurrence,
		active: row.active,
	};

	parsed
		.validate()
		.map_err(|err| Error::InvalidArgument(format!("Invalid schedule: {err}")))?;

	Ok(parsed)
}

pub async fn upsert_schedule(pool: &PgPool, schedule: &MedicationSchedule) -> Result<()> {
	schedule
		.validate()
		.map_err(|err| Error::InvalidArgument(format!("Invalid schedule: {err}")))?;

	let times = Value::Array(
		schedule
			.times
			.iter()
			.map(|t| Value::String(format!("{:02}:{:02}", t.hour(), t.minute())))
			.collect(),
	);
	let recurrence = match schedule.recurrence {
		Recurrence::Daily => "daily",
	};

	sqlx::query(
		"\
INSERT INTO medication_schedules (user_id, medicine_name, times, recurrence, active, updated_at)
VALUES ($1, $2, $3, $4, $5, now())
ON CONFLICT (user_id, medicine_name) DO UPDATE
SET
	times = EXCLUDED.times,
	recurrence = EXCLUDED.recurrence,
	active = EXCLUDED.active,
	updated_at = now()",
	)
	.bind(schedule.user_id.as_str())
	.bind(schedule.medicine_name.as_str())
	.bind(times)
	.bind(recurrence)
	.bind(schedule.active)
	.execute(pool)
	.await?;

	Ok(())
}

/// Adherence history for dashboards; newest first. Reads only the primary
/// backend, the archive is reconciled offline.
pub async fn list_user_records(
	pool: &PgPool,
	user_id: &str,
	limit: i64,
) -> Result<Vec<VerificationRecordRow>> {
	let rows = sqlx::query_as(
		"\
SELECT reminder_id, user_id, medicine_name, photo_url, ocr_text, match_status, confidence,
	scheduled_time, evaluated_at, created_at
FROM verification_records
WHERE user_id = $1
ORDER BY evaluated_at DESC
LIMIT $2",
	)
	.bind(user_id)
	.bind(limit)
	.fetch_all(pool)
	.await?;

	Ok(rows)
}

pub async fn insert_med_card(pool: &PgPool, card: &MedCardRow) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO med_cards (token, owner_user_id, generated_by, profile, medicines, read_only, created_at, expires_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
	)
	.bind(card.token.as_str())
	.bind(card.owner_user_id.as_str())
	.bind(card.generated_by.as_str())
	.bind(&card.profile)
	.bind(&card.medicines)
	.bind(card.read_only)
	.bind(card.created_at)
	.bind(card.expires_at)
	.execute(pool)
	.await?;

	Ok(())
}

pub async fn fetch_med_card(pool: &PgPool, token: &str) -> Result<Option<MedCardRow>> {
	let row = sqlx::query_as(
		"\
SELECT token, owner_user_id, generated_by, profile, medicines, read_only, created_at, expires_at
FROM med_cards
WHERE token = $1",
	)
	.bind(token)
	.fetch_optional(pool)
	.await?;

	Ok(row)
}

pub async fn purge_expired_med_cards(pool: &PgPool, now: OffsetDateTime) -> Result<u64> {
	let result =
		sqlx::query("DELETE FROM med_cards WHERE expires_at <= $1").bind(now).execute(pool).await?;

	Ok(result.rows_affected())
}

pub async fn insert_sos_event(pool: &PgPool, event: &SosEventRow) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO sos_events (sos_id, user_id, location, note, status, created_at)
VALUES ($1, $2, $3, $4, $5, $6)",
	)
	.bind(event.sos_id)
	.bind(event.user_id.as_str())
	.bind(event.location.as_str())
	.bind(event.note.as_deref())
	.bind(event.status.as_str())
	.bind(event.created_at)
	.execute(pool)
	.await?;

	Ok(())
}
