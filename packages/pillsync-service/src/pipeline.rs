use std::{collections::HashSet, sync::Mutex, time::Duration};

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{AdherenceService, Error, Result};
use pillsync_domain::{MatchPolicy, VerificationRecord, VerificationTask, matching};
use pillsync_providers::capture::CapturedPhoto;
use pillsync_storage::record_store::StoreOutcome;

#[derive(Debug)]
pub enum TaskOutcome {
	/// A record was evaluated and persisted. `missed` is set when no photo
	/// arrived before the capture deadline.
	Recorded { record: VerificationRecord, store: StoreOutcome, missed: bool },
	/// Another execution for the same `reminder_id` is still running. Nothing
	/// was captured, evaluated, or written.
	InFlight,
}

/// Runs one verification task end to end: capture, OCR, match, persist.
///
/// Every path that gets past the in-flight guard ends in a persisted record;
/// a missed capture or failed OCR degrades the inputs instead of aborting.
/// Persistence retries are the only retries here. Capture and OCR failures
/// are final for the occurrence, the record says what happened.
pub async fn run_task(service: &AdherenceService, task: &VerificationTask) -> Result<TaskOutcome> {
	let Some(_guard) = InFlightGuard::try_acquire(&service.in_flight, task.reminder_id) else {
		tracing::debug!(reminder_id = %task.reminder_id, "Task already in flight. Skipping.");

		return Ok(TaskOutcome::InFlight);
	};

	let captured = capture_with_deadline(service, task).await;
	let (photo_url, ocr_text) = match &captured {
		Some(photo) => (Some(photo.photo_url.clone()), extract_text(service, task, photo).await),
		None => (None, String::new()),
	};
	let policy = MatchPolicy::from_config(&service.cfg.matching);
	let result = matching::evaluate(&task.medicine_name, &ocr_text, &policy)?;
	let record = VerificationRecord {
		reminder_id: task.reminder_id,
		user_id: task.user_id.clone(),
		medicine_name: task.medicine_name.clone(),
		photo_url,
		ocr_text,
		match_status: result.status,
		confidence: result.confidence,
		scheduled_time: task.scheduled_time,
		evaluated_at: OffsetDateTime::now_utc(),
	};
	let store = save_with_backoff(service, &record).await?;

	tracing::info!(
		reminder_id = %task.reminder_id,
		status = record.match_status.as_str(),
		confidence = record.confidence,
		stored = store.stored,
		"Verification recorded."
	);

	Ok(TaskOutcome::Recorded { record, store, missed: captured.is_none() })
}

/// Waits for the capture collaborator until `capture_timeout` past the task's
/// due time. A window that has already closed is a missed dose outright.
async fn capture_with_deadline(
	service: &AdherenceService,
	task: &VerificationTask,
) -> Option<CapturedPhoto> {
	let deadline =
		task.due_at + time::Duration::seconds(service.cfg.pipeline.capture_timeout_secs as i64);
	let Ok(remaining) = Duration::try_from(deadline - OffsetDateTime::now_utc()) else {
		tracing::info!(reminder_id = %task.reminder_id, "Capture window already closed.");

		return None;
	};
	let request = service.providers.capture.request(&service.cfg.providers.capture, task.reminder_id);

	match tokio::time::timeout(remaining, request).await {
		Ok(Ok(photo)) => Some(photo),
		Ok(Err(err)) => {
			tracing::warn!(
				reminder_id = %task.reminder_id,
				error = %err,
				"Capture failed. Recording a missed dose."
			);

			None
		},
		Err(_) => {
			tracing::info!(reminder_id = %task.reminder_id, "Capture timed out. Recording a missed dose.");

			None
		},
	}
}

/// OCR failure is not fatal; an empty text evaluates to a mismatch, which is
/// exactly what the adherence log should say about an unreadable photo.
async fn extract_text(
	service: &AdherenceService,
	task: &VerificationTask,
	photo: &CapturedPhoto,
) -> String {
	match service.providers.ocr.extract_text(&service.cfg.providers.ocr, &photo.bytes).await {
		Ok(text) => text,
		Err(err) => {
			tracing::warn!(
				reminder_id = %task.reminder_id,
				error = %err,
				"OCR failed. Recording empty text."
			);

			String::new()
		},
	}
}

async fn save_with_backoff(
	service: &AdherenceService,
	record: &VerificationRecord,
) -> Result<StoreOutcome> {
	let max_attempts = service.cfg.pipeline.save_max_attempts;
	let mut backoff = Duration::from_millis(service.cfg.pipeline.save_base_backoff_ms.max(1) as u64);
	let mut last_error = String::new();

	for attempt in 1..=max_attempts {
		match service.store.save(record).await {
			Ok(outcome) => return Ok(outcome),
			Err(err) if err.is_retryable() => {
				tracing::warn!(
					reminder_id = %record.reminder_id,
					attempt,
					error = %err,
					"Record save failed."
				);

				last_error = err.to_string();

				if attempt < max_attempts {
					tokio::time::sleep(backoff).await;

					backoff = backoff.saturating_mul(2);
				}
			},
			Err(err) => return Err(Error::from(err)),
		}
	}

	Err(Error::PersistenceExhausted { attempts: max_attempts, message: last_error })
}

/// Marks one `reminder_id` as running; released on drop, including on the
/// error paths out of `run_task`.
struct InFlightGuard<'a> {
	tasks: &'a Mutex<HashSet<Uuid>>,
	reminder_id: Uuid,
}
impl<'a> InFlightGuard<'a> {
	fn try_acquire(tasks: &'a Mutex<HashSet<Uuid>>, reminder_id: Uuid) -> Option<Self> {
		let mut held = tasks.lock().unwrap_or_else(|err| err.into_inner());

		if !held.insert(reminder_id) {
			return None;
		}

		Some(Self { tasks, reminder_id })
	}
}
impl Drop for InFlightGuard<'_> {
	fn drop(&mut self) {
		self.tasks.lock().unwrap_or_else(|err| err.into_inner()).remove(&self.reminder_id);
	}
}
