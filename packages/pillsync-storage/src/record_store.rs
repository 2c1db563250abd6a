use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use sqlx::PgPool;

use crate::{Error, Result, db::Db};
use pillsync_domain::VerificationRecord;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const DEFAULT_SAVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Which of the two configured backends absorbed a write.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BackendRole {
	Primary,
	Secondary,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StoreOutcome {
	pub backend: BackendRole,
	/// `false` means a record with this `reminder_id` already existed in the
	/// target backend and the write was a no-op.
	pub stored: bool,
}

/// A durable sink for verification records. Implementations must deduplicate
/// on `reminder_id`: saving the same key twice stores one record and reports
/// the second call as not stored.
pub trait RecordBackend
where
	Self: Send + Sync,
{
	fn label(&self) -> &'static str;

	fn save<'a>(&'a self, record: &'a VerificationRecord) -> BoxFuture<'a, Result<bool>>;
}

// Lets tests hand a clone to the store and keep one to assert on.
impl<B> RecordBackend for Arc<B>
where
	B: RecordBackend,
{
	fn label(&self) -> &'static str {
		(**self).label()
	}

	fn save<'a>(&'a self, record: &'a VerificationRecord) -> BoxFuture<'a, Result<bool>> {
		(**self).save(record)
	}
}

/// Write-only record store over a preferred backend and an automatic
/// fallback. Failed writes are never buffered; the caller owns retries.
pub struct RecordStore {
	primary: Box<dyn RecordBackend>,
	secondary: Box<dyn RecordBackend>,
	save_timeout: Duration,
}
impl RecordStore {
	pub fn new(primary: Box<dyn RecordBackend>, secondary: Box<dyn RecordBackend>) -> Self {
		Self::with_timeout(primary, secondary, DEFAULT_SAVE_TIMEOUT)
	}

	pub fn with_timeout(
		primary: Box<dyn RecordBackend>,
		secondary: Box<dyn RecordBackend>,
		save_timeout: Duration,
	) -> Self {
		Self { primary, secondary, save_timeout }
	}

	/// Attempts the primary backend first and falls back to the secondary on
	/// any primary failure. Each backend write is bounded by `save_timeout`.
	/// A record that lands in both backends over its lifetime is fine; readers
	/// reconcile the two logs by `reminder_id`.
	pub async fn save(&self, record: &VerificationRecord) -> Result<StoreOutcome> {
		let primary_err = match self.attempt(&*self.primary, record).await {
			Ok(stored) => return Ok(StoreOutcome { backend: BackendRole::Primary, stored }),
			Err(err) => err,
		};

		tracing::warn!(
			backend = self.primary.label(),
			reminder_id = %record.reminder_id,
			error = %primary_err,
			"Primary record backend failed. Falling back to secondary."
		);

		match self.attempt(&*self.secondary, record).await {
			Ok(stored) => Ok(StoreOutcome { backend: BackendRole::Secondary, stored }),
			Err(secondary_err) => Err(Error::Unavailable(format!(
				"primary ({}): {primary_err}; secondary ({}): {secondary_err}",
				self.primary.label(),
				self.secondary.label(),
			))),
		}
	}

	/// A backend that hangs past `save_timeout` is treated like an unreachable
	/// one, so the fallback and the caller's retries engage instead of the
	/// task pinning on a dead connection.
	async fn attempt(
		&self,
		backend: &dyn RecordBackend,
		record: &VerificationRecord,
	) -> Result<bool> {
		match tokio::time::timeout(self.save_timeout, backend.save(record)).await {
			Ok(result) => result,
			Err(_) => Err(Error::Unavailable(format!(
				"{} write timed out after {}ms",
				backend.label(),
				self.save_timeout.as_millis(),
			))),
		}
	}
}

/// Postgres-backed record sink; the preferred backend in production.
pub struct PgBackend {
	pool: PgPool,
}
impl PgBackend {
	pub fn new(db: &Db) -> Self {
		Self { pool: db.pool.clone() }
	}
}
impl RecordBackend for PgBackend {
	fn label(&self) -> &'static str {
		"postgres"
	}

	fn save<'a>(&'a self, record: &'a VerificationRecord) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let result = sqlx::query(
				"\
INSERT INTO verification_records (
	reminder_id,
	user_id,
	medicine_name,
	photo_url,
	ocr_text,
	match_status,
	confidence,
	scheduled_time,
	evaluated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
ON CONFLICT (reminder_id) DO NOTHING",
			)
			.bind(record.reminder_id)
			.bind(record.user_id.as_str())
			.bind(record.medicine_name.as_str())
			.bind(record.photo_url.as_deref())
			.bind(record.ocr_text.as_str())
			.bind(record.match_status.as_str())
			.bind(record.confidence)
			.bind(record.scheduled_time)
			.bind(record.evaluated_at)
			.execute(&self.pool)
			.await?;

			Ok(result.rows_affected() == 1)
		})
	}
}
