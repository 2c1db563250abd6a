use std::{
	collections::HashMap,
	sync::{
		Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use uuid::Uuid;

use pillsync_domain::VerificationRecord;
use pillsync_storage::{
	Error as StorageError,
	record_store::{BoxFuture, RecordBackend},
};

/// In-memory record backend with the same idempotence contract as the real
/// ones. Keyed by `reminder_id`.
#[derive(Default)]
pub struct MemoryBackend {
	label: &'static str,
	records: Mutex<HashMap<Uuid, VerificationRecord>>,
}
impl MemoryBackend {
	pub fn new(label: &'static str) -> Self {
		Self { label, records: Mutex::new(HashMap::new()) }
	}

	pub fn records(&self) -> Vec<VerificationRecord> {
		self.records.lock().unwrap_or_else(|err| err.into_inner()).values().cloned().collect()
	}

	pub fn record(&self, reminder_id: Uuid) -> Option<VerificationRecord> {
		self.records.lock().unwrap_or_else(|err| err.into_inner()).get(&reminder_id).cloned()
	}

	pub fn len(&self) -> usize {
		self.records.lock().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
impl RecordBackend for MemoryBackend {
	fn label(&self) -> &'static str {
		if self.label.is_empty() { "memory" } else { self.label }
	}

	fn save<'a>(
		&'a self,
		record: &'a VerificationRecord,
	) -> BoxFuture<'a, pillsync_storage::Result<bool>> {
		Box::pin(async move {
			let mut records = self.records.lock().unwrap_or_else(|err| err.into_inner());

			if records.contains_key(&record.reminder_id) {
				return Ok(false);
			}

			records.insert(record.reminder_id, record.clone());

			Ok(true)
		})
	}
}

/// Fails the first `failures` saves with a retryable error, then behaves like
/// `MemoryBackend`. `failures` of `usize::MAX` means always failing.
pub struct FlakyBackend {
	inner: MemoryBackend,
	failures: usize,
	attempts: AtomicUsize,
}
impl FlakyBackend {
	pub fn new(label: &'static str, failures: usize) -> Self {
		Self { inner: MemoryBackend::new(label), failures, attempts: AtomicUsize::new(0) }
	}

	pub fn always_failing(label: &'static str) -> Self {
		Self::new(label, usize::MAX)
	}

	pub fn attempts(&self) -> usize {
		self.attempts.load(Ordering::SeqCst)
	}

	pub fn inner(&self) -> &MemoryBackend {
		&self.inner
	}
}
impl RecordBackend for FlakyBackend {
	fn label(&self) -> &'static str {
		self.inner.label()
	}

	fn save<'a>(
		&'a self,
		record: &'a VerificationRecord,
	) -> BoxFuture<'a, pillsync_storage::Result<bool>> {
		Box::pin(async move {
			let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);

			if attempt < self.failures {
				return Err(StorageError::Unavailable(format!(
					"Injected failure on attempt {}.",
					attempt + 1
				)));
			}

			self.inner.save(record).await
		})
	}
}
