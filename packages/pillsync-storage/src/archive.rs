use std::{
	collections::HashSet,
	fs::{self, OpenOptions},
	io::Write,
	path::PathBuf,
	sync::Mutex,
};

use uuid::Uuid;

use crate::{
	Error, Result,
	record_store::{BoxFuture, RecordBackend},
};
use pillsync_domain::VerificationRecord;

/// Append-only JSONL record sink. Serves as the secondary backend: always
/// local, so it stays writable while Postgres is unreachable. Idempotence is
/// enforced with a seen-set loaded from the file at open time.
pub struct ArchiveBackend {
	path: PathBuf,
	seen: Mutex<HashSet<Uuid>>,
}
impl ArchiveBackend {
	pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
		let path = path.into();

		if let Some(parent) = path.parent()
			&& !parent.as_os_str().is_empty()
		{
			fs::create_dir_all(parent)?;
		}

		let mut seen = HashSet::new();

		if path.exists() {
			let raw = fs::read_to_string(&path)?;

			for line in raw.lines() {
				let trimmed = line.trim();

				if trimmed.is_empty() {
					continue;
				}

				match serde_json::from_str::<VerificationRecord>(trimmed) {
					Ok(record) => {
						seen.insert(record.reminder_id);
					},
					Err(err) => {
						// A torn write from a crash mid-append. The line is
						// unrecoverable; later saves of the same key append a
						// fresh, complete copy.
						tracing::warn!(path = %path.display(), error = %err, "Skipping unreadable archive line.");
					},
				}
			}
		}

		Ok(Self { path, seen: Mutex::new(seen) })
	}
}
impl RecordBackend for ArchiveBackend {
	fn label(&self) -> &'static str {
		"archive"
	}

	fn save<'a>(&'a self, record: &'a VerificationRecord) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let line = serde_json::to_string(record)?;

			// Reserve the key before the write so a concurrent save of the
			// same record is a no-op while this one holds the append.
			if !self
				.seen
				.lock()
				.unwrap_or_else(|err| err.into_inner())
				.insert(record.reminder_id)
			{
				return Ok(false);
			}

			let path = self.path.clone();
			let appended = tokio::task::spawn_blocking(move || -> Result<()> {
				let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

				writeln!(file, "{line}")?;
				file.sync_data()?;

				Ok(())
			})
			.await
			.map_err(|err| Error::Unavailable(format!("Archive write task failed: {err}.")));

			match appended {
				Ok(Ok(())) => Ok(true),
				Ok(Err(err)) | Err(err) => {
					self.seen
						.lock()
						.unwrap_or_else(|err| err.into_inner())
						.remove(&record.reminder_id);

					Err(err)
				},
			}
		})
	}
}
