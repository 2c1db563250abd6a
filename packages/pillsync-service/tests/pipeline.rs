use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};

use time::{OffsetDateTime, macros::time};
use uuid::Uuid;

use pillsync_config::{Config, ProviderConfig};
use pillsync_domain::{MatchStatus, VerificationRecord, VerificationTask, reminder_id_for};
use pillsync_providers::capture::CapturedPhoto;
use pillsync_service::{
	AdherenceService, BoxFuture, CaptureProvider, Error, OcrProvider, Providers, TaskOutcome,
	run_task,
};
use pillsync_storage::record_store::{BackendRole, RecordBackend, RecordStore};
use pillsync_testkit::{FlakyBackend, MemoryBackend};

struct StubCapture {
	calls: AtomicUsize,
	fail: bool,
	delay_ms: u64,
}
impl StubCapture {
	fn ok() -> Arc<Self> {
		Arc::new(Self { calls: AtomicUsize::new(0), fail: false, delay_ms: 0 })
	}

	fn failing() -> Arc<Self> {
		Arc::new(Self { calls: AtomicUsize::new(0), fail: true, delay_ms: 0 })
	}

	fn slow(delay_ms: u64) -> Arc<Self> {
		Arc::new(Self { calls: AtomicUsize::new(0), fail: false, delay_ms })
	}
}
impl CaptureProvider for StubCapture {
	fn request<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		reminder_id: Uuid,
	) -> BoxFuture<'a, pillsync_providers::Result<CapturedPhoto>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if self.delay_ms > 0 {
				tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
			}
			if self.fail {
				return Err(pillsync_providers::Error::InvalidResponse {
					message: "No photo arrived.".to_string(),
				});
			}

			Ok(CapturedPhoto {
				photo_url: format!("https://photos.test/{reminder_id}.jpg"),
				bytes: vec![0xff, 0xd8],
			})
		})
	}
}

struct StubOcr {
	text: Option<&'static str>,
}
impl OcrProvider for StubOcr {
	fn extract_text<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_photo: &'a [u8],
	) -> BoxFuture<'a, pillsync_providers::Result<String>> {
		Box::pin(async move {
			match self.text {
				Some(text) => Ok(text.to_string()),
				None => Err(pillsync_providers::Error::InvalidResponse {
					message: "OCR response is missing extracted text.".to_string(),
				}),
			}
		})
	}
}

struct StalledBackend;
impl RecordBackend for StalledBackend {
	fn label(&self) -> &'static str {
		"stalled"
	}

	fn save<'a>(
		&'a self,
		_record: &'a VerificationRecord,
	) -> BoxFuture<'a, pillsync_storage::Result<bool>> {
		Box::pin(std::future::pending())
	}
}

fn test_config() -> Config {
	toml::from_str(
		r#"
[service]
log_level = "info"

[storage.postgres]
dsn = "postgres://unused/unused"
pool_max_conns = 1

[storage.archive]
path = "/tmp/unused.jsonl"

[providers.capture]
api_base = "http://127.0.0.1:1"
api_key = "key"
path = "/capture"
timeout_ms = 1000
default_headers = {}

[providers.ocr]
api_base = "http://127.0.0.1:1"
api_key = "key"
path = "/ocr"
timeout_ms = 1000
default_headers = {}

[scheduler]

[pipeline]
capture_timeout_secs = 600
save_max_attempts = 3
save_base_backoff_ms = 10

[matching]

[medcard]
"#,
	)
	.expect("test config failed to parse")
}

fn service_with(
	primary: Box<dyn RecordBackend>,
	secondary: Box<dyn RecordBackend>,
	capture: Arc<dyn CaptureProvider>,
	ocr: Arc<dyn OcrProvider>,
) -> AdherenceService {
	AdherenceService::with_providers(
		test_config(),
		RecordStore::new(primary, secondary),
		Providers::new(capture, ocr),
	)
}

fn task_due(offset: time::Duration) -> VerificationTask {
	let due_at = OffsetDateTime::now_utc() + offset;

	VerificationTask {
		reminder_id: reminder_id_for("alex", "Metformin", due_at),
		user_id: "alex".to_string(),
		medicine_name: "Metformin".to_string(),
		scheduled_time: time!(09:00),
		due_at,
	}
}

#[tokio::test]
async fn matching_label_text_is_recorded_as_a_match() {
	let primary = Arc::new(MemoryBackend::new("primary"));
	let service = service_with(
		Box::new(primary.clone()),
		Box::new(MemoryBackend::new("secondary")),
		StubCapture::ok(),
		Arc::new(StubOcr { text: Some("METFORMIN HYDROCHLORIDE 500 mg tablets") }),
	);
	let task = task_due(time::Duration::ZERO);
	let outcome = run_task(&service, &task).await.expect("run failed");

	let TaskOutcome::Recorded { record, store, missed } = outcome else {
		panic!("expected a recorded outcome");
	};

	assert!(!missed);
	assert!(store.stored);
	assert_eq!(store.backend, BackendRole::Primary);
	assert_eq!(record.match_status, MatchStatus::Match);
	assert!(record.confidence >= 0.75);
	assert!(record.photo_url.is_some());
	assert_eq!(primary.len(), 1);
}

#[tokio::test]
async fn closed_capture_window_records_a_missed_dose_without_calling_capture() {
	let primary = Arc::new(MemoryBackend::new("primary"));
	let capture = StubCapture::ok();
	let service = service_with(
		Box::new(primary.clone()),
		Box::new(MemoryBackend::new("secondary")),
		capture.clone(),
		Arc::new(StubOcr { text: Some("unused") }),
	);
	// Due 20 minutes ago with a 10 minute capture window.
	let task = task_due(time::Duration::minutes(-20));
	let outcome = run_task(&service, &task).await.expect("run failed");

	let TaskOutcome::Recorded { record, store, missed } = outcome else {
		panic!("expected a recorded outcome");
	};

	assert!(missed);
	assert!(store.stored);
	assert_eq!(capture.calls.load(Ordering::SeqCst), 0);
	assert_eq!(record.photo_url, None);
	assert_eq!(record.ocr_text, "");
	assert_eq!(record.match_status, MatchStatus::Mismatch);
	assert_eq!(record.confidence, 0.0);
	assert_eq!(primary.len(), 1);
}

#[tokio::test]
async fn capture_failure_records_a_missed_dose() {
	let primary = Arc::new(MemoryBackend::new("primary"));
	let capture = StubCapture::failing();
	let service = service_with(
		Box::new(primary.clone()),
		Box::new(MemoryBackend::new("secondary")),
		capture.clone(),
		Arc::new(StubOcr { text: Some("unused") }),
	);
	let task = task_due(time::Duration::ZERO);
	let outcome = run_task(&service, &task).await.expect("run failed");

	let TaskOutcome::Recorded { record, missed, .. } = outcome else {
		panic!("expected a recorded outcome");
	};

	assert!(missed);
	assert_eq!(capture.calls.load(Ordering::SeqCst), 1);
	assert_eq!(record.match_status, MatchStatus::Mismatch);
	assert_eq!(primary.len(), 1);
}

#[tokio::test]
async fn ocr_failure_degrades_to_empty_text_but_keeps_the_photo() {
	let primary = Arc::new(MemoryBackend::new("primary"));
	let service = service_with(
		Box::new(primary.clone()),
		Box::new(MemoryBackend::new("secondary")),
		StubCapture::ok(),
		Arc::new(StubOcr { text: None }),
	);
	let task = task_due(time::Duration::ZERO);
	let outcome = run_task(&service, &task).await.expect("run failed");

	let TaskOutcome::Recorded { record, missed, .. } = outcome else {
		panic!("expected a recorded outcome");
	};

	assert!(!missed);
	assert!(record.photo_url.is_some());
	assert_eq!(record.ocr_text, "");
	assert_eq!(record.match_status, MatchStatus::Mismatch);
	assert_eq!(record.confidence, 0.0);
}

#[tokio::test]
async fn store_failing_twice_then_succeeding_persists_exactly_once() {
	let primary = Arc::new(FlakyBackend::new("primary", 2));
	let service = service_with(
		Box::new(primary.clone()),
		Box::new(FlakyBackend::always_failing("secondary")),
		StubCapture::ok(),
		Arc::new(StubOcr { text: Some("Metformin") }),
	);
	let task = task_due(time::Duration::ZERO);
	let outcome = run_task(&service, &task).await.expect("run failed");

	let TaskOutcome::Recorded { store, .. } = outcome else {
		panic!("expected a recorded outcome");
	};

	assert!(store.stored);
	assert_eq!(store.backend, BackendRole::Primary);
	assert_eq!(primary.attempts(), 3);
	assert_eq!(primary.inner().len(), 1);
}

#[tokio::test]
async fn exhausted_store_reports_persistence_exhausted() {
	let primary = Arc::new(FlakyBackend::always_failing("primary"));
	let service = service_with(
		Box::new(primary.clone()),
		Box::new(FlakyBackend::always_failing("secondary")),
		StubCapture::ok(),
		Arc::new(StubOcr { text: Some("Metformin") }),
	);
	let task = task_due(time::Duration::ZERO);
	let err = run_task(&service, &task).await.expect_err("run should fail");

	assert!(matches!(err, Error::PersistenceExhausted { attempts: 3, .. }));
	assert_eq!(primary.attempts(), 3);
}

#[tokio::test]
async fn hung_store_writes_time_out_and_exhaust_retries() {
	let store = RecordStore::with_timeout(
		Box::new(StalledBackend),
		Box::new(StalledBackend),
		std::time::Duration::from_millis(50),
	);
	let service = AdherenceService::with_providers(
		test_config(),
		store,
		Providers::new(StubCapture::ok(), Arc::new(StubOcr { text: Some("Metformin") })),
	);
	let task = task_due(time::Duration::ZERO);
	let err = tokio::time::timeout(std::time::Duration::from_secs(2), run_task(&service, &task))
		.await
		.expect("run did not finish")
		.expect_err("run should fail");

	assert!(matches!(err, Error::PersistenceExhausted { attempts: 3, .. }));
}

#[tokio::test]
async fn concurrent_executions_for_one_reminder_run_once() {
	let primary = Arc::new(MemoryBackend::new("primary"));
	let service = service_with(
		Box::new(primary.clone()),
		Box::new(MemoryBackend::new("secondary")),
		StubCapture::slow(100),
		Arc::new(StubOcr { text: Some("Metformin") }),
	);
	let task = task_due(time::Duration::ZERO);

	// The guard is taken before the first await point, so the first future
	// holds it by the time the second one polls.
	let (first, second) = tokio::join!(run_task(&service, &task), run_task(&service, &task));

	assert!(matches!(first.expect("first run failed"), TaskOutcome::Recorded { .. }));
	assert!(matches!(second.expect("second run failed"), TaskOutcome::InFlight));
	assert_eq!(primary.len(), 1);
}

#[tokio::test]
async fn rerunning_a_finished_task_is_a_stored_no_op() {
	let primary = Arc::new(MemoryBackend::new("primary"));
	let service = service_with(
		Box::new(primary.clone()),
		Box::new(MemoryBackend::new("secondary")),
		StubCapture::ok(),
		Arc::new(StubOcr { text: Some("Metformin") }),
	);
	let task = task_due(time::Duration::ZERO);

	let first = run_task(&service, &task).await.expect("first run failed");
	let second = run_task(&service, &task).await.expect("second run failed");

	let TaskOutcome::Recorded { store: first_store, .. } = first else {
		panic!("expected a recorded outcome");
	};
	let TaskOutcome::Recorded { store: second_store, .. } = second else {
		panic!("expected a recorded outcome");
	};

	assert!(first_store.stored);
	assert!(!second_store.stored);
	assert_eq!(primary.len(), 1);
}
