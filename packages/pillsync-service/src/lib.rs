pub mod identity;
pub mod medcard;
pub mod pipeline;
pub mod sos;

mod error;

pub use error::{Error, Result};
pub use identity::{CaregiverDirectory, Identity, TokenVerifier};
pub use medcard::{GenerateMedCard, MedCardLookup};
pub use pipeline::{TaskOutcome, run_task};
pub use sos::SosRequest;

use std::{
	collections::HashSet,
	future::Future,
	pin::Pin,
	sync::{Arc, Mutex},
};

use uuid::Uuid;

use pillsync_config::{Config, ProviderConfig};
use pillsync_providers::{
	capture::{self, CapturedPhoto},
	ocr,
};
use pillsync_storage::record_store::RecordStore;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait CaptureProvider
where
	Self: Send + Sync,
{
	fn request<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		reminder_id: Uuid,
	) -> BoxFuture<'a, pillsync_providers::Result<CapturedPhoto>>;
}

pub trait OcrProvider
where
	Self: Send + Sync,
{
	fn extract_text<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		photo: &'a [u8],
	) -> BoxFuture<'a, pillsync_providers::Result<String>>;
}

#[derive(Clone)]
pub struct Providers {
	pub capture: Arc<dyn CaptureProvider>,
	pub ocr: Arc<dyn OcrProvider>,
}

struct DefaultProviders;

impl CaptureProvider for DefaultProviders {
	fn request<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		reminder_id: Uuid,
	) -> BoxFuture<'a, pillsync_providers::Result<CapturedPhoto>> {
		Box::pin(capture::request(cfg, reminder_id))
	}
}

impl OcrProvider for DefaultProviders {
	fn extract_text<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		photo: &'a [u8],
	) -> BoxFuture<'a, pillsync_providers::Result<String>> {
		Box::pin(ocr::extract_text(cfg, photo))
	}
}

impl Providers {
	pub fn new(capture: Arc<dyn CaptureProvider>, ocr: Arc<dyn OcrProvider>) -> Self {
		Self { capture, ocr }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);
		Self { capture: provider.clone(), ocr: provider }
	}
}

/// The pipeline coordinator. Holds the verification policy and the write path;
/// peripheral operations (med cards, SOS) take the database handle directly.
pub struct AdherenceService {
	pub cfg: Config,
	pub store: RecordStore,
	pub providers: Providers,
	pub(crate) in_flight: Mutex<HashSet<Uuid>>,
}
impl AdherenceService {
	pub fn new(cfg: Config, store: RecordStore) -> Self {
		Self { cfg, store, providers: Providers::default(), in_flight: Mutex::new(HashSet::new()) }
	}

	pub fn with_providers(cfg: Config, store: RecordStore, providers: Providers) -> Self {
		Self { cfg, store, providers, in_flight: Mutex::new(HashSet::new()) }
	}
}
