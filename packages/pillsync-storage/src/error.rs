#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Storage unavailable: {0}")]
	Unavailable(String),
}
impl Error {
	/// Whether a retry with backoff could plausibly succeed.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Sqlx(_) | Self::Io(_) | Self::Unavailable(_))
	}
}
