pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Configuration error: {message}")]
	Configuration { message: String },
	#[error("Transient failure: {message}")]
	Transient { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Record not persisted after {attempts} attempts: {message}")]
	PersistenceExhausted { attempts: u32, message: String },
}

impl From<pillsync_storage::Error> for Error {
	fn from(err: pillsync_storage::Error) -> Self {
		if err.is_retryable() {
			Self::Transient { message: err.to_string() }
		} else {
			Self::Storage { message: err.to_string() }
		}
	}
}

impl From<pillsync_providers::Error> for Error {
	fn from(err: pillsync_providers::Error) -> Self {
		match err {
			pillsync_providers::Error::InvalidConfig { .. }
			| pillsync_providers::Error::InvalidHeaderName(_)
			| pillsync_providers::Error::InvalidHeaderValue(_) => {
				Self::Configuration { message: err.to_string() }
			},
			_ => Self::Transient { message: err.to_string() },
		}
	}
}

impl From<pillsync_domain::MatchError> for Error {
	fn from(err: pillsync_domain::MatchError) -> Self {
		Self::Configuration { message: err.to_string() }
	}
}
