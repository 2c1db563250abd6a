use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub scheduler: Scheduler,
	pub pipeline: Pipeline,
	pub matching: Matching,
	pub medcard: MedCard,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub archive: Archive,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

/// Secondary record backend. An append-only JSONL file that absorbs writes
/// whenever Postgres is unreachable.
#[derive(Debug, Deserialize)]
pub struct Archive {
	pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub capture: ProviderConfig,
	pub ocr: ProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Scheduler {
	#[serde(default = "default_tick_interval_secs")]
	pub tick_interval_secs: u64,
	#[serde(default = "default_max_lookback_hours")]
	pub max_lookback_hours: i64,
}

#[derive(Debug, Deserialize)]
pub struct Pipeline {
	#[serde(default = "default_capture_timeout_secs")]
	pub capture_timeout_secs: u64,
	#[serde(default = "default_save_max_attempts")]
	pub save_max_attempts: u32,
	#[serde(default = "default_save_base_backoff_ms")]
	pub save_base_backoff_ms: i64,
	#[serde(default = "default_save_timeout_ms")]
	pub save_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Matching {
	#[serde(default = "default_match_threshold")]
	pub threshold: f32,
}

#[derive(Debug, Deserialize)]
pub struct MedCard {
	#[serde(default = "default_medcard_ttl_minutes")]
	pub default_ttl_minutes: i64,
}

fn default_tick_interval_secs() -> u64 {
	60
}

fn default_max_lookback_hours() -> i64 {
	24
}

fn default_capture_timeout_secs() -> u64 {
	600
}

fn default_save_max_attempts() -> u32 {
	3
}

fn default_save_base_backoff_ms() -> i64 {
	500
}

fn default_save_timeout_ms() -> u64 {
	5_000
}

fn default_match_threshold() -> f32 {
	0.75
}

fn default_medcard_ttl_minutes() -> i64 {
	60
}
