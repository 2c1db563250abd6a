pub mod worker;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pillsync_service::AdherenceService;
use pillsync_storage::{
	archive::ArchiveBackend,
	db::Db,
	record_store::{PgBackend, RecordStore},
};

#[derive(Debug, Parser)]
#[command(rename_all = "kebab")]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = pillsync_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());
	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;
	db.ensure_schema().await?;

	let archive = ArchiveBackend::open(config.storage.archive.path.as_str())?;
	let store = RecordStore::with_timeout(
		Box::new(PgBackend::new(&db)),
		Box::new(archive),
		std::time::Duration::from_millis(config.pipeline.save_timeout_ms),
	);
	let service = AdherenceService::new(config, store);

	worker::run_worker(service, db).await
}
