use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	pillsync_worker::run(pillsync_worker::Args::parse()).await
}
