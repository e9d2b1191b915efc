pub mod ingest;
pub mod locks;

mod error;

pub use error::{Error, Result};

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use clinote_service::ClinoteService;
use clinote_storage::qdrant::QdrantStore;

#[derive(Debug, Parser)]
#[command(
	version = clinote_cli::VERSION,
	rename_all = "kebab",
	styles = clinote_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Record files, or directories holding `*.json` record files.
	#[arg(required = true, value_name = "PATH")]
	pub inputs: Vec<PathBuf>,
	/// Drop and recreate the index collection before ingesting.
	#[arg(long)]
	pub recreate: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = clinote_config::load(&args.config)?;

	init_tracing(&config);

	let tokenizer_repo = config
		.chunking
		.tokenizer_repo
		.clone()
		.unwrap_or_else(|| config.providers.embedding.model.clone());
	let tokenizer = clinote_chunking::load_tokenizer(&tokenizer_repo)?;
	let store = QdrantStore::new(&config.storage.qdrant)?;

	if args.recreate {
		store.drop_collection().await?;
	}

	store.ensure_collection().await?;

	let files = ingest::collect_files(&args.inputs)?;
	let concurrency = config.worker.concurrency as usize;
	let service = Arc::new(ClinoteService::new(config, Arc::new(store), Arc::new(tokenizer)));
	let summary = ingest::ingest_files(service, &files, concurrency).await?;

	println!("{}", serde_json::to_string_pretty(&summary)?);

	Ok(())
}

fn init_tracing(config: &clinote_config::Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}
