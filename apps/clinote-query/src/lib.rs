use std::{io::Write, path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use color_eyre::eyre;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use clinote_domain::{MinimalSearchResult, SupportingContentRecord};
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
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Best chunks for a query, with full content.
	TopK {
		query: String,
		/// Defaults to `retrieval.top_k`.
		#[arg(long, short = 'k')]
		k: Option<u32>,
	},
	/// Every chunk scoring above a threshold, without chunk text.
	Threshold {
		query: String,
		#[arg(long, short = 't')]
		threshold: f32,
		/// Also fetch the full content of the best N results.
		#[arg(long, value_name = "N")]
		select: Option<usize>,
	},
	/// Full content for document ids such as `42-0`.
	Fetch {
		#[arg(required = true)]
		document_ids: Vec<String>,
	},
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Output {
	Supporting(Vec<SupportingContentRecord>),
	Threshold {
		results: Vec<MinimalSearchResult>,
		#[serde(skip_serializing_if = "Option::is_none")]
		selected: Option<Vec<SupportingContentRecord>>,
	},
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
	let service = ClinoteService::new(config, Arc::new(store), Arc::new(tokenizer));
	let output = execute(&service, args.command).await?;
	let mut stdout = std::io::stdout().lock();

	serde_json::to_writer_pretty(&mut stdout, &output)?;
	writeln!(stdout)?;

	Ok(())
}

pub async fn execute(service: &ClinoteService, command: Command) -> color_eyre::Result<Output> {
	let output = match command {
		Command::TopK { query, k } => {
			let k = k.unwrap_or(service.cfg.retrieval.top_k);

			Output::Supporting(service.query_top_k(&query, k).await?)
		},
		Command::Threshold { query, threshold, select } => {
			if !threshold.is_finite() {
				return Err(eyre::eyre!("threshold must be a finite number."));
			}

			let results = service.query_all_above_threshold(&query, threshold).await?;
			let selected = match select {
				Some(n) => {
					let ids = clinote_service::select_top(&results, n);

					Some(service.retrieve_full(&ids).await?)
				},
				None => None,
			};

			Output::Threshold { results, selected }
		},
		Command::Fetch { document_ids } =>
			Output::Supporting(service.retrieve_full(&document_ids).await?),
	};

	Ok(output)
}

fn init_tracing(config: &clinote_config::Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	// Results go to stdout, so logs stay on stderr.
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_threshold_with_selection() {
		let args = Args::try_parse_from([
			"clinote-query",
			"-c",
			"clinote.toml",
			"threshold",
			"heart failure",
			"--threshold",
			"0.02",
			"--select",
			"3",
		])
		.expect("Arguments must parse.");

		match args.command {
			Command::Threshold { query, threshold, select } => {
				assert_eq!(query, "heart failure");
				assert!((threshold - 0.02).abs() < f32::EPSILON);
				assert_eq!(select, Some(3));
			},
			other => panic!("unexpected command {other:?}"),
		}
	}

	#[test]
	fn fetch_requires_ids() {
		assert!(Args::try_parse_from(["clinote-query", "-c", "c.toml", "fetch"]).is_err());
	}

	#[test]
	fn threshold_output_omits_missing_selection() {
		let output = Output::Threshold { results: Vec::new(), selected: None };
		let json = serde_json::to_value(&output).expect("Output must serialize.");

		assert_eq!(json, serde_json::json!({ "threshold": { "results": [] } }));
	}
}
