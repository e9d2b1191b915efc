use std::{
	env, fs,
	path::PathBuf,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::{SystemTime, UNIX_EPOCH},
};

use serde_json::Map;

use clinote_chunking::FnCounter;
use clinote_config::{
	Chunking, Config, EmbeddingProviderConfig, LayoutProviderConfig, Qdrant, Retrieval, Service,
	Storage, Worker,
};
use clinote_service::{
	BoxFuture, ClinoteService, EmbeddingProvider, LayoutProvider, Providers, Result,
};
use clinote_storage::memory::MemoryIndex;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

struct SentenceLayout;
impl LayoutProvider for SentenceLayout {
	fn analyze<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(text.split(". ").collect::<Vec<_>>().join(".\n")) })
	}
}

struct ConstantEmbedding;
impl EmbeddingProvider for ConstantEmbedding {
	fn embed<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(vec![0.5, 0.5, 0.5, 0.5]) })
	}
}

fn word_count(text: &str) -> usize {
	text.split_whitespace().count()
}

fn temp_dir() -> PathBuf {
	let nanos = SystemTime::now().duration_since(UNIX_EPOCH).expect("Clock before epoch.").as_nanos();
	let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
	let dir = env::temp_dir().join(format!("clinote_worker_{nanos}_{seq}"));

	fs::create_dir_all(&dir).expect("Failed to create temp dir.");

	dir
}

fn config() -> Config {
	Config {
		service: Service { log_level: "info".to_string() },
		storage: Storage {
			qdrant: Qdrant {
				url: "http://127.0.0.1:6334".to_string(),
				collection: "clinical_notes".to_string(),
				vector_dim: 4,
			},
		},
		providers: clinote_config::Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				api_key_header: None,
				path: "/v1/embeddings".to_string(),
				model: "test".to_string(),
				dimensions: 4,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			layout: LayoutProviderConfig {
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "layout-key".to_string(),
				api_key_header: None,
				path: "/layout:analyze".to_string(),
				api_version: "2024-11-30".to_string(),
				timeout_ms: 1_000,
				poll_interval_ms: 1,
				max_polls: 1,
				default_headers: Map::new(),
			},
			rerank: None,
		},
		chunking: Chunking { max_tokens: 16, overlap_percent: 0.25, tokenizer_repo: None },
		retrieval: Retrieval::default(),
		worker: Worker { concurrency: 2 },
	}
}

#[tokio::test]
async fn later_versions_of_a_record_win_and_bad_records_are_skipped() {
	let dir = temp_dir();
	let long = "Patient admitted overnight with crushing chest pain and sweating. \
		Troponin rose from the first draw to the second draw. \
		Cardiology started heparin and aspirin after the second troponin. \
		Echo showed reduced ejection fraction with anterior wall hypokinesis. \
		Discharge planning includes cardiac rehab and a lipid panel.";
	let first = serde_json::json!({ "NoteId": 42, "NoteContent": long, "Department": "Cardiology" });
	let other = serde_json::json!({ "NoteId": 7, "NoteContent": "Knee exam normal." });
	let broken = serde_json::json!({ "NoteContent": "No id." });
	let second = serde_json::json!({ "NoteId": 42, "NoteContent": "Patient discharged home." });

	fs::write(dir.join("a.json"), format!("\u{FEFF}{first}\n{other}\n{broken}"))
		.expect("Failed to write records.");
	fs::write(dir.join("b.json"), second.to_string()).expect("Failed to write records.");
	fs::write(dir.join("ignored.txt"), "not a record").expect("Failed to write file.");

	let index = Arc::new(MemoryIndex::new());
	let counter: FnCounter<fn(&str) -> usize> = FnCounter(word_count);
	let providers = Providers::new(Arc::new(SentenceLayout), Arc::new(ConstantEmbedding), None);
	let service = Arc::new(ClinoteService::with_providers(
		config(),
		index.clone(),
		Arc::new(counter),
		providers,
	));
	let files = clinote_worker::ingest::collect_files(&[dir.clone()]).expect("Failed to list files.");

	assert_eq!(files, vec![dir.join("a.json"), dir.join("b.json")]);

	let summary = clinote_worker::ingest::ingest_files(service, &files, 2)
		.await
		.expect("Ingestion failed.");

	assert_eq!(summary.files, 2);
	assert_eq!(summary.records, 4);
	assert_eq!(summary.skipped, 1);
	assert_eq!(summary.synced, 3);
	assert_eq!(summary.failed, 0);
	assert!(summary.deleted >= 3);
	assert_eq!(index.document_ids(), vec!["7-0", "42-0"]);

	let stored = index.get("42-0").expect("Record 42 must be indexed.");

	assert_eq!(stored.chunk_text, "Patient discharged home.");
	assert_eq!(stored.metadata.title.as_deref(), Some("b.json"));

	fs::remove_dir_all(&dir).expect("Failed to remove temp dir.");
}

#[test]
fn empty_input_directories_are_an_error() {
	let dir = temp_dir();
	let result = clinote_worker::ingest::collect_files(&[dir.clone()]);

	assert!(matches!(result, Err(clinote_worker::Error::NoInputs)));

	fs::remove_dir_all(&dir).expect("Failed to remove temp dir.");
}
