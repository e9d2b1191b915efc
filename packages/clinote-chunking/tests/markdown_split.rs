use ahash::AHashMap;
use tokenizers::{
	Tokenizer, models::wordlevel::WordLevel, pre_tokenizers::whitespace::Whitespace,
};

use clinote_chunking::{
	ChunkingConfig, TokenCounter, split_markdown_lines, split_markdown_paragraphs,
};

fn test_tokenizer() -> Tokenizer {
	let mut vocab = AHashMap::new();

	vocab.insert("alpha".to_string(), 1_u32);
	vocab.insert("beta".to_string(), 2_u32);
	vocab.insert("charlie".to_string(), 3_u32);
	vocab.insert("delta".to_string(), 4_u32);
	vocab.insert("<unk>".to_string(), 0_u32);

	let model = WordLevel::builder()
		.vocab(vocab)
		.unk_token("<unk>".to_string())
		.build()
		.expect("Failed to build test tokenizer.");
	let mut tokenizer = Tokenizer::new(model);

	tokenizer.with_pre_tokenizer(Some(Whitespace));

	tokenizer
}

fn note_markdown(sentences: usize) -> String {
	let mut out = String::from("# Progress note\n\n");

	for idx in 0..sentences {
		out.push_str("alpha beta charlie delta.");
		out.push(if idx % 5 == 4 { '\n' } else { ' ' });
	}

	out
}

#[test]
fn tokenizer_counts_words_and_punctuation() {
	let tokenizer = test_tokenizer();

	assert_eq!(tokenizer.count("alpha beta."), 3);
	assert_eq!(tokenizer.count(""), 0);
}

#[test]
fn paragraphs_cover_every_word_within_budget() {
	let tokenizer = test_tokenizer();
	let cfg = ChunkingConfig::from_percent(24, 0.25).expect("valid config");
	let text = note_markdown(40);
	let lines = split_markdown_lines(&text, cfg.max_tokens as usize, &tokenizer);
	let paragraphs = split_markdown_paragraphs(
		&lines,
		cfg.max_tokens as usize,
		cfg.overlap_tokens as usize,
		&tokenizer,
	)
	.expect("split failed");

	assert!(paragraphs.len() > 1, "Expected the note to span several paragraphs.");

	for paragraph in &paragraphs[..paragraphs.len() - 1] {
		assert!(
			tokenizer.count(paragraph) <= cfg.max_tokens as usize,
			"Paragraph exceeds the token budget: {paragraph:?}"
		);
	}

	let source_words = text.split_whitespace().count();
	let mut seen = 0;

	// Without overlap the paragraphs partition the source words in order.
	let plain = split_markdown_paragraphs(&lines, cfg.max_tokens as usize, 0, &tokenizer)
		.expect("split failed");

	for paragraph in &plain {
		seen += paragraph.split_whitespace().count();
	}

	assert_eq!(seen, source_words);
	assert!(paragraphs[0].starts_with("# Progress note"));
	assert!(paragraphs.last().is_some_and(|last| last.ends_with("delta.")));
}

#[test]
fn overlap_repeats_the_head_of_the_next_paragraph() {
	let tokenizer = test_tokenizer();
	let text = note_markdown(20);
	let lines = split_markdown_lines(&text, 20, &tokenizer);
	let paragraphs = split_markdown_paragraphs(&lines, 20, 5, &tokenizer).expect("split failed");
	let plain = split_markdown_paragraphs(&lines, 20, 0, &tokenizer).expect("split failed");

	assert!(paragraphs.len() > 1);

	// Every sentence is five tokens, so the overlap is exactly the next paragraph's first sentence.
	for window in paragraphs.windows(2) {
		let end = window[1].find('.').expect("paragraph holds a sentence") + 1;
		let head = &window[1][..end];

		assert!(
			window[0].ends_with(&format!(" {head}")),
			"Missing overlap {head:?} at the end of {:?}.",
			window[0]
		);
	}

	let overlapped_words = paragraphs.iter().map(|p| p.split_whitespace().count()).sum::<usize>();
	let plain_words = plain.iter().map(|p| p.split_whitespace().count()).sum::<usize>();

	assert!(overlapped_words > plain_words);
}
