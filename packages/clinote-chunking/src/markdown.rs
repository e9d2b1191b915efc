//! Token-bounded splitting of markdown text into lines and overlapping paragraphs.
//!
//! Lines are produced by recursively halving over-budget spans at the separator nearest their
//! middle, trying progressively weaker separators. Paragraphs pack consecutive lines up to the
//! budget left after overlap, then borrow the head of the following paragraph as overlap.

use unicode_segmentation::UnicodeSegmentation;

use crate::{Error, Result, TokenCounter};

/// Separator classes from strongest to weakest. `None` cuts at the midpoint.
const MARKDOWN_SEPARATORS: [Option<&[char]>; 10] = [
	Some(&['.', '\u{3002}', '\u{FF0E}']),
	Some(&['?', '!']),
	Some(&[';']),
	Some(&[':']),
	Some(&[',', '\u{FF0C}', '\u{3001}']),
	Some(&[')', ']', '}']),
	Some(&[' ']),
	Some(&['-']),
	Some(&['\n', '\r']),
	None,
];

/// Splits markdown into trimmed lines of at most `max_tokens` tokens where a cut is possible.
pub fn split_markdown_lines(
	text: &str,
	max_tokens: usize,
	counter: &dyn TokenCounter,
) -> Vec<String> {
	split_lines(text, max_tokens, true, counter)
}

/// Packs lines into paragraphs of at most `max_tokens - overlap_tokens` tokens and appends the
/// first `overlap_tokens` worth of the next paragraph to every paragraph but the last.
pub fn split_markdown_paragraphs(
	lines: &[String],
	max_tokens: usize,
	overlap_tokens: usize,
	counter: &dyn TokenCounter,
) -> Result<Vec<String>> {
	if max_tokens == 0 {
		return Err(Error::InvalidConfig {
			message: "Max tokens must be greater than zero.".to_string(),
		});
	}
	if overlap_tokens >= max_tokens {
		return Err(Error::InvalidConfig {
			message: "Overlap tokens must be less than max tokens.".to_string(),
		});
	}
	if lines.is_empty() {
		return Ok(Vec::new());
	}

	let adjusted = max_tokens - overlap_tokens;
	let truncated = lines
		.iter()
		.flat_map(|line| split_lines(line, adjusted, false, counter))
		.collect::<Vec<_>>();
	let mut paragraphs = build_paragraphs(&truncated, adjusted, counter);

	balance_tail(&mut paragraphs, adjusted, counter);

	Ok(attach_overlap(&paragraphs, overlap_tokens, counter))
}

fn normalize_line_endings(text: &str) -> String {
	text.replace("\r\n", "\n").replace('\r', "\n")
}

fn split_lines(text: &str, max_tokens: usize, trim: bool, counter: &dyn TokenCounter) -> Vec<String> {
	let mut pieces = vec![normalize_line_endings(text)];

	for separators in MARKDOWN_SEPARATORS {
		let mut next = Vec::with_capacity(pieces.len());
		let mut was_split = false;

		for piece in &pieces {
			was_split |= split_span(piece, max_tokens, separators, trim, counter, &mut next);
		}

		pieces = next;

		if !was_split {
			break;
		}
	}

	pieces
}

/// Returns whether any emitted piece is still over budget, which asks the caller to retry with
/// the next separator class.
fn split_span(
	input: &str,
	max_tokens: usize,
	separators: Option<&[char]>,
	trim: bool,
	counter: &dyn TokenCounter,
	out: &mut Vec<String>,
) -> bool {
	if counter.count(input) <= max_tokens {
		push_piece(out, input, trim);

		return false;
	}

	let Some(cut) = cut_point(input, separators) else {
		push_piece(out, input, trim);

		return true;
	};
	let (first, second) = input.split_at(cut);
	let (first, second) = if trim { (first.trim(), second.trim()) } else { (first, second) };
	let first_split = split_span(first, max_tokens, separators, trim, counter, out);
	let second_split = split_span(second, max_tokens, separators, trim, counter, out);

	first_split || second_split
}

fn push_piece(out: &mut Vec<String>, piece: &str, trim: bool) {
	out.push(if trim { piece.trim() } else { piece }.to_string());
}

/// Byte offset just past the separator closest to the middle of `input`.
fn cut_point(input: &str, separators: Option<&[char]>) -> Option<usize> {
	let chars = input.char_indices().collect::<Vec<_>>();
	let half = chars.len() / 2;
	let Some(separators) = separators else {
		return midpoint_boundary(input, chars.get(half).map(|(offset, _)| *offset)?);
	};

	if chars.len() <= 2 {
		return None;
	}

	let half = half as i64;
	let mut cut = -1_i64;

	// The final character never counts as a separator.
	for (index, (_, ch)) in chars[..chars.len() - 1].iter().enumerate() {
		let candidate = index as i64 + 1;

		if separators.contains(ch) && (half - candidate).abs() < (half - cut).abs() {
			cut = candidate;
		}
	}

	(cut > 0).then(|| chars[cut as usize].0)
}

/// Nearest grapheme boundary at or before `target`, or the first one after it when that would
/// be the start of the text.
fn midpoint_boundary(input: &str, target: usize) -> Option<usize> {
	let mut best = None;

	for offset in input.grapheme_indices(true).map(|(offset, _)| offset).skip(1) {
		if offset > target {
			return Some(best.unwrap_or(offset));
		}

		best = Some(offset);
	}

	best
}

fn build_paragraphs(lines: &[String], max_tokens: usize, counter: &dyn TokenCounter) -> Vec<String> {
	let mut paragraphs = Vec::new();
	let mut current = String::new();

	for line in lines {
		if !current.is_empty() {
			let mut count = counter.count(line) + 1;

			if count < max_tokens {
				count += counter.count(&current);
			}
			if count >= max_tokens {
				paragraphs.push(current.trim().to_string());
				current.clear();
			}
		}

		current.push_str(line);
		current.push('\n');
	}

	if !current.is_empty() {
		paragraphs.push(current.trim().to_string());
	}

	paragraphs
}

/// Folds a short final paragraph into its predecessor when their combined word count fits.
fn balance_tail(paragraphs: &mut Vec<String>, max_tokens: usize, counter: &dyn TokenCounter) {
	let [.., second_last, last] = paragraphs.as_slice() else {
		return;
	};

	if counter.count(last) >= max_tokens / 4 {
		return;
	}

	let last_words = last.split(' ').filter(|word| !word.is_empty()).collect::<Vec<_>>();
	let second_words = second_last.split(' ').filter(|word| !word.is_empty()).collect::<Vec<_>>();

	if last_words.len() + second_words.len() > max_tokens {
		return;
	}

	let merged = format!("{} {}", second_words.join(" "), last_words.join(" "));

	paragraphs.pop();

	if let Some(slot) = paragraphs.last_mut() {
		*slot = merged;
	}
}

fn attach_overlap(
	paragraphs: &[String],
	overlap_tokens: usize,
	counter: &dyn TokenCounter,
) -> Vec<String> {
	paragraphs
		.iter()
		.enumerate()
		.map(|(index, paragraph)| {
			if overlap_tokens > 0
				&& let Some(next) = paragraphs.get(index + 1)
				&& let Some(head) = split_lines(next, overlap_tokens, false, counter).into_iter().next()
			{
				format!("{paragraph} {head}")
			} else {
				paragraph.clone()
			}
		})
		.collect()
}
