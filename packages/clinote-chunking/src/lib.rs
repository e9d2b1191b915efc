pub mod markdown;

mod error;

pub use error::{Error, Result};
pub use markdown::{split_markdown_lines, split_markdown_paragraphs};
pub use tokenizers::Tokenizer;

/// Counts model tokens in a piece of text.
pub trait TokenCounter
where
	Self: Send + Sync,
{
	fn count(&self, text: &str) -> usize;
}
impl TokenCounter for Tokenizer {
	fn count(&self, text: &str) -> usize {
		match self.encode(text, false) {
			Ok(encoding) => encoding.len(),
			Err(err) => {
				tracing::error!(error = %err, "Tokenizer failed to encode text.");

				0
			},
		}
	}
}

/// Adapts a plain function into a [`TokenCounter`].
pub struct FnCounter<F>(pub F);
impl<F> TokenCounter for FnCounter<F>
where
	F: Fn(&str) -> usize + Send + Sync,
{
	fn count(&self, text: &str) -> usize {
		(self.0)(text)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkingConfig {
	pub max_tokens: u32,
	pub overlap_tokens: u32,
}
impl ChunkingConfig {
	/// Builds a config whose overlap is `overlap_percent` of `max_tokens`, rounded half away from
	/// zero.
	pub fn from_percent(max_tokens: u32, overlap_percent: f32) -> Result<Self> {
		if !overlap_percent.is_finite() || !(0.0..1.0).contains(&overlap_percent) {
			return Err(Error::InvalidConfig {
				message: "Overlap percent must be in the range 0.0 (inclusive) to 1.0 (exclusive)."
					.to_string(),
			});
		}

		let cfg = Self {
			max_tokens,
			overlap_tokens: (overlap_percent * max_tokens as f32).round() as u32,
		};

		cfg.validate()?;

		Ok(cfg)
	}

	pub fn validate(&self) -> Result<()> {
		if self.max_tokens == 0 {
			return Err(Error::InvalidConfig {
				message: "Max tokens must be greater than zero.".to_string(),
			});
		}
		if self.overlap_tokens >= self.max_tokens {
			return Err(Error::InvalidConfig {
				message: "Overlap tokens must be less than max tokens.".to_string(),
			});
		}

		Ok(())
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
	/// Zero-based emission order.
	pub order: u32,
	pub text: String,
}

pub fn load_tokenizer(repo: &str) -> Result<Tokenizer> {
	Tokenizer::from_pretrained(repo, None)
		.map_err(|err| Error::LoadTokenizer { repo: repo.to_string(), message: err.to_string() })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn overlap_percent_rounds_to_tokens() {
		let cfg = ChunkingConfig::from_percent(512, 0.25).expect("valid config");

		assert_eq!(cfg, ChunkingConfig { max_tokens: 512, overlap_tokens: 128 });

		let cfg = ChunkingConfig::from_percent(10, 0.25).expect("valid config");

		assert_eq!(cfg.overlap_tokens, 3);
	}

	#[test]
	fn rejects_overlap_that_swallows_the_chunk() {
		assert!(ChunkingConfig::from_percent(0, 0.25).is_err());
		assert!(ChunkingConfig::from_percent(512, 1.0).is_err());
		assert!(ChunkingConfig { max_tokens: 1, overlap_tokens: 1 }.validate().is_err());
	}

	#[test]
	fn fn_counter_delegates() {
		let counter = FnCounter(|text: &str| text.split_whitespace().count());

		assert_eq!(counter.count("one two  three"), 3);
	}
}
