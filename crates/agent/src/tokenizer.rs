//! BPE tokenizer backed by `tiktoken-rs`.

use memochat_core::error::{Error, Result};
use memochat_core::tokenizer::{Token, Tokenizer};
use tiktoken_rs::CoreBPE;
use tracing::debug;

/// How many trailing tokens a truncated decode may give up to land on a
/// valid UTF-8 boundary.
const MAX_DECODE_BACKOFF: usize = 3;

/// The production tokenizer: OpenAI's BPE encodings.
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    /// The encoding used by the GPT-4o family.
    pub fn o200k() -> Result<Self> {
        let bpe = tiktoken_rs::o200k_base().map_err(|e| Error::Config {
            message: format!("Failed to load o200k_base tokenizer: {e}"),
        })?;
        Ok(Self { bpe })
    }

    /// The encoding matching `model`, falling back to o200k_base for
    /// model names tiktoken does not know.
    pub fn for_model(model: &str) -> Result<Self> {
        match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => Ok(Self { bpe }),
            Err(e) => {
                debug!(model, error = %e, "No tokenizer registered for model, using o200k_base");
                Self::o200k()
            }
        }
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn encode(&self, text: &str) -> Vec<Token> {
        self.bpe.encode_with_special_tokens(text)
    }

    fn decode(&self, tokens: &[Token]) -> String {
        // A prefix may end in the middle of a multi-byte character.
        let keep_min = tokens.len().saturating_sub(MAX_DECODE_BACKOFF);
        for end in (keep_min..=tokens.len()).rev() {
            if let Ok(text) = self.bpe.decode(tokens[..end].to_vec()) {
                return text;
            }
        }
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ascii_and_unicode() {
        let tokenizer = TiktokenTokenizer::o200k().unwrap();
        for text in ["Hello, world!", "Привет, мир", "日本語のテキスト 🦀"] {
            let tokens = tokenizer.encode(text);
            assert!(!tokens.is_empty());
            assert_eq!(tokenizer.decode(&tokens), text);
        }
    }

    #[test]
    fn count_matches_encode_length() {
        let tokenizer = TiktokenTokenizer::o200k().unwrap();
        let text = "The quick brown fox jumps over the lazy dog.";
        assert_eq!(tokenizer.count(text), tokenizer.encode(text).len());
        assert_eq!(tokenizer.count(""), 0);
    }

    #[test]
    fn prefix_decode_is_a_prefix_of_the_text() {
        let tokenizer = TiktokenTokenizer::o200k().unwrap();
        let text = "Rust makes systems programming safe and productive.";
        let tokens = tokenizer.encode(text);
        let partial = tokenizer.decode(&tokens[..3]);
        assert!(!partial.is_empty());
        assert!(text.starts_with(&partial));
    }

    #[test]
    fn unknown_model_falls_back() {
        let tokenizer = TiktokenTokenizer::for_model("some-local-model").unwrap();
        assert_eq!(tokenizer.decode(&tokenizer.encode("abc")), "abc");
    }
}
