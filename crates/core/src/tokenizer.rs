//! Tokenizer contract.
//!
//! The BPE algorithm itself is not implemented here; budgeting only needs the
//! two-way mapping between text and token sequences.

/// A single token id.
pub type Token = u32;

/// Deterministic text ⇄ token mapping.
///
/// `decode(encode(s)) == s` must hold for whole sequences. Decoding a prefix
/// may be lossy at a multi-byte boundary.
pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Vec<Token>;

    fn decode(&self, tokens: &[Token]) -> String;

    /// Number of tokens `text` encodes to.
    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}
