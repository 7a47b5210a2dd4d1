//! Fixed-length token id encoding for token-mode heads

use polyhead_core::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

/// Vocabulary entry holding the unknown-token id
pub const UNK_TOKEN: &str = "[UNK]";

/// Vocabulary entry holding the padding id
pub const PAD_TOKEN: &str = "[PAD]";

/// Trait for encoding normalized text as a fixed-length id sequence
pub trait Tokenizer: Send + Sync {
    /// Encode `text` as exactly `max_len` ids, padding or truncating the tail
    fn tokenize(&self, text: &str, max_len: usize) -> Result<Vec<i64>>;

    /// Encode a batch, preserving order
    fn tokenize_batch(&self, texts: &[String], max_len: usize) -> Result<Vec<Vec<i64>>> {
        texts.iter().map(|t| self.tokenize(t, max_len)).collect()
    }
}

/// Whitespace tokenizer backed by a vocabulary table
#[derive(Debug, Clone)]
pub struct WhitespaceTokenizer {
    vocabulary: HashMap<String, i64>,
    unknown_id: i64,
    pad_id: i64,
}

impl WhitespaceTokenizer {
    pub fn new(vocabulary: HashMap<String, i64>, unknown_id: i64, pad_id: i64) -> Self {
        Self {
            vocabulary,
            unknown_id,
            pad_id,
        }
    }

    /// Build from a vocabulary carrying `[UNK]` and `[PAD]` entries.
    /// Missing reserved entries default to id 0.
    pub fn from_vocabulary(vocabulary: HashMap<String, i64>) -> Self {
        let unknown_id = vocabulary.get(UNK_TOKEN).copied().unwrap_or(0);
        let pad_id = vocabulary.get(PAD_TOKEN).copied().unwrap_or(0);
        Self::new(vocabulary, unknown_id, pad_id)
    }

    pub fn unknown_id(&self) -> i64 {
        self.unknown_id
    }

    pub fn pad_id(&self) -> i64 {
        self.pad_id
    }

    pub fn vocab_size(&self) -> usize {
        self.vocabulary.len()
    }
}

impl Tokenizer for WhitespaceTokenizer {
    /// Splits on runs of whitespace and drops empty pieces, so an empty or
    /// all-whitespace text encodes to `max_len` pad ids with no unknown id.
    fn tokenize(&self, text: &str, max_len: usize) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = text
            .split_whitespace()
            .take(max_len)
            .map(|word| self.vocabulary.get(word).copied().unwrap_or(self.unknown_id))
            .collect();

        ids.resize(max_len, self.pad_id);
        Ok(ids)
    }
}

/// Adapter over a HuggingFace tokenizer with the fixed-length contract
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
    pad_id: i64,
    add_special_tokens: bool,
}

impl HfTokenizer {
    /// Wrap an already-built tokenizer
    pub fn new(inner: tokenizers::Tokenizer, pad_id: i64) -> Self {
        Self {
            inner,
            pad_id,
            add_special_tokens: true,
        }
    }

    /// Load a `tokenizer.json` file
    pub fn from_file(path: impl AsRef<Path>, pad_id: i64) -> Result<Self> {
        let path = path.as_ref();
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            Error::config(format!(
                "Failed to load tokenizer from {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::new(inner, pad_id))
    }

    /// Toggle `[CLS]`/`[SEP]`-style special tokens
    pub fn with_special_tokens(mut self, add: bool) -> Self {
        self.add_special_tokens = add;
        self
    }
}

impl Tokenizer for HfTokenizer {
    fn tokenize(&self, text: &str, max_len: usize) -> Result<Vec<i64>> {
        let encoding = self
            .inner
            .encode(text, self.add_special_tokens)
            .map_err(|e| Error::validation(format!("Tokenization failed: {}", e)))?;

        let mut ids: Vec<i64> = encoding
            .get_ids()
            .iter()
            .take(max_len)
            .map(|&id| i64::from(id))
            .collect();

        ids.resize(max_len, self.pad_id);
        Ok(ids)
    }
}
