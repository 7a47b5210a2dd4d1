//! Text normalization applied before encoding
//!
//! Steps run in a fixed order: unicode NFD → strip URLs → strip e-mails →
//! strip @mentions → strip #hashtags → lowercase → collapse whitespace →
//! trim. Each step is toggled by [`PreprocessingConfig`].

use crate::config::PreprocessingConfig;
use polyhead_core::{Error, Result};
use regex::Regex;
use tokenizers::NormalizedString;

/// Trait for deterministic text normalization
pub trait TextPreprocessor: Send + Sync {
    /// Preprocess a single text
    fn preprocess(&self, text: &str) -> String;

    /// Preprocess a batch, preserving order
    fn preprocess_batch(&self, texts: &[String]) -> Vec<String> {
        texts.iter().map(|t| self.preprocess(t)).collect()
    }
}

/// Preprocessor that returns text unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpPreprocessor;

impl TextPreprocessor for NoOpPreprocessor {
    fn preprocess(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Regex-based preprocessor covering the common cleanup steps
#[derive(Debug, Clone)]
pub struct BasicTextPreprocessor {
    config: PreprocessingConfig,
    url_regex: Regex,
    email_regex: Regex,
    mention_regex: Regex,
    hashtag_regex: Regex,
    whitespace_regex: Regex,
}

impl BasicTextPreprocessor {
    /// Create a preprocessor with the given flags
    pub fn new(config: PreprocessingConfig) -> Result<Self> {
        Ok(Self {
            config,
            url_regex: compile(
                "URL",
                r"https?://[\w.-]+(?:\.[\w.-]+)+[\w\-._~:/?#\[\]@!$&'()*+,;=]*",
            )?,
            email_regex: compile("email", r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")?,
            mention_regex: compile("mention", r"@\w+")?,
            hashtag_regex: compile("hashtag", r"#\w+")?,
            whitespace_regex: compile("whitespace", r"\s+")?,
        })
    }

    /// Lowercase, unicode-normalize, collapse whitespace and trim
    pub fn standard() -> Result<Self> {
        Self::new(PreprocessingConfig::standard())
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }
}

fn compile(what: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| Error::config(format!("Failed to compile {} regex: {}", what, e)))
}

impl TextPreprocessor for BasicTextPreprocessor {
    fn preprocess(&self, text: &str) -> String {
        let mut processed = if self.config.unicode_normalization {
            let mut normalized = NormalizedString::from(text);
            normalized.nfd();
            normalized.get().to_string()
        } else {
            text.to_string()
        };

        let strip_steps = [
            (self.config.remove_urls, &self.url_regex),
            (self.config.remove_emails, &self.email_regex),
            (self.config.remove_mentions, &self.mention_regex),
            (self.config.remove_hashtags, &self.hashtag_regex),
        ];
        for (enabled, regex) in strip_steps {
            if enabled {
                processed = regex.replace_all(&processed, " ").into_owned();
            }
        }

        if self.config.lowercase {
            processed = processed.to_lowercase();
        }

        if self.config.normalize_whitespace {
            processed = self.whitespace_regex.replace_all(&processed, " ").into_owned();
        }

        if self.config.trim {
            processed = processed.trim().to_string();
        }

        processed
    }
}
