//! # Preprocessor
//!
//! Sits between the tokenizer and the parser:
//!
//! ```text
//! Source → Tokenizer → TokenPreprocessor → Parser → AST
//!    └──→ StringPreprocessor → parse cache key
//! ```
//!
//! * [`TokenPreprocessor`] drops comments, whitespace and newlines from the token stream.
//! * [`StringPreprocessor`] normalizes source text so that layout-only differences share one
//!   cache entry. Strings cannot span lines, so every rewrite it makes happens outside string
//!   literals and never changes the meaning of the program.

use crate::tokenizer::token::TokenSpan;

/// A trait for preprocessing different types of input
pub trait Preprocessor<T, U = T> {
    fn process(&self, input: T) -> U;
}

#[derive(Debug, Default, Clone)]
pub struct TokenPreprocessor {}

impl TokenPreprocessor {
    pub fn new() -> Self {
        Self {}
    }
}

impl Preprocessor<Vec<TokenSpan>> for TokenPreprocessor {
    fn process(&self, input: Vec<TokenSpan>) -> Vec<TokenSpan> {
        input
            .into_iter()
            .filter(|span| !span.token.is_trivia())
            .collect()
    }
}

#[derive(Debug, Default, Clone)]
pub struct StringPreprocessor {}

impl StringPreprocessor {
    pub fn new() -> Self {
        Self {}
    }
}

impl Preprocessor<&str, String> for StringPreprocessor {
    /// Unifies line endings, trims trailing blanks, drops empty lines and trims the ends.
    fn process(&self, input: &str) -> String {
        input
            .lines()
            .map(|line| line.trim_end())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}
