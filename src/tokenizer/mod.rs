//! # Tokenizer Component
//!
//! Lexical analysis of rule source text. The tokenizer turns raw text into a stream of
//! [`TokenSpan`](token::TokenSpan)s, each carrying the byte range and the 1-based line and
//! column where it starts, so that the parser can report syntax errors precisely.
//!
//! Whitespace, newlines and comments are kept as tokens here and dropped later by the
//! [`preprocessor`](crate::preprocessor).
//!
//! ## Component Structure
//!
//! * [`token`]: token types and the [`Tokenizer`](token::Tokenizer) driver
//! * [`keyword`]: the uppercase, case-sensitive keyword set
//! * [`symbol`]: operators and delimiters
//! * [`literal`]: number and string literals (with escapes)
//! * [`whitespace`]: whitespace and newlines
//! * [`comment`]: `//` and `/* */` comments
//!
//! ## Usage Example
//!
//! ```rust
//! use finrule::tokenizer::token::Tokenizer;
//!
//! let mut tokenizer = Tokenizer::new();
//! let tokens = tokenizer.tokenize("SET total = 1 + 2;").unwrap();
//! assert_eq!(tokens[0].line, 1);
//! ```

pub mod comment;
pub mod keyword;
pub mod literal;
pub mod symbol;
pub mod token;
pub mod whitespace;
