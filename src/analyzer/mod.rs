//! Token-level parser combinators and the rule grammar built on them.
//!
//! [`core`] defines the [`Parser`] trait and [`ParseError`], [`combinators`] the generic
//! building blocks and [`prelude`] their constructor functions. The grammar itself lives in
//! [`parsers`].

pub mod combinators;
pub mod core;
pub mod parsers;
pub mod prelude;

pub use core::ParseError;
pub use core::ParseResult;
pub use core::Parser;
