use std::{
    collections::{hash_map::DefaultHasher, HashSet},
    hash::{Hash, Hasher},
    sync::Arc,
};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    analyzer::{parsers::program::parse_program_complete, ParseError},
    ast::Program,
    config::ParserConfig,
    error::{ErrorKind, SyntaxError},
    eval::report::Diagnostic,
    preprocessor::{Preprocessor, StringPreprocessor, TokenPreprocessor},
    tokenizer::{
        keyword::Keyword,
        symbol::{Delimiter, Operator},
        token::{Token, TokenSpan, Tokenizer, TokenizerError},
    },
};

/// Parses rule source into shared, immutable programs and caches them by the hash of the
/// normalized source text. Safe to share across threads; lookups never block each other.
#[derive(Debug, Clone, Default)]
pub struct AstRegistry {
    asts: Arc<DashMap<u64, (String, Arc<Program>)>>,
    config: ParserConfig,
}

/// Outcome of [`AstRegistry::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl AstRegistry {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            asts: Arc::new(DashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Returns the cached program for `source`, parsing it on first use.
    #[tracing::instrument(level = "debug", skip(self, source), fields(len = source.len()))]
    pub fn parse(&self, source: &str) -> Result<Arc<Program>, SyntaxError> {
        let normalized = StringPreprocessor::default().process(source);
        let key = cache_key(&normalized);

        if let Some(entry) = self.asts.get(&key) {
            let (cached_source, program) = entry.value();
            if *cached_source == normalized {
                debug!("parse cache hit");
                return Ok(program.clone());
            }
        }

        let program = Arc::new(self.parse_uncached(source)?);
        self.asts.insert(key, (normalized, program.clone()));
        Ok(program)
    }

    /// Parses `source` without touching the cache.
    pub fn parse_uncached(&self, source: &str) -> Result<Program, SyntaxError> {
        let spans = Tokenizer::new()
            .tokenize(source)
            .map_err(tokenizer_error)?;
        let spans = TokenPreprocessor::default().process(spans);
        check_nesting(&spans, &self.config)?;

        let tokens: Vec<Token> = spans.iter().map(|span| span.token.clone()).collect();
        parse_program_complete(&tokens).map_err(|e| {
            let error = syntax_error(&e, &spans);
            warn!("{}", error);
            error
        })
    }

    pub fn clear_cache(&self) {
        self.asts.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.asts.len()
    }

    /// Checks `source` without keeping its tree. Duplicate rule names are reported as warnings;
    /// the last definition wins at run time.
    pub fn validate(&self, source: &str) -> Validation {
        match self.parse_uncached(source) {
            Ok(program) => {
                let mut seen = HashSet::new();
                let diagnostics = program
                    .functions()
                    .filter(|def| !seen.insert(def.name.as_str()))
                    .map(|def| {
                        Diagnostic::warning(format!(
                            "RULE '{}' is defined more than once; the last definition wins",
                            def.name
                        ))
                    })
                    .collect();
                Validation {
                    valid: true,
                    diagnostics,
                }
            }
            Err(e) => Validation {
                valid: false,
                diagnostics: vec![Diagnostic::error(ErrorKind::SyntaxError, e.message.clone())
                    .at(e.line, e.column)],
            },
        }
    }
}

fn cache_key(normalized: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    normalized.hash(&mut hasher);
    hasher.finish()
}

fn tokenizer_error(e: TokenizerError) -> SyntaxError {
    let span = e.span();
    SyntaxError::new(e.message(), span.line, span.column)
}

/// Maps a token-level parse error back to the source position of the offending token. Errors
/// at the end of input point just past the last token.
fn syntax_error(e: &ParseError, spans: &[TokenSpan]) -> SyntaxError {
    let position = e.position();
    let (line, column) = match (spans.get(position), spans.last()) {
        (Some(span), _) => (span.line, span.column),
        (None, Some(last)) => (last.line, last.column + (last.end - last.start)),
        (None, None) => (1, 1),
    };
    let context = e.innermost_context().unwrap_or("statement");
    let message = match e.root() {
        ParseError::Unexpected {
            expected, found, ..
        } => format!("expected {}, found {}", expected, found),
        ParseError::UnexpectedEof { .. } => {
            format!("unexpected end of input while parsing {}", context)
        }
        ParseError::NoAlternative { .. } => match spans.get(position) {
            Some(span) => format!("expected {}, found '{}'", context, span.token),
            None => format!("unexpected end of input while parsing {}", context),
        },
        ParseError::Fail { message, .. } => message.clone(),
        // root() never returns a context wrapper
        ParseError::WithContext { message, .. } => message.clone(),
    };
    SyntaxError::new(message, line, column)
}

/// Rejects token streams whose expressions would nest deeper than `max_nesting_depth`, or
/// chain more than `max_expression_length` operators in one statement, before the
/// recursive-descent parser sees them. Nesting counts open brackets, runs of prefix
/// operators and pending conditionals. Binary operators fold into left-leaning chains, so
/// they count toward the length instead.
fn check_nesting(spans: &[TokenSpan], config: &ParserConfig) -> Result<(), SyntaxError> {
    let limit = config.max_nesting_depth;
    // pending `?` per open bracket group, outermost first
    let mut groups: Vec<usize> = vec![0];
    let mut prefix_run = 0;
    let mut after_operand = false;
    let mut length = 0;

    for span in spans {
        if after_operand && is_chain_link(&span.token) {
            length += 1;
            if length > config.max_expression_length {
                return Err(SyntaxError::new(
                    format!(
                        "expression length exceeds the limit of {} operators",
                        config.max_expression_length
                    ),
                    span.line,
                    span.column,
                ));
            }
        }
        match &span.token {
            Token::Delimiter(Delimiter::OpenParen | Delimiter::OpenBracket) => {
                groups.push(0);
                prefix_run = 0;
                after_operand = false;
            }
            Token::Delimiter(Delimiter::CloseParen | Delimiter::CloseBracket) => {
                if groups.len() > 1 {
                    groups.pop();
                }
                prefix_run = 0;
                after_operand = true;
            }
            Token::Delimiter(Delimiter::Semicolon)
            | Token::Keyword(
                Keyword::Rule
                | Keyword::EndRule
                | Keyword::Return
                | Keyword::Set
                | Keyword::Log
                | Keyword::Export,
            ) if groups.len() == 1 => {
                groups[0] = 0;
                prefix_run = 0;
                after_operand = false;
                length = 0;
            }
            Token::Operator(Operator::Plus | Operator::Minus | Operator::Not)
            | Token::Keyword(Keyword::Not)
                if !after_operand =>
            {
                prefix_run += 1;
            }
            // sibling list items do not nest
            Token::Delimiter(Delimiter::Comma) => {
                if let Some(pending) = groups.last_mut() {
                    *pending = 0;
                }
                prefix_run = 0;
                after_operand = false;
            }
            Token::Operator(Operator::Question) => {
                if let Some(pending) = groups.last_mut() {
                    *pending += 1;
                }
                prefix_run = 0;
                after_operand = false;
            }
            Token::Identifier(_)
            | Token::Literal(_)
            | Token::Keyword(Keyword::True | Keyword::False | Keyword::Null) => {
                prefix_run = 0;
                after_operand = true;
            }
            _ => {
                prefix_run = 0;
                after_operand = false;
            }
        }

        let depth = (groups.len() - 1) + groups.iter().sum::<usize>() + prefix_run;
        if depth > limit {
            return Err(SyntaxError::new(
                format!("expression nesting exceeds the limit of {}", limit),
                span.line,
                span.column,
            ));
        }
    }
    Ok(())
}

/// Tokens that, right after an operand, extend the expression by one left-nested node.
fn is_chain_link(token: &Token) -> bool {
    match token {
        Token::Operator(op) => !matches!(op, Operator::Question | Operator::Not),
        Token::Keyword(keyword) => matches!(keyword, Keyword::And | Keyword::Or),
        Token::Delimiter(delimiter) => matches!(delimiter, Delimiter::OpenBracket),
        _ => false,
    }
}
