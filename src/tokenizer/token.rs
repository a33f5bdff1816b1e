use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    combinator::recognize,
    error::{context, VerboseError},
    sequence::pair,
    IResult,
};
use thiserror::Error;

use super::{
    comment::parse_comment,
    keyword::Keyword,
    literal::{parse_literal, Literal},
    symbol::{parse_delimiter, parse_operator, Delimiter, Operator},
    whitespace::{parse_newline, parse_whitespace},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Keyword(Keyword),
    Identifier(String),
    Operator(Operator),
    Delimiter(Delimiter),
    Literal(Literal),
    // Formatting
    Whitespace(String),
    Newline,
    Comment {
        content: String,
        comment_type: CommentType,
    },
}

impl Token {
    pub fn is_comment(&self) -> bool {
        matches!(self, Token::Comment { .. })
    }

    pub fn is_whitespace(&self) -> bool {
        matches!(self, Token::Whitespace(_))
    }

    pub fn is_newline(&self) -> bool {
        matches!(self, Token::Newline)
    }

    /// Tokens that carry no meaning for the grammar.
    pub fn is_trivia(&self) -> bool {
        self.is_comment() || self.is_whitespace() || self.is_newline()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Keyword(keyword) => write!(f, "{}", keyword),
            Token::Identifier(name) => write!(f, "{}", name),
            Token::Operator(op) => write!(f, "{}", op),
            Token::Delimiter(delimiter) => write!(f, "{}", delimiter),
            Token::Literal(Literal::Number(n)) => write!(f, "{}", n),
            Token::Literal(Literal::String(s)) => write!(f, "{:?}", s),
            Token::Whitespace(_) => write!(f, "whitespace"),
            Token::Newline => write!(f, "newline"),
            Token::Comment { .. } => write!(f, "comment"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentType {
    Line,  // //
    Block, // /* */
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    current_position: usize,
    current_line: usize,
    current_column: usize,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            current_position: 0,
            current_line: 1,   // 1-based
            current_column: 1, // 1-based
        }
    }

    #[tracing::instrument(level = "debug", skip(self, input))]
    pub fn tokenize(&mut self, input: &str) -> TokenizerResult<Vec<TokenSpan>> {
        let mut tokens = Vec::new();
        let mut remaining = input;

        while !remaining.is_empty() {
            let start_position = self.current_position;
            let start_line = self.current_line;
            let start_column = self.current_column;

            // comments must be tried before operators so that `/` does not win
            let result = alt((
                parse_whitespace,
                parse_newline,
                parse_comment,
                parse_literal,
                parse_operator,
                parse_delimiter,
                parse_identifier,
            ))(remaining);

            match result {
                Ok((new_remaining, token)) => {
                    let consumed = &remaining[..(remaining.len() - new_remaining.len())];
                    self.update_position(consumed);

                    tokens.push(TokenSpan {
                        token,
                        start: start_position,
                        end: self.current_position,
                        line: start_line,
                        column: start_column,
                    });

                    remaining = new_remaining;
                }
                Err(e) => {
                    let found = remaining.chars().take(20).collect::<String>();
                    let span = Span {
                        start: self.current_position,
                        end: self.current_position + 1,
                        line: self.current_line,
                        column: self.current_column,
                    };
                    let message = match e {
                        nom::Err::Incomplete(needed) => format!("incomplete input, {:?}", needed),
                        nom::Err::Error(_) | nom::Err::Failure(_) => {
                            describe_unrecognized(remaining)
                        }
                    };
                    let error = TokenizerError::ParseError {
                        message,
                        found,
                        span,
                    };
                    tracing::debug!("{}", error);
                    return Err(error);
                }
            }
        }

        Ok(tokens)
    }

    fn update_position(&mut self, text: &str) {
        for c in text.chars() {
            self.current_position += c.len_utf8();
            if c == '\n' {
                self.current_line += 1;
                self.current_column = 1;
            } else {
                self.current_column += 1;
            }
        }
    }
}

fn describe_unrecognized(remaining: &str) -> String {
    if remaining.starts_with("/*") {
        "unterminated block comment".to_string()
    } else if remaining.starts_with('"') || remaining.starts_with('\'') {
        "unterminated or malformed string literal".to_string()
    } else {
        match remaining.chars().next() {
            Some(c) => format!("unexpected character '{}'", c),
            None => "unexpected end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenSpan {
    pub token: Token,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Identifiers and keywords share one lexical shape; the keyword table decides which one
/// a word is, so `RULES` stays an identifier instead of `RULE` followed by `S`.
#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_identifier(input: &str) -> ParserResult<Token> {
    let (input, id) = context(
        "identifier",
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_'),
            take_while(|c: char| c.is_alphanumeric() || c == '_'),
        )),
    )(input)?;

    if let Ok(kw) = id.parse::<Keyword>() {
        return Ok((input, Token::Keyword(kw)));
    }

    Ok((input, Token::Identifier(id.to_string())))
}

pub type ParserResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

pub type TokenizerResult<T> = Result<T, TokenizerError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenizerError {
    #[error("{message} at {span}")]
    ParseError {
        message: String,
        found: String,
        span: Span,
    },
}

impl TokenizerError {
    pub fn span(&self) -> &Span {
        match self {
            TokenizerError::ParseError { span, .. } => span,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            TokenizerError::ParseError { message, .. } => message,
        }
    }
}
