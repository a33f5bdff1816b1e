//! Whitespace and newline tokens.
//!
//! Both are kept as tokens so positions stay exact; the parser never sees them.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    combinator::map,
    error::context,
};

use super::token::{ParserResult, Token};

/// Spaces, tabs and stray carriage returns.
#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_whitespace(input: &str) -> ParserResult<Token> {
    context(
        "whitespace expected",
        map(
            take_while1(|c| c == ' ' || c == '\t' || c == '\r' || c == '\u{c}'),
            |ws: &str| Token::Whitespace(ws.to_string()),
        ),
    )(input)
}

/// `\n` or `\r\n`.
#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_newline(input: &str) -> ParserResult<Token> {
    context(
        "newline expected",
        map(alt((tag("\r\n"), tag("\n"))), |_| Token::Newline),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace() {
        let (rest, token) = parse_whitespace(" \t hello").unwrap();
        assert_eq!(token, Token::Whitespace(" \t ".to_string()));
        assert_eq!(rest, "hello");
    }

    #[test]
    fn test_newline() {
        let (rest, token) = parse_newline("\nhello").unwrap();
        assert_eq!(token, Token::Newline);
        assert_eq!(rest, "hello");

        let (rest, token) = parse_newline("\r\nworld").unwrap();
        assert_eq!(token, Token::Newline);
        assert_eq!(rest, "world");
    }

    #[test]
    fn test_error() {
        assert!(parse_whitespace("hello").is_err());
        assert!(parse_newline("hello").is_err());
    }
}
