//! # Symbol Token Handling
//!
//! Operators and delimiters of the rule language.
//!
//! Symbols are matched longest first, so `**` is one power operator rather than two
//! multiplications and `<=` is never split into `<` and `=`.

use strum_macros::{AsRefStr, Display, EnumString};

use nom::{
    branch::alt,
    bytes::complete::tag,
    combinator::{map, value},
    error::context,
};

use super::token::{ParserResult, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
pub enum Operator {
    /// Member access (`.`)
    #[strum(serialize = ".")]
    Dot,
    /// Conditional (`?`), paired with the `:` delimiter
    #[strum(serialize = "?")]
    Question,

    #[strum(serialize = "==")]
    EqualEqual,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = ">=")]
    GreaterEqual,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = "<=")]
    LessEqual,

    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "%")]
    Modulo,
    /// Power (`^`)
    #[strum(serialize = "^")]
    Caret,
    /// Power, alternate spelling (`**`)
    #[strum(serialize = "**")]
    StarStar,

    /// Logical AND alias (`&&`)
    #[strum(serialize = "&&")]
    And,
    /// Logical OR alias (`||`)
    #[strum(serialize = "||")]
    Or,
    /// Logical NOT (`!`)
    #[strum(serialize = "!")]
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
pub enum Delimiter {
    #[strum(serialize = "(")]
    OpenParen,
    #[strum(serialize = ")")]
    CloseParen,
    #[strum(serialize = "[")]
    OpenBracket,
    #[strum(serialize = "]")]
    CloseBracket,
    #[strum(serialize = ",")]
    Comma,
    #[strum(serialize = ";")]
    Semicolon,
    #[strum(serialize = ":")]
    Colon,
    /// Assignment in `SET name = expr`
    #[strum(serialize = "=")]
    Equal,
}

/// Parses an operator token.
///
/// ```
/// # use finrule::tokenizer::symbol::{parse_operator, Operator};
/// # use finrule::tokenizer::token::Token;
/// let (rest, token) = parse_operator("** 2").unwrap();
/// assert_eq!(token, Token::Operator(Operator::StarStar));
/// assert_eq!(rest, " 2");
/// ```
#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_operator(input: &str) -> ParserResult<Token> {
    context(
        "operator",
        map(
            alt((
                // two characters first
                value(Operator::StarStar, tag("**")),
                value(Operator::EqualEqual, tag("==")),
                value(Operator::NotEqual, tag("!=")),
                value(Operator::GreaterEqual, tag(">=")),
                value(Operator::LessEqual, tag("<=")),
                value(Operator::And, tag("&&")),
                value(Operator::Or, tag("||")),
                value(Operator::Dot, tag(".")),
                value(Operator::Question, tag("?")),
                value(Operator::Greater, tag(">")),
                value(Operator::Less, tag("<")),
                value(Operator::Plus, tag("+")),
                value(Operator::Minus, tag("-")),
                value(Operator::Multiply, tag("*")),
                value(Operator::Divide, tag("/")),
                value(Operator::Modulo, tag("%")),
                value(Operator::Caret, tag("^")),
                value(Operator::Not, tag("!")),
            )),
            Token::Operator,
        ),
    )(input)
}

/// Parses a delimiter token. Must run after [`parse_operator`] so `==` is not read as two `=`.
#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_delimiter(input: &str) -> ParserResult<Token> {
    context(
        "delimiter",
        map(
            alt((
                value(Delimiter::OpenParen, tag("(")),
                value(Delimiter::CloseParen, tag(")")),
                value(Delimiter::OpenBracket, tag("[")),
                value(Delimiter::CloseBracket, tag("]")),
                value(Delimiter::Comma, tag(",")),
                value(Delimiter::Semicolon, tag(";")),
                value(Delimiter::Colon, tag(":")),
                value(Delimiter::Equal, tag("=")),
            )),
            Token::Delimiter,
        ),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operators() {
        let test_cases = [
            ("**", Token::Operator(Operator::StarStar)),
            ("^", Token::Operator(Operator::Caret)),
            ("==", Token::Operator(Operator::EqualEqual)),
            ("!=", Token::Operator(Operator::NotEqual)),
            (">=", Token::Operator(Operator::GreaterEqual)),
            ("<=", Token::Operator(Operator::LessEqual)),
            ("&&", Token::Operator(Operator::And)),
            ("||", Token::Operator(Operator::Or)),
            ("%", Token::Operator(Operator::Modulo)),
            ("?", Token::Operator(Operator::Question)),
            (".", Token::Operator(Operator::Dot)),
            ("!", Token::Operator(Operator::Not)),
        ];

        for (input, expected) in test_cases.iter() {
            let (rest, token) = parse_operator(input).unwrap();
            assert_eq!(token, *expected);
            assert_eq!(rest, "");
        }
    }

    #[test]
    fn test_delimiters() {
        let test_cases = [
            ("(", Token::Delimiter(Delimiter::OpenParen)),
            (")", Token::Delimiter(Delimiter::CloseParen)),
            ("[", Token::Delimiter(Delimiter::OpenBracket)),
            ("]", Token::Delimiter(Delimiter::CloseBracket)),
            (",", Token::Delimiter(Delimiter::Comma)),
            (";", Token::Delimiter(Delimiter::Semicolon)),
            (":", Token::Delimiter(Delimiter::Colon)),
            ("=", Token::Delimiter(Delimiter::Equal)),
        ];

        for (input, expected) in test_cases.iter() {
            let (rest, token) = parse_delimiter(input).unwrap();
            assert_eq!(token, *expected);
            assert_eq!(rest, "");
        }
    }

    #[test]
    fn test_longest_match() {
        let (rest, token) = parse_operator("**2").unwrap();
        assert_eq!(token, Token::Operator(Operator::StarStar));
        assert_eq!(rest, "2");

        let (rest, token) = parse_operator("<=x").unwrap();
        assert_eq!(token, Token::Operator(Operator::LessEqual));
        assert_eq!(rest, "x");
    }
}
