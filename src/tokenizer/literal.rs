use nom::{
    branch::alt,
    bytes::complete::{take_while1, take_while_m_n},
    character::complete::{char, digit1, one_of},
    combinator::{cut, map, map_opt, map_res, opt, recognize, value},
    error::context,
    multi::fold_many0,
    sequence::{pair, preceded, terminated, tuple},
};

use super::token::{ParserResult, Token};

/// Number and string literals. `TRUE`, `FALSE` and `NULL` are keywords, not literals, at
/// this level.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
}

/// Unsigned numbers with optional fraction and exponent: `42`, `3.25`, `1e6`, `2.5E-3`.
/// A leading minus is the unary operator, not part of the literal.
#[tracing::instrument(level = "debug", skip(input))]
fn parse_number_literal(input: &str) -> ParserResult<Literal> {
    context(
        "number literal",
        map_res(
            recognize(tuple((
                digit1,
                opt(pair(char('.'), digit1)),
                opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
            ))),
            |s: &str| s.parse::<f64>().map(Literal::Number),
        ),
    )(input)
}

fn hex_char(digits: &str) -> Option<char> {
    u32::from_str_radix(digits, 16)
        .ok()
        .and_then(char::from_u32)
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_escape(input: &str) -> ParserResult<char> {
    context(
        "escape sequence",
        preceded(
            char('\\'),
            alt((
                preceded(
                    char('x'),
                    map_opt(take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()), hex_char),
                ),
                preceded(
                    char('u'),
                    map_opt(take_while_m_n(4, 4, |c: char| c.is_ascii_hexdigit()), hex_char),
                ),
                value('\n', char('n')),
                value('\t', char('t')),
                value('\r', char('r')),
                value('\\', char('\\')),
                value('\'', char('\'')),
                value('"', char('"')),
                value('/', char('/')),
                value('\u{8}', char('b')),
                value('\u{c}', char('f')),
                value('\u{b}', char('v')),
                value('\0', char('0')),
            )),
        ),
    )(input)
}

/// A string delimited by `quote`. Raw line breaks are not allowed inside; use `\n`.
fn parse_quoted(quote: char) -> impl FnMut(&str) -> ParserResult<String> {
    move |input: &str| {
        let (input, _) = char(quote)(input)?;
        cut(terminated(
            fold_many0(
                alt((
                    map(
                        take_while1(move |c: char| {
                            c != quote && c != '\\' && c != '\n' && c != '\r'
                        }),
                        |chunk: &str| chunk.to_string(),
                    ),
                    map(parse_escape, String::from),
                )),
                String::new,
                |mut acc, part| {
                    acc.push_str(&part);
                    acc
                },
            ),
            char(quote),
        ))(input)
    }
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_string_literal(input: &str) -> ParserResult<Literal> {
    context(
        "string literal",
        map(alt((parse_quoted('"'), parse_quoted('\''))), Literal::String),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_literal(input: &str) -> ParserResult<Token> {
    context(
        "literal",
        map(
            alt((parse_string_literal, parse_number_literal)),
            Token::Literal,
        ),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_literals() {
        let cases = [
            ("123", 123.0),
            ("0.5", 0.5),
            ("1e3", 1000.0),
            ("2.5E-3", 0.0025),
            ("7e+2", 700.0),
        ];
        for (input, expected) in cases {
            let (rest, result) = parse_number_literal(input).unwrap();
            assert_eq!(result, Literal::Number(expected));
            assert_eq!(rest, "");
        }
    }

    #[test]
    fn test_number_followed_by_member_access() {
        let (rest, result) = parse_number_literal("1.x").unwrap();
        assert_eq!(result, Literal::Number(1.0));
        assert_eq!(rest, ".x");
    }

    #[test]
    fn test_simple_strings() {
        let (rest, result) = parse_string_literal("\"hello world\"").unwrap();
        assert_eq!(rest, "");
        assert_eq!(result, Literal::String("hello world".to_string()));

        let (_, result) = parse_string_literal("'it''").unwrap();
        assert_eq!(result, Literal::String("it".to_string()));
    }

    #[test]
    fn test_escapes() {
        let (_, result) =
            parse_string_literal(r#""a\n\t\"q\" \\ \/ \x41\u00e9\0""#).unwrap();
        assert_eq!(
            result,
            Literal::String("a\n\t\"q\" \\ / A\u{e9}\0".to_string())
        );

        let (_, result) = parse_string_literal(r"'don\'t'").unwrap();
        assert_eq!(result, Literal::String("don't".to_string()));
    }

    #[test]
    fn test_other_quote_needs_no_escape() {
        let (_, result) = parse_string_literal(r#"'say "hi"'"#).unwrap();
        assert_eq!(result, Literal::String("say \"hi\"".to_string()));
    }

    #[test]
    fn test_malformed_strings() {
        assert!(matches!(
            parse_string_literal("\"open"),
            Err(nom::Err::Failure(_))
        ));
        assert!(matches!(
            parse_string_literal("\"line\nbreak\""),
            Err(nom::Err::Failure(_))
        ));
        assert!(matches!(
            parse_string_literal(r#""\q""#),
            Err(nom::Err::Failure(_))
        ));
    }
}
