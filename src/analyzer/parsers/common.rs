use super::super::{core::*, prelude::*};
use crate::ast;
use crate::tokenizer::{
    keyword::Keyword,
    literal::Literal,
    symbol::{Delimiter, Operator},
    token::Token,
};

pub fn parse_identifier() -> impl Parser<Token, String> {
    satisfy("identifier", |token: &Token| match token {
        Token::Identifier(s) => Some(s.clone()),
        _ => None,
    })
}

pub fn parse_keyword(keyword: Keyword) -> impl Parser<Token, ()> {
    as_unit(equal(Token::Keyword(keyword)))
}

pub fn parse_operator(operator: Operator) -> impl Parser<Token, ()> {
    as_unit(equal(Token::Operator(operator)))
}

pub fn parse_delimiter(delimiter: Delimiter) -> impl Parser<Token, ()> {
    as_unit(equal(Token::Delimiter(delimiter)))
}

pub fn parse_comma() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::Comma)
}

pub fn parse_semicolon() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::Semicolon)
}

pub fn parse_colon() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::Colon)
}

pub fn parse_equal() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::Equal)
}

pub fn parse_open_paren() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::OpenParen)
}

pub fn parse_close_paren() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::CloseParen)
}

pub fn parse_open_bracket() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::OpenBracket)
}

pub fn parse_close_bracket() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::CloseBracket)
}

/// Number and string tokens plus the `TRUE`, `FALSE` and `NULL` keywords.
pub fn parse_literal() -> impl Parser<Token, ast::Literal> {
    satisfy("literal", |token: &Token| match token {
        Token::Literal(Literal::Number(n)) => Some(ast::Literal::Number(*n)),
        Token::Literal(Literal::String(s)) => Some(ast::Literal::String(s.clone())),
        Token::Keyword(Keyword::True) => Some(ast::Literal::Boolean(true)),
        Token::Keyword(Keyword::False) => Some(ast::Literal::Boolean(false)),
        Token::Keyword(Keyword::Null) => Some(ast::Literal::Null),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identifier() {
        let tokens = vec![
            Token::Identifier("total".to_string()),
            Token::Keyword(Keyword::Set),
        ];
        assert_eq!(
            parse_identifier().parse(&tokens, 0),
            Ok((1, "total".to_string()))
        );
        assert_eq!(
            parse_identifier().parse(&tokens, 1),
            Err(ParseError::Unexpected {
                expected: "identifier".to_string(),
                found: "'SET'".to_string(),
                position: 1,
            })
        );
    }

    #[test]
    fn test_parse_literal() {
        let tokens = vec![
            Token::Literal(Literal::Number(2.5)),
            Token::Literal(Literal::String("eur".to_string())),
            Token::Keyword(Keyword::True),
            Token::Keyword(Keyword::Null),
        ];
        assert_eq!(
            parse_literal().parse(&tokens, 0),
            Ok((1, ast::Literal::Number(2.5)))
        );
        assert_eq!(
            parse_literal().parse(&tokens, 1),
            Ok((2, ast::Literal::String("eur".to_string())))
        );
        assert_eq!(
            parse_literal().parse(&tokens, 2),
            Ok((3, ast::Literal::Boolean(true)))
        );
        assert_eq!(parse_literal().parse(&tokens, 3), Ok((4, ast::Literal::Null)));
    }
}
