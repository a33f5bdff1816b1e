use nom::{
    branch::alt,
    bytes::complete::{tag, take_until},
    character::complete::not_line_ending,
    combinator::{cut, map},
    error::context,
    sequence::{preceded, terminated},
};

use super::token::{CommentType, ParserResult, Token};

#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_line_comment(input: &str) -> ParserResult<Token> {
    context(
        "line comment",
        map(preceded(tag("//"), not_line_ending), |content: &str| {
            Token::Comment {
                content: content.trim().to_string(),
                comment_type: CommentType::Line,
            }
        }),
    )(input)
}

/// Block comments do not nest: the first `*/` closes the comment. Once `/*` is seen the
/// comment is committed, so an unterminated one is an error rather than a division.
#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_block_comment(input: &str) -> ParserResult<Token> {
    context(
        "block comment",
        map(
            preceded(tag("/*"), cut(terminated(take_until("*/"), tag("*/")))),
            |content: &str| Token::Comment {
                content: content.to_string(),
                comment_type: CommentType::Block,
            },
        ),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_comment(input: &str) -> ParserResult<Token> {
    context("comment", alt((parse_block_comment, parse_line_comment)))(input)
}
