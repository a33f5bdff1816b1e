use std::collections::HashSet;

use super::{
    super::{core::*, prelude::*},
    expression::*,
    *,
};
use crate::ast::{self, Block, FunctionDef, Statement};
use crate::tokenizer::{keyword::Keyword, token::Token};

/// A statement allowed at the top level of a program: everything except `RETURN`.
pub fn parse_top_level_statement() -> impl Parser<Token, Statement> {
    with_context(
        terminated_statement(choice(vec![
            Box::new(parse_rule_definition()),
            Box::new(parse_set_statement()),
            Box::new(parse_log_statement()),
            Box::new(parse_export_statement()),
            Box::new(parse_call_statement()),
            Box::new(parse_expression_statement()),
            Box::new(reject_keyword(
                Keyword::Return,
                "RETURN is only allowed inside a RULE body",
            )),
        ])),
        "statement",
    )
}

/// A statement inside a `RULE` body: everything except a nested `RULE`.
pub fn parse_body_statement() -> impl Parser<Token, Statement> {
    with_context(
        terminated_statement(choice(vec![
            Box::new(parse_return_statement()),
            Box::new(parse_set_statement()),
            Box::new(parse_log_statement()),
            Box::new(parse_export_statement()),
            Box::new(parse_call_statement()),
            Box::new(parse_expression_statement()),
            Box::new(reject_keyword(
                Keyword::Rule,
                "RULE definitions cannot be nested",
            )),
        ])),
        "statement",
    )
}

/// Statements end with an optional semicolon.
fn terminated_statement<P>(parser: P) -> impl Parser<Token, Statement>
where
    P: Parser<Token, Statement>,
{
    map(
        tuple2(parser, optional(parse_semicolon())),
        |(statement, _)| statement,
    )
}

/// Fails with `message` at a keyword that is valid elsewhere but not here.
fn reject_keyword(keyword: Keyword, message: &'static str) -> impl Parser<Token, Statement> {
    verify(parse_keyword(keyword), move |_| {
        Err::<Statement, String>(message.to_string())
    })
}

fn parse_rule_definition() -> impl Parser<Token, Statement> {
    with_context(
        map(
            tuple5(
                parse_keyword(Keyword::Rule),
                parse_identifier(),
                parse_parameters(),
                many(parse_body_statement()),
                parse_keyword(Keyword::EndRule),
            ),
            |(_, name, parameters, statements, _)| {
                Statement::FunctionDefinition(FunctionDef {
                    name,
                    parameters,
                    body: Block::new(statements),
                })
            },
        ),
        "rule definition",
    )
}

fn parse_parameters() -> impl Parser<Token, Vec<String>> {
    verify(
        delimited(
            parse_open_paren(),
            separated_list(parse_identifier(), parse_comma()),
            parse_close_paren(),
        ),
        |parameters: Vec<String>| {
            let mut seen = HashSet::new();
            for name in &parameters {
                if !seen.insert(name.as_str()) {
                    return Err(format!("duplicate parameter '{}'", name));
                }
            }
            Ok(parameters)
        },
    )
}

fn parse_return_statement() -> impl Parser<Token, Statement> {
    map(
        preceded(parse_keyword(Keyword::Return), parse_expression()),
        Statement::Return,
    )
}

fn parse_set_statement() -> impl Parser<Token, Statement> {
    map(
        tuple4(
            parse_keyword(Keyword::Set),
            parse_identifier(),
            parse_equal(),
            parse_expression(),
        ),
        |(_, name, _, value)| Statement::Set { name, value },
    )
}

fn parse_log_statement() -> impl Parser<Token, Statement> {
    map(
        preceded(parse_keyword(Keyword::Log), parse_expression()),
        Statement::Log,
    )
}

fn parse_export_statement() -> impl Parser<Token, Statement> {
    map(
        preceded(parse_keyword(Keyword::Export), parse_identifier()),
        Statement::Export,
    )
}

/// `CALL name(arguments)` standing alone. When the call is followed by an operator the
/// whole thing is an expression statement instead.
fn parse_call_statement() -> impl Parser<Token, Statement> {
    map(
        tuple4(
            parse_keyword(Keyword::Call),
            parse_identifier(),
            parse_arguments(),
            not(
                parse_expression_continuation(),
                "CALL statement continues as an expression",
            ),
        ),
        |(_, name, arguments, _)| Statement::Call { name, arguments },
    )
}

fn parse_expression_statement() -> impl Parser<Token, Statement> {
    map(parse_expression(), ast::Statement::Expression)
}
