//! Expression grammar, lowest precedence first:
//!
//! ```text
//! conditional    := or ( "?" expression ":" expression )?
//! or             := and ( ("OR" | "||") and )*
//! and            := equality ( ("AND" | "&&") equality )*
//! equality       := relational ( ("==" | "!=") relational )*
//! relational     := additive ( ("<" | "<=" | ">" | ">=") additive )*
//! additive       := multiplicative ( ("+" | "-") multiplicative )*
//! multiplicative := power ( ("*" | "/" | "%") power )*
//! power          := unary ( ("^" | "**") unary )*
//! unary          := ("+" | "-" | "!" | "NOT")* postfix
//! postfix        := primary ( "." identifier | "[" expression "]" )*
//! primary        := literal | "CALL"? identifier "(" arguments ")" | identifier
//!                 | "[" elements "]" | "(" expression ")"
//! ```
//!
//! Every binary level folds to the left, power included, so `2 ^ 3 ^ 2` is `(2 ^ 3) ^ 2`.

use super::{
    super::{core::*, prelude::*},
    *,
};
use crate::ast::{self, BinaryOperator, Expression, MemberProperty, UnaryOperator};
use crate::tokenizer::{keyword::Keyword, symbol::Operator, token::Token};

pub fn parse_expression() -> impl Parser<Token, Expression> {
    choice(vec![Box::new(lazy(parse_conditional))])
}

fn fold_binary(first: Expression, rest: Vec<(BinaryOperator, Expression)>) -> Expression {
    rest.into_iter()
        .fold(first, |left, (op, right)| Expression::binary(op, left, right))
}

fn binary_op(token: Token, op: BinaryOperator) -> Box<dyn Parser<Token, BinaryOperator>> {
    Box::new(map(equal(token), move |_| op))
}

fn parse_conditional() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            parse_logical_or(),
            optional(tuple4(
                parse_operator(Operator::Question),
                parse_expression(),
                parse_colon(),
                parse_expression(),
            )),
        ),
        |(condition, branches)| match branches {
            Some((_, then_branch, _, else_branch)) => Expression::Conditional {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            None => condition,
        },
    )
}

fn parse_logical_or() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            parse_logical_and(),
            many(tuple2(parse_operator_or(), parse_logical_and())),
        ),
        |(first, rest)| fold_binary(first, rest),
    )
}

fn parse_operator_or() -> impl Parser<Token, BinaryOperator> {
    choice(vec![
        binary_op(Token::Keyword(Keyword::Or), BinaryOperator::Or),
        binary_op(Token::Operator(Operator::Or), BinaryOperator::Or),
    ])
}

fn parse_logical_and() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            parse_equality(),
            many(tuple2(parse_operator_and(), parse_equality())),
        ),
        |(first, rest)| fold_binary(first, rest),
    )
}

fn parse_operator_and() -> impl Parser<Token, BinaryOperator> {
    choice(vec![
        binary_op(Token::Keyword(Keyword::And), BinaryOperator::And),
        binary_op(Token::Operator(Operator::And), BinaryOperator::And),
    ])
}

fn parse_equality() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            parse_relational(),
            many(tuple2(
                choice(vec![
                    binary_op(Token::Operator(Operator::EqualEqual), BinaryOperator::Equal),
                    binary_op(Token::Operator(Operator::NotEqual), BinaryOperator::NotEqual),
                ]),
                parse_relational(),
            )),
        ),
        |(first, rest)| fold_binary(first, rest),
    )
}

fn parse_relational() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            parse_additive(),
            many(tuple2(
                choice(vec![
                    binary_op(Token::Operator(Operator::Less), BinaryOperator::LessThan),
                    binary_op(
                        Token::Operator(Operator::LessEqual),
                        BinaryOperator::LessThanEqual,
                    ),
                    binary_op(Token::Operator(Operator::Greater), BinaryOperator::GreaterThan),
                    binary_op(
                        Token::Operator(Operator::GreaterEqual),
                        BinaryOperator::GreaterThanEqual,
                    ),
                ]),
                parse_additive(),
            )),
        ),
        |(first, rest)| fold_binary(first, rest),
    )
}

fn parse_additive() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            parse_multiplicative(),
            many(tuple2(
                choice(vec![
                    binary_op(Token::Operator(Operator::Plus), BinaryOperator::Add),
                    binary_op(Token::Operator(Operator::Minus), BinaryOperator::Subtract),
                ]),
                parse_multiplicative(),
            )),
        ),
        |(first, rest)| fold_binary(first, rest),
    )
}

fn parse_multiplicative() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            parse_power(),
            many(tuple2(
                choice(vec![
                    binary_op(Token::Operator(Operator::Multiply), BinaryOperator::Multiply),
                    binary_op(Token::Operator(Operator::Divide), BinaryOperator::Divide),
                    binary_op(Token::Operator(Operator::Modulo), BinaryOperator::Modulo),
                ]),
                parse_power(),
            )),
        ),
        |(first, rest)| fold_binary(first, rest),
    )
}

fn parse_power() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            parse_unary(),
            many(tuple2(
                choice(vec![
                    binary_op(Token::Operator(Operator::Caret), BinaryOperator::Power),
                    binary_op(Token::Operator(Operator::StarStar), BinaryOperator::Power),
                ]),
                parse_unary(),
            )),
        ),
        |(first, rest)| fold_binary(first, rest),
    )
}

fn parse_unary_operator() -> impl Parser<Token, UnaryOperator> {
    satisfy("unary operator", |token: &Token| match token {
        Token::Operator(Operator::Plus) => Some(UnaryOperator::Plus),
        Token::Operator(Operator::Minus) => Some(UnaryOperator::Minus),
        Token::Operator(Operator::Not) | Token::Keyword(Keyword::Not) => {
            Some(UnaryOperator::Not)
        }
        _ => None,
    })
}

fn parse_unary() -> impl Parser<Token, Expression> {
    map(
        tuple2(many(parse_unary_operator()), parse_postfix()),
        |(ops, operand)| {
            ops.into_iter()
                .rev()
                .fold(operand, |operand, op| Expression::Unary {
                    op,
                    operand: Box::new(operand),
                })
        },
    )
}

fn parse_postfix() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            parse_primary(),
            many(choice(vec![
                Box::new(map(
                    preceded(parse_operator(Operator::Dot), parse_identifier()),
                    MemberProperty::Named,
                )),
                Box::new(map(
                    delimited(parse_open_bracket(), parse_expression(), parse_close_bracket()),
                    |index| MemberProperty::Computed(Box::new(index)),
                )),
            ])),
        ),
        |(object, properties)| {
            properties
                .into_iter()
                .fold(object, |object, property| Expression::Member {
                    object: Box::new(object),
                    property,
                })
        },
    )
}

fn parse_primary() -> impl Parser<Token, Expression> {
    with_context(
        choice(vec![
            Box::new(map(parse_literal(), Expression::Literal)),
            Box::new(preceded(parse_keyword(Keyword::Call), parse_function_call())),
            Box::new(parse_function_call()),
            Box::new(map(parse_identifier(), Expression::Variable)),
            Box::new(parse_array()),
            Box::new(delimited(
                parse_open_paren(),
                parse_expression(),
                parse_close_paren(),
            )),
        ]),
        "expression",
    )
}

pub fn parse_arguments() -> impl Parser<Token, Vec<Expression>> {
    delimited(
        parse_open_paren(),
        separated_list(parse_expression(), parse_comma()),
        parse_close_paren(),
    )
}

fn parse_function_call() -> impl Parser<Token, Expression> {
    map(
        tuple2(parse_identifier(), parse_arguments()),
        |(function, arguments)| Expression::FunctionCall {
            function,
            arguments,
        },
    )
}

fn parse_array() -> impl Parser<Token, Expression> {
    map(
        delimited(
            parse_open_bracket(),
            separated_list(parse_expression(), parse_comma()),
            parse_close_bracket(),
        ),
        ast::Expression::Array,
    )
}

/// Tokens that would continue an expression after a complete operand. Used to tell a
/// `CALL` statement apart from a `CALL` expression that goes on.
pub fn parse_expression_continuation() -> impl Parser<Token, ()> {
    satisfy("operator", |token: &Token| match token {
        Token::Operator(Operator::Not) => None,
        Token::Operator(_) | Token::Keyword(Keyword::And) | Token::Keyword(Keyword::Or) => {
            Some(())
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessor::{Preprocessor, TokenPreprocessor};
    use crate::tokenizer::token::Tokenizer;
    use pretty_assertions::assert_eq;

    fn tokens(source: &str) -> Vec<Token> {
        let spans = Tokenizer::new().tokenize(source).unwrap();
        TokenPreprocessor::default()
            .process(spans)
            .into_iter()
            .map(|span| span.token)
            .collect()
    }

    fn parse(source: &str) -> Expression {
        let tokens = tokens(source);
        let (pos, expr) = parse_expression().parse(&tokens, 0).unwrap();
        assert_eq!(pos, tokens.len(), "unconsumed input in {:?}", source);
        expr
    }

    fn num(n: f64) -> Expression {
        Expression::number(n)
    }

    fn var(name: &str) -> Expression {
        Expression::variable(name)
    }

    #[test]
    fn test_multiplication_binds_tighter() {
        assert_eq!(
            parse("1 + 2 * 3"),
            Expression::binary(
                BinaryOperator::Add,
                num(1.0),
                Expression::binary(BinaryOperator::Multiply, num(2.0), num(3.0)),
            )
        );
    }

    #[test]
    fn test_power_is_left_associative() {
        assert_eq!(
            parse("2 ^ 3 ** 2"),
            Expression::binary(
                BinaryOperator::Power,
                Expression::binary(BinaryOperator::Power, num(2.0), num(3.0)),
                num(2.0),
            )
        );
    }

    #[test]
    fn test_subtraction_is_left_associative() {
        assert_eq!(
            parse("10 - 4 - 3"),
            Expression::binary(
                BinaryOperator::Subtract,
                Expression::binary(BinaryOperator::Subtract, num(10.0), num(4.0)),
                num(3.0),
            )
        );
    }

    #[test]
    fn test_logical_keywords_and_aliases() {
        assert_eq!(
            parse("a OR b && c"),
            Expression::binary(
                BinaryOperator::Or,
                var("a"),
                Expression::binary(BinaryOperator::And, var("b"), var("c")),
            )
        );
    }

    #[test]
    fn test_comparison_below_arithmetic() {
        assert_eq!(
            parse("a + 1 >= b == TRUE"),
            Expression::binary(
                BinaryOperator::Equal,
                Expression::binary(
                    BinaryOperator::GreaterThanEqual,
                    Expression::binary(BinaryOperator::Add, var("a"), num(1.0)),
                    var("b"),
                ),
                Expression::Literal(ast::Literal::Boolean(true)),
            )
        );
    }

    #[test]
    fn test_conditional_is_right_nested() {
        assert_eq!(
            parse("a ? 1 : b ? 2 : 3"),
            Expression::Conditional {
                condition: Box::new(var("a")),
                then_branch: Box::new(num(1.0)),
                else_branch: Box::new(Expression::Conditional {
                    condition: Box::new(var("b")),
                    then_branch: Box::new(num(2.0)),
                    else_branch: Box::new(num(3.0)),
                }),
            }
        );
    }

    #[test]
    fn test_unary_chain() {
        assert_eq!(
            parse("- -x"),
            Expression::Unary {
                op: UnaryOperator::Minus,
                operand: Box::new(Expression::Unary {
                    op: UnaryOperator::Minus,
                    operand: Box::new(var("x")),
                }),
            }
        );
        assert_eq!(
            parse("NOT done"),
            Expression::Unary {
                op: UnaryOperator::Not,
                operand: Box::new(var("done")),
            }
        );
    }

    #[test]
    fn test_calls_and_members() {
        assert_eq!(
            parse("CALL SUM(a, 2).total[0]"),
            Expression::Member {
                object: Box::new(Expression::Member {
                    object: Box::new(Expression::FunctionCall {
                        function: "SUM".to_string(),
                        arguments: vec![var("a"), num(2.0)],
                    }),
                    property: MemberProperty::Named("total".to_string()),
                }),
                property: MemberProperty::Computed(Box::new(num(0.0))),
            }
        );
        assert_eq!(
            parse("MAX()"),
            Expression::FunctionCall {
                function: "MAX".to_string(),
                arguments: vec![],
            }
        );
    }

    #[test]
    fn test_array_and_grouping() {
        assert_eq!(
            parse("[1, (2 + 3)] "),
            Expression::Array(vec![
                num(1.0),
                Expression::binary(BinaryOperator::Add, num(2.0), num(3.0)),
            ])
        );
    }

    #[test]
    fn test_missing_operand_is_an_error() {
        let tokens = tokens("1 + )");
        let err = parse_expression().parse(&tokens, 0).unwrap_err();
        assert_eq!(err.position(), 2);
        assert_eq!(err.innermost_context(), Some("expression"));
    }
}
