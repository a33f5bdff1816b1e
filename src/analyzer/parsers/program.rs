use super::{
    super::{core::*, prelude::*},
    statement::parse_top_level_statement,
};
use crate::ast::Program;
use crate::tokenizer::token::Token;

/// Parses as many top-level statements as possible. The caller checks that all input was
/// consumed; see [`parse_program_complete`].
pub fn parse_program() -> impl Parser<Token, Program> {
    map(many(parse_top_level_statement()), Program::new)
}

/// Parses the whole token stream. When statements stop short of the end, the statement
/// parser is run again at the stopping point to report why.
#[tracing::instrument(level = "debug", skip_all, fields(tokens = tokens.len()))]
pub fn parse_program_complete(tokens: &[Token]) -> Result<Program, ParseError> {
    let (pos, program) = parse_program().parse(tokens, 0)?;
    if pos == tokens.len() {
        return Ok(program);
    }
    match parse_top_level_statement().parse(tokens, pos) {
        Err(e) => Err(e),
        Ok(_) => Err(ParseError::NoAlternative { position: pos }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Statement;
    use crate::preprocessor::{Preprocessor, TokenPreprocessor};
    use crate::tokenizer::token::Tokenizer;

    fn tokens(source: &str) -> Vec<Token> {
        let spans = Tokenizer::new().tokenize(source).unwrap();
        TokenPreprocessor::default()
            .process(spans)
            .into_iter()
            .map(|span| span.token)
            .collect()
    }

    #[test]
    fn test_statement_sequence() {
        let program = parse_program_complete(&tokens(
            "RULE ADD(a,b) RETURN a + b; ENDRULE SET x = CALL ADD(2,3); EXPORT x;",
        ))
        .unwrap();
        let kinds: Vec<_> = program.statements.iter().map(Statement::kind).collect();
        assert_eq!(
            kinds,
            vec!["FunctionDefinition", "SetStatement", "ExportStatement"]
        );
    }

    #[test]
    fn test_semicolons_are_optional() {
        let program = parse_program_complete(&tokens("SET a = 1\nSET b = 2\nEXPORT a")).unwrap();
        assert_eq!(program.statements.len(), 3);
    }

    #[test]
    fn test_empty_program() {
        let program = parse_program_complete(&[]).unwrap();
        assert!(program.statements.is_empty());
    }

    #[test]
    fn test_stray_token_reports_position() {
        let err = parse_program_complete(&tokens("SET a = 1; )")).unwrap_err();
        assert_eq!(err.position(), 5);
    }
}
