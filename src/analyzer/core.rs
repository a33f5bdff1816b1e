use thiserror::Error;

/// A parser over a slice of `I`, starting at `pos`. On success returns the position after the
/// consumed input together with the parsed value.
pub trait Parser<I, O> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O>;
}

pub type ParseResult<O> = Result<(usize, O), ParseError>;

/// Combinator level error. Every variant records the input position it refers to, which the
/// registry later maps back to a source line and column.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected {expected}, found {found}")]
    Unexpected {
        expected: String,
        found: String,
        position: usize,
    },
    #[error("unexpected end of input")]
    UnexpectedEof { position: usize },
    #[error("no alternative matched")]
    NoAlternative { position: usize },
    #[error("{message}")]
    Fail { message: String, position: usize },
    #[error("{message}: {inner}")]
    WithContext {
        message: String,
        inner: Box<ParseError>,
    },
}

impl ParseError {
    pub fn position(&self) -> usize {
        match self {
            ParseError::Unexpected { position, .. }
            | ParseError::UnexpectedEof { position }
            | ParseError::NoAlternative { position }
            | ParseError::Fail { position, .. } => *position,
            ParseError::WithContext { inner, .. } => inner.position(),
        }
    }

    /// Of two failures, keep the one that got further into the input. On a tie the receiver
    /// wins.
    pub fn furthest(self, other: ParseError) -> ParseError {
        if other.position() > self.position() {
            other
        } else {
            self
        }
    }

    /// The innermost error, without context wrappers.
    pub fn root(&self) -> &ParseError {
        match self {
            ParseError::WithContext { inner, .. } => inner.root(),
            other => other,
        }
    }

    /// The outermost context label that applies to the innermost error, e.g. `"expression"`.
    pub fn innermost_context(&self) -> Option<&str> {
        match self {
            ParseError::WithContext { message, inner } => {
                inner.innermost_context().or(Some(message.as_str()))
            }
            _ => None,
        }
    }

    /// A deliberate rejection with its own message, as opposed to a mismatch.
    pub fn is_explicit(&self) -> bool {
        matches!(self.root(), ParseError::Fail { .. })
    }

    /// True if the parser consumed input beyond `start` before failing.
    pub fn is_committed(&self, start: usize) -> bool {
        self.position() > start
    }
}
