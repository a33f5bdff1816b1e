use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatterError {
    #[error("Formatting error: {0}")]
    Format(String),
    #[error("Number has no source form: {0}")]
    NonFiniteNumber(f64),
}

impl From<std::fmt::Error> for FormatterError {
    fn from(e: std::fmt::Error) -> Self {
        FormatterError::Format(e.to_string())
    }
}
