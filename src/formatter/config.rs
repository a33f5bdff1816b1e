use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatterConfig {
    #[serde(default = "default_indent_spaces")]
    pub indent_spaces: usize,
    /// Terminate every simple statement with `;`. When off, a `;` is still written where the
    /// next statement would otherwise read as a continuation of the previous one.
    #[serde(default = "default_semicolons")]
    pub semicolons: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            indent_spaces: default_indent_spaces(),
            semicolons: default_semicolons(),
        }
    }
}

fn default_indent_spaces() -> usize {
    4
}

fn default_semicolons() -> bool {
    true
}
