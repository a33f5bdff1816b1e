use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Reserved words of the rule language.
///
/// Keywords are uppercase and case-sensitive: `RULE` is a keyword, `rule` is an ordinary
/// identifier. They are recognized by looking the whole word up in this table, see
/// [`parse_identifier`](super::token::parse_identifier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, EnumIter, AsRefStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Keyword {
    Rule,
    #[strum(serialize = "ENDRULE")]
    EndRule,
    Return,
    Set,
    Call,
    Log,
    Export,
    True,
    False,
    Null,
    Or,
    And,
    Not,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_keyword_display_round_trips() {
        for keyword in Keyword::iter() {
            let text = keyword.to_string();
            assert_eq!(text.parse::<Keyword>().unwrap(), keyword);
            assert_eq!(text, text.to_uppercase());
        }
    }

    #[test]
    fn test_lowercase_is_not_keyword() {
        assert!("return".parse::<Keyword>().is_err());
        assert!("EndRule".parse::<Keyword>().is_err());
        assert_eq!("ENDRULE".parse::<Keyword>().unwrap(), Keyword::EndRule);
    }
}
