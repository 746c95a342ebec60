//! Classification of control tokens.

use std::fmt;

/// A control token recognized by the grammar.
///
/// Everything that is not one of these is a literal argument (an executable,
/// an option or a filename).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `&`, treated exactly like `&&`.
    Ampersand,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `;`
    Sequence,
    /// `<`
    RedirectIn,
    /// `>`
    RedirectOut,
    /// `|`
    Pipe,
}

impl Operator {
    /// Every control token, in the order they are matched.
    ///
    /// New operators only need to be added here and to [`Operator::as_str`].
    pub const ALL: [Operator; 7] = [
        Operator::Ampersand,
        Operator::And,
        Operator::Or,
        Operator::Sequence,
        Operator::RedirectIn,
        Operator::RedirectOut,
        Operator::Pipe,
    ];

    /// The exact token text of this operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Ampersand => "&",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Sequence => ";",
            Operator::RedirectIn => "<",
            Operator::RedirectOut => ">",
            Operator::Pipe => "|",
        }
    }

    /// Returns which operator `token` is, or `None` for a literal.
    pub fn classify(token: &str) -> Option<Operator> {
        Self::ALL.into_iter().find(|op| op.as_str() == token)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shorthand for `Operator::classify(token).is_some()`.
pub fn is_operator(token: &str) -> bool {
    Operator::classify(token).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_every_control_token() {
        for op in Operator::ALL {
            assert_eq!(Operator::classify(op.as_str()), Some(op));
        }
    }

    #[test]
    fn literals_are_not_operators() {
        for token in ["ls", "-l", "&&&", "|&", ">>", "", "a;b"] {
            assert!(!is_operator(token), "{token:?} must be a literal");
        }
    }

    #[test]
    fn single_and_double_ampersand_are_distinct() {
        assert_eq!(Operator::classify("&"), Some(Operator::Ampersand));
        assert_eq!(Operator::classify("&&"), Some(Operator::And));
    }
}
