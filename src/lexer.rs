//! Splits a raw input line into the flat token sequence the parser consumes.
//!
//! Operators are separated from words even when written without spaces
//! (`ls>out` is `ls`, `>`, `out`). Quoting only affects how a word is read;
//! the resulting token is a plain string either way.

use std::fmt;

/// Errors that can occur during the lexical analysis process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    UnfinishedQuote,
    /// The line ends with a lone backslash.
    TrailingEscape,
}

impl fmt::Display for LexingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexingError::UnfinishedQuote => f.write_str("unterminated quote"),
            LexingError::TrailingEscape => f.write_str("line ends with an escape character"),
        }
    }
}

impl std::error::Error for LexingError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    buffer: String,
    // Distinguishes `""` (an empty word) from no word at all.
    in_word: bool,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            buffer: String::new(),
            in_word: false,
        }
    }

    fn make_tokens(&mut self) -> Result<Vec<String>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start | LexingState::ReadingWord => self.handle_word(ch, &mut out)?,
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch)?,
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote | LexingState::ReadingDoubleQuote => {
                return Err(LexingError::UnfinishedQuote);
            }
            LexingState::Start | LexingState::ReadingWord => {}
        }

        self.finish_word(&mut out);
        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<String>) -> Result<(), LexingError> {
        match ch {
            ' ' | '\t' | '\n' | '\r' => {
                self.finish_word(out);
                self.state = LexingState::Start;
            }
            '&' | '|' | ';' | '<' | '>' => {
                self.finish_word(out);
                out.push(self.read_operator(ch));
                self.state = LexingState::Start;
            }
            '\'' => self.enter_quote(LexingState::ReadingSingleQuote),
            '"' => self.enter_quote(LexingState::ReadingDoubleQuote),
            '\\' => {
                let escaped = self.read_char().ok_or(LexingError::TrailingEscape)?;
                self.push_word_char(escaped);
            }
            c => self.push_word_char(c),
        }
        Ok(())
    }

    /// Reads the rest of an operator starting with `first`, preferring the
    /// two-character form (`&&`, `||`).
    fn read_operator(&mut self, first: char) -> String {
        let doubled = matches!(first, '&' | '|') && self.peek_char() == Some(first);
        if doubled {
            self.read_char();
            [first, first].iter().collect()
        } else {
            first.to_string()
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::ReadingWord,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) -> Result<(), LexingError> {
        match ch {
            '"' => self.state = LexingState::ReadingWord,
            '\\' if matches!(self.peek_char(), Some('"' | '\\')) => {
                let escaped = self.read_char().ok_or(LexingError::TrailingEscape)?;
                self.buffer.push(escaped);
            }
            c => self.buffer.push(c),
        }
        Ok(())
    }

    fn enter_quote(&mut self, state: LexingState) {
        self.in_word = true;
        self.state = state;
    }

    fn push_word_char(&mut self, ch: char) {
        self.in_word = true;
        self.buffer.push(ch);
        self.state = LexingState::ReadingWord;
    }

    fn finish_word(&mut self, out: &mut Vec<String>) {
        if self.in_word {
            out.push(std::mem::take(&mut self.buffer));
            self.in_word = false;
        }
    }
}

/// Tokenizes one input line.
///
/// An empty or blank line yields an empty vector.
pub fn split_into_tokens(line: &str) -> Result<Vec<String>, LexingError> {
    let mut lexer = LexingFSM::new(line);
    lexer.make_tokens()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(line: &str) -> Vec<String> {
        split_into_tokens(line).unwrap()
    }

    #[test]
    fn blank_line_has_no_tokens() {
        assert!(lex("").is_empty());
        assert!(lex("   \t ").is_empty());
    }

    #[test]
    fn splits_words_and_spaced_operators() {
        assert_eq!(
            lex("ls -l | wc -c > out.txt && status"),
            vec!["ls", "-l", "|", "wc", "-c", ">", "out.txt", "&&", "status"]
        );
    }

    #[test]
    fn splits_operators_glued_to_words() {
        assert_eq!(lex("a&&b||c;d&e"), vec!["a", "&&", "b", "||", "c", ";", "d", "&", "e"]);
        assert_eq!(lex("sort<in>out"), vec!["sort", "<", "in", ">", "out"]);
        assert_eq!(lex("a|b"), vec!["a", "|", "b"]);
    }

    #[test]
    fn quotes_join_into_one_word() {
        assert_eq!(lex(r#"echo "hello world" 'a b'c"#), vec!["echo", "hello world", "a bc"]);
        assert_eq!(lex(r#"printf "" x"#), vec!["printf", "", "x"]);
        assert_eq!(lex(r#"echo "say \"hi\"""#), vec!["echo", "say \"hi\""]);
    }

    #[test]
    fn quoted_operator_characters_stay_in_the_word() {
        assert_eq!(lex("echo 'a|b' \"c&&d\""), vec!["echo", "a|b", "c&&d"]);
    }

    #[test]
    fn backslash_escapes_outside_quotes() {
        assert_eq!(lex(r"echo a\ b \;"), vec!["echo", "a b", ";"]);
    }

    #[test]
    fn unfinished_input_is_an_error() {
        assert_eq!(split_into_tokens("echo 'abc"), Err(LexingError::UnfinishedQuote));
        assert_eq!(split_into_tokens("echo \"abc"), Err(LexingError::UnfinishedQuote));
        assert_eq!(split_into_tokens("echo \\"), Err(LexingError::TrailingEscape));
    }
}
