//! POSIX-style word splitting and quoting for command lines.
//!
//! Used on compiler dry-run output and on flags printed by config tools.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShellWordsError {
    #[error("unterminated {0} quote in `{1}`")]
    Unterminated(char, String),
}

/// Split a line into words, honouring quotes and backslash escapes.
pub fn split(line: &str) -> Result<Vec<String>, ShellWordsError> {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Between,
        Word,
        Single,
        Double,
    }

    let mut words = Vec::new();
    let mut word = String::new();
    let mut state = State::Between;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match state {
            State::Between | State::Word => match c {
                c if c.is_whitespace() => {
                    if state == State::Word {
                        words.push(std::mem::take(&mut word));
                        state = State::Between;
                    }
                }
                '\'' => state = State::Single,
                '"' => state = State::Double,
                '\\' => {
                    if let Some(next) = chars.next() {
                        if next != '\n' {
                            word.push(next);
                        }
                    }
                    state = State::Word;
                }
                c => {
                    word.push(c);
                    state = State::Word;
                }
            },
            State::Single => match c {
                '\'' => state = State::Word,
                c => word.push(c),
            },
            State::Double => match c {
                '"' => state = State::Word,
                '\\' => match chars.next() {
                    Some(next @ ('"' | '\\' | '$' | '`')) => word.push(next),
                    Some('\n') => {}
                    Some(next) => {
                        word.push('\\');
                        word.push(next);
                    }
                    None => word.push('\\'),
                },
                c => word.push(c),
            },
        }
    }

    match state {
        State::Single => Err(ShellWordsError::Unterminated('\'', line.to_string())),
        State::Double => Err(ShellWordsError::Unterminated('"', line.to_string())),
        State::Word => {
            words.push(word);
            Ok(words)
        }
        State::Between => Ok(words),
    }
}

/// Quote a single word so that [`split`] yields it back unchanged.
pub fn quote(word: &str) -> String {
    if word.is_empty() {
        return "''".to_string();
    }
    let plain = word
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_=+./,:@%^".contains(c));
    if plain {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r#"'"'"'"#))
}

/// Quote and join words into one command-line fragment.
pub fn join<I, S>(words: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    words
        .into_iter()
        .map(|w| quote(w.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}
