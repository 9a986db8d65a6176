//! Error types for building and preparing a filter.

use thiserror::Error;

/// Errors from parsing an expression or loading its external id lists.
#[derive(Error, Debug)]
pub enum FilterError {
    /// Syntax error at a byte offset in the input.
    #[error("parse error at offset {offset}: expecting {expected}")]
    Parse { offset: usize, expected: String },

    /// A well-formed construct used where its type or context forbids it.
    #[error("parse error at offset {offset}: {message}")]
    Context { offset: usize, message: String },

    /// Regex pattern that did not compile.
    #[error("invalid regex '{pattern}': {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to read id list '{path}': {source}")]
    IdListIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid id '{token}' in id list '{path}'")]
    IdListValue { path: String, token: String },
}

impl FilterError {
    /// Byte offset into the expression text, for errors that carry one.
    pub fn offset(&self) -> Option<usize> {
        match self {
            FilterError::Parse { offset, .. } | FilterError::Context { offset, .. } => {
                Some(*offset)
            }
            _ => None,
        }
    }
}

/// Render the input line containing `offset` with a caret underneath.
pub fn render_caret(input: &str, offset: usize) -> String {
    let offset = offset.min(input.len());
    let line_start = input[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = input[offset..]
        .find('\n')
        .map(|i| offset + i)
        .unwrap_or(input.len());
    let column = input[line_start..offset].chars().count();
    format!("{}\n{}^", &input[line_start..line_end], " ".repeat(column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_points_at_offset() {
        assert_eq!(render_caret("@id === 1", 5), "@id === 1\n     ^");
    }

    #[test]
    fn caret_at_end_of_input() {
        assert_eq!(render_caret("true and", 8), "true and\n        ^");
    }

    #[test]
    fn caret_picks_the_right_line() {
        let input = "true\nand @xyz";
        // Offset of '@' on the second line.
        assert_eq!(render_caret(input, 9), "and @xyz\n    ^");
    }
}
