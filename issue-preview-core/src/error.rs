//! Error types for issue-preview-core.

use thiserror::Error;

/// All errors that can arise while parsing an issue form template.
///
/// Every variant carries a human-readable location hint so the preview can
/// point at the offending part of the source document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The source is not well-formed YAML (or not UTF-8).
    ///
    /// `message` already embeds the line/column text produced by serde_yaml.
    #[error("syntax error: {message}")]
    Syntax {
        message: String,
        /// 1-based line, when the YAML parser reports one.
        line: Option<usize>,
        /// 1-based column, when the YAML parser reports one.
        column: Option<usize>,
    },

    /// The YAML is valid but does not describe a valid issue form.
    #[error("invalid template at {location}: {message}")]
    Schema { location: String, message: String },
}

impl ParseError {
    /// Short description of where the error was found.
    pub fn location(&self) -> String {
        match self {
            ParseError::Syntax { line, column, .. } => match (line, column) {
                (Some(line), Some(column)) => format!("line {line}, column {column}"),
                (Some(line), None) => format!("line {line}"),
                _ => "document".to_string(),
            },
            ParseError::Schema { location, .. } => location.clone(),
        }
    }

    pub(crate) fn schema(location: impl Into<String>, message: impl Into<String>) -> Self {
        ParseError::Schema {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl From<serde_yaml::Error> for ParseError {
    fn from(err: serde_yaml::Error) -> Self {
        let location = err.location();
        ParseError::Syntax {
            message: err.to_string(),
            line: location.as_ref().map(|l| l.line()),
            column: location.as_ref().map(|l| l.column()),
        }
    }
}
