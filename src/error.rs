//! Error types surfaced to callers.
//!
//! Problems confined to a single settings line never become errors; they are
//! logged and reported as [`SettingsIssue`]s in a
//! [`LoadReport`](crate::settings::LoadReport).

use thiserror::Error;

/// Failures that abort a whole configuration load.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read the settings file: it is empty")]
    Unreadable,

    #[error("Could not fetch the settings file {path}: {source}")]
    Fetch {
        path: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Recoverable problems found while applying a settings file.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsIssue {
    #[error("line {line}: could not parse a settings line: {text:?}")]
    MalformedLine { line: usize, text: String },

    #[error("line {line}: unknown setting: {key}")]
    UnknownDirective { line: usize, key: String },

    #[error("line {line}: error parsing setting {kind} {token:?}")]
    InvalidValue {
        line: usize,
        kind: ValueKind,
        token: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Number,
    Hex,
    Color,
    Shape,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ValueKind::Number => "number",
            ValueKind::Hex => "hex number",
            ValueKind::Color => "color",
            ValueKind::Shape => "shape",
        })
    }
}

/// A single token that could not be parsed as the expected kind of value.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{token:?} is not a valid {kind}")]
pub struct ValueParseError {
    pub kind: ValueKind,
    pub token: String,
}

/// Failures of VR presentation control.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DisplayError {
    #[error("Already started")]
    AlreadyStarted,

    #[error("No vr display was found")]
    NoDeviceAvailable,

    #[error("The display rejected the presentation request: {0}")]
    PresentRejected(String),

    #[error("The display rejected the request to exit presentation: {0}")]
    ExitRejected(String),
}
