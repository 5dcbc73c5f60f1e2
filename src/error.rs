//! Error types shared across the crate.
//!
//! # Responsibilities
//! - Describe parse failures with line/column diagnostics
//! - Describe node ↔ value conversion failures with their node path
//! - Aggregate field-level failures (primary error plus suppressed ones)
//!
//! # Design Decisions
//! - `thiserror` for every public error enum
//! - Serialization errors pick up their path lazily, on the way out

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::node::NodePath;

/// Top-level error for loading, saving and referencing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Malformed source data.
    #[error(transparent)]
    Parsing(#[from] ParsingError),

    /// A value could not be converted to or from a node.
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// Filesystem failure during load or save.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file watcher could not be set up.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// The loader does not support the requested direction.
    #[error("Loader cannot {0}")]
    Unsupported(&'static str),

    /// The reference has been closed.
    #[error("Configuration reference is closed")]
    Closed,

    /// The watched source went away.
    #[error("Watch source closed: {0}")]
    SourceClosed(String),

    /// An asynchronous task was dropped before reporting a result.
    #[error("Task failed: {0}")]
    Task(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Malformed source data, with optional position information.
#[derive(Debug, Clone, Error)]
#[error("{}", self.describe())]
pub struct ParsingError {
    /// Human readable description from the format parser.
    pub message: String,
    /// 1-based line, when known.
    pub line: Option<usize>,
    /// 1-based column, when known.
    pub column: Option<usize>,
    /// The offending source line, when known.
    pub context: Option<String>,
    /// Source file, when loading from disk.
    pub source_path: Option<PathBuf>,
}

impl ParsingError {
    /// Create an error without position information.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
            context: None,
            source_path: None,
        }
    }

    /// Attach a 1-based position.
    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Attach the source line the error occurred on.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Attach the file being parsed.
    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    /// Build from a byte offset into `content`, filling line, column and context.
    pub fn from_offset(message: impl Into<String>, content: &str, offset: usize) -> Self {
        let offset = offset.min(content.len());
        let before = &content[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = before[line_start..].chars().count() + 1;
        let context = content[line_start..].lines().next().unwrap_or_default();
        Self::new(message).at(line, column).with_context(context)
    }

    fn describe(&self) -> String {
        let mut out = String::new();
        if let Some(path) = &self.source_path {
            out.push_str(&format!("{}: ", path.display()));
        }
        out.push_str(&self.message);
        if let (Some(line), Some(column)) = (self.line, self.column) {
            out.push_str(&format!(" (line {line}, column {column})"));
        }
        if let Some(context) = &self.context {
            out.push_str(&format!("\n  {context}"));
            if let Some(column) = self.column {
                out.push_str(&format!("\n  {}^", " ".repeat(column.saturating_sub(1))));
            }
        }
        out
    }
}

/// What went wrong while converting between a node and a value.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// Type mismatch or lossy narrowing of a scalar.
    Coercion { value: String, target: String },
    /// No registered serializer matches the requested type.
    NoSerializer,
    /// A field constraint rejected the value.
    Constraint(String),
    /// Missing, unknown or non-conforming discriminator.
    Polymorphism(String),
    /// Anything else.
    Message(String),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Coercion { value, target } => {
                write!(f, "Failed to coerce input value `{value}` to {target}")
            }
            ErrorKind::NoSerializer => write!(f, "No applicable type serializer for type"),
            ErrorKind::Constraint(msg) => f.write_str(msg),
            ErrorKind::Polymorphism(msg) => f.write_str(msg),
            ErrorKind::Message(msg) => f.write_str(msg),
        }
    }
}

/// Failure converting a node to a value or a value to a node.
///
/// When several fields of one object fail, the first failure is returned
/// and the others are attached as [`suppressed`](Self::suppressed).
#[derive(Debug, Clone, Error)]
#[error("{}", self.describe())]
pub struct SerializationError {
    kind: ErrorKind,
    path: Option<NodePath>,
    type_name: Option<String>,
    suppressed: Vec<SerializationError>,
}

/// Result type for serialization operations.
pub type SerializationResult<T> = Result<T, SerializationError>;

impl SerializationError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: None,
            type_name: None,
            suppressed: Vec::new(),
        }
    }

    /// A scalar could not be coerced to `target`.
    pub fn coercion(value: impl fmt::Display, target: impl Into<String>) -> Self {
        Self::new(ErrorKind::Coercion {
            value: value.to_string(),
            target: target.into(),
        })
    }

    /// No serializer is registered for `type_name`.
    pub fn no_serializer(type_name: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoSerializer).with_type(type_name)
    }

    /// A constraint rejected the value.
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Constraint(message.into()))
    }

    /// Discriminator failure for a polymorphic value.
    pub fn polymorphism(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Polymorphism(message.into()))
    }

    /// Free-form failure.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Message(message.into()))
    }

    /// Set the node path unless one is already recorded.
    pub fn with_path(mut self, path: &NodePath) -> Self {
        if self.path.is_none() {
            self.path = Some(path.clone());
        }
        self
    }

    /// Set the type name unless one is already recorded.
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        if self.type_name.is_none() {
            self.type_name = Some(type_name.into());
        }
        self
    }

    /// Attach a secondary failure.
    pub fn add_suppressed(&mut self, other: SerializationError) {
        self.suppressed.push(other);
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn path(&self) -> Option<&NodePath> {
        self.path.as_ref()
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn suppressed(&self) -> &[SerializationError] {
        &self.suppressed
    }

    fn describe(&self) -> String {
        let mut out = String::new();
        if let Some(path) = &self.path {
            out.push_str(&format!("{path}"));
            if let Some(ty) = &self.type_name {
                out.push_str(&format!(" of type {ty}"));
            }
            out.push_str(": ");
        } else if let Some(ty) = &self.type_name {
            out.push_str(&format!("{ty}: "));
        }
        out.push_str(&self.kind.to_string());
        if !self.suppressed.is_empty() {
            out.push_str(&format!(" (and {} more)", self.suppressed.len()));
        }
        out
    }
}

/// Collects failures, keeping the first as the primary error.
#[derive(Debug, Default)]
pub(crate) struct ErrorCollector {
    primary: Option<SerializationError>,
}

impl ErrorCollector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, error: SerializationError) {
        match &mut self.primary {
            Some(primary) => primary.add_suppressed(error),
            None => self.primary = Some(error),
        }
    }

    pub(crate) fn finish(self) -> SerializationResult<()> {
        match self.primary {
            Some(primary) => Err(primary),
            None => Ok(()),
        }
    }
}
