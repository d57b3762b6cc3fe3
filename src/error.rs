use std::fmt;
use std::path::PathBuf;

/// Where in the input an error originated, when known.
///
/// Populated by the MEF reader (`mef::reader`) from the XML buffer
/// position; `None` for errors raised against a model built
/// programmatically (e.g. in tests).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSpan {
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
}

impl SourceSpan {
    pub fn new(file: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            file: Some(file.into()),
            line: Some(line),
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}", file.display(), line),
            (Some(file), None) => write!(f, "{}", file.display()),
            _ => write!(f, "<unknown location>"),
        }
    }
}

/// The error taxonomy of the core, one kind per spec.md §7.
///
/// Every user-surfaced variant carries a [`SourceSpan`] so diagnostics can
/// point back at the offending MEF element. `Logic` is reserved for
/// internal invariant violations (bugs) and is never expected in normal
/// operation.
#[derive(Debug, thiserror::Error)]
pub enum ScramError {
    #[error("I/O error at {span}: {message}")]
    Io { message: String, span: SourceSpan },

    #[error("invalid argument at {span}: {message}")]
    InvalidArgument { message: String, span: SourceSpan },

    #[error("internal logic error: {0}")]
    Logic(String),

    #[error("illegal operation at {span}: {message}")]
    IllegalOperation { message: String, span: SourceSpan },

    #[error("settings error: {0}")]
    Settings(String),

    #[error("validation error at {span}: {message}")]
    Validation { message: String, span: SourceSpan },

    #[error("redefinition of '{id}' at {span}")]
    Redefinition { id: String, span: SourceSpan },

    #[error("duplicate argument '{id}' in formula at {span}")]
    DuplicateArgument { id: String, span: SourceSpan },

    #[error("undefined element '{id}' referenced at {span}")]
    UndefinedElement { id: String, span: SourceSpan },

    #[error("cycle detected: {}", .cycle.join(" -> "))]
    Cycle { cycle: Vec<String>, span: SourceSpan },
}

impl ScramError {
    pub fn span(&self) -> SourceSpan {
        match self {
            ScramError::Io { span, .. }
            | ScramError::InvalidArgument { span, .. }
            | ScramError::IllegalOperation { span, .. }
            | ScramError::Validation { span, .. }
            | ScramError::Redefinition { span, .. }
            | ScramError::DuplicateArgument { span, .. }
            | ScramError::UndefinedElement { span, .. }
            | ScramError::Cycle { span, .. } => span.clone(),
            ScramError::Logic(_) | ScramError::Settings(_) => SourceSpan::unknown(),
        }
    }

    /// Process exit code per spec.md §6: 0 success, 1 validation error,
    /// 2 I/O error, 3 internal/logic error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ScramError::Io { .. } => 2,
            ScramError::Logic(_) => 3,
            ScramError::Settings(_) => 1,
            ScramError::InvalidArgument { .. }
            | ScramError::IllegalOperation { .. }
            | ScramError::Validation { .. }
            | ScramError::Redefinition { .. }
            | ScramError::DuplicateArgument { .. }
            | ScramError::UndefinedElement { .. }
            | ScramError::Cycle { .. } => 1,
        }
    }

    pub fn validation(message: impl Into<String>, span: SourceSpan) -> Self {
        ScramError::Validation {
            message: message.into(),
            span,
        }
    }

    pub fn invalid_argument(message: impl Into<String>, span: SourceSpan) -> Self {
        ScramError::InvalidArgument {
            message: message.into(),
            span,
        }
    }
}

impl From<std::io::Error> for ScramError {
    fn from(e: std::io::Error) -> Self {
        ScramError::Io {
            message: e.to_string(),
            span: SourceSpan::unknown(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScramError>;
