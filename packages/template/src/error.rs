//! Error types for template compilation and rendering.

use urlstore_core::Error;

/// Errors raised while scanning, analyzing or interpreting a template.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemplateError {
    /// A `{` was never closed.
    #[error("unbalanced brace: tag opened at offset {offset} is never closed")]
    UnbalancedBrace { offset: usize },

    /// A `{` appeared inside an open tag.
    #[error("overlapping open brace at offset {offset}")]
    OverlappingOpenBrace { offset: usize },

    /// A quoted string ran to the end of the input.
    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },

    /// A block directive was never closed with `.end`.
    #[error("missing .end for .{directive}")]
    MissingEndDirective { directive: String },

    /// A directive name that is not recognized.
    #[error("unknown directive '.{name}' at offset {offset}")]
    UnknownDirective { name: String, offset: usize },

    /// A directive that is not valid where it appears.
    #[error("unexpected directive '.{name}' at offset {offset}")]
    UnexpectedDirective { name: String, offset: usize },

    /// Malformed tag content.
    #[error("unexpected {token} at offset {offset}")]
    UnknownToken { token: String, offset: usize },

    /// A field was requested on a value that has no fields.
    #[error("field '{field}' requested on a {found} context")]
    ContextNotContainer { field: String, found: &'static str },

    /// No function is registered under the name.
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    /// The value has no text form.
    #[error("cannot render a {kind} as text")]
    ValueNotStringCoercible { kind: &'static str },

    /// A fragment-only load had nothing to resolve against.
    #[error("cannot load '{url}': no item or base url to resolve it against")]
    MissingBaseForFragmentLoad { url: String },

    /// A function failed.
    #[error("function '{name}' failed: {message}")]
    Function { name: String, message: String },

    /// A store operation failed while rendering.
    #[error(transparent)]
    Store(#[from] Error),
}

impl TemplateError {
    /// Shorthand for a function failure.
    pub fn function(name: impl Into<String>, message: impl Into<String>) -> Self {
        TemplateError::Function {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;
