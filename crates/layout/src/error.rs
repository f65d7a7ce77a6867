//! Error kinds raised by the size, serialize, deserialize and discriminator
//! engines.
//!
//! Every engine raises at most one [`Error`] per call; errors that originate
//! inside a named item are wrapped in [`Error::InField`] on the way back up
//! so the caller can see which field went wrong without attaching a
//! backtrace.

use std::fmt;

/// Any failure produced while sizing, serializing, deserializing, or
/// building a discriminator for a [`crate::item::Layout`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A read would go past the end of the buffer (or sub-chunk).
    #[error("truncated: tried to read {requested} byte(s) with {remaining} remaining")]
    Truncated { requested: usize, remaining: usize },

    /// `deserialize` was asked to consume the whole buffer but bytes were left over.
    #[error("{extra} excess byte(s) left after decoding")]
    ExcessBytes { extra: usize },

    /// `serialize` computed a size but the write did not reach the end of the buffer.
    #[error("serialize computed size {computed} but wrote only {written} byte(s)")]
    UnderWrite { computed: usize, written: usize },

    /// Two sizes that are supposed to agree do not.
    #[error("size mismatch: expected {expected}, found {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A numeric value does not fit in its declared width, or is not an integer.
    #[error("value out of range for a {size}-byte {kind}")]
    OutOfRange { size: u8, kind: &'static str },

    /// A constant (numeric or byte) check failed.
    #[error("constant mismatch: expected {expected}, found {actual}")]
    ConstantMismatch { expected: String, actual: String },

    /// No switch branch claims the wire id that was read.
    #[error("no switch branch matches wire id {0}")]
    UnknownSwitchId(u64),

    /// `serialize` could not find a named field in the supplied data.
    #[error("field `{0}` is missing from the supplied data")]
    UnknownField(Box<str>),

    /// The size engine needed more data than was supplied to determine a size.
    #[error("incomplete data: {0}")]
    IncompleteData(String),

    /// An invariant of the layout algebra was violated.
    #[error("malformed layout: {0}")]
    MalformedLayout(String),

    /// Wraps an error that occurred while processing a named item, so the
    /// path to the offending field survives the walk back up the layout tree.
    #[error("in field `{name}`: {source}")]
    InField {
        name: Box<str>,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap `self` as having occurred while processing the field called `name`.
    ///
    /// Repeated wrapping (nested named items) produces a chain of
    /// [`Error::InField`]s; `Display` only prints the innermost one directly,
    /// but the chain is reachable through [`std::error::Error::source`].
    pub fn in_field(self, name: impl Into<Box<str>>) -> Error {
        Error::InField {
            name: name.into(),
            source: Box::new(self),
        }
    }

    /// The innermost, non-[`Error::InField`] error, for callers that only
    /// care about the error kind and not the field path.
    pub fn kind(&self) -> &Error {
        match self {
            Error::InField { source, .. } => source.kind(),
            other => other,
        }
    }
}

/// Renders the full dotted field path for an [`Error::InField`] chain, e.g.
/// `address.value`. Returns an empty string for errors with no field path.
pub fn field_path(err: &Error) -> String {
    let mut parts = Vec::new();
    let mut cur = err;
    while let Error::InField { name, source } = cur {
        parts.push(name.as_ref());
        cur = source;
    }
    parts.join(".")
}

impl fmt::Debug for FieldPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", field_path(self.0))
    }
}

/// A display-only wrapper produced by [`field_path`] callers that want a
/// `Debug`-able value rather than a freshly allocated `String`.
pub struct FieldPath<'a>(pub &'a Error);
