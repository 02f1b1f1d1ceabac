//! Unified error types for amf-codec

use std::fmt;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Stable classification of every failure the codec can surface
///
/// Brokers map these onto fault replies without inspecting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad marker, out-of-range length, invalid UTF-8 or a dangling reference
    MalformedInput,
    /// The stream ended in the middle of a value
    TruncatedInput,
    /// A configured depth or table-size cap was hit
    LimitExceeded,
    /// No translation strategy or registration exists for a type
    UnknownType,
    /// The validator declined to allow an instantiation
    CreationRejected,
    /// The validator declined one assignment (never raised, only reported)
    AssignmentRejected,
    /// Invalid configuration supplied by the caller
    InvalidConfig,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::MalformedInput => "malformed input",
            ErrorKind::TruncatedInput => "truncated input",
            ErrorKind::LimitExceeded => "limit exceeded",
            ErrorKind::UnknownType => "unknown type",
            ErrorKind::CreationRejected => "creation rejected",
            ErrorKind::AssignmentRejected => "assignment rejected",
            ErrorKind::InvalidConfig => "invalid configuration",
        };
        f.write_str(name)
    }
}

/// Unified error type for all codec operations
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// AMF encoding/decoding error
    Amf(AmfError),
    /// Wire graph to host value translation error
    Translation(TranslationError),
    /// Invalid configuration
    Config(String),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Amf(e) => e.kind(),
            Error::Translation(e) => e.kind(),
            Error::Config(_) => ErrorKind::InvalidConfig,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Amf(e) => write!(f, "AMF error: {}", e),
            Error::Translation(e) => write!(f, "Translation error: {}", e),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Amf(e) => Some(e),
            Error::Translation(e) => Some(e),
            Error::Config(_) => None,
        }
    }
}

impl From<AmfError> for Error {
    fn from(err: AmfError) -> Self {
        Error::Amf(err)
    }
}

impl From<TranslationError> for Error {
    fn from(err: TranslationError) -> Self {
        Error::Translation(err)
    }
}

/// Which per-pass reference table a handle points into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    String,
    Object,
    Traits,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::String => f.write_str("string"),
            TableKind::Object => f.write_str("object"),
            TableKind::Traits => f.write_str("traits"),
        }
    }
}

/// AMF encoding/decoding errors
///
/// Offsets are relative to the start of the top-level decode call.
#[derive(Debug, Clone, PartialEq)]
pub enum AmfError {
    UnknownMarker { marker: u8, offset: usize },
    UnexpectedEof { offset: usize },
    InvalidUtf8 { offset: usize },
    InvalidReference { table: TableKind, index: u32, offset: usize },
    InvalidLength { length: u64, offset: usize },
    InvalidObjectEnd { offset: usize },
    DuplicateMember { type_name: String, member: String },
    EmptyKey,
    NestingTooDeep { max: usize },
    TooManyReferences { table: TableKind, max: usize },
    IntegerOutOfRange(u32),
    UnsupportedVersion(u16),
    UnknownExternalizable(String),
    DanglingNode(u32),
}

impl AmfError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AmfError::UnexpectedEof { .. } => ErrorKind::TruncatedInput,
            AmfError::NestingTooDeep { .. } | AmfError::TooManyReferences { .. } => {
                ErrorKind::LimitExceeded
            }
            AmfError::UnknownExternalizable(_) => ErrorKind::UnknownType,
            _ => ErrorKind::MalformedInput,
        }
    }

    /// Byte offset the error was detected at, when known
    pub fn offset(&self) -> Option<usize> {
        match self {
            AmfError::UnknownMarker { offset, .. }
            | AmfError::UnexpectedEof { offset }
            | AmfError::InvalidUtf8 { offset }
            | AmfError::InvalidReference { offset, .. }
            | AmfError::InvalidLength { offset, .. }
            | AmfError::InvalidObjectEnd { offset } => Some(*offset),
            _ => None,
        }
    }
}

impl fmt::Display for AmfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmfError::UnknownMarker { marker, offset } => {
                write!(f, "Unknown AMF marker: 0x{:02x} at offset {}", marker, offset)
            }
            AmfError::UnexpectedEof { offset } => {
                write!(f, "Unexpected end of AMF data at offset {}", offset)
            }
            AmfError::InvalidUtf8 { offset } => {
                write!(f, "Invalid UTF-8 in AMF string at offset {}", offset)
            }
            AmfError::InvalidReference { table, index, offset } => write!(
                f,
                "Invalid AMF {} reference: {} at offset {}",
                table, index, offset
            ),
            AmfError::InvalidLength { length, offset } => {
                write!(f, "Invalid AMF length: {} at offset {}", length, offset)
            }
            AmfError::InvalidObjectEnd { offset } => {
                write!(f, "Invalid object end marker at offset {}", offset)
            }
            AmfError::DuplicateMember { type_name, member } => write!(
                f,
                "Duplicate member '{}' in traits of '{}'",
                member, type_name
            ),
            AmfError::EmptyKey => write!(f, "Empty key in associative or dynamic members"),
            AmfError::NestingTooDeep { max } => {
                write!(f, "AMF nesting too deep (max {})", max)
            }
            AmfError::TooManyReferences { table, max } => {
                write!(f, "AMF {} table exceeds {} entries", table, max)
            }
            AmfError::IntegerOutOfRange(v) => {
                write!(f, "Integer {} out of range for U29 encoding", v)
            }
            AmfError::UnsupportedVersion(v) => write!(f, "Unsupported AMF version: {}", v),
            AmfError::UnknownExternalizable(name) => {
                write!(f, "No externalizer registered for type '{}'", name)
            }
            AmfError::DanglingNode(id) => write!(f, "Value refers to missing graph node {}", id),
        }
    }
}

impl std::error::Error for AmfError {}

/// Errors raised while materializing host values from a wire graph
#[derive(Debug, Clone, PartialEq)]
pub enum TranslationError {
    CreationRejected { type_name: String },
    UnknownType { type_name: String },
    UnsupportedConversion { from: &'static str, to: String },
    InvalidValue { type_name: String, reason: String },
    UnknownProperty { type_name: String, property: String },
    XmlNotAllowed,
    NestingTooDeep { max: usize },
    DanglingNode(u32),
}

impl TranslationError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranslationError::CreationRejected { .. } | TranslationError::XmlNotAllowed => {
                ErrorKind::CreationRejected
            }
            TranslationError::UnknownType { .. } | TranslationError::UnsupportedConversion { .. } => {
                ErrorKind::UnknownType
            }
            TranslationError::NestingTooDeep { .. } => ErrorKind::LimitExceeded,
            TranslationError::InvalidValue { .. }
            | TranslationError::UnknownProperty { .. }
            | TranslationError::DanglingNode(_) => ErrorKind::MalformedInput,
        }
    }
}

impl fmt::Display for TranslationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslationError::CreationRejected { type_name } => {
                write!(f, "Creation of type '{}' rejected by validator", type_name)
            }
            TranslationError::UnknownType { type_name } => {
                write!(f, "Unknown type '{}'", type_name)
            }
            TranslationError::UnsupportedConversion { from, to } => {
                write!(f, "Cannot translate {} into {}", from, to)
            }
            TranslationError::InvalidValue { type_name, reason } => {
                write!(f, "Invalid value for '{}': {}", type_name, reason)
            }
            TranslationError::UnknownProperty { type_name, property } => {
                write!(f, "Type '{}' has no property '{}'", type_name, property)
            }
            TranslationError::XmlNotAllowed => write!(f, "XML content is not allowed"),
            TranslationError::NestingTooDeep { max } => {
                write!(f, "Translation nesting too deep (max {})", max)
            }
            TranslationError::DanglingNode(id) => {
                write!(f, "Value refers to missing graph node {}", id)
            }
        }
    }
}

impl std::error::Error for TranslationError {}
