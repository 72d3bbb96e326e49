use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::result;
use std::str::Utf8Error;

use crate::primitive::PrimitiveKind;

// Error data structures are modeled just like in the `csv` crate by BurntSushi.

pub(crate) fn new_error(kind: ErrorKind) -> Error {
    Error(Box::new(kind))
}

pub(crate) fn new_malformed_error(kind: MalformedInput) -> Error {
    Error(Box::new(ErrorKind::Malformed(kind)))
}

pub(crate) fn new_unsupported_error(kind: UnsupportedFormat) -> Error {
    Error(Box::new(ErrorKind::Unsupported(kind)))
}

pub(crate) fn new_protobuf_error(err: protobuf::Error, location: &'static str) -> Error {
    new_malformed_error(MalformedInput::Protobuf { err, location })
}

/// A type alias for `Result<T, phaeton::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// The boxed error type a [`Handler`](crate::Handler) may fail with.
pub type HandlerError = Box<dyn StdError + Send + Sync + 'static>;

/// An error that can occur while decoding an extract or dispatching its primitives.
#[derive(Debug)]
pub struct Error(Box<ErrorKind>);

impl Error {
    /// Return the specific type of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Unwrap this error into its underlying type.
    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// Short name of the error class, suitable as a prefix for user-facing messages.
    pub fn category(&self) -> &'static str {
        match *self.0 {
            ErrorKind::NotFound { .. } => "not found",
            ErrorKind::Io(_) => "io",
            ErrorKind::Malformed(_) => "malformed input",
            ErrorKind::Unsupported(_) => "unsupported format",
            ErrorKind::Dispatch { .. } => "dispatch",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(*self.0, ErrorKind::NotFound { .. })
    }

    pub fn is_malformed(&self) -> bool {
        matches!(*self.0, ErrorKind::Malformed(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(*self.0, ErrorKind::Unsupported(_))
    }

    pub fn is_dispatch(&self) -> bool {
        matches!(*self.0, ErrorKind::Dispatch { .. })
    }
}

/// The specific type of an error.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The input path does not resolve to a readable file.
    NotFound { path: PathBuf, err: io::Error },
    /// Reading from an already opened source failed.
    Io(io::Error),
    /// The extract failed structural validation.
    Malformed(MalformedInput),
    /// The extract is valid but uses an encoding this reader does not implement.
    Unsupported(UnsupportedFormat),
    /// A handler failed while processing a primitive.
    Dispatch {
        kind: PrimitiveKind,
        id: u64,
        err: HandlerError,
    },
}

/// Structural problems found while decoding an extract.
#[derive(Debug)]
#[non_exhaustive]
pub enum MalformedInput {
    /// The 4-byte length prefix of a blob header is incomplete.
    InvalidHeaderSize,
    HeaderTooBig { size: u64 },
    MessageTooBig { size: u64 },
    /// The blob header announces a negative data size.
    InvalidBlobSize { size: i32 },
    /// The stream ended inside a blob that announced `expected` bytes.
    Truncated { expected: u64, offset: u64 },
    Protobuf {
        err: protobuf::Error,
        location: &'static str,
    },
    /// The blob carries no data field at all.
    EmptyBlob,
    /// The zlib stream of a blob is corrupt.
    Decompression(io::Error),
    UnknownBlobType(String),
    /// The first blob of the extract is not an `OSMHeader` blob.
    MissingHeaderBlock,
    /// An `OSMHeader` blob appeared after the first blob.
    UnexpectedHeaderBlock,
    RawSizeMismatch { expected: u64, actual: u64 },
    StringtableIndexOutOfBounds { index: usize },
    Utf8(Utf8Error),
    NegativeId { id: i64 },
    UnknownMemberType { value: i32 },
    /// The parallel arrays of a dense node group have different lengths.
    InconsistentDenseNodes,
    /// The parallel arrays of a node, way or relation have different lengths.
    InconsistentArrays { field: &'static str },
    /// Delta decoding or scaling of a value leaves the `i64` range.
    Overflow { field: &'static str },
}

/// Recognized encodings that are not implemented.
#[derive(Debug)]
#[non_exhaustive]
pub enum UnsupportedFormat {
    /// The header block requires a feature this reader does not implement.
    RequiredFeature(String),
    /// The blob is compressed with the named algorithm.
    Compression(&'static str),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        new_error(ErrorKind::Io(err))
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self.0 {
            ErrorKind::NotFound { ref err, .. } => Some(err),
            ErrorKind::Io(ref err) => Some(err),
            ErrorKind::Malformed(MalformedInput::Protobuf { ref err, .. }) => Some(err),
            ErrorKind::Malformed(MalformedInput::Utf8(ref err)) => Some(err),
            ErrorKind::Malformed(MalformedInput::Decompression(ref err)) => Some(err),
            ErrorKind::Dispatch { ref err, .. } => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self.0 {
            ErrorKind::NotFound { ref path, ref err } => {
                write!(f, "cannot open '{}': {}", path.display(), err)
            }
            ErrorKind::Io(ref err) => err.fmt(f),
            ErrorKind::Malformed(ref kind) => kind.fmt(f),
            ErrorKind::Unsupported(ref kind) => kind.fmt(f),
            ErrorKind::Dispatch { kind, id, ref err } => {
                write!(f, "handler failed on {kind} {id}: {err}")
            }
        }
    }
}

impl fmt::Display for MalformedInput {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MalformedInput::InvalidHeaderSize => {
                write!(f, "blob header size could not be decoded")
            }
            MalformedInput::HeaderTooBig { size } => {
                write!(f, "blob header is too big: {size} bytes")
            }
            MalformedInput::MessageTooBig { size } => {
                write!(f, "blob message is too big: {size} bytes")
            }
            MalformedInput::InvalidBlobSize { size } => {
                write!(f, "blob header announces invalid data size {size}")
            }
            MalformedInput::Truncated { expected, offset } => {
                write!(
                    f,
                    "extract is truncated: expected {expected} bytes at offset {offset}"
                )
            }
            MalformedInput::Protobuf { ref err, location } => {
                write!(f, "protobuf error at '{location}': {err}")
            }
            MalformedInput::EmptyBlob => {
                write!(f, "blob is missing a data field")
            }
            MalformedInput::Decompression(ref err) => {
                write!(f, "failed to decompress blob: {err}")
            }
            MalformedInput::UnknownBlobType(ref name) => {
                write!(f, "unknown blob type '{name}'")
            }
            MalformedInput::MissingHeaderBlock => {
                write!(f, "extract does not start with an OSMHeader blob")
            }
            MalformedInput::UnexpectedHeaderBlock => {
                write!(f, "unexpected OSMHeader blob after the first blob")
            }
            MalformedInput::RawSizeMismatch { expected, actual } => {
                write!(
                    f,
                    "decoded blob has {actual} bytes but its raw_size is {expected}"
                )
            }
            MalformedInput::StringtableIndexOutOfBounds { index } => {
                write!(f, "stringtable index out of bounds: {index}")
            }
            MalformedInput::Utf8(ref err) => {
                write!(f, "invalid string in stringtable: {err}")
            }
            MalformedInput::NegativeId { id } => {
                write!(f, "negative identifier {id}")
            }
            MalformedInput::UnknownMemberType { value } => {
                write!(f, "unknown relation member type {value}")
            }
            MalformedInput::InconsistentDenseNodes => {
                write!(f, "dense node arrays have different lengths")
            }
            MalformedInput::InconsistentArrays { field } => {
                write!(f, "{field} arrays have different lengths")
            }
            MalformedInput::Overflow { field } => {
                write!(f, "integer overflow while decoding {field}")
            }
        }
    }
}

impl fmt::Display for UnsupportedFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            UnsupportedFormat::RequiredFeature(ref feature) => {
                write!(f, "required feature '{feature}' is not supported")
            }
            UnsupportedFormat::Compression(name) => {
                write!(f, "{name} compressed blobs are not supported")
            }
        }
    }
}
