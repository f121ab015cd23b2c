use core::fmt;

/// Errors returned by table operations.
///
/// A failed operation leaves the table's contents unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// The key is already present. Inserts never overwrite.
    DuplicateKey,
    /// The key is not present.
    KeyNotFound,
    /// An open-addressing insert exhausted its probe sequence without
    /// finding a free slot. The load-factor policy keeps this unreachable.
    TableFull,
    /// A cuckoo insert kept cycling after a full rehash.
    InsertionFailed,
    /// A constructor argument was out of range.
    InvalidArgument {
        /// What was wrong with the argument.
        reason: &'static str,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DuplicateKey => write!(f, "key is already present"),
            Error::KeyNotFound => write!(f, "key not found"),
            Error::TableFull => write!(f, "no free slot found within the probe bound"),
            Error::InsertionFailed => {
                write!(f, "cuckoo insertion cycled after a full rehash")
            }
            Error::InvalidArgument { reason } => write!(f, "invalid argument: {}", reason),
        }
    }
}

impl core::error::Error for Error {}

/// Result alias for table operations.
pub type Result<T> = core::result::Result<T, Error>;
