/*!
Specialized `Error` and `Result` types for cachedump.
*/

use std::{convert, error, fmt, result};

/// Specialized `Error` type for cachedump errors.
///
/// Every variant is recoverable at the granularity of a single cache type request.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Error {
    /// Generic error type containing a string
    Other(&'static str),
    /// Unknown layout.
    ///
    /// The requested key is not present in the registry.
    /// Contains a printable form of the key.
    UnknownLayout(String),
    /// Schema error.
    ///
    /// The external layout schema of `cpu` could not be turned into a layout.
    /// `cache_type` is empty when the whole document is unusable.
    Schema {
        cpu: String,
        cache_type: String,
        reason: String,
    },
    /// Out of bounds.
    ///
    /// The requested region (or row count, for merges) does not fit into what is available.
    Bounds {
        what: &'static str,
        required: u64,
        available: u64,
    },
    /// Invalid layout.
    ///
    /// A field or layout descriptor is internally inconsistent.
    Layout(String),
    /// IO error
    ///
    /// Catch-all for io related errors.
    IO(&'static str),
}

/// Convert from &str to error
impl convert::From<&'static str> for Error {
    fn from(error: &'static str) -> Self {
        Error::Other(error)
    }
}

impl Error {
    pub fn schema<C, T, R>(cpu: C, cache_type: T, reason: R) -> Self
    where
        C: Into<String>,
        T: Into<String>,
        R: Into<String>,
    {
        Error::Schema {
            cpu: cpu.into(),
            cache_type: cache_type.into(),
            reason: reason.into(),
        }
    }

    pub fn layout<S: Into<String>>(reason: S) -> Self {
        Error::Layout(reason.into())
    }

    pub fn bytes(required: u64, available: u64) -> Self {
        Error::Bounds {
            what: "bytes",
            required,
            available,
        }
    }

    /// Returns a simple string representation of the error category.
    pub fn to_str(&self) -> &'static str {
        match self {
            Error::Other(_) => "other error",
            Error::UnknownLayout(_) => "layout not supported",
            Error::Schema { .. } => "schema error",
            Error::Bounds { .. } => "out of bounds",
            Error::Layout(_) => "invalid layout",
            Error::IO(_) => "io error",
        }
    }

    /// Logs the error as a warning and hands it back.
    pub fn log_warn(self, context: impl fmt::Display) -> Self {
        log::warn!("{}: {}", context, self);
        self
    }

    /// Logs the error and hands it back.
    pub fn log_error(self, context: impl fmt::Display) -> Self {
        log::error!("{}: {}", context, self);
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let desc = self.to_str();
        match self {
            Error::Other(e) | Error::IO(e) => write!(f, "{}: {}", desc, e),
            Error::UnknownLayout(key) => write!(f, "{}: {}", desc, key),
            Error::Schema {
                cpu,
                cache_type,
                reason,
            } => {
                if cache_type.is_empty() {
                    write!(f, "{} in {}: {}", desc, cpu, reason)
                } else {
                    write!(f, "{} in {}/{}: {}", desc, cpu, cache_type, reason)
                }
            }
            Error::Bounds {
                what,
                required,
                available,
            } => write!(
                f,
                "{}: {} {} required, {} available",
                desc, required, what, available
            ),
            Error::Layout(e) => write!(f, "{}: {}", desc, e),
        }
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        self.to_str()
    }
}

/// Specialized `Result` type for cachedump results.
pub type Result<T> = result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn display_bounds() {
        let err = Error::bytes(0x40, 0x20);
        assert_eq!(
            err.to_string(),
            "out of bounds: 64 bytes required, 32 available"
        );
    }

    #[test]
    pub fn display_schema() {
        let err = Error::schema("kryo3xx-gold", "L1_DCache_TAG", "missing field `numSets`");
        assert_eq!(
            err.to_string(),
            "schema error in kryo3xx-gold/L1_DCache_TAG: missing field `numSets`"
        );

        let err = Error::schema("kryo3xx-gold", "", "expected value at line 1 column 1");
        assert_eq!(
            err.to_string(),
            "schema error in kryo3xx-gold: expected value at line 1 column 1"
        );
    }

    #[test]
    pub fn from_str() {
        let err: Error = "not found".into();
        assert_eq!(err, Error::Other("not found"));
        assert_eq!(err.to_str(), "other error");
    }
}
