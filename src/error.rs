use std::fmt;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Which counter moved backwards between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Download,
    Upload,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Download => f.write_str("receive"),
            Direction::Upload => f.write_str("transmit"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{context} ({})", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("interface '{0}' not present in counter report")]
    NotFound(String),

    #[error("malformed counter report: {0}")]
    Parse(String),

    #[error("{} line {line}: {reason}", .path.display())]
    Format {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{direction} counter went backwards ({previous} -> {current}); interface reset or counter rollover")]
    RateAnomaly {
        direction: Direction,
        previous: u64,
        current: u64,
    },

    #[error("elapsed time between snapshots is zero")]
    InvalidInterval,
}

impl Error {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            context,
            path: path.into(),
            source,
        }
    }

    /// Process exit code reported by the binary for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::NotFound(_) => 2,
            Error::Parse(_) | Error::Format { .. } => 3,
            Error::RateAnomaly { .. } | Error::InvalidInterval => 4,
            Error::Io { .. } => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_kind() {
        let io = Error::io(
            "read counters",
            "/proc/net/dev",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(io.exit_code(), 5);
        assert_eq!(Error::NotFound("eth0".into()).exit_code(), 2);
        assert_eq!(Error::Parse("x".into()).exit_code(), 3);
        assert_eq!(Error::InvalidInterval.exit_code(), 4);
        assert!(io.to_string().contains("/proc/net/dev"));
    }

    #[test]
    fn anomaly_message_names_direction() {
        let err = Error::RateAnomaly {
            direction: Direction::Download,
            previous: 100,
            current: 50,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("receive counter went backwards"));
        assert!(msg.contains("100 -> 50"));
    }
}
