use std::path::PathBuf;
use thiserror::Error;

/// Failures that decide how a packaging run ends.
#[derive(Debug, Error)]
pub enum PackError {
    /// The install root is not a usable directory.
    #[error("install root '{}' is not a directory", .0.display())]
    InvalidRoot(PathBuf),

    /// The external archiver ran but reported failure.
    #[error("archiver '{program}' failed with exit code {code}")]
    ArchiverFailed { program: String, code: i32 },

    /// Merged configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Selected files are larger than the configured limit.
    #[error("total size {total} bytes exceeds limit {limit} ({limit_bytes} bytes)")]
    SizeLimitExceeded {
        total: u64,
        limit: String,
        limit_bytes: u64,
    },

    /// A hook command exited with a non-zero status.
    #[error("{stage} hook failed: {message}")]
    HookFailed { stage: String, message: String },
}

impl PackError {
    /// Process exit code for a run that ends with this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            PackError::InvalidConfig(_) | PackError::InvalidRoot(_) => 2,
            PackError::SizeLimitExceeded { .. } => 42,
            PackError::ArchiverFailed { .. } | PackError::HookFailed { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(PackError::InvalidConfig("x".into()).exit_code(), 2);
        assert_eq!(
            PackError::SizeLimitExceeded {
                total: 10,
                limit: "1".into(),
                limit_bytes: 1
            }
            .exit_code(),
            42
        );
        assert_eq!(
            PackError::ArchiverFailed {
                program: "7z".into(),
                code: 2
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn test_messages() {
        let err = PackError::InvalidRoot(PathBuf::from("/opt/app"));
        assert_eq!(err.to_string(), "install root '/opt/app' is not a directory");
        assert_eq!(err.exit_code(), 2);

        let err = PackError::HookFailed {
            stage: "before".into(),
            message: "exit 1".into(),
        };
        assert_eq!(err.to_string(), "before hook failed: exit 1");
    }
}
