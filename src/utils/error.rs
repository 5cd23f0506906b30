use thiserror::Error;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Header encoding error: {0}")]
    EncodingError(#[from] bincode::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Could not find {path}")]
    NotFound { path: String },

    #[error("{path} is a file")]
    NotADirectory { path: String },

    #[error("{path} is a directory")]
    NotAFile { path: String },

    #[error("{name} {reason}")]
    AlreadyExists { name: String, reason: String },

    #[error("{path} is not empty")]
    DirectoryNotEmpty { path: String },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Header is larger than the allocated size of {capacity} bytes (needs {required})")]
    HeaderOverflow { required: u64, capacity: u64 },

    #[error("Corrupt container: {message}")]
    CorruptContainer { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Path,
    Namespace,
    Container,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FsError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            FsError::IoError(_) | FsError::ZipError(_) => ErrorCategory::Io,
            FsError::InvalidPath { .. } | FsError::InvalidName { .. } => ErrorCategory::Path,
            FsError::NotFound { .. }
            | FsError::NotADirectory { .. }
            | FsError::NotAFile { .. }
            | FsError::AlreadyExists { .. }
            | FsError::DirectoryNotEmpty { .. }
            | FsError::InvalidOperation { .. } => ErrorCategory::Namespace,
            FsError::EncodingError(_)
            | FsError::HeaderOverflow { .. }
            | FsError::CorruptContainer { .. } => ErrorCategory::Container,
            FsError::TomlError(_)
            | FsError::ConfigError { .. }
            | FsError::InvalidConfigValueError { .. }
            | FsError::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Path | ErrorCategory::Namespace => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Io => ErrorSeverity::Medium,
            ErrorCategory::Container => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Io => format!("Could not access the container or host file: {}", self),
            ErrorCategory::Path | ErrorCategory::Namespace => self.to_string(),
            ErrorCategory::Container => format!("The container cannot be used: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            FsError::InvalidPath { .. } => "Use absolute container paths such as /dir/file.txt",
            FsError::InvalidName { .. } => "Names must be non-empty and must not contain '/'",
            FsError::NotFound { .. } => "Check the path with `cfs ls` or `cfs tree`",
            FsError::DirectoryNotEmpty { .. } => "Remove the contents first or use `rm -r`",
            FsError::HeaderOverflow { .. } => {
                "Create a new container with a larger header_size and import the data into it"
            }
            FsError::CorruptContainer { .. } | FsError::EncodingError(_) => {
                "The file is not a container or is damaged; restore it from a backup"
            }
            FsError::IoError(_) | FsError::ZipError(_) => {
                "Check that the file exists, is writable and the disk has free space"
            }
            FsError::TomlError(_)
            | FsError::ConfigError { .. }
            | FsError::InvalidConfigValueError { .. } => "Fix the configuration file and try again",
            FsError::MissingConfigError { .. } => {
                "Pass the value on the command line or set it in the config file"
            }
            _ => "Check the arguments and try again",
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = FsError::DirectoryNotEmpty {
            path: "/usr".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Namespace);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert_eq!(err.to_string(), "/usr is not empty");

        let err = FsError::HeaderOverflow {
            required: 10,
            capacity: 5,
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);

        let err: FsError = std::io::Error::other("disk gone").into();
        assert_eq!(err.category(), ErrorCategory::Io);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
    }
}
