use thiserror::Error;

/// Error returned by every fallible memkit operation.
///
/// The kind is boxed so that `Result<T>` stays one pointer wide on the
/// error path.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn out_of_memory(requested: usize, alignment: usize) -> Error {
        Error(
            ErrorKind::OutOfMemory {
                requested,
                alignment,
            }
            .into(),
        )
    }

    pub fn integrity(context: impl Into<String>) -> Error {
        Error(
            ErrorKind::Integrity {
                context: context.into(),
            }
            .into(),
        )
    }

    pub fn overflow(requested: usize, capacity: usize) -> Error {
        Error(
            ErrorKind::Overflow {
                requested,
                capacity,
            }
            .into(),
        )
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    /// `true` for caller-side input errors.
    pub fn is_invalid_arg(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidArgument { .. })
    }

    /// `true` when an allocation or reallocation could not be satisfied.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self.kind(), ErrorKind::OutOfMemory { .. })
    }

    /// `true` for corrupted or misused handles.
    pub fn is_integrity(&self) -> bool {
        matches!(self.kind(), ErrorKind::Integrity { .. })
    }

    /// `true` when a fixed-capacity structure cannot grow.
    pub fn is_overflow(&self) -> bool {
        matches!(self.kind(), ErrorKind::Overflow { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("allocation of {requested} bytes (alignment {alignment}) failed")]
    OutOfMemory { requested: usize, alignment: usize },

    #[error("integrity violation: {context}")]
    Integrity { context: String },

    #[error("fixed capacity exceeded: {requested} bytes requested, capacity {capacity}")]
    Overflow { requested: usize, capacity: usize },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_discriminable() {
        assert!(Error::invalid_arg("size", "size > 0").is_invalid_arg());
        assert!(Error::out_of_memory(64, 8).is_out_of_memory());
        assert!(Error::integrity("bad magic").is_integrity());
        assert!(Error::overflow(100, 10).is_overflow());
        assert!(!Error::invalid_operation("create").is_integrity());
    }

    #[test]
    fn test_error_display() {
        let e = Error::overflow(100, 10);
        assert_eq!(
            e.to_string(),
            "fixed capacity exceeded: 100 bytes requested, capacity 10"
        );
        let e = Error::invalid_arg("alignment", "alignment.is_power_of_two()");
        assert_eq!(
            e.to_string(),
            "invalid argument alignment: alignment.is_power_of_two()"
        );
    }

    #[test]
    fn test_into_kind() {
        let e = Error::out_of_memory(128, 16);
        match e.into_kind() {
            ErrorKind::OutOfMemory {
                requested,
                alignment,
            } => {
                assert_eq!(requested, 128);
                assert_eq!(alignment, 16);
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let e: Error = io.into();
        assert!(matches!(e.kind(), ErrorKind::Io { .. }));
    }
}
