pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// Returns an `InvalidArgument` error from the enclosing function unless
/// `$expr` holds.
#[macro_export]
macro_rules! verify_arg {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_arg(result, stringify!($name), stringify!($expr))?;
    }};
}

/// Returns an `Integrity` error from the enclosing function unless `$expr`
/// holds.
#[macro_export]
macro_rules! verify_integrity {
    ($context:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_integrity(result, $context, stringify!($expr))?;
    }};
}

#[inline]
pub fn verify_arg(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        invalid_arg(name, condition)
    }
}

#[inline]
pub fn verify_integrity(predicate: bool, context: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        integrity_violation(context, condition)
    }
}

#[cold]
pub fn invalid_arg(name: &str, condition: &str) -> Result<()> {
    Err(crate::error::ErrorKind::InvalidArgument {
        name: name.to_string(),
        message: condition.to_string(),
    }
    .into())
}

#[cold]
pub fn integrity_violation(context: &str, condition: &str) -> Result<()> {
    Err(crate::error::ErrorKind::Integrity {
        context: format!("{context}: {condition}"),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use crate::ErrorKind;

    fn check_size(size: usize) -> crate::Result<usize> {
        verify_arg!(size, size != 0);
        Ok(size)
    }

    fn check_magic(magic: u64) -> crate::Result<()> {
        verify_integrity!("block header", magic == 0xfeed);
        Ok(())
    }

    #[test]
    fn test_verify_arg_passes_and_fails() {
        assert_eq!(check_size(4).unwrap(), 4);
        let err = check_size(0).unwrap_err();
        match err.kind() {
            ErrorKind::InvalidArgument { name, message } => {
                assert_eq!(name, "size");
                assert_eq!(message, "size != 0");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_verify_integrity_reports_context() {
        assert!(check_magic(0xfeed).is_ok());
        let err = check_magic(0).unwrap_err();
        assert!(err.is_integrity());
        assert!(err.to_string().contains("block header"));
    }
}
