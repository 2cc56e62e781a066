//! Options and limits for serialization and deserialization.

/// Bounds on the pathnames and entry names a transplant operation will handle.
///
/// Both limits count a terminator slot, so the longest usable path is `max_path_len - 1` bytes
/// and the longest usable name is `max_name_len - 1` bytes.
///
/// # Example
///
/// ```
/// use transplant::Limits;
///
/// let limits = Limits {
///     max_path_len: 4096,
///     ..Default::default()
/// };
/// assert_eq!(limits.max_name_len, 256);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum path length in bytes, including the terminator slot.
    ///
    /// Default: 1024 bytes.
    pub max_path_len: usize,

    /// Maximum entry name length in bytes, including the terminator slot.
    ///
    /// Names read from a stream that exceed this cause a [`crate::Error::NameTooLong`] error.
    ///
    /// Default: 256 bytes.
    pub max_name_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_path_len: 1024,
            max_name_len: 256,
        }
    }
}

impl Limits {
    /// Create a new `Limits` with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Options shared by [`crate::serialize()`] and [`crate::deserialize()`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Allow deserialize to overwrite existing files and merge into existing directories.
    /// Serialize ignores it.
    pub clobber: bool,

    /// Bounds on path and name lengths.
    pub limits: Limits,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_path_len, 1024);
        assert_eq!(limits.max_name_len, 256);
        assert_eq!(Limits::new(), limits);
    }

    #[test]
    fn test_default_options() {
        let options = Options::default();
        assert!(!options.clobber);
        assert_eq!(options.limits, Limits::default());
    }
}
