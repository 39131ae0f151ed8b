use thiserror::Error;

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Only genuine contract violations are represented here. Situations the analysis is designed to
/// tolerate, such as a call target or a configured signature that cannot be resolved to a
/// declaration, are reported as [`crate::metadata::ResolutionMiss`] values and never abort a run.
///
/// # Error Categories
///
/// ## Analysis Errors
/// - [`Error::SafeCriticalConflict`] - A method is forced SafeCritical while inheritance requires Critical
///
/// ## Descriptor Errors
/// - [`Error::DescriptorConflict`] - More than one override marker for the same signature
/// - [`Error::MalformedDescriptor`] - A descriptor line violates the line grammar
///
/// ## Input Errors
/// - [`Error::MalformedConfig`] - A configuration list line could not be parsed
/// - [`Error::Provider`] - The metadata provider failed to produce a snapshot
/// - [`Error::FileError`] - Filesystem I/O errors
///
/// # Examples
///
/// ```rust
/// use secscope::{Error, descriptor::DescriptorSet};
///
/// match DescriptorSet::parse("SC-X: Foo") {
///     Ok(_) => unreachable!(),
///     Err(Error::MalformedDescriptor { line, .. }) => assert_eq!(line, 1),
///     Err(e) => panic!("unexpected error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A method listed as allowed to remain SafeCritical must be Critical because it shares an
    /// inheritance graph with another critical method.
    ///
    /// This is a configuration error: override slots and all their implementations must agree on
    /// their privilege level, so the SafeCritical designation cannot be honored.
    ///
    /// # Fields
    ///
    /// * `method` - Signature of the SafeCritical method
    /// * `via` - Signature of the critical method that forced the cascade
    #[error("Method {method} is marked SafeCritical but must be Critical (same inheritance graph as {via})")]
    SafeCriticalConflict {
        /// Signature of the SafeCritical method
        method: String,
        /// Signature of the critical inheritance peer
        via: String,
    },

    /// More than one override marker was supplied for the same signature.
    ///
    /// Conflicting overrides are not auto-resolved; the author of the override files has to
    /// decide which one applies.
    #[error("Conflicting override markers for {signature}")]
    DescriptorConflict {
        /// The signature with conflicting overrides
        signature: String,
    },

    /// A descriptor line does not follow `<marker><kind>-<target>: <signature>`.
    ///
    /// # Fields
    ///
    /// * `line` - 1-based line number in the parsed text
    /// * `content` - The offending line
    /// * `message` - What was wrong with it
    #[error("Malformed descriptor at line {line}: {message} - '{content}'")]
    MalformedDescriptor {
        /// 1-based line number
        line: usize,
        /// The offending line
        content: String,
        /// Detailed description of the problem
        message: String,
    },

    /// A configuration list line could not be parsed.
    #[error("Malformed configuration at line {line}: {message}")]
    MalformedConfig {
        /// 1-based line number
        line: usize,
        /// Detailed description of the problem
        message: String,
    },

    /// The metadata provider failed to load its assemblies.
    #[error("Metadata provider failed - {0}")]
    Provider(String),

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur while reading configuration or descriptor files.
    #[error("{0}")]
    FileError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_names_both_methods() {
        let err = Error::SafeCriticalConflict {
            method: "System.Void A::M()".to_string(),
            via: "System.Void B::M()".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("System.Void A::M()"));
        assert!(message.contains("System.Void B::M()"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.txt");
        let err: Error = io.into();
        assert!(matches!(err, Error::FileError(_)));
    }
}
