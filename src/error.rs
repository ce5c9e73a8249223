//! Error kinds surfaced by the demag engine (spec.md §7).

use std::io;

// ======================================================================
// Error - PUBLIC

/// Represents all possible errors that can occur in this crate.
///
/// No error is recovered internally; the caller decides whether to
/// retry with a smaller mesh or different configuration.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Bad dimensions, unsupported periodicity, bad `save_tensor_fmt`,
    /// or any other configuration the engine cannot act on.
    ///
    /// Surfaced to the caller; the step that triggered it is aborted.
    #[error("invalid configuration: {reason}")]
    Config {
        /// Human-readable description of what was invalid.
        reason: String,
    },

    /// Allocation failure inside the tensor builder or a worker
    /// workspace.
    #[error("resource allocation failed while allocating {what} ({bytes} bytes)")]
    Resource {
        /// What was being allocated (e.g. `"demag tensor"`).
        what: String,
        /// Size of the failed allocation, in bytes.
        bytes: usize,
    },

    /// Tensor-dump file write failure. The computation itself (if any
    /// was in progress) remains valid; only the dump failed.
    #[error("I/O error writing tensor dump to {path}: {source}")]
    Io {
        /// Path the engine was writing to.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An internal consistency check failed (builder symmetry
    /// self-test, index overflow). Fatal; always a bug, either in the
    /// caller (e.g. mesh parameters that overflow index arithmetic) or
    /// in this crate.
    #[error("internal invariant violated: {what}")]
    Invariant {
        /// Name/description of the violated invariant.
        what: String,
    },
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_includes_reason() {
        let err = Error::Config {
            reason: "bad thing".into(),
        };
        assert!(err.to_string().contains("bad thing"));
    }

    #[test]
    fn io_error_display_includes_path() {
        let err = Error::Io {
            path: "/tmp/a.tensor".into(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/tmp/a.tensor"));
    }
}
