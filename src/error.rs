use thiserror::Error;

/// Errors surfaced by the boot-slot selection core.
///
/// Variants match the taxonomy one-to-one: callers match on the variant
/// rather than inspect a string. The core never retries a failed mutation;
/// see the module-level docs on [`crate::dispatcher`].
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown bootloader name, or a required external tool is missing
    /// from `$PATH`.
    #[error("unsupported bootloader configuration: {0}")]
    Unsupported(String),

    /// The slot has no `bootname` and cannot be mapped to a bootloader
    /// entry. Indicates a programming error in the caller, which should
    /// only ask the core about bootable slots.
    #[error("slot '{0}' has no bootname and is not bootable")]
    NotBootable(String),

    /// An external tool invocation exited non-zero.
    #[error("backend command '{command}' failed: {stderr}")]
    BackendError { command: String, stderr: String },

    /// Tool output could not be interpreted.
    #[error("failed to parse backend output, offending line: '{line}'")]
    ParseError { line: String },

    /// No slot currently qualifies as primary.
    #[error("no slot qualifies as primary in the current bootloader state")]
    NoPrimary,
}

impl Error {
    pub(crate) fn backend(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::BackendError {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    pub(crate) fn parse(line: impl Into<String>) -> Self {
        Self::ParseError { line: line.into() }
    }
}
