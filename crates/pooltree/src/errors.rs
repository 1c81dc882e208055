//! Error handling and exit codes.

use pooltree_memory::ConfigError;

/// Process exit codes.
pub mod exit_codes {
    /// Run completed and nothing leaked.
    pub const SUCCESS: u8 = 0;
    /// Unexpected failure.
    pub const ERROR_GENERIC: u8 = 1;
    /// Data read back from a pool did not match what was written.
    pub const ERROR_CORRUPTION: u8 = 2;
    /// A workload finished with memory or cleanups still outstanding.
    pub const ERROR_LEAK: u8 = 3;
    /// Configuration could not be loaded.
    pub const ERROR_CONFIG: u8 = 4;
}

/// Failures the driver reports with a dedicated exit code.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("workload {workload} leaked: {detail}")]
    Leak {
        workload: &'static str,
        detail: String,
    },

    #[error("workload {workload} read back corrupted data: {detail}")]
    Corruption {
        workload: &'static str,
        detail: String,
    },
}

/// Exit code for an error returned by [`crate::app::run`].
#[must_use]
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<AppError>() {
        Some(AppError::Config(_)) => exit_codes::ERROR_CONFIG,
        Some(AppError::Leak { .. }) => exit_codes::ERROR_LEAK,
        Some(AppError::Corruption { .. }) => exit_codes::ERROR_CORRUPTION,
        None => exit_codes::ERROR_GENERIC,
    }
}
