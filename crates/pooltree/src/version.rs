//! Version information.

/// Get the version string.
#[must_use]
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Version line including the default chunk size, for bug reports.
#[must_use]
pub fn full_version() -> String {
    format!(
        "pooltree {} (default chunk {} bytes)",
        version(),
        pooltree_memory::constants::DEFAULT_CHUNK_SIZE
    )
}
