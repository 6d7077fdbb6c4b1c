//! Process-wide setup.

/// Installs the `env_logger` backend for the `log` facade.
///
/// Filtering follows `RUST_LOG`. Calling this more than once, or after the
/// host application installed its own logger, is harmless.
///
/// # Example
///
/// ```no_run
/// spectromesh::init_logging();
/// log::info!("logging ready");
/// ```
pub fn init_logging() {
    if env_logger::try_init().is_ok() {
        log::debug!("spectromesh logging initialized");
    }
}
