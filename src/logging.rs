use tracing_subscriber::EnvFilter;

/// Filter used when the debug switch is on: everything from this crate,
/// warnings from dependencies.
pub const DEBUG_DIRECTIVE: &str = "warn,zoomview=debug";

fn filter_for(enable_debug: bool, from_env: Option<EnvFilter>) -> EnvFilter {
    if enable_debug {
        return EnvFilter::new(DEBUG_DIRECTIVE);
    }
    from_env.unwrap_or_else(|| EnvFilter::new("warn"))
}

/// Installs the fmt subscriber and routes `log` records through `tracing`.
///
/// Raster workers are named threads, so thread names are printed. Later calls
/// keep the first subscriber.
pub fn init_tracing(enable_debug: bool) {
    let _ = tracing_log::LogTracer::init();

    let env_filter = filter_for(enable_debug, EnvFilter::try_from_default_env().ok());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_names(true)
        .try_init()
        .ok();
}
