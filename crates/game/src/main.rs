use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app;

fn main() {
    init_tracing();
    info!("=== Scene Zone Sandbox Startup ===");

    let app::AppWiring {
        loop_config,
        mut manager,
    } = match app::build_app() {
        Ok(wiring) => wiring,
        Err(err) => {
            error!(error = %err, "startup_failed");
            std::process::exit(1);
        }
    };

    scenezone::run_loop(loop_config, &mut manager);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
