//! Control Server - Entry Point
//!
//! Modes:
//! - Default: serve the dashboard API
//! - --check-config: load settings, print a summary, exit

use control_server::{Config, DashboardServer};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let json_logs = args.iter().any(|a| a == "--json");
    let check_config = args.iter().any(|a| a == "--check-config");
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");

    if help_mode {
        println!("Control Server v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: control-server [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --json           Log as JSON");
        println!("  --check-config   Validate settings and exit");
        println!("  --help, -h       Show this help");
        println!();
        println!("Environment variables:");
        println!("  CONTROL_SETTINGS          Settings file (default: settings.json)");
        println!("  CONTROL_BIND_ADDR         Listen address (default: 127.0.0.1)");
        println!("  CONTROL_PORT              Listen port (default: 3001)");
        println!("  CONTROL_ROUTER_HOST       Router address");
        println!("  CONTROL_ROUTER_PASSWORD   Router admin password");
        println!("  CONTROL_STATIC_DIR        Dashboard build directory");
        println!("  RUST_LOG                  Log level");
        return Ok(());
    }

    let config = Config::from_env()?;

    let log_level = std::env::var("RUST_LOG")
        .map(|s| parse_level(&s))
        .unwrap_or_else(|_| parse_level(&config.settings.log.level));

    if json_logs {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("Control Server v{}", env!("CARGO_PKG_VERSION"));

    if config.loaded_from_file {
        info!("Loaded settings from {}", config.settings_path.display());
    } else {
        warn!(
            "Settings file {} not found - using defaults",
            config.settings_path.display()
        );
    }

    if config.settings.router.password.is_empty() {
        warn!("No router password configured - /router requests will fail to log in");
    }

    if check_config {
        let settings = &config.settings;
        println!("router:   {}", settings.router.host);
        println!("listen:   {}", settings.server.socket_addr());
        println!("systems:  {}", settings.systems.len());
        for system in &settings.systems {
            println!("  - {} ({}@{})", system.name, system.user, system.host);
        }
        println!("shutdown: {}", settings.shutdown.command());
        return Ok(());
    }

    let server = DashboardServer::from_config(&config)?;
    server.run().await?;

    Ok(())
}
