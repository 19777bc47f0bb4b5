use clap::Parser;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::prelude::*;
use vestibule::config::Config;
use vestibule::server::DEFAULT_MAX_CONNECTIONS;

/// Arguments to configure this runtime of the application before it is started.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The log level of the console output.
    #[arg(long, env, default_value = "INFO")]
    log_level: LevelFilter,
    /// The number of connections that may be served concurrently.
    #[arg(long, env, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    max_connections: usize,
    /// The path of the JSON configuration file.
    #[arg(default_value = vestibule::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

/// Initializes the application and invokes vestibule.
///
/// This initializes the logging, loads the configuration and starts the multithreaded tokio
/// runtime. This is only a thin wrapper around the vestibule crate that supplies the necessary
/// settings.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // parse the arguments and configuration
    let args = Args::parse();

    // initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_filter(args.log_level),
        )
        .init();

    // load the configuration (falls back to built-in defaults on any problem)
    let config = Config::load(&args.config);

    // run the responder blocking
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async { vestibule::start(config, args.max_connections).await })
}
