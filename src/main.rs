use clap::Parser;
use tracing_subscriber::EnvFilter;

use packup::cli::Cli;
use packup::core::user_friendly_error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = cli.execute().await {
        user_friendly_error(e).display();
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "off"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    // RUST_LOG takes precedence over the verbosity flags when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("packup={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
