use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use wayroute::{run, Cli};

fn init_logging(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let stdout = std::io::stdout();
    if let Err(e) = run(cli, &mut stdout.lock()) {
        error!("{e:#}");
        std::process::exit(1);
    }
}
