use tracing_subscriber::EnvFilter;

use uplift_unroll::cli::{self, Cli};
use uplift_unroll::ui::output::{self, Verbosity};

fn main() {
    let cli = Cli::parse_args();

    let filter = Verbosity::from_flags(cli.quiet, cli.debug).log_filter();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = cli::run(cli) {
        output::error(format!("{err:#}"));
        std::process::exit(1);
    }
}
