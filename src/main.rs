use bandtrader::cli::{Cli, log_filter, run};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(log_filter(cli.log_level.as_deref()))
        .init();
    run(cli)
}
