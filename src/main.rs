use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use treestore::cli::args::Cli;
use treestore::cli::commands::execute_command;
use treestore::cli::output;

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.debug);

    if let Err(e) = execute_command(&cli) {
        output::error(&e);
        std::process::exit(e.exit_code());
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    // Only our own targets; config and serde internals stay quiet
    let own_targets = filter_fn(|metadata| metadata.target().starts_with("treestore"));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity > 1)
        .with_span_events(if verbosity > 2 { FmtSpan::CLOSE } else { FmtSpan::NONE })
        .with_filter(level)
        .with_filter(own_targets);

    tracing_subscriber::registry().with(layer).init();
    tracing::debug!(%level, "logging initialised");
}

#[cfg(test)]
mod tests {
    use super::*;
    use treestore::util::testing;

    // https://docs.rs/clap/latest/clap/_derive/_tutorial/index.html#testing
    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        testing::init_test_setup();
        Cli::command().debug_assert();
    }
}
