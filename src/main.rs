use antigram_solver::cli;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("antigram_solver=debug,info")
    } else {
        EnvFilter::new("antigram_solver=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        cli::Commands::Identify(args) => {
            cli::identify::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Coverage(args) => {
            cli::coverage::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Rules(args) => {
            cli::rules::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Panels(args) => {
            cli::panels::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Cells(args) => {
            cli::cells::run(args, cli.format, cli.verbose)?;
        }
    }

    Ok(())
}
