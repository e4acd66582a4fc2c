use std::path::PathBuf;

use clap::{Parser, Subcommand};
use common::{composite::CompositeOutcome, config::Config};
use eyre::Result;
use tracing::error;
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::report::ReportPaths;

mod report;

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Extra tracing directives, eg. `common=debug`
    #[arg(short, long, global = true)]
    log: Vec<String>,
    /// Yaml overrides for tasks, colors, axis and annotation text
    #[arg(short, long, global = true)]
    config_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a chart per task and composite the logo onto it
    Plot {
        #[arg(short, long, default_value = "results.txt")]
        input: PathBuf,
        #[arg(long, default_value = "logo.png")]
        logo: PathBuf,
        /// Directory the charts are written to
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Print the filtered results table for each task
    Show {
        #[arg(short, long, default_value = "results.txt")]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("warn".to_owned());
    let args = Cli::parse();
    let file_appender = tracing_appender::rolling::never(".", "log.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let mut env_filter = EnvFilter::new(format!("bench_chart={log_level}"));
    if !args.log.iter().any(|x| x.starts_with("common")) {
        env_filter = env_filter.add_directive(format!("common={log_level}").parse()?);
    }
    for log in &args.log {
        env_filter = env_filter.add_directive(log.parse()?);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .compact(),
        )
        .with(layer().with_writer(non_blocking))
        .init();

    if let Err(err) = run(args) {
        error!("{err:#?}");
        return Err(err);
    }
    Ok(())
}

fn run(args: Cli) -> Result<()> {
    let config = Config::load(args.config_file.as_deref())?;
    match args.command {
        Commands::Plot {
            input,
            logo,
            out_dir,
        } => {
            let paths = ReportPaths {
                input,
                logo,
                out_dir,
            };
            for (task, outcome) in report::run_report(&paths, &config)? {
                if let CompositeOutcome::Failed { reason } = outcome {
                    println!("{task}: no final chart ({reason})");
                }
            }
        }
        Commands::Show { input } => report::show(&input, &config)?,
    }
    Ok(())
}
