use std::path::{Path, PathBuf};

use common::{
    composite::{CompositeJob, CompositeOutcome, composite},
    config::Config,
    plot,
    table::ResultsTable,
    util::write_plot_data,
};
use eyre::{Context, Result};
use tracing::{debug, info};

pub struct ReportPaths {
    pub input: PathBuf,
    pub logo: PathBuf,
    pub out_dir: PathBuf,
}

/// Files produced for one task category
#[derive(Debug, PartialEq)]
pub struct TaskFiles {
    pub tmp_chart: PathBuf,
    pub chart: PathBuf,
    pub plot_data: PathBuf,
}

impl TaskFiles {
    pub fn new(out_dir: &Path, task: &str) -> Self {
        Self {
            tmp_chart: out_dir.join(format!("results{task}-tmp.png")),
            chart: out_dir.join(format!("results{task}.png")),
            plot_data: out_dir.join("plot_data").join(format!("results{task}.csv")),
        }
    }
}

/// Renders one chart per configured task
pub fn run_report(
    paths: &ReportPaths,
    config: &Config,
) -> Result<Vec<(String, CompositeOutcome)>> {
    let table = ResultsTable::load(&paths.input)?;
    std::fs::create_dir_all(&paths.out_dir)
        .wrap_err_with(|| format!("Create output dir {}", paths.out_dir.display()))?;

    let mut outcomes = Vec::new();
    for task in &config.tasks {
        let outcome = render_task(&table, task, paths, config)
            .wrap_err_with(|| format!("Render chart for task {task}"))?;
        outcomes.push((task.clone(), outcome));
    }
    Ok(outcomes)
}

fn render_task(
    table: &ResultsTable,
    task: &str,
    paths: &ReportPaths,
    config: &Config,
) -> Result<CompositeOutcome> {
    let rows = table.for_task(task);
    debug!("Task {task}: {} rows", rows.len());
    println!("{}", table.format_view(&rows, &config.gpu_marker));

    let files = TaskFiles::new(&paths.out_dir, task);
    write_plot_data(&files.plot_data, &rows, &config.gpu_marker)?;

    let layout = plot::layout(&rows, config)?;
    plot::render(&layout, config, &files.tmp_chart)?;

    let outcome = composite(
        &CompositeJob {
            base: &files.tmp_chart,
            logo: &paths.logo,
            output: &files.chart,
        },
        &config.composite,
    )?;
    if outcome == CompositeOutcome::Composited {
        info!("Wrote {}", files.chart.display());
    }
    Ok(outcome)
}

/// Prints the filtered tables without rendering anything
pub fn show(input: &Path, config: &Config) -> Result<()> {
    let table = ResultsTable::load(input)?;
    for task in &config.tasks {
        println!("{task}");
        println!("{}", table.format_view(&table.for_task(task), &config.gpu_marker));
    }
    Ok(())
}
