use std::path::Path;

use eyre::{Context, Result};
use plotters::style::RGBColor;
use serde::Serialize;

use crate::{ReportError, table::Record};

const NAMED_COLORS: &[(&str, (u8, u8, u8))] = &[
    ("black", (0, 0, 0)),
    ("white", (255, 255, 255)),
    ("gray", (128, 128, 128)),
    ("red", (255, 0, 0)),
    ("crimson", (220, 20, 60)),
    ("orange", (255, 165, 0)),
    ("darkorange", (255, 140, 0)),
    ("green", (0, 128, 0)),
    ("forestgreen", (34, 139, 34)),
    ("limegreen", (50, 205, 50)),
    ("blue", (0, 0, 255)),
    ("royalblue", (65, 105, 225)),
    ("steelblue", (70, 130, 180)),
    ("dodgerblue", (30, 144, 255)),
    ("purple", (128, 0, 128)),
];

/// Accepts a css color name from [`NAMED_COLORS`] or `#rrggbb`
pub fn parse_color(color: &str) -> Result<RGBColor, ReportError> {
    let unknown = || ReportError::UnknownColor(color.to_owned());
    if let Some(hex) = color.strip_prefix('#') {
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(unknown());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| unknown());
        return Ok(RGBColor(channel(0)?, channel(2)?, channel(4)?));
    }
    let name = color.to_ascii_lowercase();
    NAMED_COLORS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, (r, g, b))| RGBColor(*r, *g, *b))
        .ok_or_else(unknown)
}

#[derive(Debug, Serialize)]
struct PlotDataRow<'a> {
    hardware: &'a str,
    task: &'a str,
    runtime: f64,
    #[serde(rename = "AUC")]
    auc: f64,
    gpu: bool,
}

/// Writes the rows behind a chart so it can be reproduced elsewhere
pub fn write_plot_data(path: &Path, rows: &[&Record], gpu_marker: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("Create plot data dir {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .wrap_err_with(|| format!("Create plot data file {}", path.display()))?;
    for row in rows {
        writer.serialize(PlotDataRow {
            hardware: &row.hardware,
            task: &row.task,
            runtime: row.runtime,
            auc: row.auc,
            gpu: row.is_gpu(gpu_marker),
        })?;
    }
    writer.flush()?;
    Ok(())
}
