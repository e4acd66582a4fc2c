use std::path::Path;

use eyre::{Context, Result};
use plotters::{
    prelude::*,
    style::{
        FontDesc, FontFamily, FontStyle,
        text_anchor::{HPos, Pos, VPos},
    },
};
use tracing::debug;

use crate::{config::Config, table::Record, util::parse_color};

/// Caption anchor on the runtime axis, in seconds
const CAPTION_X: f64 = 470.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub hardware: String,
    pub gpu: bool,
    pub runtime: f64,
    /// Bar centre, row 0 sits at the top of the chart
    pub y: f64,
    /// Runtime clamped to the x range, where the rectangle actually ends
    pub drawn_end: f64,
    pub color: RGBColor,
    /// Rounded runtime and its x position, `None` when it would fall outside the axes
    pub value_label: Option<(String, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartLayout {
    pub bars: Vec<Bar>,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub gpu_color: RGBColor,
    pub cpu_color: RGBColor,
}

fn font(size: f64, style: FontStyle) -> FontDesc<'static> {
    FontDesc::new(FontFamily::SansSerif, size, style)
}

/// Places one bar per row in file order, first row on top
pub fn layout(rows: &[&Record], config: &Config) -> Result<ChartLayout> {
    config.validate()?;
    let gpu_color = parse_color(&config.colors.gpu)?;
    let cpu_color = parse_color(&config.colors.cpu)?;
    let (x_min, x_max) = config.x_range;
    let n = rows.len();

    let bars = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let gpu = row.is_gpu(&config.gpu_marker);
            let label_x = row.runtime + config.label_offset;
            Bar {
                hardware: row.hardware.clone(),
                gpu,
                runtime: row.runtime,
                y: (n - 1 - i) as f64,
                drawn_end: row.runtime.clamp(x_min, x_max),
                color: if gpu { gpu_color } else { cpu_color },
                value_label: (x_min..=x_max)
                    .contains(&label_x)
                    .then(|| (format!("{:.0}", row.runtime), label_x)),
            }
        })
        .collect();

    Ok(ChartLayout {
        bars,
        x_range: config.x_range,
        y_range: (-0.5, n.max(1) as f64 - 0.5),
        gpu_color,
        cpu_color,
    })
}

/// Draws the chart to a png at `path`
pub fn render(layout: &ChartLayout, config: &Config, path: &Path) -> Result<()> {
    let figure = &config.figure;
    let text = &config.text;
    let (width, height) = figure.pixels();
    let pt = |points: f64| figure.pt(points);
    let px = |points: f64| figure.pt(points).round() as i32;

    let tick_size = pt(24.0);
    let longest_label = layout
        .bars
        .iter()
        .map(|b| b.hardware.chars().count())
        .max()
        .unwrap_or_default();
    let y_label_area = (longest_label as f64 * tick_size * 0.6 + pt(20.0)) as u32;

    let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
    root.fill(&WHITE)?;

    let (x_min, x_max) = layout.x_range;
    let (y_min, y_max) = layout.y_range;
    let mut chart = ChartBuilder::on(&root)
        .caption(&text.title, font(pt(34.0), FontStyle::Normal))
        .margin_top(px(20.0) as u32)
        .margin_right(px(40.0) as u32)
        .margin_bottom((height as f64 * 0.2) as u32)
        .x_label_area_size(px(60.0) as u32)
        .y_label_area_size(y_label_area)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(10)
        .y_labels(0)
        .x_label_formatter(&|x| format!("{x:.0}"))
        .label_style(font(tick_size, FontStyle::Normal))
        .x_desc(text.x_label.as_str())
        .axis_desc_style(font(tick_size, FontStyle::Bold))
        .draw()?;

    let half = config.bar_width / 2.0;
    chart.draw_series(layout.bars.iter().map(|bar| {
        Rectangle::new(
            [(x_min, bar.y - half), (bar.drawn_end, bar.y + half)],
            bar.color.filled(),
        )
    }))?;

    let value_style = font(pt(20.0), FontStyle::Bold)
        .color(&BLACK)
        .pos(Pos::new(HPos::Left, VPos::Center));
    chart.draw_series(layout.bars.iter().filter_map(|bar| {
        bar.value_label
            .as_ref()
            .map(|(label, x)| Text::new(label.clone(), (*x, bar.y), value_style.clone()))
    }))?;

    let hardware_style = font(tick_size, FontStyle::Normal)
        .color(&BLACK)
        .pos(Pos::new(HPos::Right, VPos::Center));
    for bar in &layout.bars {
        let (x, y) = chart.backend_coord(&(x_min, bar.y));
        root.draw(&Text::new(
            bar.hardware.as_str(),
            (x - px(6.0), y),
            hardware_style.clone(),
        ))?;
    }

    let (caption_x, caption_y) = chart.backend_coord(&(CAPTION_X, y_max));
    root.draw(&Text::new(
        text.caption.as_str(),
        (caption_x, caption_y - px(6.0)),
        font(pt(24.0), FontStyle::Normal)
            .color(&BLACK)
            .pos(Pos::new(HPos::Left, VPos::Bottom)),
    ))?;

    let (axes_left, axes_bottom) = chart.backend_coord(&(x_min, y_min));
    root.draw(&Text::new(
        text.url.as_str(),
        ((axes_left - px(170.0)).max(px(10.0)), axes_bottom + px(98.0)),
        font(pt(16.0), FontStyle::Normal)
            .color(&BLACK)
            .pos(Pos::new(HPos::Left, VPos::Top)),
    ))?;

    let footnote_style = font(pt(16.0), FontStyle::Normal)
        .color(&BLACK)
        .pos(Pos::new(HPos::Right, VPos::Top));
    let footnote_x = (axes_left + px(910.0)).min(width as i32 - px(10.0));
    for (i, line) in text.footnote.lines().enumerate() {
        root.draw(&Text::new(
            line,
            (footnote_x, axes_bottom + px(80.0) + i as i32 * px(16.0 * 1.2)),
            footnote_style.clone(),
        ))?;
    }

    let swatch = px(8.0);
    for (label, color) in [("GPU", layout.gpu_color), ("CPU", layout.cpu_color)] {
        chart
            .draw_series(std::iter::empty::<Rectangle<(f64, f64)>>())?
            .label(label)
            .legend(move |(x, y)| {
                Rectangle::new([(x, y - swatch), (x + 2 * swatch, y + swatch)], color.filled())
            });
    }
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .margin(px(10.0) as u32)
        .legend_area_size(px(24.0) as u32)
        .label_font(font(pt(20.0), FontStyle::Normal))
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()
        .wrap_err_with(|| format!("Write chart {}", path.display()))?;
    debug!("Rendered {} bars to {}", layout.bars.len(), path.display());
    Ok(())
}
