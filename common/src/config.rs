use std::path::Path;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ReportError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Task categories that each get a chart, in order
    pub tasks: Vec<String>,
    /// Substring of the hardware label that marks a GPU run
    pub gpu_marker: String,
    pub colors: Colors,
    pub x_range: (f64, f64),
    pub figure: Figure,
    /// Fraction of a row each bar occupies
    pub bar_width: f64,
    /// Distance past the bar end for value labels, in data units
    pub label_offset: f64,
    pub text: Annotations,
    pub composite: CompositeSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Colors {
    pub gpu: String,
    pub cpu: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Figure {
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Annotations {
    pub title: String,
    pub caption: String,
    pub url: String,
    pub footnote: String,
    pub x_label: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositeMode {
    #[default]
    External,
    Builtin,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log and carry on without a final image
    #[default]
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompositeSettings {
    pub mode: CompositeMode,
    /// Program and arguments, `{base}`, `{logo}` and `{output}` are substituted
    pub command: Vec<String>,
    /// Logo position on the chart, in pixels from the top-left corner
    pub offset: (i64, i64),
    pub on_failure: FailurePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tasks: vec!["GBM".to_owned()],
            gpu_marker: "GPU".to_owned(),
            colors: Colors::default(),
            x_range: (0.0, 4800.0),
            figure: Figure::default(),
            bar_width: 0.7,
            label_offset: 30.0,
            text: Annotations::default(),
            composite: CompositeSettings::default(),
        }
    }
}

impl Default for Colors {
    fn default() -> Self {
        Self {
            gpu: "limegreen".to_owned(),
            cpu: "dodgerblue".to_owned(),
        }
    }
}

impl Default for Figure {
    fn default() -> Self {
        Self {
            width_in: 16.0,
            height_in: 9.0,
            dpi: 300,
        }
    }
}

impl Figure {
    pub fn pixels(&self) -> (u32, u32) {
        (
            (self.width_in * self.dpi as f64).round() as u32,
            (self.height_in * self.dpi as f64).round() as u32,
        )
    }

    /// Converts a font size in points to pixels at the figure dpi
    pub fn pt(&self, points: f64) -> f64 {
        points * self.dpi as f64 / 72.0
    }
}

impl Default for Annotations {
    fn default() -> Self {
        Self {
            title: "H2O.ai Machine Learning - Gradient Boosting Machine".to_owned(),
            caption: "Time to Train 16 H2O XGBoost Models (histogram method)".to_owned(),
            url: "http://github.com/h2oai/perf/".to_owned(),
            footnote: "*NVIDIA DGX-1, **Dual Intel Xeon E5-2698 v4\n\
                       Higgs dataset (binary classification): 1M rows, 29 cols; \
                       max_depth: {6,8,10,12}, sample_rate: {0.7,0.8,0.9,1.0}"
                .to_owned(),
            x_label: "time [sec]".to_owned(),
        }
    }
}

impl Default for CompositeSettings {
    fn default() -> Self {
        Self {
            mode: CompositeMode::External,
            command: ["convert", "{base}", "{logo}", "-composite", "{output}"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            offset: (0, 0),
            on_failure: FailurePolicy::Warn,
        }
    }
}

impl Config {
    /// Reads a yaml config, or the built-in defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .wrap_err_with(|| format!("Read config {}", path.display()))?;
                let config: Self = serde_yml::from_str(&raw)
                    .wrap_err_with(|| format!("Parse config {}", path.display()))?;
                config
                    .validate()
                    .wrap_err_with(|| format!("Check config {}", path.display()))?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Rejects axis and figure settings the chart cannot be drawn with
    pub fn validate(&self) -> Result<(), ReportError> {
        let invalid = |msg: String| Err(ReportError::InvalidConfig(msg));
        let (x_min, x_max) = self.x_range;
        if !x_min.is_finite() || !x_max.is_finite() || x_min >= x_max {
            return invalid(format!("x_range [{x_min}, {x_max}] must be finite and increasing"));
        }
        if self.figure.dpi == 0 {
            return invalid("figure.dpi must be positive".to_owned());
        }
        let (width, height) = (self.figure.width_in, self.figure.height_in);
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return invalid(format!("figure size {width}x{height} must be positive"));
        }
        if !(self.bar_width > 0.0 && self.bar_width <= 1.0) {
            return invalid(format!("bar_width {} must be in (0, 1]", self.bar_width));
        }
        if !self.label_offset.is_finite() {
            return invalid(format!("label_offset {} must be finite", self.label_offset));
        }
        Ok(())
    }
}
