use std::{fs, io::ErrorKind, path::Path, process::Command};

use eyre::Result;
use tracing::{debug, warn};

use crate::{
    ReportError,
    config::{CompositeMode, CompositeSettings, FailurePolicy},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositeOutcome {
    Composited,
    Failed { reason: String },
}

pub struct CompositeJob<'a> {
    /// Rendered chart, removed once compositing finishes
    pub base: &'a Path,
    pub logo: &'a Path,
    pub output: &'a Path,
}

/// Overlays the logo onto the chart and removes the intermediate image.
///
/// The output is only reported as composited when it exists with a nonzero
/// size afterwards. Whether a failure is an error depends on
/// [`CompositeSettings::on_failure`].
pub fn composite(job: &CompositeJob<'_>, settings: &CompositeSettings) -> Result<CompositeOutcome> {
    remove_if_exists(job.output)?;

    let attempt = match settings.mode {
        CompositeMode::External => run_external(job, &settings.command),
        CompositeMode::Builtin => run_builtin(job, settings.offset),
    };
    let outcome = match attempt.and_then(|()| check_output(job.output)) {
        Ok(()) => CompositeOutcome::Composited,
        Err(reason) => CompositeOutcome::Failed { reason },
    };

    if let Err(err) = remove_if_exists(job.base) {
        warn!("{err:#}");
    }

    match &outcome {
        CompositeOutcome::Failed { reason } if settings.on_failure == FailurePolicy::Error => {
            return Err(ReportError::Composite {
                output: job.output.display().to_string(),
                reason: reason.clone(),
            }
            .into());
        }
        CompositeOutcome::Failed { reason } => {
            warn!("No composited image at {}: {reason}", job.output.display())
        }
        CompositeOutcome::Composited => debug!("Composited {}", job.output.display()),
    }
    Ok(outcome)
}

fn substitute(arg: &str, job: &CompositeJob<'_>) -> String {
    arg.replace("{base}", &job.base.to_string_lossy())
        .replace("{logo}", &job.logo.to_string_lossy())
        .replace("{output}", &job.output.to_string_lossy())
}

fn run_external(job: &CompositeJob<'_>, command: &[String]) -> Result<(), String> {
    let Some((program, args)) = command.split_first() else {
        return Err("empty compositor command".to_owned());
    };
    let args = args.iter().map(|a| substitute(a, job)).collect::<Vec<_>>();
    debug!("Running {program} {}", args.join(" "));

    let output = Command::new(program)
        .args(&args)
        .output()
        .map_err(|err| format!("could not run {program}: {err}"))?;
    if !output.status.success() {
        return Err(format!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(())
}

fn run_builtin(job: &CompositeJob<'_>, (x, y): (i64, i64)) -> Result<(), String> {
    let mut base = image::open(job.base)
        .map_err(|err| format!("open {}: {err}", job.base.display()))?
        .to_rgba8();
    let logo = image::open(job.logo)
        .map_err(|err| format!("open {}: {err}", job.logo.display()))?
        .to_rgba8();
    image::imageops::overlay(&mut base, &logo, x, y);
    base.save(job.output)
        .map_err(|err| format!("save {}: {err}", job.output.display()))
}

fn check_output(output: &Path) -> Result<(), String> {
    match fs::metadata(output) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(format!("{} is empty", output.display())),
        Err(_) => Err(format!("{} was not created", output.display())),
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != ErrorKind::NotFound => {
            Err(eyre::Report::new(err).wrap_err(format!("Remove {}", path.display())))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::*;

    fn settings(
        mode: CompositeMode,
        command: &[&str],
        on_failure: FailurePolicy,
    ) -> CompositeSettings {
        CompositeSettings {
            mode,
            command: command.iter().map(|s| s.to_string()).collect(),
            offset: (1, 1),
            on_failure,
        }
    }

    fn write_images(dir: &Path) {
        RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]))
            .save(dir.join("resultsGBM-tmp.png"))
            .unwrap();
        RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]))
            .save(dir.join("logo.png"))
            .unwrap();
    }

    #[test]
    fn builtin_overlays_logo() {
        let dir = tempfile::tempdir().unwrap();
        write_images(dir.path());
        let (base, logo, output) = (
            dir.path().join("resultsGBM-tmp.png"),
            dir.path().join("logo.png"),
            dir.path().join("resultsGBM.png"),
        );
        let job = CompositeJob {
            base: &base,
            logo: &logo,
            output: &output,
        };

        let builtin = settings(CompositeMode::Builtin, &[], FailurePolicy::Error);
        let outcome = composite(&job, &builtin).unwrap();
        assert_eq!(outcome, CompositeOutcome::Composited);
        assert!(!base.exists());

        let result = image::open(&output).unwrap().to_rgba8();
        assert_eq!(result.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(result.get_pixel(1, 1), &Rgba([255, 0, 0, 255]));
        assert_eq!(result.get_pixel(3, 3), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn missing_tool_is_best_effort_by_default() {
        let dir = tempfile::tempdir().unwrap();
        write_images(dir.path());
        let (base, logo, output) = (
            dir.path().join("resultsGBM-tmp.png"),
            dir.path().join("logo.png"),
            dir.path().join("resultsGBM.png"),
        );
        let job = CompositeJob {
            base: &base,
            logo: &logo,
            output: &output,
        };
        let cmd = ["no-such-compositor-on-path", "{base}", "{logo}", "-composite", "{output}"];

        let external = settings(CompositeMode::External, &cmd, FailurePolicy::Warn);
        let outcome = composite(&job, &external).unwrap();
        assert!(matches!(outcome, CompositeOutcome::Failed { .. }));
        assert!(!base.exists());
        assert!(!output.exists());
    }

    #[test]
    fn missing_tool_fails_under_strict_policy() {
        let dir = tempfile::tempdir().unwrap();
        write_images(dir.path());
        let (base, logo, output) = (
            dir.path().join("resultsGBM-tmp.png"),
            dir.path().join("logo.png"),
            dir.path().join("resultsGBM.png"),
        );
        let job = CompositeJob {
            base: &base,
            logo: &logo,
            output: &output,
        };

        let strict = settings(
            CompositeMode::External,
            &["no-such-compositor-on-path"],
            FailurePolicy::Error,
        );
        let err = composite(&job, &strict).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReportError>(),
            Some(ReportError::Composite { .. })
        ));
        assert!(!base.exists());
    }

    #[test]
    fn missing_logo_fails_builtin() {
        let dir = tempfile::tempdir().unwrap();
        write_images(dir.path());
        let (base, logo, output) = (
            dir.path().join("resultsGBM-tmp.png"),
            dir.path().join("absent-logo.png"),
            dir.path().join("resultsGBM.png"),
        );
        let job = CompositeJob {
            base: &base,
            logo: &logo,
            output: &output,
        };
        let builtin = settings(CompositeMode::Builtin, &[], FailurePolicy::Warn);
        let outcome = composite(&job, &builtin).unwrap();
        assert!(matches!(
            outcome,
            CompositeOutcome::Failed { reason } if reason.contains("absent-logo.png")
        ));
        assert!(!base.exists());
    }

    #[cfg(unix)]
    #[test]
    fn external_success_and_stale_output() {
        let dir = tempfile::tempdir().unwrap();
        write_images(dir.path());
        let (base, logo, output) = (
            dir.path().join("resultsGBM-tmp.png"),
            dir.path().join("logo.png"),
            dir.path().join("resultsGBM.png"),
        );
        let job = CompositeJob {
            base: &base,
            logo: &logo,
            output: &output,
        };

        let copy = settings(
            CompositeMode::External,
            &["cp", "{base}", "{output}"],
            FailurePolicy::Error,
        );
        let outcome = composite(&job, &copy).unwrap();
        assert_eq!(outcome, CompositeOutcome::Composited);
        assert!(output.exists());
        assert!(!base.exists());

        // a tool that succeeds without writing must not pass on a previous run's file
        write_images(dir.path());
        let noop = settings(CompositeMode::External, &["true"], FailurePolicy::Warn);
        let outcome = composite(&job, &noop).unwrap();
        assert!(matches!(outcome, CompositeOutcome::Failed { .. }));
        assert!(!output.exists());
    }

    #[test]
    fn empty_command() {
        let dir = tempfile::tempdir().unwrap();
        write_images(dir.path());
        let base = dir.path().join("resultsGBM-tmp.png");
        let output = dir.path().join("resultsGBM.png");
        let job = CompositeJob {
            base: &base,
            logo: &base,
            output: &output,
        };
        let empty = settings(CompositeMode::External, &[], FailurePolicy::Warn);
        let outcome = composite(&job, &empty).unwrap();
        assert_eq!(
            outcome,
            CompositeOutcome::Failed {
                reason: "empty compositor command".to_owned()
            }
        );
    }
}
