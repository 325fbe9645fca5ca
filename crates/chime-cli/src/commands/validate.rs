//! Check configuration files without building them.

use std::path::PathBuf;

use anyhow::Context;
use chime_config::{
    BeatTrackConfig, SoundPatch, ValidationError, validate_beat_track, validate_patch,
};
use clap::{Args, ValueEnum};

/// What kind of file to validate.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FileKind {
    /// Oscillator sound patch
    Patch,
    /// Beat track sequence
    BeatTrack,
}

/// Validate a patch or beat track file.
#[derive(Args)]
pub struct ValidateArgs {
    /// TOML file to check
    pub path: PathBuf,

    /// File kind
    #[arg(short, long, value_enum, default_value = "patch")]
    pub kind: FileKind,
}

/// Run the validate command.
pub fn run(args: ValidateArgs) -> anyhow::Result<()> {
    let context = || format!("loading {}", args.path.display());
    let (name, result) = match args.kind {
        FileKind::Patch => {
            let patch = SoundPatch::load(&args.path).with_context(context)?;
            let result = validate_patch(&patch);
            (patch.name, result)
        }
        FileKind::BeatTrack => {
            let config = BeatTrackConfig::load(&args.path).with_context(context)?;
            let result = validate_beat_track(&config);
            (config.name, result)
        }
    };

    match result {
        Ok(()) => {
            println!("{}: '{name}' is valid", args.path.display());
            Ok(())
        }
        Err(err) => {
            let problems = problems(err);
            for problem in &problems {
                println!("  error: {problem}");
            }
            anyhow::bail!(
                "{}: {} problem(s) in '{name}'",
                args.path.display(),
                problems.len()
            )
        }
    }
}

fn problems(err: ValidationError) -> Vec<ValidationError> {
    match err {
        ValidationError::Multiple(errors) => errors,
        other => vec![other],
    }
}
