//! Play a sound patch once and sample its automation.

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;
use chime_config::{SoundPatch, validate_patch};
use chime_core::offline::OfflineHost;
use chime_core::{AudioContext, ConnectionGraph, ParamName, Playable};
use clap::Args;
use serde_json::json;

use super::common::{event_json, print_log, sample_times};

/// Play a patch and print its gain and frequency over time.
#[derive(Args)]
pub struct PatchArgs {
    /// Sound patch TOML file
    pub path: PathBuf,

    /// How long to play, in seconds
    #[arg(short, long, default_value = "1.0")]
    pub duration: f64,

    /// Sampling step for the automation table, in seconds
    #[arg(long, default_value = "0.1")]
    pub sample_every: f64,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the patch command.
pub fn run(args: PatchArgs) -> anyhow::Result<()> {
    if !args.duration.is_finite() || args.duration <= 0.0 {
        anyhow::bail!("duration must be positive, got {}", args.duration);
    }
    let patch =
        SoundPatch::load(&args.path).with_context(|| format!("loading {}", args.path.display()))?;
    validate_patch(&patch)?;

    let host = Rc::new(OfflineHost::new());
    let context = AudioContext::with_host(host.clone());
    let mut voice = patch.build(&context)?;
    voice.play_for(args.duration)?;

    let graph = voice.playback().graph();
    let gain = graph.get_node_from(ConnectionGraph::GAIN)?.id();
    let source = graph.source_node()?.id();
    let samples: Vec<(f64, Option<f32>, Option<f32>)> =
        sample_times(args.duration, args.sample_every)
            .into_iter()
            .map(|t| {
                (
                    t,
                    host.param_value_at(gain, ParamName::Gain, t),
                    host.param_value_at(source, ParamName::Frequency, t),
                )
            })
            .collect();

    host.advance_to(args.duration);
    let still_playing = voice.is_playing();
    tracing::debug!(still_playing, "patch simulation finished");

    let events = host.events();
    if args.json {
        let report = json!({
            "name": patch.name,
            "waveform": voice.waveform().to_string(),
            "stages": graph.names().collect::<Vec<_>>(),
            "samples": samples
                .iter()
                .map(|(t, g, f)| json!({ "time": t, "gain": g, "frequency": f }))
                .collect::<Vec<_>>(),
            "events": events.iter().map(event_json).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Patch:     {}", patch.name);
    if let Some(description) = &patch.description {
        println!("           {description}");
    }
    println!("Waveform:  {}", voice.waveform());
    println!("Chain:     {}", graph.names().collect::<Vec<_>>().join(" -> "));
    println!();
    println!("{:>8}  {:>10}  {:>12}", "time", "gain", "frequency");
    for (t, g, f) in &samples {
        println!("{:>7.3}s  {:>10}  {:>12}", t, format_level(*g), format_hz(*f));
    }
    println!();
    print_log(&events);
    Ok(())
}

fn format_level(value: Option<f32>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}

fn format_hz(value: Option<f32>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2} Hz"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn plays_patch_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pluck.toml");
        std::fs::write(
            &path,
            r#"
            name = "pluck"
            waveform = "triangle"
            note = "C4"

            [[events]]
            event = "ramp"
            param = "gain"
            from = "1"
            to = "0.01"
            over = "200ms"
            "#,
        )
        .unwrap();

        run(PatchArgs {
            path,
            duration: 0.3,
            sample_every: 0.05,
            json: true,
        })
        .unwrap();
    }

    #[test]
    fn rejects_non_positive_duration() {
        let result = run(PatchArgs {
            path: PathBuf::from("unused.toml"),
            duration: 0.0,
            sample_every: 0.1,
            json: false,
        });
        assert!(result.is_err());
    }

    #[test]
    fn formats_missing_values() {
        assert_eq!(format_level(None), "-");
        assert_eq!(format_hz(Some(440.0)), "440.00 Hz");
    }
}
