//! Run a beat track against the offline host.

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;
use chime_config::{BeatTrackConfig, format_pattern, validate_beat_track};
use chime_core::offline::OfflineHost;
use chime_core::{AudioContext, Beat, BeatTrack};
use clap::Args;
use serde_json::json;

use super::common::{event_json, print_log};

/// Schedule passes of a beat track and report what plays when.
#[derive(Args)]
pub struct SimulateArgs {
    /// Beat track TOML file
    pub path: PathBuf,

    /// Number of passes over the pattern
    #[arg(short, long, default_value = "1")]
    pub passes: usize,

    /// Print the host log as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the simulate command.
pub fn run(args: SimulateArgs) -> anyhow::Result<()> {
    let config = BeatTrackConfig::load(&args.path)
        .with_context(|| format!("loading {}", args.path.display()))?;
    validate_beat_track(&config)?;

    let host = Rc::new(OfflineHost::new());
    let context = AudioContext::with_host(host.clone());
    let mut track = config.build(&context)?;
    let lookahead = config.engine.lookahead_seconds()?;

    if !args.json {
        println!("Track:    {}", config.name);
        println!(
            "Pattern:  {} ({} beats x {:.3}s)",
            format_pattern(&track.pattern()),
            track.num_beats(),
            track.beat_duration()
        );
        println!("Samples:  {}", track.sampler().len());
        println!();
    }

    let mut timeline = Vec::new();
    for pass in 0..args.passes {
        // One pass at a time: a beat's playhead flags follow its latest mark.
        let start_in = if pass == 0 { lookahead } else { 0.0 };
        track.schedule_pass(start_in)?;
        let pass_start = host.now() + start_in;
        for index in 0..track.num_beats() {
            let midpoint = pass_start + (index as f64 + 0.5) * track.beat_duration();
            host.advance_to(midpoint);
            timeline.push((pass, index, midpoint, playhead(&track)));
        }
        host.advance_to(pass_start + track.pass_duration());
    }

    let events = host.events();
    if args.json {
        let beats: Vec<_> = timeline
            .iter()
            .map(|(pass, index, at, state)| {
                json!({
                    "pass": pass,
                    "beat": index,
                    "at": at,
                    "current": state.current,
                    "sounding": state.sounding,
                })
            })
            .collect();
        let report = json!({
            "name": config.name,
            "pattern": format_pattern(&track.pattern()),
            "beats": beats,
            "events": events.iter().map(event_json).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Playhead:");
    for (pass, index, at, state) in &timeline {
        println!(
            "  pass {pass} beat {index:>2} [{at:>7.3}s] current={:?} sounding={:?}",
            state.current, state.sounding
        );
    }
    println!();
    print_log(&events);
    Ok(())
}

struct Playhead {
    current: Vec<usize>,
    sounding: Vec<usize>,
}

fn playhead(track: &BeatTrack) -> Playhead {
    let indices = |pred: fn(&Beat) -> bool| {
        track
            .beats()
            .iter()
            .enumerate()
            .filter(|(_, beat)| pred(beat))
            .map(|(i, _)| i)
            .collect()
    };
    Playhead {
        current: indices(Beat::current_time_is_playing),
        sounding: indices(Beat::is_playing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn simulates_two_passes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("beat.toml");
        std::fs::write(
            &path,
            r#"
            name = "t"
            num_beats = 4
            beat_duration = "100ms"
            pattern = "x.x."

            [[samples]]
            duration = "50ms"
            "#,
        )
        .unwrap();

        run(SimulateArgs {
            path: path.clone(),
            passes: 2,
            json: false,
        })
        .unwrap();
        run(SimulateArgs {
            path,
            passes: 1,
            json: true,
        })
        .unwrap();
    }

    #[test]
    fn missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let result = run(SimulateArgs {
            path: dir.path().join("none.toml"),
            passes: 1,
            json: false,
        });
        assert!(result.is_err());
    }
}
