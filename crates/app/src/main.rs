use std::path::{Path, PathBuf};

use audio_analysis_tools_core::{
    compute_spectrogram, AppConfig, AudioAnalyzer, AudioBuffer, BeatDetector, EnvelopeAnalyzer,
    EnvelopeConfig, EnvelopeData, ModuleGraph, OnsetDetector, Revision, SpectrumAnalyzer,
};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

fn main() -> audio_analysis_tools_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Features { input, start, end } => run_features(&config, &input, start, end),
        Commands::Envelope { input, output } => run_envelope(&config, &input, output.as_deref()),
        Commands::Onsets { input, output } => run_onsets(&config, &input, output.as_deref()),
        Commands::Beats { input, output } => run_beats(&config, &input, output.as_deref()),
        Commands::Spectrogram { input, output } => run_spectrogram(&config, &input, &output),
        Commands::Modules { revision } => run_modules(revision),
        Commands::Config => emit_text(config.to_json_pretty()?, None),
    }
}

fn run_features(
    config: &AppConfig,
    input: &Path,
    start: Option<f32>,
    end: Option<f32>,
) -> audio_analysis_tools_core::Result<()> {
    let buffer = AudioBuffer::from_wav(input)?;
    let mut analyzer = AudioAnalyzer::with_envelope(config.analysis.clone(), config.envelope.clone())?;
    tracing::info!(input = %input.display(), duration = buffer.duration(), "extracting features");

    let value = match (start, end) {
        (None, None) => serde_json::to_value(analyzer.analyze_buffer(&buffer)?)?,
        (start, end) => {
            let start = start.unwrap_or(0.0);
            let end = end.unwrap_or_else(|| buffer.duration());
            analyzer.process_buffer_range(&buffer, start, end)?;
            json!({
                "start": start,
                "end": end,
                "features": analyzer.features(),
                "magnitude_spectrum": analyzer.magnitude_spectrum(),
            })
        }
    };
    emit(&value, None)
}

fn run_envelope(config: &AppConfig, input: &Path, output: Option<&Path>) -> audio_analysis_tools_core::Result<()> {
    let envelope = analyse_envelope(config, input)?;
    emit(&serde_json::to_value(&envelope)?, output)
}

fn run_onsets(config: &AppConfig, input: &Path, output: Option<&Path>) -> audio_analysis_tools_core::Result<()> {
    let envelope = analyse_envelope(config, input)?;
    let onsets = OnsetDetector::new(config.onset.clone()).detect(&envelope)?;
    tracing::info!(count = onsets.len(), "onsets detected");
    emit(&json!({ "onsets": onsets }), output)
}

fn run_beats(config: &AppConfig, input: &Path, output: Option<&Path>) -> audio_analysis_tools_core::Result<()> {
    let buffer = AudioBuffer::from_wav(input)?;
    let frame_size = config.analysis.frame_size;
    let mut spectrum = SpectrumAnalyzer::new(frame_size, config.analysis.window_type)?;
    let mut beats = BeatDetector::from_config(&config.beat)?;
    let sample_rate = buffer.sample_rate() as f32;

    let mut events = Vec::new();
    for (index, frame) in buffer.to_mono().chunks_exact(frame_size).enumerate() {
        beats.process_magnitude(&spectrum.process(frame)?.magnitude);

        let (kick, snare, hihat) = (beats.is_kick(), beats.is_snare(), beats.is_hihat());
        if kick || snare || hihat {
            events.push(json!({
                "time_sec": (index * frame_size) as f32 / sample_rate,
                "kick": kick,
                "snare": snare,
                "hihat": hihat,
            }));
        }
    }

    tracing::info!(events = events.len(), "beats detected");
    emit(&Value::Array(events), output)
}

fn run_spectrogram(config: &AppConfig, input: &Path, output: &Path) -> audio_analysis_tools_core::Result<()> {
    let buffer = AudioBuffer::from_wav(input)?;
    let mut spectrogram = compute_spectrogram(&buffer, &config.spectrogram)?;
    spectrogram.normalize();
    tracing::info!(columns = spectrogram.columns.len(), output = %output.display(), "writing spectrogram");
    emit(&serde_json::to_value(&spectrogram)?, Some(output))
}

fn run_modules(revision: Option<Revision>) -> audio_analysis_tools_core::Result<()> {
    let revisions = match revision {
        Some(revision) => vec![revision],
        None => Revision::ALL.to_vec(),
    };

    let mut report = Vec::with_capacity(revisions.len());
    for revision in revisions {
        let graph = ModuleGraph::for_revision(revision);
        graph.validate()?;
        let order = graph.topological_order()?;
        let modules: Vec<Value> = order
            .iter()
            .filter_map(|name| graph.module(name))
            .map(|rules| {
                json!({
                    "rules": rules,
                    "visible": graph.transitive_public(&rules.name),
                })
            })
            .collect();
        report.push(json!({
            "revision": revision,
            "build_order": order,
            "modules": modules,
        }));
    }

    emit(&Value::Array(report), None)
}

fn analyse_envelope(config: &AppConfig, input: &Path) -> audio_analysis_tools_core::Result<EnvelopeData> {
    let buffer = AudioBuffer::from_wav(input)?;
    let mut analyzer = EnvelopeAnalyzer::new(EnvelopeConfig {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        ..config.envelope.clone()
    })?;
    tracing::info!(input = %input.display(), channels = buffer.channels(), "following envelope");
    analyzer.analyze(buffer.samples())
}

fn emit(value: &Value, output: Option<&Path>) -> audio_analysis_tools_core::Result<()> {
    emit_text(serde_json::to_string_pretty(value)?, output)
}

fn emit_text(text: String, output: Option<&Path>) -> audio_analysis_tools_core::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text)?;
            tracing::info!(path = %path.display(), "wrote output");
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio analysis toolkit", long_about = None)]
struct Cli {
    /// JSON configuration file; missing sections use their defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print per-frame features, or the features of one time range.
    Features {
        /// WAV file to analyse.
        input: PathBuf,
        /// Start of the range in seconds.
        #[arg(long)]
        start: Option<f32>,
        /// End of the range in seconds.
        #[arg(long)]
        end: Option<f32>,
    },
    /// Follow the amplitude envelope of a WAV file.
    Envelope {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Detect onset times from the amplitude envelope.
    Onsets {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Report kick, snare and hi-hat beats per frame.
    Beats {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write a normalised spectrogram as JSON.
    Spectrogram {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate the module manifest and print its build order.
    Modules {
        /// Only report one revision (initial, split, consolidated or merged).
        #[arg(short, long)]
        revision: Option<Revision>,
    },
    /// Print the effective configuration.
    Config,
}
