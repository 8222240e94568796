use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use plenum::{
    normalize_audio, parse_transcription_file, parse_turns_file, reconcile, HumanMinutes,
    MachineMinutes, NormalizeConfig, Pipeline, PipelineConfig, PipelineOptions, ReconcileConfig,
};

#[derive(Parser)]
#[command(name = "plenum")]
#[command(author, version, about = "Meeting audio to attributed minutes pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on a meeting recording
    Process {
        /// Input audio file
        #[arg(short, long)]
        input: PathBuf,

        /// Session directory for all outputs
        #[arg(short, long)]
        session_dir: PathBuf,

        /// Apply the speech-band filter chain during normalization
        #[arg(long)]
        enhance: bool,

        /// Meeting agenda (text file)
        #[arg(long)]
        agenda: Option<PathBuf>,

        /// Participant list (text file), enables speaker naming
        #[arg(long)]
        participants: Option<PathBuf>,

        /// Official vote record (text file)
        #[arg(long)]
        votes: Option<PathBuf>,

        /// Name of the meeting chair
        #[arg(long)]
        chair: Option<String>,

        /// Language hint for transcription (overrides MEETING_LANGUAGE)
        #[arg(long)]
        language: Option<String>,

        /// Stop after reconciliation (no speaker naming, report or decisions)
        #[arg(long)]
        skip_llm: bool,

        /// Status log file
        #[arg(long, default_value = "history.json")]
        status_log: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Reconcile saved diarization and transcription files offline
    Reconcile {
        /// Diarization turns (JSON)
        #[arg(short, long)]
        turns: PathBuf,

        /// Transcription output (JSON, or plain text)
        #[arg(short = 'x', long)]
        transcription: PathBuf,

        /// Output file for reconciled segments (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Output file for human-readable minutes (text)
        #[arg(long)]
        human_readable: Option<PathBuf>,

        /// Merge gap threshold for same-speaker runs, in seconds
        #[arg(long, default_value = "5.0")]
        merge_gap: f64,

        /// Keep diarization turns as-is instead of merging runs
        #[arg(long)]
        no_merge: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Normalize an audio file without running the pipeline
    Normalize {
        /// Input audio file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Apply the speech-band filter chain
        #[arg(long)]
        enhance: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            session_dir,
            enhance,
            agenda,
            participants,
            votes,
            chair,
            language,
            skip_llm,
            status_log,
            verbose,
        } => {
            setup_logging(verbose);
            let mut config = PipelineConfig::from_env()?;
            if let Some(language) = language {
                config.language = language;
            }
            let pipeline = Pipeline::new(config, status_log);
            let options = PipelineOptions {
                enhance,
                context: plenum::models::ContextDocuments {
                    agenda,
                    participants,
                    votes,
                },
                chair,
                skip_llm,
                reconcile: ReconcileConfig::default(),
            };

            let outcome = pipeline.run_session(&input, &session_dir, &options).await?;
            info!(
                "Session {} completed: {} segments ({})",
                outcome.session_id,
                outcome.segments.len(),
                outcome.strategy
            );
            if !outcome.warnings.is_empty() {
                info!("{} validation warnings, see log above", outcome.warnings.len());
            }
            info!("Minutes written to {:?}", outcome.minutes_path);
            Ok(())
        }
        Commands::Reconcile {
            turns,
            transcription,
            output,
            human_readable,
            merge_gap,
            no_merge,
            verbose,
        } => {
            setup_logging(verbose);
            reconcile_files(
                turns,
                transcription,
                output,
                human_readable,
                merge_gap,
                no_merge,
            )
        }
        Commands::Normalize {
            input,
            output,
            enhance,
            verbose,
        } => {
            setup_logging(verbose);
            let config = NormalizeConfig {
                enhance,
                ..NormalizeConfig::default()
            };
            let written = normalize_audio(&input, &output, &config).await?;
            info!("Normalized audio written to {:?}", written);
            Ok(())
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn reconcile_files(
    turns_path: PathBuf,
    transcription_path: PathBuf,
    output: PathBuf,
    human_readable: Option<PathBuf>,
    merge_gap: f64,
    no_merge: bool,
) -> Result<()> {
    info!("Loading turns from {:?}", turns_path);
    let turns = parse_turns_file(&turns_path).context("Failed to parse diarization turns")?;
    info!("Loading transcription from {:?}", transcription_path);
    let transcription =
        parse_transcription_file(&transcription_path).context("Failed to parse transcription")?;

    let config = ReconcileConfig {
        merge_max_gap: merge_gap,
        merge_runs: !no_merge,
        ..ReconcileConfig::default()
    };
    let report = reconcile(&turns, &transcription, &config);
    let strategy = plenum::strategy_label(report.strategy);

    info!(
        "Reconciled {} turns into {} segments ({})",
        turns.len(),
        report.segments.len(),
        strategy
    );
    for warning in &report.warnings {
        info!("warning: {}", warning);
    }

    MachineMinutes::new(report.segments.clone(), strategy).write_json(&output)?;
    info!("Segments written to {:?}", output);

    if let Some(path) = human_readable {
        let names = HashMap::new();
        HumanMinutes::new(&report.segments, &names).write_file(&path)?;
        info!("Human-readable minutes written to {:?}", path);
    }

    Ok(())
}
