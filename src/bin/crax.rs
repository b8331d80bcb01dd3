//! CLI binary for crax.

use clap::{Args, Parser, Subcommand};
use crax::classifier::ClassifierOptions;
use crax::config::TtsBackend;
use crax::keywords::BUILTIN_KEYWORDS;
use crax::llm::{OpenAiClientConfig, OpenAiCompletionClient};
use crax::responder::ResponderOptions;
use crax::stt::{MicrophoneRecognizer, SpeechRecognizer, TextRecognizer, TranscriptionClient};
use crax::{
    ActionRegistry, CraxConfig, IntentClassifier, ResponseGenerator, SessionLoop, SessionOptions,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CRA-X: voice command classifier that learns new keywords.
#[derive(Parser)]
#[command(name = "crax", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Listen for voice commands (the default).
    Run(RunArgs),

    /// Print built-in and learned keywords.
    Keywords,

    /// List available audio input devices.
    Devices,

    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Overrides for a listening session.
#[derive(Args, Default)]
struct RunArgs {
    /// Seconds to wait for speech to start (0 waits forever).
    #[arg(long)]
    listen_timeout: Option<f32>,

    /// Maximum phrase length in seconds (0 is unbounded).
    #[arg(long)]
    phrase_time_limit: Option<f32>,

    /// Pause after each handled command, in milliseconds.
    #[arg(long)]
    cooldown_ms: Option<u64>,

    /// Read commands as lines from stdin instead of the microphone.
    #[arg(long)]
    text: bool,

    /// Print replies instead of speaking them.
    #[arg(long)]
    silent: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Suppress noisy dependency logs by default.
    // Users can override with RUST_LOG=debug to see everything.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("crax=info,reqwest=warn,hyper=warn")),
        )
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run(RunArgs::default()));
    if let Command::Init { force } = command {
        return write_default_config(cli.config, force);
    }

    let config = CraxConfig::load(cli.config.as_deref())?;
    match command {
        Command::Run(args) => run_session(config, args).await,
        Command::Keywords => list_keywords(&config),
        Command::Devices => list_devices(),
        Command::Init { .. } => Ok(()),
    }
}

async fn run_session(mut config: CraxConfig, args: RunArgs) -> anyhow::Result<()> {
    if let Some(secs) = args.listen_timeout {
        config.session.listen_timeout_secs = secs;
    }
    if let Some(secs) = args.phrase_time_limit {
        config.session.phrase_time_limit_secs = secs;
    }
    if let Some(ms) = args.cooldown_ms {
        config.session.cooldown_ms = ms;
    }
    if args.silent {
        config.tts.backend = TtsBackend::Console;
    }

    let client = OpenAiCompletionClient::new(OpenAiClientConfig::from_llm_config(&config.llm)?)?;
    let service = Arc::new(client);
    let classifier = IntentClassifier::new(
        service.clone(),
        ClassifierOptions {
            max_output_tokens: config.llm.classify_max_tokens,
        },
    );
    let responder = ResponseGenerator::new(
        service,
        ResponderOptions {
            max_output_tokens: config.llm.response_max_tokens,
            temperature: config.llm.response_temperature,
        },
    );

    let recognizer: Box<dyn SpeechRecognizer> = if args.text {
        println!("Type a command per line. Ctrl+D or 'stop listening' to quit.");
        Box::new(TextRecognizer::stdin())
    } else {
        Box::new(MicrophoneRecognizer::new(
            config.audio.clone(),
            config.vad.clone(),
            Duration::from_millis(u64::from(config.stt.calibration_ms)),
            TranscriptionClient::from_config(&config.stt, &config.llm),
        ))
    };
    let speaker = crax::tts::speaker_from_config(&config.tts)?;
    let store = config.keywords.store();
    info!("keyword log: {}", store.path().display());

    let mut session = SessionLoop::new(
        recognizer,
        speaker,
        classifier,
        responder,
        ActionRegistry::builtin(),
        store,
        SessionOptions::from_config(&config.session),
    );

    // Handle Ctrl+C
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            cancel_clone.cancel();
        }
    });

    let summary = session.run(cancel).await?;
    info!(
        "session ended ({:?}): {} utterances, {} dispatched, {} learned, {} errors",
        summary.exit,
        summary.utterances,
        summary.dispatched,
        summary.learned.len(),
        summary.errors
    );
    Ok(())
}

fn list_keywords(config: &CraxConfig) -> anyhow::Result<()> {
    let store = config.keywords.store();

    println!("Built-in keywords:");
    for keyword in BUILTIN_KEYWORDS {
        println!("  {keyword}");
    }

    let learned = store.learned();
    println!("\nLearned keywords ({}):", store.path().display());
    if learned.is_empty() {
        println!("  (none)");
    }
    for keyword in learned {
        println!("  {keyword}");
    }

    println!("\nKeywords with dedicated actions:");
    for keyword in ActionRegistry::builtin().keywords() {
        println!("  {keyword}");
    }
    Ok(())
}

fn write_default_config(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(CraxConfig::default_config_path);
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    CraxConfig::default().save_to_file(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn list_devices() -> anyhow::Result<()> {
    println!("Input devices:");
    for name in crax::audio::list_input_devices()? {
        println!("  {name}");
    }
    Ok(())
}
