use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lingo_voice::audio::{AudioFeeder, AudioSink, NullSink, WavChunkReader, WavFileSink};
use lingo_voice::scenario::{LearnerProfile, ScenarioGenerator, ScenarioImagery, ScenarioRecord};
use lingo_voice::{create_router, AppState, Config, OpenAiClient, ServiceHandles, Session};
use lingo_voice::{TerminationReason, TurnController};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "lingo-voice", version, about = "Spoken language practice sessions")]
struct Cli {
    /// Config file (extension optional)
    #[arg(long, global = true, default_value = "config/lingo-voice")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve,

    /// Hold one conversation from recorded WAV utterances
    Converse {
        #[arg(long)]
        language: String,

        #[arg(long)]
        level: String,

        #[arg(long)]
        name: String,

        /// Reuse a saved scenario instead of generating one
        #[arg(long)]
        scenario: Option<PathBuf>,

        /// Save the scenario used by this session
        #[arg(long)]
        save_scenario: Option<PathBuf>,

        /// Render the scenario background and avatar here
        /// (the scenario is saved alongside unless --save-scenario is given)
        #[arg(long)]
        images_dir: Option<PathBuf>,

        /// One WAV file per user utterance, in order
        #[arg(long = "utterance", required = true)]
        utterances: Vec<PathBuf>,

        /// Write replies as WAV files here
        #[arg(long)]
        replies_dir: Option<PathBuf>,

        /// Feed utterances at capture speed
        #[arg(long)]
        realtime: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("Lingo Voice v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let client = Arc::new(OpenAiClient::new(cfg.openai_settings()?)?);
    let services = ServiceHandles::from_client(client);

    match cli.command {
        Command::Serve => serve(cfg, services).await,
        Command::Converse {
            language,
            level,
            name,
            scenario,
            save_scenario,
            images_dir,
            utterances,
            replies_dir,
            realtime,
        } => {
            let profile = LearnerProfile::new(language, level, name)?;
            let options = ConverseOptions {
                scenario,
                save_scenario,
                images_dir,
                utterances,
                replies_dir,
                realtime,
            };
            converse(cfg, services, profile, options).await
        }
    }
}

async fn serve(cfg: Config, services: ServiceHandles) -> Result<()> {
    let state = AppState::new(
        services,
        cfg.service.http.assets_dir.clone(),
        cfg.session_config("template")?,
        cfg.audio.feed_capacity,
    );
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

struct ConverseOptions {
    scenario: Option<PathBuf>,
    save_scenario: Option<PathBuf>,
    images_dir: Option<PathBuf>,
    utterances: Vec<PathBuf>,
    replies_dir: Option<PathBuf>,
    realtime: bool,
}

async fn converse(
    cfg: Config,
    services: ServiceHandles,
    profile: LearnerProfile,
    options: ConverseOptions,
) -> Result<()> {
    let mut record = match &options.scenario {
        Some(path) => {
            info!("Loading scenario from {}", path.display());
            ScenarioRecord::load(path)?
        }
        None => ScenarioRecord::new(
            ScenarioGenerator::new(services.generation.clone())
                .generate(&profile)
                .await?,
        ),
    };

    if let Some(dir) = &options.images_dir {
        record = ScenarioImagery::new(services.images.clone(), dir)
            .render_record(record.scenario)
            .await?;
    }

    let save_path = options
        .save_scenario
        .clone()
        .or_else(|| options.images_dir.as_ref().map(|dir| dir.join("scenario.json")));
    if let Some(path) = save_path {
        record.save(&path)?;
        info!("Scenario saved to {}", path.display());
    }

    let scenario = record.scenario;

    info!(
        "Scenario: {} at {} with {}",
        scenario.goal(),
        scenario.place(),
        scenario.person_to_talk_to()
    );

    let session_config = cfg.session_config(format!("session-{}", uuid::Uuid::new_v4()))?;
    let cancel = CancellationToken::new();
    let reader = WavChunkReader::new(options.utterances, session_config.endpointing.clone())
        .realtime(options.realtime);
    let (source, feeder) = AudioFeeder::spawn(reader, cfg.audio.feed_capacity, cancel.clone());

    let sink: Box<dyn AudioSink> = match options.replies_dir {
        Some(dir) => Box::new(WavFileSink::new(dir)?),
        None => Box::new(NullSink),
    };

    let session = Session::new(
        session_config.session_id.clone(),
        scenario,
        session_config.retention,
    );
    let controller = TurnController::new(
        session,
        services,
        Box::new(source),
        sink,
        session_config,
        cancel.clone(),
    );

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, ending session");
            ctrl_c.cancel();
        }
    });

    let outcome = controller.run().await;
    cancel.cancel();
    if let Err(e) = feeder.await? {
        warn!("Audio feeder failed: {:#}", e);
    }

    match outcome {
        Ok(summary) => {
            for turn in &summary.history {
                println!("[{}] {}: {}", turn.sequence_number, turn.role.as_str(), turn.text);
            }
            match summary.reason {
                TerminationReason::Phrase { phrase } => info!("Ended by '{}'", phrase),
                reason => info!("Ended: {:?}", reason),
            }
            if summary.failed_turns > 0 {
                warn!("{} turn(s) had to be repeated", summary.failed_turns);
            }
            Ok(())
        }
        // Running out of utterances closes the feed
        Err(lingo_voice::SessionError::RecordingDevice(e)) => {
            info!("Audio input ended: {}", e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
