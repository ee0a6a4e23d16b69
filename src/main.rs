//! Siren - fully local, always-listening voice assistant
//!
//! Audio flows from the microphone through a wake-word gate; on a hit the
//! utterance is captured, transcribed by the STT worker, answered by the
//! LLM worker, and spoken back through the TTS worker with partial model
//! output streamed into synthesis. The three workers are separate
//! processes supervised by this binary; nothing ever leaves the machine.

#![forbid(unsafe_code)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use config::{Config, Environment, File};
use siren_audio::{
    Chime, FrameRead, FrameSource, NoiseFloor, OnnxWakeModel, SpeechGate, VadGate, WakeDetector,
    WakeInference,
};
use siren_core::{
    handlers::{FileSearchHandler, MemoryHandler, NoteHandler, WebSearchHandler},
    AppConfig, ConversationController, HandlerRegistry, Intent, LlmRouter, PerfLog, ResponseText,
    Session, StreamingBridge, TranscriptionLog,
};
use siren_rpc::{
    LanguageModel, LlmClient, SpeechSynth, SpeechToText, StreamOptions, SttClient, Supervisor,
    TtsClient, WorkerSpec,
};
use siren_search::{DocumentIndexer, MiniLmEmbedder};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if present)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let app_config = load_config();
    init_tracing(&app_config.paths.logs_dir)?;

    info!("Starting Siren v{}", env!("CARGO_PKG_VERSION"));

    if cli.index {
        return run_indexer(&app_config).await;
    }
    run_assistant(app_config).await
}

/// Layer `config/default.toml`, optional `config/local.toml`, then
/// `SIREN__`-prefixed environment variables. An unreadable configuration
/// is recoverable: the built-in defaults are used.
fn load_config() -> AppConfig {
    let built = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name("config/local").required(false))
        .add_source(
            Environment::with_prefix("SIREN")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .and_then(|c| c.try_deserialize::<AppConfig>());

    match built {
        Ok(config) => config,
        Err(e) => {
            eprintln!("warning: configuration unreadable ({e}), using defaults");
            AppConfig::default()
        }
    }
}

/// Console layer plus a JSON layer appending to `logs/app.jsonl`.
fn init_tracing(logs_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("cannot create log directory {}", logs_dir.display()))?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(logs_dir.join("app.jsonl"))
        .context("cannot open logs/app.jsonl")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "siren=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::sync::Mutex::new(file)),
        )
        .init();
    Ok(())
}

/// The `--index` subtool: build the document index and exit. Never opens
/// the microphone or spawns a worker.
async fn run_indexer(config: &AppConfig) -> Result<()> {
    info!("Building document index");
    let embedder = MiniLmEmbedder::new().context("embedding model unavailable")?;
    let indexer = DocumentIndexer::new(
        embedder,
        &config.paths.search_config,
        &config.paths.index_dir,
    );
    let count = indexer.run().await.context("indexing failed")?;
    info!(
        "Indexed {} documents into {}",
        count,
        config.paths.index_dir.display()
    );
    Ok(())
}

fn worker_specs(config: &AppConfig) -> Vec<WorkerSpec> {
    // Start order is fixed: TTS, STT, LLM.
    [
        ("tts", &config.workers.tts),
        ("stt", &config.workers.stt),
        ("llm", &config.workers.llm),
    ]
    .into_iter()
    .map(|(name, worker)| WorkerSpec {
        name: name.to_string(),
        command: worker.command.clone(),
        args: worker.args.clone(),
        port: worker.port,
    })
    .collect()
}

async fn run_assistant(config: AppConfig) -> Result<()> {
    let app_started = Instant::now();

    // Wake models load before anything is spawned: a missing model file
    // is fatal and must not leave workers behind.
    let mut models: Vec<Box<dyn WakeInference>> = Vec::new();
    for path in &config.wake.model_paths {
        models.push(Box::new(OnnxWakeModel::load(path)?));
    }
    let mut wake = WakeDetector::with_tuning(
        models,
        config.wake.threshold,
        Duration::from_millis(config.wake.cooldown_ms),
    );

    let mut supervisor = Supervisor::new()?;
    if let Err(e) = supervisor.start_all(&worker_specs(&config)).await {
        return Err(e).context("worker startup failed");
    }

    let outcome = assistant_loop(&config, &mut wake, &supervisor, app_started).await;

    // Teardown runs on every exit path, including Ctrl-C and fatal
    // errors surfaced by the loop.
    supervisor.shutdown().await;
    info!("Siren shut down");
    outcome
}

async fn assistant_loop(
    config: &AppConfig,
    wake: &mut WakeDetector,
    supervisor: &Supervisor,
    app_started: Instant,
) -> Result<()> {
    let host = &config.workers.host;
    let perf = Arc::new(PerfLog::new(&config.paths.logs_dir));
    let transcripts = Arc::new(TranscriptionLog::new(&config.paths.logs_dir));
    let text = Arc::new(ResponseText::load(
        config.paths.config_dir.join("llm_responses.json"),
    ));

    let tts: Arc<dyn SpeechSynth> =
        Arc::new(TtsClient::new(host, config.workers.tts.port)?);
    let stt: Arc<dyn SpeechToText> =
        Arc::new(SttClient::new(host, config.workers.stt.port)?);
    let llm_client: Arc<dyn LanguageModel> =
        Arc::new(LlmClient::new(host, config.workers.llm.port)?);

    let registry = HandlerRegistry::new()
        .with(
            Intent::Note,
            Arc::new(NoteHandler::new(
                config.paths.config_dir.join("notes.json"),
                Arc::clone(&text),
            )),
        )
        .with(
            Intent::Memory,
            Arc::new(MemoryHandler::new(
                config.paths.config_dir.join("memory.log"),
                Arc::clone(&text),
            )),
        )
        .with(
            Intent::WebSearch,
            Arc::new(WebSearchHandler::new(
                Arc::clone(&llm_client),
                Arc::clone(&text),
            )),
        )
        .with(
            Intent::FileSearch,
            Arc::new(FileSearchHandler::new(
                &config.paths.index_dir,
                Arc::clone(&text),
            )),
        );
    let llm: Arc<dyn LanguageModel> = Arc::new(LlmRouter::new(llm_client, registry));

    // Warm the heavyweight workers so the first turn is not the slow one.
    let warmup_started = Instant::now();
    if let Err(e) = tts.warmup().await {
        warn!("TTS warmup failed: {}", e);
    }
    if let Err(e) = llm.warmup().await {
        warn!("LLM warmup failed: {}", e);
    }
    perf.record(
        "worker_warmup",
        warmup_started.elapsed(),
        serde_json::Value::Null,
    );

    let session = Session::start(&config.paths.config_dir, &config.paths.logs_dir);
    let bridge = StreamingBridge::new(
        config.bridge.min_chunk_size,
        config.bridge.sentence_boundary,
        StreamOptions {
            chunk_threshold: config.bridge.worker_chunk_threshold,
            sentence_boundary: config.bridge.sentence_boundary,
        },
        Arc::clone(&perf),
    );
    let mut controller = ConversationController::new(
        stt,
        llm,
        Arc::clone(&tts),
        bridge,
        session,
        Arc::clone(&perf),
        transcripts,
        &config.capture,
    );

    let floor = NoiseFloor::new(config.audio.noise_window_frames, config.audio.noise_multiplier);
    let mut gate = VadGate::new();
    let mut source = FrameSource::open().context("cannot open capture device")?;

    perf.record(
        "app_startup",
        app_started.elapsed(),
        serde_json::json!({"workers": supervisor.services().len()}),
    );

    if let Err(e) = tts.speak(&config.persona.greeting).await {
        warn!("could not announce readiness: {}", e);
    }
    let wake_chime = Chime::from_file(&config.wake.chime_path);
    let end_chime = Chime::generated();
    wake_chime.play_detached();

    wake.enable();
    info!("Wake word detection active - listening");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl-C)");
                return Ok(());
            }
            frame = source.read() => {
                match frame {
                    Ok(frame) => {
                        let packet = gate.packet_speech(&frame).unwrap_or(false);
                        floor.update(&frame, packet);

                        let hit = wake.process(&frame, packet, floor.threshold());
                        if let Some(event) = hit {
                            if controller.accepts_wake() {
                                debug!("wake scores: {:?}", event.scores);
                                wake_chime.play_detached();
                                wake.disable();
                                controller.run_turn(&mut source, &mut gate, &floor).await;
                                wake.enable();
                                end_chime.play_detached();
                                info!("Conversation ended - listening for wake word");
                            }
                        }
                    }
                    Err(siren_audio::Error::AudioUnavailable(e)) => {
                        debug!("audio momentarily unavailable: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                    Err(e) => {
                        return Err(e).context("audio pipeline failed");
                    }
                }
            }
        }
    }
}
