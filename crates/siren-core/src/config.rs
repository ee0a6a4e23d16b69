//! Application configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Noise-floor tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Noise window length in frames (100 ≈ 3 s).
    #[serde(default = "default_noise_window")]
    pub noise_window_frames: usize,

    /// Multiplier applied to the window mean.
    #[serde(default = "default_noise_multiplier")]
    pub noise_multiplier: f32,
}

fn default_noise_window() -> usize {
    100
}

fn default_noise_multiplier() -> f32 {
    2.0
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            noise_window_frames: default_noise_window(),
            noise_multiplier: default_noise_multiplier(),
        }
    }
}

/// Wake-word detection tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WakeConfig {
    /// ONNX wake models to load; every listed file must exist.
    #[serde(default = "default_wake_models")]
    pub model_paths: Vec<PathBuf>,

    /// Confidence above which a wake event fires.
    #[serde(default = "default_wake_threshold")]
    pub threshold: f32,

    /// Suppression interval after a hit, in milliseconds.
    #[serde(default = "default_wake_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Chime played on detection; the generated beep covers a missing file.
    #[serde(default = "default_wake_chime")]
    pub chime_path: PathBuf,
}

fn default_wake_models() -> Vec<PathBuf> {
    vec![PathBuf::from("models/alexa.onnx")]
}

fn default_wake_threshold() -> f32 {
    0.77
}

fn default_wake_cooldown_ms() -> u64 {
    2000
}

fn default_wake_chime() -> PathBuf {
    PathBuf::from("config/sounds/kwd_success.wav")
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            model_paths: default_wake_models(),
            threshold: default_wake_threshold(),
            cooldown_ms: default_wake_cooldown_ms(),
            chime_path: default_wake_chime(),
        }
    }
}

/// Utterance capture tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Trailing silence that ends the post-wake capture.
    #[serde(default = "default_wake_silence_ms")]
    pub wake_silence_ms: u64,

    /// Trailing silence that ends a follow-up capture.
    #[serde(default = "default_followup_silence_ms")]
    pub followup_silence_ms: u64,
}

fn default_wake_silence_ms() -> u64 {
    3000
}

fn default_followup_silence_ms() -> u64 {
    4000
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            wake_silence_ms: default_wake_silence_ms(),
            followup_silence_ms: default_followup_silence_ms(),
        }
    }
}

/// Streaming bridge tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Minimum accumulated characters before a TTS submission.
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,

    /// Also submit whenever the accumulator ends a sentence.
    #[serde(default = "default_sentence_boundary")]
    pub sentence_boundary: bool,

    /// Chunk threshold requested from the LLM worker.
    #[serde(default = "default_worker_chunk_threshold")]
    pub worker_chunk_threshold: usize,
}

fn default_min_chunk_size() -> usize {
    80
}

fn default_sentence_boundary() -> bool {
    true
}

fn default_worker_chunk_threshold() -> usize {
    50
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            min_chunk_size: default_min_chunk_size(),
            sentence_boundary: default_sentence_boundary(),
            worker_chunk_threshold: default_worker_chunk_threshold(),
        }
    }
}

/// How to launch one worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Loopback port the worker binds.
    pub port: u16,
    /// Executable to spawn.
    pub command: String,
    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
}

impl WorkerConfig {
    fn uvicorn(app: &str, port: u16) -> Self {
        Self {
            port,
            command: "python3".to_string(),
            args: vec![
                "-m".to_string(),
                "uvicorn".to_string(),
                app.to_string(),
                "--host".to_string(),
                "127.0.0.1".to_string(),
                "--port".to_string(),
                port.to_string(),
            ],
        }
    }
}

/// The three worker processes, in start order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkersConfig {
    /// Loopback host shared by all workers.
    #[serde(default = "default_worker_host")]
    pub host: String,
    /// TTS worker (started first).
    #[serde(default = "default_tts_worker")]
    pub tts: WorkerConfig,
    /// STT worker.
    #[serde(default = "default_stt_worker")]
    pub stt: WorkerConfig,
    /// LLM worker (started last).
    #[serde(default = "default_llm_worker")]
    pub llm: WorkerConfig,
}

fn default_worker_host() -> String {
    siren_rpc::WORKER_HOST.to_string()
}

fn default_tts_worker() -> WorkerConfig {
    WorkerConfig::uvicorn("workers.tts_server:app", siren_rpc::TTS_PORT)
}

fn default_stt_worker() -> WorkerConfig {
    WorkerConfig::uvicorn("workers.stt_server:app", siren_rpc::STT_PORT)
}

fn default_llm_worker() -> WorkerConfig {
    WorkerConfig::uvicorn("workers.llm_server:app", siren_rpc::LLM_PORT)
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            host: default_worker_host(),
            tts: default_tts_worker(),
            stt: default_stt_worker(),
            llm: default_llm_worker(),
        }
    }
}

/// Filesystem layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding persona, memory, notes and canned responses.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Directory receiving every log file.
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,

    /// Search paths definition for the indexer.
    #[serde(default = "default_search_config")]
    pub search_config: PathBuf,

    /// Where the document index is persisted.
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("config")
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_search_config() -> PathBuf {
    PathBuf::from("config/search_config.json")
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("config/faiss_index")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            logs_dir: default_logs_dir(),
            search_config: default_search_config(),
            index_dir: default_index_dir(),
        }
    }
}

/// Assistant persona surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Spoken once at startup when all services are ready.
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

fn default_greeting() -> String {
    "Hi! Siren at your service.".to_string()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Noise-floor tuning.
    #[serde(default)]
    pub audio: AudioConfig,
    /// Wake detection tuning.
    #[serde(default)]
    pub wake: WakeConfig,
    /// Capture tuning.
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Streaming bridge tuning.
    #[serde(default)]
    pub bridge: BridgeConfig,
    /// Worker processes.
    #[serde(default)]
    pub workers: WorkersConfig,
    /// Filesystem layout.
    #[serde(default)]
    pub paths: PathsConfig,
    /// Persona surface.
    #[serde(default)]
    pub persona: PersonaConfig,
}
