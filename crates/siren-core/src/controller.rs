//! Conversation state machine

use crate::bridge::StreamingBridge;
use crate::config::CaptureConfig;
use crate::error::Result;
use crate::perf::{PerfLog, TranscriptionLog};
use crate::session::Session;
use siren_audio::{capture_utterance, FrameRead, NoiseFloor, SpeechGate};
use siren_rpc::{LanguageModel, SpeechSynth, SpeechToText};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Where the controller currently is in the wake → reply → follow-up
/// cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    /// Listening for the wake word only.
    Idle,
    /// Recording the post-wake utterance.
    Capturing,
    /// Waiting on the STT worker.
    Transcribing,
    /// Streaming the model's reply into synthesis.
    Responding,
    /// Listening for a follow-up to begin.
    AwaitingFollowup,
    /// Recording a follow-up utterance.
    FollowupCapturing,
}

/// Observable conversation milestones, mirrored to an optional channel.
#[derive(Debug, Clone)]
pub enum ConversationEvent {
    /// The state machine moved.
    StateChanged(ConversationState),
    /// A user utterance was transcribed.
    Transcribed(String),
    /// The assistant finished a reply.
    Responded(String),
}

/// Drives one wake interaction at a time: capture, transcribe, respond,
/// then loop on follow-ups until the user goes quiet.
///
/// Owns the session for its lifetime. Errors inside a turn are logged and
/// the controller returns to `Idle`; the surrounding audio loop never
/// sees them.
pub struct ConversationController {
    stt: Arc<dyn SpeechToText>,
    llm: Arc<dyn LanguageModel>,
    tts: Arc<dyn SpeechSynth>,
    bridge: StreamingBridge,
    session: Session,
    perf: Arc<PerfLog>,
    transcripts: Arc<TranscriptionLog>,
    wake_silence_ms: u64,
    followup_silence_ms: u64,
    state: ConversationState,
    events: Option<mpsc::Sender<ConversationEvent>>,
}

impl ConversationController {
    /// Build a controller over the worker adapters.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        stt: Arc<dyn SpeechToText>,
        llm: Arc<dyn LanguageModel>,
        tts: Arc<dyn SpeechSynth>,
        bridge: StreamingBridge,
        session: Session,
        perf: Arc<PerfLog>,
        transcripts: Arc<TranscriptionLog>,
        capture: &CaptureConfig,
    ) -> Self {
        Self {
            stt,
            llm,
            tts,
            bridge,
            session,
            perf,
            transcripts,
            wake_silence_ms: capture.wake_silence_ms,
            followup_silence_ms: capture.followup_silence_ms,
            state: ConversationState::Idle,
            events: None,
        }
    }

    /// Mirror milestones onto `events`.
    #[must_use]
    pub fn with_events(mut self, events: mpsc::Sender<ConversationEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConversationState {
        self.state
    }

    /// Whether a wake event would start a turn right now. Wake events are
    /// ignored in every state except `Idle` and `AwaitingFollowup`.
    #[must_use]
    pub fn accepts_wake(&self) -> bool {
        matches!(
            self.state,
            ConversationState::Idle | ConversationState::AwaitingFollowup
        )
    }

    /// The session owned by this controller.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    fn transition(&mut self, state: ConversationState) {
        debug!("conversation state: {:?} -> {:?}", self.state, state);
        self.state = state;
        self.emit(ConversationEvent::StateChanged(state));
    }

    fn emit(&self, event: ConversationEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.try_send(event);
        }
    }

    /// Run one full wake interaction. Always leaves the controller in
    /// `Idle`; failures are logged, never propagated.
    pub async fn run_turn(
        &mut self,
        source: &mut dyn FrameRead,
        gate: &mut dyn SpeechGate,
        floor: &NoiseFloor,
    ) {
        let woke_at = Instant::now();
        if let Err(e) = self.turn_inner(source, gate, floor, woke_at).await {
            error!("turn aborted: {}", e);
        }
        self.transition(ConversationState::Idle);
    }

    async fn turn_inner(
        &mut self,
        source: &mut dyn FrameRead,
        gate: &mut dyn SpeechGate,
        floor: &NoiseFloor,
        woke_at: Instant,
    ) -> Result<()> {
        self.transition(ConversationState::Capturing);
        let pcm = capture_utterance(source, gate, floor, self.wake_silence_ms).await?;
        if pcm.is_empty() {
            warn!("no utterance after wake word");
            return Ok(());
        }

        self.transition(ConversationState::Transcribing);
        self.perf.record(
            "wake_to_transcription_start",
            woke_at.elapsed(),
            serde_json::Value::Null,
        );

        let stt_started = Instant::now();
        let transcription = self.stt.transcribe(&pcm).await?;
        self.perf.record(
            "stt_transcription",
            stt_started.elapsed(),
            serde_json::json!({"chars": transcription.len()}),
        );
        if transcription.is_empty() {
            warn!("transcription came back empty");
            return Ok(());
        }
        info!("user said: {}", transcription);
        self.transcripts.append(&transcription);
        self.emit(ConversationEvent::Transcribed(transcription.clone()));

        let mut prompt = transcription;
        loop {
            self.transition(ConversationState::Responding);
            self.session.record_user(&prompt);

            let response_started = Instant::now();
            let outcome = self
                .bridge
                .speak_response(self.llm.as_ref(), self.tts.as_ref(), &prompt, response_started)
                .await?;
            self.session.record_assistant(&outcome.text);
            self.emit(ConversationEvent::Responded(outcome.text));

            self.transition(ConversationState::AwaitingFollowup);
            let pcm = capture_utterance(source, gate, floor, self.followup_silence_ms).await?;
            if pcm.is_empty() {
                info!("dialog ended due to inactivity");
                return Ok(());
            }
            self.transition(ConversationState::FollowupCapturing);

            self.transition(ConversationState::Transcribing);
            let stt_started = Instant::now();
            let follow_up = self.stt.transcribe(&pcm).await?;
            self.perf.record(
                "stt_transcription",
                stt_started.elapsed(),
                serde_json::json!({"chars": follow_up.len(), "followup": true}),
            );
            if follow_up.is_empty() {
                info!("dialog ended due to inactivity");
                return Ok(());
            }
            info!("follow-up: {}", follow_up);
            self.transcripts.append(&follow_up);
            self.emit(ConversationEvent::Transcribed(follow_up.clone()));
            prompt = follow_up;
        }
    }
}
