use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::session::Session;
use super::state::{termination_phrase, TerminationReason, TurnOutcome, TurnState};
use super::stats::{SessionStatus, SessionSummary};
use crate::audio::{AudioChunkSource, AudioSink, EndpointingRecorder, SynthesizedReply};
use crate::conversation::{ConversationMemory, ConversationTurn, Role};
use crate::error::{ServiceError, SessionError, TurnFailure};
use crate::services::{GenerationRequest, ServiceHandles};

/// Instruction used to let the scenario character speak first
pub const OPENING_INSTRUCTION: &str = "Start the conversation.";

/// Why a turn stopped before completing
enum Interrupt {
    Cancelled,
    Failed(TurnFailure),
}

/// Drives one session through record → transcribe → generate → synthesize → play
///
/// Service failures end the current turn only; memory is committed once a
/// reply has been synthesized, so a failed turn leaves history untouched.
pub struct TurnController {
    session: Session,
    state: TurnState,
    recorder: EndpointingRecorder,
    source: Box<dyn AudioChunkSource>,
    sink: Box<dyn AudioSink>,
    services: ServiceHandles,
    config: SessionConfig,
    cancel: CancellationToken,
    status_tx: watch::Sender<SessionStatus>,
    failed_turns: usize,
    last_notice: Option<String>,
    termination: Option<TerminationReason>,
}

impl TurnController {
    pub fn new(
        session: Session,
        services: ServiceHandles,
        source: Box<dyn AudioChunkSource>,
        sink: Box<dyn AudioSink>,
        config: SessionConfig,
        cancel: CancellationToken,
    ) -> Self {
        let recorder = EndpointingRecorder::new(config.endpointing.clone());

        let (status_tx, _) = watch::channel(SessionStatus {
            session_id: session.id().to_string(),
            state: TurnState::Idle,
            started_at: session.started_at(),
            history: session.memory().history(),
            failed_turns: 0,
            last_notice: None,
            termination: None,
        });

        info!(
            "Turn controller ready for session {} (source: {}, sink: {})",
            session.id(),
            source.name(),
            sink.name()
        );

        Self {
            session,
            state: TurnState::Idle,
            recorder,
            source,
            sink,
            services,
            config,
            cancel,
            status_tx,
            failed_turns: 0,
            last_notice: None,
            termination: None,
        }
    }

    /// Receive a status snapshot after every transition
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn memory(&self) -> &ConversationMemory {
        self.session.memory()
    }

    pub fn failed_turns(&self) -> usize {
        self.failed_turns
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Have the scenario character deliver its opening line
    ///
    /// The instruction itself is not stored; only the reply is.
    pub async fn open_conversation(&mut self) -> Result<TurnOutcome, SessionError> {
        if let Some(reason) = &self.termination {
            return Ok(TurnOutcome::Ended(reason.clone()));
        }

        info!("Session {}: requesting opening line", self.session.id());

        let (reply, audio) = match self.compose(OPENING_INSTRUCTION).await {
            Ok(composed) => composed,
            Err(interrupt) => return Ok(self.interrupted(interrupt)),
        };

        let assistant = self.session.memory.append(Role::Assistant, reply).clone();

        match self.deliver(&assistant, audio).await {
            Ok(()) => {
                self.transition(TurnState::Idle);
                Ok(TurnOutcome::Opened { assistant })
            }
            Err(interrupt) => Ok(self.interrupted(interrupt)),
        }
    }

    /// Run one full turn starting from `Idle`
    ///
    /// Only a recording failure is returned as an error.
    pub async fn run_turn(&mut self) -> Result<TurnOutcome, SessionError> {
        if let Some(reason) = &self.termination {
            return Ok(TurnOutcome::Ended(reason.clone()));
        }

        self.transition(TurnState::Recording);

        let recorded = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.recorder.record_utterance(self.source.as_mut()) => Some(result),
        };

        let buffer = match recorded {
            None => return Ok(self.terminate(TerminationReason::Cancelled)),
            Some(Ok(buffer)) => buffer,
            Some(Err(e)) => {
                error!("Session {}: {}", self.session.id(), e);
                self.terminate(TerminationReason::DeviceFailure {
                    message: e.to_string(),
                });
                return Err(e.into());
            }
        };

        self.transition(TurnState::Transcribing);

        let transcript = match guarded(
            &self.cancel,
            self.config.service_timeout,
            self.services.transcription.transcribe(&buffer),
            TurnFailure::TranscriptionService,
        )
        .await
        {
            Ok(text) => text,
            Err(interrupt) => return Ok(self.interrupted(interrupt)),
        };

        info!("Session {}: user said: {}", self.session.id(), transcript);

        self.transition(TurnState::CheckingTermination);

        if let Some(phrase) = termination_phrase(&transcript) {
            info!("Session {}: termination phrase '{}'", self.session.id(), phrase);
            return Ok(self.terminate(TerminationReason::Phrase {
                phrase: phrase.to_string(),
            }));
        }

        let user_text = transcript.trim();
        if user_text.is_empty() {
            debug!("Session {}: nothing intelligible heard", self.session.id());
            self.transition(TurnState::Idle);
            return Ok(TurnOutcome::NothingHeard);
        }

        let (reply, audio) = match self.compose(user_text).await {
            Ok(composed) => composed,
            Err(interrupt) => return Ok(self.interrupted(interrupt)),
        };

        // Commit the exchange only once it can be delivered
        let user = self.session.memory.append(Role::User, user_text).clone();
        let assistant = self.session.memory.append(Role::Assistant, reply).clone();

        match self.deliver(&assistant, audio).await {
            Ok(()) => {
                self.transition(TurnState::Idle);
                Ok(TurnOutcome::Replied { user, assistant })
            }
            Err(interrupt) => Ok(self.interrupted(interrupt)),
        }
    }

    /// Run the session until it terminates
    pub async fn run(mut self) -> Result<SessionSummary, SessionError> {
        info!("Session {} started", self.session.id());

        if self.config.open_with_greeting {
            if let TurnOutcome::Ended(reason) = self.open_conversation().await? {
                return Ok(self.summary(reason));
            }
        }

        let reason = loop {
            match self.run_turn().await? {
                TurnOutcome::Ended(reason) => break reason,
                TurnOutcome::Failed(failure) => {
                    debug!("Session {}: continuing after {}", self.session.id(), failure);
                }
                _ => {}
            }
        };

        info!(
            "Session {} ended ({:?}) after {} turns",
            self.session.id(),
            reason,
            self.session.memory().total_appended()
        );

        Ok(self.summary(reason))
    }

    /// Generate and synthesize a reply to `user_text`
    async fn compose(&mut self, user_text: &str) -> Result<(String, Vec<u8>), Interrupt> {
        let timeout = self.config.service_timeout;

        self.transition(TurnState::Generating);

        let history = self.session.memory().history();
        let reply = guarded(
            &self.cancel,
            timeout,
            self.services.generation.generate(GenerationRequest {
                system_context: self.session.context(),
                history: &history,
                user_text,
            }),
            TurnFailure::GenerationService,
        )
        .await?;

        info!("Session {}: reply: {}", self.session.id(), reply);

        self.transition(TurnState::Synthesizing);

        let audio = guarded(
            &self.cancel,
            timeout,
            self.services.synthesis.synthesize(&reply, &self.config.voice),
            TurnFailure::SynthesisService,
        )
        .await?;

        Ok((reply, audio))
    }

    /// Play a committed reply; a playback failure is only logged
    async fn deliver(
        &mut self,
        assistant: &ConversationTurn,
        audio: Vec<u8>,
    ) -> Result<(), Interrupt> {
        self.transition(TurnState::Playing);

        let playback = SynthesizedReply {
            sequence_number: assistant.sequence_number,
            text: assistant.text.clone(),
            audio,
        };

        let played = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.sink.play(&playback) => Some(result),
        };

        match played {
            None => Err(Interrupt::Cancelled),
            Some(Err(e)) => {
                warn!(
                    "Session {}: playback of reply {} failed: {}",
                    self.session.id(),
                    assistant.sequence_number,
                    e
                );
                Ok(())
            }
            Some(Ok(())) => Ok(()),
        }
    }

    fn interrupted(&mut self, interrupt: Interrupt) -> TurnOutcome {
        match interrupt {
            Interrupt::Cancelled => self.terminate(TerminationReason::Cancelled),
            Interrupt::Failed(failure) => {
                warn!(
                    "Session {}: turn failed in {:?}: {}",
                    self.session.id(),
                    self.state,
                    failure
                );
                self.failed_turns += 1;
                self.last_notice = Some(failure.notice().to_string());
                self.transition(TurnState::Idle);
                TurnOutcome::Failed(failure)
            }
        }
    }

    fn terminate(&mut self, reason: TerminationReason) -> TurnOutcome {
        self.termination = Some(reason.clone());
        self.transition(TurnState::Terminated);
        TurnOutcome::Ended(reason)
    }

    fn transition(&mut self, next: TurnState) {
        if self.state != next {
            debug!(
                "Session {}: {:?} -> {:?}",
                self.session.id(),
                self.state,
                next
            );
        }
        self.state = next;
        self.publish();
    }

    fn publish(&self) {
        self.status_tx.send_replace(SessionStatus {
            session_id: self.session.id().to_string(),
            state: self.state,
            started_at: self.session.started_at(),
            history: self.session.memory().history(),
            failed_turns: self.failed_turns,
            last_notice: self.last_notice.clone(),
            termination: self.termination.clone(),
        });
    }

    fn summary(&self, reason: TerminationReason) -> SessionSummary {
        SessionSummary {
            session_id: self.session.id().to_string(),
            reason,
            history: self.session.memory().history(),
            failed_turns: self.failed_turns,
        }
    }
}

/// Await a service call under the session timeout and cancellation token
async fn guarded<T, F>(
    cancel: &CancellationToken,
    timeout: Duration,
    call: F,
    wrap: fn(ServiceError) -> TurnFailure,
) -> Result<T, Interrupt>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupt::Cancelled),
        result = tokio::time::timeout(timeout, call) => match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Interrupt::Failed(wrap(e))),
            Err(_) => Err(Interrupt::Failed(wrap(ServiceError::Timeout(timeout)))),
        },
    }
}
