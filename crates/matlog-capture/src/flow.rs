use std::sync::Arc;
use std::time::Duration;

use matlog_extract::{resolve_gap, Extraction, Extractor};
use matlog_schema::{EvidenceChip, GapQuestion, SessionRecord, TrainingType};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::gateway::SaveGateway;

/// Phases of one capture attempt. `Input` doubles as the neutral idle state;
/// `Success` is absorbing for the finished attempt but a new submission may
/// begin from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Input,
    Processing,
    GapFill,
    Review,
    Saving,
    Error,
    Success,
}

impl CapturePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Processing => "processing",
            Self::GapFill => "gap_fill",
            Self::Review => "review",
            Self::Saving => "saving",
            Self::Error => "error",
            Self::Success => "success",
        }
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("nothing to capture: input text is empty")]
    EmptyInput,
    #[error("{op} is not allowed in the {} phase", .phase.as_str())]
    Phase {
        op: &'static str,
        phase: CapturePhase,
    },
    #[error("record is not complete: training type missing")]
    Incomplete,
}

/// In-flight state for exactly one attempt. Dropped wholesale on cancel so
/// nothing can leak into the next attempt.
struct Attempt {
    record: SessionRecord,
    chips: Vec<EvidenceChip>,
    question: Option<GapQuestion>,
    last_error: Option<String>,
    saved_id: Option<Uuid>,
}

/// Finite-state capture flow: collect text, extract, gap-fill at most one
/// field, review, persist. Owns at most one record at a time. The two
/// suspension points (the processing delay standing in for a remote
/// transcription/extraction service, and the gateway save) are both
/// cancellable through the token passed in by the caller.
pub struct CaptureFlow {
    extractor: Extractor,
    gateway: Arc<dyn SaveGateway>,
    processing_delay: Duration,
    phase: CapturePhase,
    attempt: Option<Attempt>,
}

impl CaptureFlow {
    pub fn new(
        extractor: Extractor,
        gateway: Arc<dyn SaveGateway>,
        processing_delay: Duration,
    ) -> Self {
        Self {
            extractor,
            gateway,
            processing_delay,
            phase: CapturePhase::Input,
            attempt: None,
        }
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    pub fn record(&self) -> Option<&SessionRecord> {
        self.attempt.as_ref().map(|a| &a.record)
    }

    pub fn chips(&self) -> &[EvidenceChip] {
        self.attempt.as_ref().map(|a| a.chips.as_slice()).unwrap_or(&[])
    }

    pub fn question(&self) -> Option<&GapQuestion> {
        self.attempt.as_ref().and_then(|a| a.question.as_ref())
    }

    pub fn last_error(&self) -> Option<&str> {
        self.attempt.as_ref().and_then(|a| a.last_error.as_deref())
    }

    pub fn saved_id(&self) -> Option<Uuid> {
        self.attempt.as_ref().and_then(|a| a.saved_id)
    }

    /// Start a new attempt from submitted text. Only legal once the previous
    /// attempt has reached a terminal state. Waits out the processing delay
    /// before extraction; cancelling during the wait discards the attempt
    /// and returns to idle without ever touching the gateway.
    pub async fn submit(
        &mut self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<CapturePhase, CaptureError> {
        if !matches!(self.phase, CapturePhase::Input | CapturePhase::Success) {
            return Err(CaptureError::Phase {
                op: "submit",
                phase: self.phase,
            });
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(CaptureError::EmptyInput);
        }

        // Fresh attempt: nothing from a previous run may survive.
        self.attempt = None;
        self.phase = CapturePhase::Processing;
        tracing::info!("capture attempt started, text_len={}", text.len());

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("capture cancelled during processing");
                return Ok(self.reset());
            }
            _ = tokio::time::sleep(self.processing_delay) => {}
        }

        let Extraction { record, chips } = self.extractor.extract(text);
        let question = resolve_gap(&record);
        self.phase = if question.is_some() {
            CapturePhase::GapFill
        } else {
            CapturePhase::Review
        };
        self.attempt = Some(Attempt {
            record,
            chips,
            question,
            last_error: None,
            saved_id: None,
        });
        tracing::info!("extraction done, phase={}", self.phase.as_str());
        Ok(self.phase)
    }

    /// Answer the single clarifying question and move on to review. After
    /// this the resolver has nothing left to ask in this attempt.
    pub fn answer_gap(&mut self, choice: TrainingType) -> Result<CapturePhase, CaptureError> {
        if self.phase != CapturePhase::GapFill {
            return Err(CaptureError::Phase {
                op: "answer_gap",
                phase: self.phase,
            });
        }
        let attempt = self.attempt.as_mut().ok_or(CaptureError::Phase {
            op: "answer_gap",
            phase: self.phase,
        })?;
        attempt.record.training_type = Some(choice);
        attempt.question = None;
        self.phase = CapturePhase::Review;
        tracing::info!("gap filled, training_type={}", choice.as_str());
        Ok(self.phase)
    }

    /// Confirm the reviewed record and hand it to the gateway. Success is
    /// gated on the gateway's answer.
    pub async fn confirm(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<CapturePhase, CaptureError> {
        if self.phase != CapturePhase::Review {
            return Err(CaptureError::Phase {
                op: "confirm",
                phase: self.phase,
            });
        }
        self.save_attempt(cancel).await
    }

    /// User-triggered retry after a persistence failure: the identical
    /// finalized record is resent unchanged. No automatic backoff.
    pub async fn retry(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<CapturePhase, CaptureError> {
        if self.phase != CapturePhase::Error {
            return Err(CaptureError::Phase {
                op: "retry",
                phase: self.phase,
            });
        }
        self.save_attempt(cancel).await
    }

    /// Deliberate lossy exit: discard the in-flight attempt and return to
    /// idle. A no-op once the attempt has succeeded (terminal is absorbing).
    pub fn cancel(&mut self) -> CapturePhase {
        if self.phase == CapturePhase::Success {
            return self.phase;
        }
        if self.phase != CapturePhase::Input {
            tracing::info!("capture cancelled in phase={}", self.phase.as_str());
        }
        self.reset()
    }

    async fn save_attempt(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<CapturePhase, CaptureError> {
        let record = match &self.attempt {
            Some(attempt) if attempt.record.is_complete() => attempt.record.clone(),
            Some(_) => return Err(CaptureError::Incomplete),
            None => {
                return Err(CaptureError::Phase {
                    op: "save",
                    phase: self.phase,
                })
            }
        };

        self.phase = CapturePhase::Saving;
        let gateway = Arc::clone(&self.gateway);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("capture cancelled while waiting on the gateway");
                return Ok(self.reset());
            }
            outcome = gateway.save(&record) => outcome,
        };

        // The attempt is still present: nothing else can mutate the flow
        // while save_attempt holds &mut self.
        let attempt = self.attempt.as_mut().ok_or(CaptureError::Phase {
            op: "save",
            phase: self.phase,
        })?;
        match outcome {
            Ok(id) => {
                attempt.saved_id = Some(id);
                attempt.last_error = None;
                self.phase = CapturePhase::Success;
                tracing::info!("session saved, id={id}");
            }
            Err(err) => {
                tracing::warn!("gateway save failed: {err:#}");
                attempt.last_error = Some(err.to_string());
                self.phase = CapturePhase::Error;
            }
        }
        Ok(self.phase)
    }

    fn reset(&mut self) -> CapturePhase {
        self.attempt = None;
        self.phase = CapturePhase::Input;
        self.phase
    }
}
