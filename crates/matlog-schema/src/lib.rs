use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of training session. The extraction engine picks this from an
/// ordered marker table; it is the only field the gap resolver may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingType {
    Gi,
    NoGi,
    OpenMat,
    Drilling,
    Private,
}

impl TrainingType {
    pub const ALL: [TrainingType; 5] = [
        TrainingType::Gi,
        TrainingType::NoGi,
        TrainingType::OpenMat,
        TrainingType::Drilling,
        TrainingType::Private,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gi => "gi",
            Self::NoGi => "no_gi",
            Self::OpenMat => "open_mat",
            Self::Drilling => "drilling",
            Self::Private => "private",
        }
    }

    /// Human-facing label used for chips and review output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Gi => "Gi",
            Self::NoGi => "No-Gi",
            Self::OpenMat => "Open Mat",
            Self::Drilling => "Drilling",
            Self::Private => "Private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "gi" => Some(Self::Gi),
            "no_gi" | "no-gi" | "nogi" => Some(Self::NoGi),
            "open_mat" | "open-mat" | "open mat" => Some(Self::OpenMat),
            "drilling" => Some(Self::Drilling),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SparringDirection {
    /// The user submitted a partner.
    Given,
    /// A partner submitted the user.
    Received,
}

/// One detected submission mention, in order of appearance in the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparringResult {
    pub direction: SparringDirection,
    pub technique: String,
}

/// The evolving target of extraction. Every field is independently optional
/// until filled; `training_type` is the only field required before the
/// record may be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub training_type: Option<TrainingType>,
    pub duration_minutes: Option<i64>,
    pub sparring_rounds: Option<i64>,
    #[serde(default)]
    pub techniques_drilled: Vec<String>,
    #[serde(default)]
    pub sparring_results: Vec<SparringResult>,
    #[serde(default)]
    pub positive_notes: Vec<String>,
    #[serde(default)]
    pub struggle_notes: Vec<String>,
    pub raw_text: String,
}

impl SessionRecord {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            training_type: None,
            duration_minutes: None,
            sparring_rounds: None,
            techniques_drilled: Vec::new(),
            sparring_results: Vec::new(),
            positive_notes: Vec::new(),
            struggle_notes: Vec::new(),
            raw_text: raw_text.into(),
        }
    }

    /// Ready for persistence. Only the training type is ever required.
    pub fn is_complete(&self) -> bool {
        self.training_type.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChipCategory {
    TrainingType,
    Duration,
    Rounds,
    Technique,
    Submission,
    PositiveNote,
    StruggleNote,
}

impl ChipCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrainingType => "type",
            Self::Duration => "duration",
            Self::Rounds => "rounds",
            Self::Technique => "technique",
            Self::Submission => "submission",
            Self::PositiveNote => "positive",
            Self::StruggleNote => "struggle",
        }
    }
}

/// Audit artifact generated 1:1 with each fact placed into the record.
/// Shown to the user for confirmation; never consumed by downstream logic.
/// Generation is deterministic for a given input (sequential ids, `source`
/// names the rule that fired).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceChip {
    pub id: String,
    pub category: ChipCategory,
    pub label: String,
    pub value: String,
    pub source: String,
}

/// The single clarifying question the gap resolver may produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapQuestion {
    pub prompt: String,
    pub options: Vec<TrainingType>,
}

/// A persisted session as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub record: SessionRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn training_type_serde_names() {
        let json = serde_json::to_string(&TrainingType::NoGi).unwrap();
        assert_eq!(json, "\"no_gi\"");
        let back: TrainingType = serde_json::from_str("\"open_mat\"").unwrap();
        assert_eq!(back, TrainingType::OpenMat);
    }

    #[test]
    fn training_type_parse_accepts_spellings() {
        assert_eq!(TrainingType::parse("No-Gi"), Some(TrainingType::NoGi));
        assert_eq!(TrainingType::parse("open mat"), Some(TrainingType::OpenMat));
        assert_eq!(TrainingType::parse("karate"), None);
    }

    #[test]
    fn record_complete_only_with_training_type() {
        let mut record = SessionRecord::new("rolled a bit");
        assert!(!record.is_complete());
        record.duration_minutes = Some(60);
        assert!(!record.is_complete());
        record.training_type = Some(TrainingType::Gi);
        assert!(record.is_complete());
    }
}
