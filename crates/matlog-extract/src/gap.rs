use matlog_schema::{GapQuestion, SessionRecord, TrainingType};

/// Decide whether a clarifying question is needed before the record can be
/// finalized. At most one question per attempt, and only for the training
/// type; every other field stays optional. Deliberately narrow: this is a
/// single-question flow, not a wizard.
pub fn resolve_gap(record: &SessionRecord) -> Option<GapQuestion> {
    if record.training_type.is_some() {
        return None;
    }
    Some(GapQuestion {
        prompt: "What kind of session was it?".to_string(),
        options: TrainingType::ALL.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asks_only_when_type_missing() {
        let mut record = SessionRecord::new("rolled for an hour");
        let question = resolve_gap(&record).expect("question expected");
        assert_eq!(question.options.len(), 5);

        record.training_type = Some(TrainingType::OpenMat);
        assert!(resolve_gap(&record).is_none());
    }

    #[test]
    fn other_missing_fields_never_prompt() {
        let mut record = SessionRecord::new("short one");
        record.training_type = Some(TrainingType::Gi);
        // Everything else is empty; still no question.
        assert!(resolve_gap(&record).is_none());
    }
}
