use std::ops::RangeInclusive;

use anyhow::{Context, Result};
use matlog_schema::{ChipCategory, EvidenceChip, SessionRecord, SparringDirection, SparringResult};
use regex::Regex;

use crate::lexicon::Lexicon;
use crate::sentence::{split_sentences, title_case};

pub const DURATION_RANGE: RangeInclusive<i64> = 15..=300;
pub const ROUNDS_RANGE: RangeInclusive<i64> = 1..=20;

/// Minimum length of a trimmed sentence before it is worth keeping as a
/// sentiment note.
const MIN_NOTE_LEN: usize = 10;

/// Everything one extraction pass produced: the partially filled record and
/// one evidence chip per extracted fact, in extraction order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub record: SessionRecord,
    pub chips: Vec<EvidenceChip>,
}

/// A ranked numeric rule. Rules are evaluated in table order and the first
/// rule whose first match converts into the valid range wins; an
/// out-of-range match is discarded (never clamped) and the next rule tried.
struct NumberRule {
    name: &'static str,
    regex: Regex,
    multiplier: f64,
}

struct DirectionPattern {
    name: String,
    regex: Regex,
}

/// The rule-based extraction engine. Construction compiles every regex in
/// the lexicon once; `extract` itself is pure, deterministic and total.
pub struct Extractor {
    lexicon: Lexicon,
    duration_rules: Vec<NumberRule>,
    round_rules: Vec<NumberRule>,
    given: Vec<DirectionPattern>,
    received: Vec<DirectionPattern>,
}

impl Extractor {
    pub fn new(lexicon: Lexicon) -> Result<Self> {
        let duration_rules = vec![
            NumberRule {
                name: "hours",
                regex: Regex::new(r"(\d+(?:\.\d+)?)\s*(?:hours|hour|hrs|hr)\b")
                    .context("duration hours pattern")?,
                multiplier: 60.0,
            },
            NumberRule {
                name: "minutes",
                regex: Regex::new(r"(\d+)\s*(?:minutes|minute|mins|min)\b")
                    .context("duration minutes pattern")?,
                multiplier: 1.0,
            },
            NumberRule {
                name: "bare-number",
                regex: Regex::new(r"\b(\d{2,3})\b").context("duration bare-number pattern")?,
                multiplier: 1.0,
            },
        ];
        let round_rules = vec![
            NumberRule {
                name: "counted",
                regex: Regex::new(r"(\d+)\s*(?:rounds|round|rolls|roll)\b")
                    .context("rounds counted pattern")?,
                multiplier: 1.0,
            },
            NumberRule {
                name: "rolled",
                regex: Regex::new(r"(?:rolled|sparred)\s+(\d+)\b")
                    .context("rounds rolled pattern")?,
                multiplier: 1.0,
            },
        ];
        let given = compile_direction("given", &lexicon.given_patterns)?;
        let received = compile_direction("received", &lexicon.received_patterns)?;
        Ok(Self {
            lexicon,
            duration_rules,
            round_rules,
            given,
            received,
        })
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Map raw text to a partial record plus its evidence chips. Absence of
    /// a fact leaves the field empty; nothing here is an error.
    ///
    /// Steps run in fixed precedence order and a later step never overwrites
    /// a field set by an earlier one.
    pub fn extract(&self, text: &str) -> Extraction {
        let mut record = SessionRecord::new(text);
        let mut chips = ChipBuilder::default();
        let lowered = text.to_lowercase();

        // 1. Training type: first marker contained in the text wins.
        for marker in &self.lexicon.type_markers {
            if lowered.contains(&marker.phrase.to_lowercase()) {
                record.training_type = Some(marker.training_type);
                chips.push(
                    ChipCategory::TrainingType,
                    "Training type",
                    marker.training_type.label().to_string(),
                    format!("type/{}", marker.phrase),
                );
                break;
            }
        }

        // 2. Duration in minutes, range-filtered.
        if let Some((minutes, rule)) = resolve_number(&self.duration_rules, &lowered, DURATION_RANGE)
        {
            record.duration_minutes = Some(minutes);
            chips.push(
                ChipCategory::Duration,
                "Duration",
                format!("{minutes} min"),
                format!("duration/{rule}"),
            );
        }

        // 3. Sparring rounds, range-filtered.
        if let Some((rounds, rule)) = resolve_number(&self.round_rules, &lowered, ROUNDS_RANGE) {
            record.sparring_rounds = Some(rounds);
            chips.push(
                ChipCategory::Rounds,
                "Rounds",
                format!("{rounds} rounds"),
                format!("rounds/{rule}"),
            );
        }

        // 4. Techniques drilled: every contained phrase, lexicon order,
        //    duplicates suppressed.
        for phrase in &self.lexicon.techniques {
            if lowered.contains(phrase.as_str()) {
                let display = title_case(phrase);
                if !record.techniques_drilled.contains(&display) {
                    record.techniques_drilled.push(display.clone());
                    chips.push(
                        ChipCategory::Technique,
                        "Drilled",
                        display,
                        format!("technique/{phrase}"),
                    );
                }
            }
        }

        // 5 + 6. Sentence-scoped passes.
        let sentences = split_sentences(text);
        for sentence in &sentences {
            let sentence_lc = sentence.to_lowercase();
            self.attribute_submission(
                SparringDirection::Given,
                &self.given,
                &sentence_lc,
                &mut record,
                &mut chips,
            );
            self.attribute_submission(
                SparringDirection::Received,
                &self.received,
                &sentence_lc,
                &mut record,
                &mut chips,
            );
        }
        for sentence in &sentences {
            self.collect_sentiment(sentence, &mut record, &mut chips);
        }

        tracing::debug!(
            "extracted type={:?} duration={:?} rounds={:?} techniques={} results={} chips={}",
            record.training_type,
            record.duration_minutes,
            record.sparring_rounds,
            record.techniques_drilled.len(),
            record.sparring_results.len(),
            chips.chips.len()
        );
        Extraction {
            record,
            chips: chips.chips,
        }
    }

    /// At most one submission per sentence per direction: the first pattern
    /// whose capture resolves to a known submission wins and the remaining
    /// patterns for that sentence are skipped.
    fn attribute_submission(
        &self,
        direction: SparringDirection,
        patterns: &[DirectionPattern],
        sentence_lc: &str,
        record: &mut SessionRecord,
        chips: &mut ChipBuilder,
    ) {
        for pattern in patterns {
            let Some(captures) = pattern.regex.captures(sentence_lc) else {
                continue;
            };
            let Some(candidate) = captures.get(1) else {
                continue;
            };
            let Some(known) = self.match_submission(candidate.as_str()) else {
                continue;
            };
            let technique = title_case(known);
            let label = match direction {
                SparringDirection::Given => "Given",
                SparringDirection::Received => "Received",
            };
            record.sparring_results.push(SparringResult {
                direction,
                technique: technique.clone(),
            });
            chips.push(
                ChipCategory::Submission,
                label,
                technique,
                pattern.name.clone(),
            );
            return;
        }
    }

    /// First submission phrase contained in the captured text, lexicon order.
    fn match_submission(&self, captured: &str) -> Option<&str> {
        let captured = captured.trim();
        self.lexicon
            .submissions
            .iter()
            .find(|phrase| captured.contains(phrase.as_str()))
            .map(String::as_str)
    }

    /// One contribution per polarity per sentence, first keyword hit wins,
    /// exact-text dedup across the whole record.
    fn collect_sentiment(
        &self,
        sentence: &str,
        record: &mut SessionRecord,
        chips: &mut ChipBuilder,
    ) {
        let trimmed = sentence.trim();
        let sentence_lc = trimmed.to_lowercase();
        if let Some(keyword) = first_keyword(&self.lexicon.positive_keywords, &sentence_lc) {
            if trimmed.len() >= MIN_NOTE_LEN && !record.positive_notes.contains(&trimmed.to_string())
            {
                record.positive_notes.push(trimmed.to_string());
                chips.push(
                    ChipCategory::PositiveNote,
                    "Positive",
                    trimmed.to_string(),
                    format!("positive/{keyword}"),
                );
            }
        }
        if let Some(keyword) = first_keyword(&self.lexicon.struggle_keywords, &sentence_lc) {
            if trimmed.len() >= MIN_NOTE_LEN && !record.struggle_notes.contains(&trimmed.to_string())
            {
                record.struggle_notes.push(trimmed.to_string());
                chips.push(
                    ChipCategory::StruggleNote,
                    "Struggle",
                    trimmed.to_string(),
                    format!("struggle/{keyword}"),
                );
            }
        }
    }
}

fn first_keyword<'a>(keywords: &'a [String], sentence_lc: &str) -> Option<&'a str> {
    keywords
        .iter()
        .find(|keyword| sentence_lc.contains(keyword.as_str()))
        .map(String::as_str)
}

fn compile_direction(direction: &str, sources: &[String]) -> Result<Vec<DirectionPattern>> {
    sources
        .iter()
        .enumerate()
        .map(|(idx, source)| {
            let regex = Regex::new(source)
                .with_context(|| format!("invalid {direction} pattern {idx}: {source}"))?;
            Ok(DirectionPattern {
                name: format!("{direction}/pattern-{idx}"),
                regex,
            })
        })
        .collect()
}

/// Ranked-rule evaluation: first rule whose first match lands in range wins.
/// Out-of-range matches are discarded, not clamped.
fn resolve_number(
    rules: &[NumberRule],
    lowered: &str,
    range: RangeInclusive<i64>,
) -> Option<(i64, &'static str)> {
    for rule in rules {
        let Some(captures) = rule.regex.captures(lowered) else {
            continue;
        };
        let Some(value) = captures.get(1) else {
            continue;
        };
        let Ok(parsed) = value.as_str().parse::<f64>() else {
            continue;
        };
        let scaled = (parsed * rule.multiplier).round() as i64;
        if range.contains(&scaled) {
            return Some((scaled, rule.name));
        }
    }
    None
}

#[derive(Default)]
struct ChipBuilder {
    chips: Vec<EvidenceChip>,
}

impl ChipBuilder {
    fn push(&mut self, category: ChipCategory, label: &str, value: String, source: String) {
        self.chips.push(EvidenceChip {
            id: format!("chip-{}", self.chips.len()),
            category,
            label: label.to_string(),
            value,
            source,
        });
    }
}

#[cfg(test)]
mod tests {
    use matlog_schema::TrainingType;

    use super::*;

    fn extractor() -> Extractor {
        Extractor::new(Lexicon::default()).unwrap()
    }

    #[test]
    fn extract_is_deterministic() {
        let ex = extractor();
        let text = "No-gi tonight, 90 min, 5 rounds. I caught him with an armbar. Felt great!";
        let first = ex.extract(text);
        let second = ex.extract(text);
        assert_eq!(first, second);
    }

    #[test]
    fn nogi_wins_over_gi_substring() {
        let ex = extractor();
        let extraction = ex.extract("no-gi class today");
        assert_eq!(extraction.record.training_type, Some(TrainingType::NoGi));
    }

    #[test]
    fn bare_gi_still_matches() {
        let ex = extractor();
        let extraction = ex.extract("gi class today");
        assert_eq!(extraction.record.training_type, Some(TrainingType::Gi));
    }

    #[test]
    fn first_type_marker_wins() {
        let ex = extractor();
        // Both open mat and gi markers present; open mat is earlier in the table.
        let extraction = ex.extract("open mat after the gi class");
        assert_eq!(extraction.record.training_type, Some(TrainingType::OpenMat));
    }

    #[test]
    fn duration_in_minutes() {
        let ex = extractor();
        let extraction = ex.extract("trained 90 min");
        assert_eq!(extraction.record.duration_minutes, Some(90));
    }

    #[test]
    fn duration_in_hours_converts() {
        let ex = extractor();
        let extraction = ex.extract("trained for 2 hours");
        assert_eq!(extraction.record.duration_minutes, Some(120));
    }

    #[test]
    fn fractional_hours_round() {
        let ex = extractor();
        let extraction = ex.extract("about 1.5 hrs of drilling");
        assert_eq!(extraction.record.duration_minutes, Some(90));
    }

    #[test]
    fn out_of_range_duration_discarded_not_clamped() {
        let ex = extractor();
        let extraction = ex.extract("I trained for 400 minutes");
        assert_eq!(extraction.record.duration_minutes, None);
    }

    #[test]
    fn bare_number_accepted_in_range() {
        let ex = extractor();
        let extraction = ex.extract("solid 45 tonight");
        assert_eq!(extraction.record.duration_minutes, Some(45));
    }

    #[test]
    fn rounds_range_filtered() {
        let ex = extractor();
        assert_eq!(ex.extract("did 5 rounds").record.sparring_rounds, Some(5));
        assert_eq!(ex.extract("did 50 rounds").record.sparring_rounds, None);
    }

    #[test]
    fn techniques_dedup_preserving_order() {
        let ex = extractor();
        let extraction =
            ex.extract("Drilled armbar then triangle, finished with more armbar reps.");
        assert_eq!(
            extraction.record.techniques_drilled,
            vec!["Armbar".to_string(), "Triangle".to_string()]
        );
    }

    #[test]
    fn submission_attribution_example() {
        let ex = extractor();
        let extraction = ex.extract("I caught him with an armbar. He got me with a triangle.");
        assert_eq!(
            extraction.record.sparring_results,
            vec![
                SparringResult {
                    direction: SparringDirection::Given,
                    technique: "Armbar".to_string(),
                },
                SparringResult {
                    direction: SparringDirection::Received,
                    technique: "Triangle".to_string(),
                },
            ]
        );
    }

    #[test]
    fn one_submission_per_sentence_per_direction() {
        let ex = extractor();
        let extraction =
            ex.extract("I caught him with an armbar and finished with a kimura as well.");
        let given: Vec<_> = extraction
            .record
            .sparring_results
            .iter()
            .filter(|r| r.direction == SparringDirection::Given)
            .collect();
        assert_eq!(given.len(), 1);
    }

    #[test]
    fn unknown_submission_capture_is_ignored() {
        let ex = extractor();
        let extraction = ex.extract("I caught him with a flying squirrel.");
        assert!(extraction.record.sparring_results.is_empty());
    }

    #[test]
    fn multiword_submission_title_cased() {
        let ex = extractor();
        let extraction = ex.extract("Got caught in a rear naked choke.");
        assert_eq!(
            extraction.record.sparring_results,
            vec![SparringResult {
                direction: SparringDirection::Received,
                technique: "Rear Naked Choke".to_string(),
            }]
        );
    }

    #[test]
    fn sentiment_notes_recorded_and_deduped() {
        let ex = extractor();
        let extraction = ex.extract(
            "My guard retention finally clicked today. My guard retention finally clicked today. \
             I struggled against the bigger guys.",
        );
        assert_eq!(
            extraction.record.positive_notes,
            vec!["My guard retention finally clicked today".to_string()]
        );
        assert_eq!(
            extraction.record.struggle_notes,
            vec!["I struggled against the bigger guys".to_string()]
        );
    }

    #[test]
    fn short_sentiment_fragments_dropped() {
        let ex = extractor();
        let extraction = ex.extract("Great. Fun.");
        assert!(extraction.record.positive_notes.is_empty());
    }

    #[test]
    fn sentence_can_feed_both_polarities() {
        let ex = extractor();
        let extraction = ex.extract("Tough round but my passing finally improved.");
        assert_eq!(extraction.record.positive_notes.len(), 1);
        assert_eq!(extraction.record.struggle_notes.len(), 1);
    }

    #[test]
    fn chips_have_sequential_ids_and_sources() {
        let ex = extractor();
        let extraction = ex.extract("Gi class, 60 minutes, worked on armbar.");
        for (idx, chip) in extraction.chips.iter().enumerate() {
            assert_eq!(chip.id, format!("chip-{idx}"));
            assert!(!chip.source.is_empty());
        }
        assert_eq!(extraction.chips.len(), 3);
    }

    #[test]
    fn no_findings_is_not_an_error() {
        let ex = extractor();
        let extraction = ex.extract("went to the gym");
        assert_eq!(extraction.record.training_type, None);
        assert!(extraction.chips.is_empty());
        assert_eq!(extraction.record.raw_text, "went to the gym");
    }
}
