use std::path::Path;

use anyhow::{Context, Result};
use matlog_schema::TrainingType;
use serde::{Deserialize, Serialize};

/// One entry in the ordered training-type marker table. Order matters:
/// "no-gi" must be listed before the bare "gi" marker, otherwise the "gi"
/// substring inside "no-gi" wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeMarker {
    pub phrase: String,
    pub training_type: TrainingType,
}

impl TypeMarker {
    fn new(phrase: &str, training_type: TrainingType) -> Self {
        Self {
            phrase: phrase.to_string(),
            training_type,
        }
    }
}

/// Static phrase tables driving the extraction engine. Immutable once built;
/// tests substitute smaller fixtures, deployments may override the builtin
/// tables with a YAML file.
///
/// All matching against these tables is lowercase substring containment, so
/// every phrase here must be stored lowercase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Lexicon {
    /// Ordered: first marker contained in the text wins.
    pub type_markers: Vec<TypeMarker>,
    /// Technique phrases recognized as "drilled" when contained in the text.
    pub techniques: Vec<String>,
    /// Subset of technique phrases that count as submissions.
    pub submissions: Vec<String>,
    pub positive_keywords: Vec<String>,
    pub struggle_keywords: Vec<String>,
    /// Ordered regex sources for "I submitted someone" sentences. Each must
    /// have exactly one capture group holding the candidate technique text.
    pub given_patterns: Vec<String>,
    /// Ordered regex sources for "someone submitted me" sentences.
    pub received_patterns: Vec<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            type_markers: vec![
                TypeMarker::new("no-gi", TrainingType::NoGi),
                TypeMarker::new("no gi", TrainingType::NoGi),
                TypeMarker::new("nogi", TrainingType::NoGi),
                TypeMarker::new("open mat", TrainingType::OpenMat),
                TypeMarker::new("drilling", TrainingType::Drilling),
                TypeMarker::new("drill", TrainingType::Drilling),
                TypeMarker::new("private", TrainingType::Private),
                TypeMarker::new("gi", TrainingType::Gi),
            ],
            techniques: strings(&[
                "armbar",
                "triangle",
                "kimura",
                "americana",
                "guillotine",
                "rear naked choke",
                "cross collar choke",
                "bow and arrow",
                "loop choke",
                "north south choke",
                "ezekiel",
                "darce",
                "anaconda",
                "omoplata",
                "heel hook",
                "kneebar",
                "toe hold",
                "wrist lock",
                "scissor sweep",
                "butterfly sweep",
                "hip bump sweep",
                "flower sweep",
                "pendulum sweep",
                "arm drag",
                "double leg",
                "single leg",
                "hip throw",
                "osoto gari",
                "knee cut",
                "torreando",
                "over under pass",
                "stack pass",
                "back take",
                "berimbolo",
                "closed guard",
                "half guard",
                "de la riva",
                "x guard",
                "spider guard",
                "butterfly guard",
                "mount escape",
                "side control escape",
                "hip escape",
                "technical stand up",
            ]),
            submissions: strings(&[
                "armbar",
                "triangle",
                "kimura",
                "americana",
                "guillotine",
                "rear naked choke",
                "cross collar choke",
                "bow and arrow",
                "loop choke",
                "north south choke",
                "ezekiel",
                "darce",
                "anaconda",
                "omoplata",
                "heel hook",
                "kneebar",
                "toe hold",
                "wrist lock",
            ]),
            positive_keywords: strings(&[
                "felt good",
                "felt great",
                "great",
                "awesome",
                "amazing",
                "finally",
                "clicked",
                "improved",
                "improving",
                "progress",
                "proud",
                "smooth",
                "sharp",
                "confident",
                "fun",
            ]),
            struggle_keywords: strings(&[
                "struggled",
                "struggling",
                "tough",
                "rough",
                "tired",
                "exhausted",
                "gassed",
                "frustrated",
                "frustrating",
                "stuck",
                "couldn't",
                "could not",
                "kept getting",
                "smashed",
                "crushed",
                "hard time",
                "sore",
            ]),
            given_patterns: strings(&[
                r"(?:caught|tapped|submitted|finished|choked)\s+(?:him|her|them|someone|everyone|everybody|my\s+partner)\s+(?:out\s+)?(?:with|in|using)\s+(?:an?\s+|the\s+)?([a-z][a-z\s-]*)",
                r"i\s+(?:got|hit|landed|locked\s+in|sunk\s+in)\s+(?:an?\s+|the\s+)?([a-z][a-z\s-]*?)\s+on\s+",
                r"(?:finished|won)\s+(?:with|by)\s+(?:an?\s+|the\s+)?([a-z][a-z\s-]*)",
            ]),
            received_patterns: strings(&[
                r"(?:he|she|they|someone|everybody|my\s+partner)\s+(?:caught|got|tapped|submitted|finished|choked)\s+me\s+(?:out\s+)?(?:with|in|using)\s+(?:an?\s+|the\s+)?([a-z][a-z\s-]*)",
                r"(?:got|was)\s+(?:caught|tapped|submitted|finished|choked)\s+(?:out\s+)?(?:with|in|by)\s+(?:an?\s+|the\s+)?([a-z][a-z\s-]*)",
                r"tapped\s+(?:out\s+)?to\s+(?:an?\s+|the\s+)?([a-z][a-z\s-]*)",
            ]),
        }
    }
}

impl Lexicon {
    /// Load a lexicon from YAML. Missing sections fall back to the builtin
    /// tables, so an override file may replace just one list.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read lexicon file {}", path.display()))?;
        let lexicon: Lexicon = serde_yaml::from_str(&raw)
            .with_context(|| format!("invalid lexicon file {}", path.display()))?;
        Ok(lexicon)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nogi_markers_precede_gi() {
        let lexicon = Lexicon::default();
        let gi_pos = lexicon
            .type_markers
            .iter()
            .position(|m| m.phrase == "gi")
            .unwrap();
        for (idx, marker) in lexicon.type_markers.iter().enumerate() {
            if marker.training_type == TrainingType::NoGi {
                assert!(idx < gi_pos, "no-gi marker listed after bare gi");
            }
        }
    }

    #[test]
    fn submissions_are_a_subset_of_techniques() {
        let lexicon = Lexicon::default();
        for sub in &lexicon.submissions {
            assert!(
                lexicon.techniques.contains(sub),
                "submission {sub} missing from technique table"
            );
        }
    }

    #[test]
    fn phrases_are_lowercase() {
        let lexicon = Lexicon::default();
        let all = lexicon
            .techniques
            .iter()
            .chain(&lexicon.submissions)
            .chain(&lexicon.positive_keywords)
            .chain(&lexicon.struggle_keywords);
        for phrase in all {
            assert_eq!(phrase, &phrase.to_lowercase());
        }
    }

    #[test]
    fn partial_yaml_override_keeps_builtin_rest() {
        let lexicon: Lexicon = serde_yaml::from_str("techniques:\n  - armbar\n").unwrap();
        assert_eq!(lexicon.techniques, vec!["armbar".to_string()]);
        assert!(!lexicon.type_markers.is_empty());
        assert!(!lexicon.given_patterns.is_empty());
    }
}
