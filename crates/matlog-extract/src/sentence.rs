/// Split an utterance into sentences on `.`, `!` and `?`. Fragments are
/// trimmed; empty fragments are dropped. No abbreviation handling: the input
/// is conversational gym talk, not prose.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Display form of a matched lexicon phrase: title-case each
/// whitespace-separated token, independent of how the phrase appeared in
/// the source text.
pub fn title_case(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|token| {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminators() {
        let sentences = split_sentences("Trained hard. Felt great! Tired now?");
        assert_eq!(sentences, vec!["Trained hard", "Felt great", "Tired now"]);
    }

    #[test]
    fn drops_empty_fragments() {
        let sentences = split_sentences("One... two.. ");
        assert_eq!(sentences, vec!["One", "two"]);
    }

    #[test]
    fn title_cases_each_token() {
        assert_eq!(title_case("rear naked choke"), "Rear Naked Choke");
        assert_eq!(title_case("armbar"), "Armbar");
        assert_eq!(title_case("de la riva"), "De La Riva");
    }
}
