//! Renders one utterance's emotion scores as a bracketed annotation.

use std::cmp::Ordering;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::lexicon;

/// Annotation used when no usable emotion signal exists.
pub const NEUTRAL: &str = "{neutral}";

/// Number of emotions rendered per utterance.
pub const TOP_N: usize = 3;

/// Emotion name → intensity pairs in the order the source mapping listed them.
///
/// Source order is the tie-break when ranking equal scores, so this keeps a
/// `Vec` rather than a map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmotionScores(Vec<(String, f64)>);

impl EmotionScores {
    pub fn new(entries: Vec<(String, f64)>) -> Self {
        Self(entries)
    }

    /// Parse the JSON-encoded emotion payload carried on a feed event.
    pub fn parse(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, score)| (name.as_str(), *score))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for EmotionScores {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(n, s)| (n.into(), s)).collect())
    }
}

impl Serialize for EmotionScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, score) in &self.0 {
            map.serialize_entry(name, score)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EmotionScores {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScoresVisitor;

        impl<'de> Visitor<'de> for ScoresVisitor {
            type Value = EmotionScores;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of emotion names to numeric scores")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, score)) = map.next_entry::<String, f64>()? {
                    // A repeated key keeps its first position and its last value.
                    match entries.iter_mut().find(|(seen, _)| *seen == name) {
                        Some(entry) => entry.1 = score,
                        None => entries.push((name, score)),
                    }
                }
                Ok(EmotionScores(entries))
            }
        }

        deserializer.deserialize_map(ScoresVisitor)
    }
}

/// One rendered `(adverb, adjective)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmotionDescriptor {
    pub adverb: &'static str,
    pub adjective: String,
}

impl fmt::Display for EmotionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.adverb, self.adjective)
    }
}

/// Top emotions for a single utterance; empty means neutral.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmotionAnnotation {
    pub descriptors: Vec<EmotionDescriptor>,
}

impl EmotionAnnotation {
    pub fn neutral() -> Self {
        Self::default()
    }

    pub fn is_neutral(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Rank `scores` and keep the strongest [`TOP_N`].
    pub fn from_scores(scores: &EmotionScores) -> Self {
        let mut ranked: Vec<(&str, f64)> = scores.iter().collect();
        // `sort_by` is stable: equal scores keep source order.
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let descriptors = ranked
            .into_iter()
            .take(TOP_N)
            .map(|(name, score)| {
                let base = lexicon::normalize_name(name);
                let adjective = lexicon::adjective(base)
                    .map(str::to_string)
                    .unwrap_or_else(|| base.to_lowercase());
                EmotionDescriptor {
                    adverb: lexicon::adverb_for_score(score),
                    adjective,
                }
            })
            .collect();

        Self { descriptors }
    }
}

impl fmt::Display for EmotionAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_neutral() {
            return f.write_str(NEUTRAL);
        }
        let rendered: Vec<String> = self.descriptors.iter().map(|d| d.to_string()).collect();
        write!(f, "{{{}}}", rendered.join(", "))
    }
}

/// Render an already-parsed score vector. Absent or empty yields `{neutral}`.
pub fn annotate(emotions: Option<&EmotionScores>) -> String {
    match emotions {
        Some(scores) if !scores.is_empty() => EmotionAnnotation::from_scores(scores).to_string(),
        _ => NEUTRAL.to_string(),
    }
}

/// Render the raw JSON payload from a feed event.
///
/// Malformed payloads are a data-quality issue, not a failure: they are
/// logged and rendered as `{neutral}`.
pub fn annotate_payload(payload: Option<&str>) -> String {
    let Some(raw) = payload else {
        return NEUTRAL.to_string();
    };
    match EmotionScores::parse(raw) {
        Ok(scores) => annotate(Some(&scores)),
        Err(e) => {
            tracing::debug!(error = %e, "unparsable emotion payload, using neutral");
            NEUTRAL.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(entries: &[(&str, f64)]) -> EmotionScores {
        entries.iter().map(|(n, s)| (*n, *s)).collect()
    }

    #[test]
    fn test_absent_and_empty_are_neutral() {
        assert_eq!(annotate(None), "{neutral}");
        assert_eq!(annotate(Some(&EmotionScores::default())), "{neutral}");
        assert_eq!(annotate_payload(None), "{neutral}");
        assert_eq!(annotate_payload(Some("{}")), "{neutral}");
    }

    #[test]
    fn test_single_known_emotion() {
        assert_eq!(annotate(Some(&scores(&[("Joy", 0.8)]))), "{extremely happy}");
    }

    #[test]
    fn test_top_three_ranked_descending() {
        let s = scores(&[
            ("Concentration", 0.1),
            ("Joy", 0.9),
            ("Boredom", 0.05),
            ("Sadness", 0.55),
        ]);
        assert_eq!(
            annotate(Some(&s)),
            "{extremely happy, quite sad, very slightly focused}"
        );
    }

    #[test]
    fn test_ties_keep_source_order() {
        let s = scores(&[("Calmness", 0.3), ("Anger", 0.3), ("Awe", 0.3), ("Envy", 0.3)]);
        assert_eq!(
            annotate(Some(&s)),
            "{slightly calm, slightly angry, slightly awestruck}"
        );
    }

    #[test]
    fn test_unknown_names_are_lowercased() {
        let s = scores(&[("Surprise (positive)", 0.4), ("Bewilderment", 0.2)]);
        assert_eq!(
            annotate(Some(&s)),
            "{somewhat surprise, very slightly bewilderment}"
        );
    }

    #[test]
    fn test_polarity_split_entries_rank_independently() {
        let s = scores(&[("Surprise (negative)", 0.1), ("Surprise (positive)", 0.65)]);
        assert_eq!(
            annotate(Some(&s)),
            "{very surprise, very slightly surprise}"
        );
    }

    #[test]
    fn test_payload_preserves_insertion_order_for_ties() {
        let out = annotate_payload(Some(r#"{"Tiredness": 0.5, "Doubt": 0.5}"#));
        assert_eq!(out, "{moderately tired, moderately doubtful}");
    }

    #[test]
    fn test_malformed_payload_is_neutral() {
        assert_eq!(annotate_payload(Some("not json")), "{neutral}");
        assert_eq!(annotate_payload(Some(r#"{"Joy": "high"}"#)), "{neutral}");
        assert_eq!(annotate_payload(Some("[0.1, 0.2]")), "{neutral}");
    }

    #[test]
    fn test_duplicate_keys_keep_last_value() {
        assert_eq!(
            annotate_payload(Some(r#"{"Joy": 0.1, "Joy": 0.9}"#)),
            "{extremely happy}"
        );
        assert_eq!(
            annotate_payload(Some(r#"{"Joy": 0.9, "Doubt": 0.3, "Joy": 0.1}"#)),
            "{slightly doubtful, very slightly happy}"
        );
    }

    #[test]
    fn test_integer_scores_parse() {
        assert_eq!(annotate_payload(Some(r#"{"Pride": 1}"#)), "{extremely proud}");
    }
}
