//! Fixed vocabulary for rendering emotion scores as natural language.
//!
//! Both tables are plain data: an emotion-name → adjective table and an
//! ordered list of half-open intensity ranges mapped to adverbs.

/// Adverb returned when a score falls outside every range (e.g. negative).
pub const FALLBACK_ADVERB: &str = "somewhat";

/// Half-open `[lower, upper)` intensity ranges in ascending order.
///
/// The last range is open-ended so scores above 1.0 still land in a bucket.
pub const ADVERB_RANGES: &[(f64, f64, &str)] = &[
    (0.0, 0.26, "very slightly"),
    (0.26, 0.35, "slightly"),
    (0.35, 0.44, "somewhat"),
    (0.44, 0.53, "moderately"),
    (0.53, 0.62, "quite"),
    (0.62, 0.71, "very"),
    (0.71, f64::INFINITY, "extremely"),
];

/// Emotion names as reported by the expression model, with their adjective form.
pub const EMOTION_ADJECTIVES: &[(&str, &str)] = &[
    ("Admiration", "admiring"),
    ("Adoration", "adoring"),
    ("Aesthetic Appreciation", "appreciative"),
    ("Amusement", "amused"),
    ("Anger", "angry"),
    ("Anxiety", "anxious"),
    ("Awe", "awestruck"),
    ("Awkwardness", "uncomfortable"),
    ("Boredom", "bored"),
    ("Calmness", "calm"),
    ("Concentration", "focused"),
    ("Contemplation", "contemplative"),
    ("Confusion", "confused"),
    ("Contempt", "contemptuous"),
    ("Contentment", "content"),
    ("Craving", "hungry"),
    ("Determination", "determined"),
    ("Disappointment", "disappointed"),
    ("Disgust", "disgusted"),
    ("Distress", "distressed"),
    ("Doubt", "doubtful"),
    ("Ecstasy", "euphoric"),
    ("Embarrassment", "embarrassed"),
    ("Empathic Pain", "disturbed"),
    ("Entrancement", "entranced"),
    ("Envy", "envious"),
    ("Excitement", "excited"),
    ("Fear", "fearful"),
    ("Guilt", "guilty"),
    ("Horror", "horrified"),
    ("Interest", "interested"),
    ("Joy", "happy"),
    ("Love", "enamored"),
    ("Nostalgia", "nostalgic"),
    ("Pain", "pained"),
    ("Pride", "proud"),
    ("Realization", "inspired"),
    ("Relief", "relieved"),
    ("Romance", "smitten"),
    ("Sadness", "sad"),
    ("Satisfaction", "satisfied"),
    ("Desire", "desirous"),
    ("Shame", "ashamed"),
    ("Sympathy", "sympathetic"),
    ("Tiredness", "tired"),
    ("Triumph", "triumphant"),
];

/// Suffixes stripped from emotion names before adjective lookup.
pub const POLARITY_SUFFIXES: &[&str] = &[" (negative)", " (positive)"];

/// Look up the adjective for an emotion name, if the lexicon knows it.
pub fn adjective(name: &str) -> Option<&'static str> {
    EMOTION_ADJECTIVES
        .iter()
        .find(|(emotion, _)| *emotion == name)
        .map(|(_, adjective)| *adjective)
}

/// Select the adverb bucket for an intensity score.
pub fn adverb_for_score(score: f64) -> &'static str {
    ADVERB_RANGES
        .iter()
        .find(|(lower, upper, _)| score >= *lower && score < *upper)
        .map(|(_, _, adverb)| *adverb)
        .unwrap_or(FALLBACK_ADVERB)
}

/// Strip the polarity suffixes so split emotions share one base name.
pub fn normalize_name(name: &str) -> &str {
    POLARITY_SUFFIXES
        .iter()
        .fold(name, |acc, suffix| acc.strip_suffix(suffix).unwrap_or(acc))
}
