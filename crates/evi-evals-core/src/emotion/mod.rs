//! Emotion annotation for user turns.
//!
//! - [`lexicon`]: adjective table and adverb intensity ranges
//! - [`annotator`]: `annotate`, `EmotionScores`, `EmotionAnnotation`

pub mod annotator;
pub mod lexicon;

pub use annotator::{
    annotate, annotate_payload, EmotionAnnotation, EmotionDescriptor, EmotionScores, NEUTRAL,
};
