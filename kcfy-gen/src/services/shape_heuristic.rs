//! Prompt → procedural shape heuristic
//!
//! Lower-cases the prompt, splits it into words and walks two ordered
//! keyword tables. The first table entry matching any word wins, so table
//! order decides ties, not position in the text. Words split on anything
//! that is not alphanumeric, which makes "heart-shaped" match "heart" while
//! "inspired" never matches "red". A trailing plural "s" is accepted. Color
//! and shape are chosen independently and each falls back to its own default.

use crate::models::{GeneratedPrompt, Primitive, ShapeSpec};

/// Color used when no color keyword matches (purple)
pub const DEFAULT_COLOR: &str = "#D43CFF";

/// Shape used when no shape keyword matches
pub const DEFAULT_SHAPE: Primitive = Primitive::Knot;

/// Color keywords in match priority order
pub const COLOR_KEYWORDS: &[(&str, &str)] = &[
    ("red", "#FF4D4D"),
    ("blue", "#3C82FF"),
    ("green", "#3CCB6B"),
    ("yellow", "#FFD93C"),
    ("orange", "#FF9A3C"),
    ("pink", "#FF6FB5"),
    ("purple", "#D43CFF"),
    ("gold", "#D4AF37"),
    ("silver", "#C0C0C0"),
    ("black", "#1F1F1F"),
    ("white", "#F5F5F5"),
];

/// Shape keywords in match priority order
pub const SHAPE_KEYWORDS: &[(&str, Primitive)] = &[
    ("heart", Primitive::Heart),
    ("sphere", Primitive::Sphere),
    ("orb", Primitive::Sphere),
    ("cube", Primitive::Cube),
    ("box", Primitive::Cube),
    ("torus", Primitive::Torus),
    ("ring", Primitive::Torus),
    ("donut", Primitive::Torus),
    ("knot", Primitive::Knot),
];

fn words(prompt: &str) -> Vec<String> {
    prompt
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

fn mentions(words: &[String], keyword: &str) -> bool {
    words.iter().any(|word| {
        word == keyword || word.strip_suffix('s').is_some_and(|stem| stem == keyword)
    })
}

/// Derive `{color, shape}` from prompt text. Total and deterministic.
pub fn derive_shape(prompt: &str) -> ShapeSpec {
    let words = words(prompt);

    let color = COLOR_KEYWORDS
        .iter()
        .find(|(keyword, _)| mentions(&words, keyword))
        .map(|(_, hex)| *hex)
        .unwrap_or(DEFAULT_COLOR);

    let shape = SHAPE_KEYWORDS
        .iter()
        .find(|(keyword, _)| mentions(&words, keyword))
        .map(|(_, primitive)| *primitive)
        .unwrap_or(DEFAULT_SHAPE);

    ShapeSpec {
        color: color.to_string(),
        shape,
    }
}

/// [`derive_shape`] for a synthesized prompt
pub fn shape_for_prompt(prompt: &GeneratedPrompt) -> ShapeSpec {
    derive_shape(prompt.as_str())
}

/// The built-in default shape
pub fn default_shape() -> ShapeSpec {
    ShapeSpec {
        color: DEFAULT_COLOR.to_string(),
        shape: DEFAULT_SHAPE,
    }
}
