#![forbid(unsafe_code)]

//! Text rewrites a misbehaving editor applies to incoming text.
//!
//! Every variant works on whole code points so the result is always valid
//! text; only its length and content differ from what the keyboard sent.

/// Rewrite text on its way into the editor.
pub trait TransformText {
    fn transform(&self, input: &str) -> String;
}

/// Built-in rewrites.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TextModifier {
    /// Store text as sent.
    #[default]
    Identity,
    /// Every code point twice: `"ab"` becomes `"aabb"`.
    Double,
    /// Keep the first half of the code points, rounding up.
    Halve,
    /// Reverse code point order.
    Flip,
    /// Replace each code point with the next one.
    Increment,
    /// Drop the listed characters.
    BlockCharacters(Vec<char>),
}

impl TransformText for TextModifier {
    fn transform(&self, input: &str) -> String {
        match self {
            Self::Identity => input.to_owned(),
            Self::Double => input.chars().flat_map(|c| [c, c]).collect(),
            Self::Halve => {
                let keep = input.chars().count().div_ceil(2);
                input.chars().take(keep).collect()
            }
            Self::Flip => input.chars().rev().collect(),
            // No successor (surrogate block, U+10FFFF): keep the original.
            Self::Increment => input
                .chars()
                .map(|c| char::from_u32(c as u32 + 1).unwrap_or(c))
                .collect(),
            Self::BlockCharacters(blocked) => input.chars().filter(|c| !blocked.contains(c)).collect(),
        }
    }
}

impl TextModifier {
    /// Whether the rewrite can change what the editor stores.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        match self {
            Self::Identity => true,
            Self::BlockCharacters(blocked) => blocked.is_empty(),
            _ => false,
        }
    }
}
