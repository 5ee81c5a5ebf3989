//! Gate applied after inspection, before any heavy lifting.
//!
//! Limits are conservative relative to the sticker pack validator
//! (<https://github.com/WhatsApp/stickers/blob/main/Android/app/src/main/java/com/example/samplestickerapp/StickerPackValidator.java#L30-L46>)
//! because the output gets re-encoded at 512x512.

use std::fmt::Display;

use indicatif::HumanBytes;

pub const MAX_SOURCE_SIZE: u64 = 400 * 1024;
pub const MAX_FRAME_COUNT: usize = 100;
pub const MAX_TOTAL_DURATION_MS: u64 = 10_000;

/// What is known about an emote once it's downloaded and inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetFacts {
    pub size: u64,
    pub frame_count: usize,
    pub total_duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    TooLarge(u64),
    TooManyFrames(usize),
    TooLong(u64),
}

impl Display for Ineligible {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Ineligible::TooLarge(size) => write!(f, "is huge ({})", HumanBytes(size)),
            Ineligible::TooManyFrames(count) => write!(f, "has lots of frames ({count})"),
            Ineligible::TooLong(ms) => write!(f, "is longer than 10s ({:.1}s)", ms as f64 / 1000.0),
        }
    }
}

/// Every limit the asset exceeds, in checking order.
pub fn violations(facts: &AssetFacts) -> Vec<Ineligible> {
    let mut found = Vec::new();
    if facts.size > MAX_SOURCE_SIZE {
        found.push(Ineligible::TooLarge(facts.size));
    }
    if facts.frame_count > MAX_FRAME_COUNT {
        found.push(Ineligible::TooManyFrames(facts.frame_count));
    }
    if facts.total_duration_ms > MAX_TOTAL_DURATION_MS {
        found.push(Ineligible::TooLong(facts.total_duration_ms));
    }
    found
}

/// The first violated limit unless `force` is set.
pub fn check(facts: &AssetFacts, force: bool) -> Result<(), Ineligible> {
    match violations(facts).first() {
        Some(&reason) if !force => Err(reason),
        _ => Ok(()),
    }
}
