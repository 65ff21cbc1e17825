//! Nudge composition
//!
//! A nudge is a tone sentence chosen by probability tier followed by a closing
//! clause chosen by communication style. When a text generator is configured
//! the composer asks it first and falls back to the local text on any failure.

pub mod composer;
pub mod generator;
pub mod templates;

pub use composer::NudgeComposer;
pub use generator::{ChatCompletionsGenerator, NudgePrompt, TextGenerator};
pub use templates::{compose_local, onboarding, Tier};
