//! Local nudge text

use crate::types::CommunicationStyle;

/// Probability above which momentum is considered strong
pub const HIGH_TIER_THRESHOLD: f64 = 0.75;

/// Probability above which progress is considered steady
pub const STEADY_TIER_THRESHOLD: f64 = 0.45;

/// Probability tier of a nudge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    High,
    Steady,
    Low,
}

impl Tier {
    pub fn from_probability(p: f64) -> Self {
        if p > HIGH_TIER_THRESHOLD {
            Tier::High
        } else if p > STEADY_TIER_THRESHOLD {
            Tier::Steady
        } else {
            Tier::Low
        }
    }

    /// Canonical tone sentence for the tier
    pub fn tone(&self) -> &'static str {
        match self {
            Tier::High => "You have strong momentum, keep the streak alive!",
            Tier::Steady => "Good progress, a small, focused action will help.",
            Tier::Low => "This one might slip, try a tiny, doable version now.",
        }
    }
}

/// Closing clause for a style
pub fn closing_clause(style: CommunicationStyle, habit_name: &str) -> String {
    match style {
        CommunicationStyle::Mentor => format!(
            "Mentor tip: plan a 5-minute action for '{habit_name}' and reflect afterwards."
        ),
        CommunicationStyle::Challenger => {
            format!("Challenge: set a 10-minute timer and start '{habit_name}' now.")
        }
        CommunicationStyle::Storyteller => format!(
            "Write one sentence describing a scene where your {habit_name} succeeds."
        ),
        CommunicationStyle::Musician => format!(
            "Play a 60-second riff or pattern related to '{habit_name}'. Keep it simple and repeat it 3 times."
        ),
        CommunicationStyle::Encourager | CommunicationStyle::Neutral => {
            format!("Try a 5-minute focused session on '{habit_name}'.")
        }
    }
}

/// First nudge for a habit with no logged events
pub fn onboarding(habit_name: &str) -> String {
    format!("Let's begin building your '{habit_name}' routine, start small and be consistent.")
}

/// Deterministic nudge: tier tone followed by the style clause.
///
/// A non-finite probability is treated as the low tier.
pub fn compose_local(habit_name: &str, probability: f64, style: CommunicationStyle) -> String {
    let tier = Tier::from_probability(probability);
    format!("{} {}", tier.tone(), closing_clause(style, habit_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers() {
        assert_eq!(Tier::from_probability(0.9), Tier::High);
        assert_eq!(Tier::from_probability(0.75), Tier::Steady);
        assert_eq!(Tier::from_probability(0.5), Tier::Steady);
        assert_eq!(Tier::from_probability(0.45), Tier::Low);
        assert_eq!(Tier::from_probability(0.0), Tier::Low);
        assert_eq!(Tier::from_probability(f64::NAN), Tier::Low);
    }

    #[test]
    fn test_challenger_high_tier() {
        let text = compose_local("Running", 0.9, CommunicationStyle::Challenger);
        assert!(text.starts_with(Tier::High.tone()));
        assert!(text.contains("10-minute timer"));
        assert!(text.contains("'Running'"));
    }

    #[test]
    fn test_every_style_has_a_clause() {
        for style in [
            CommunicationStyle::Encourager,
            CommunicationStyle::Mentor,
            CommunicationStyle::Challenger,
            CommunicationStyle::Neutral,
            CommunicationStyle::Storyteller,
            CommunicationStyle::Musician,
        ] {
            let text = compose_local("Piano", 0.3, style);
            assert!(text.starts_with(Tier::Low.tone()));
            assert!(text.contains("Piano"), "{style:?}: {text}");
        }
    }

    #[test]
    fn test_onboarding_names_the_habit() {
        let text = onboarding("Meditation");
        assert!(text.contains("'Meditation' routine"));
        assert!(!text.contains(Tier::Steady.tone()));
    }

    #[test]
    fn test_plain_styles_share_micro_task() {
        assert_eq!(
            compose_local("Reading", 0.6, CommunicationStyle::Encourager),
            compose_local("Reading", 0.6, CommunicationStyle::Neutral)
        );
    }
}
