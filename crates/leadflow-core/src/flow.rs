//! The closed set of conversation states.
//!
//! The store persists the string form; everything else works with the enum.
//! An unrecognized stored string is corrupted state — `parse` returns `None`
//! and the FSM resets the contact rather than failing the request.

use serde::{Deserialize, Serialize};

/// One state of the scripted qualification dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowStep {
    /// First contact: greet and present the interest menu. Any input advances.
    New,
    /// Waiting for the interest choice (site / commerce / sistemas).
    Triage,
    /// "Do you already have a site?"
    QualifySite,
    /// "Do you sell online today?"
    QualifyOnline,
    /// "Roughly how many products?"
    QualifyProducts,
    /// "Scheduling or direct sales?"
    QualifyGoal,
    /// Presentation PDF vs. meeting.
    Offer,
    /// Qualified. Absorbing; entry fires the operator notification.
    Closing,
    /// Script exhausted or disabled — generative responder takes over. Absorbing.
    AiChat,
}

impl FlowStep {
    /// The string form stored on the contact row.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Triage => "TRIAGE",
            Self::QualifySite => "QUALIFY_SITE",
            Self::QualifyOnline => "QUALIFY_ONLINE",
            Self::QualifyProducts => "QUALIFY_PRODUCTS",
            Self::QualifyGoal => "QUALIFY_GOAL",
            Self::Offer => "OFFER",
            Self::Closing => "CLOSING",
            Self::AiChat => "AI_CHAT",
        }
    }

    /// Parse a stored value. `None` means corrupted state.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(Self::New),
            "TRIAGE" => Some(Self::Triage),
            "QUALIFY_SITE" => Some(Self::QualifySite),
            "QUALIFY_ONLINE" => Some(Self::QualifyOnline),
            "QUALIFY_PRODUCTS" => Some(Self::QualifyProducts),
            "QUALIFY_GOAL" => Some(Self::QualifyGoal),
            "OFFER" => Some(Self::Offer),
            "CLOSING" => Some(Self::Closing),
            "AI_CHAT" => Some(Self::AiChat),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_steps() {
        let steps = [
            FlowStep::New,
            FlowStep::Triage,
            FlowStep::QualifySite,
            FlowStep::QualifyOnline,
            FlowStep::QualifyProducts,
            FlowStep::QualifyGoal,
            FlowStep::Offer,
            FlowStep::Closing,
            FlowStep::AiChat,
        ];
        for step in steps {
            assert_eq!(FlowStep::parse(step.as_str()), Some(step));
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(FlowStep::parse("QUALIFY"), None);
        assert_eq!(FlowStep::parse("new"), None);
        assert_eq!(FlowStep::parse(""), None);
    }
}
