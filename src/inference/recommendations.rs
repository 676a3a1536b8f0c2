//! Adaptation categories and the advice shown for each

use crate::error::{AdaptError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdaptationCategory {
    #[serde(rename = "Highly Adaptive")]
    HighlyAdaptive,
    #[serde(rename = "Moderately Adaptive")]
    ModeratelyAdaptive,
    #[serde(rename = "Non-Adaptive")]
    NonAdaptive,
}

impl AdaptationCategory {
    pub const ALL: [AdaptationCategory; 3] = [
        AdaptationCategory::HighlyAdaptive,
        AdaptationCategory::ModeratelyAdaptive,
        AdaptationCategory::NonAdaptive,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AdaptationCategory::HighlyAdaptive => "Highly Adaptive",
            AdaptationCategory::ModeratelyAdaptive => "Moderately Adaptive",
            AdaptationCategory::NonAdaptive => "Non-Adaptive",
        }
    }

    /// Title of the advice block
    pub fn heading(self) -> &'static str {
        match self {
            AdaptationCategory::HighlyAdaptive => "Continue Best Practices",
            AdaptationCategory::ModeratelyAdaptive => "Suggested Improvements",
            AdaptationCategory::NonAdaptive => "Immediate Actions Needed",
        }
    }

    pub fn recommendations(self) -> &'static [&'static str] {
        match self {
            AdaptationCategory::HighlyAdaptive => &[
                "Maintain current adaptation strategies",
                "Share knowledge with community",
                "Stay updated on early warning systems",
                "Keep monitoring river conditions",
            ],
            AdaptationCategory::ModeratelyAdaptive => &[
                "Strengthen existing protection systems",
                "Increase community involvement",
                "Explore additional income sources",
                "Enhance disaster preparedness",
            ],
            AdaptationCategory::NonAdaptive => &[
                "Seek government/NGO assistance programs",
                "Participate in community adaptation initiatives",
                "Develop income diversification strategies",
                "Install early warning systems",
                "Consider housing improvements",
            ],
        }
    }
}

impl fmt::Display for AdaptationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AdaptationCategory {
    type Err = AdaptError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.label() == s)
            .ok_or_else(|| AdaptError::InvalidTargetLabel(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TARGET_CLASSES;

    #[test]
    fn test_labels_match_target_classes() {
        for (category, label) in AdaptationCategory::ALL.iter().zip(TARGET_CLASSES) {
            assert_eq!(category.label(), label);
            assert_eq!(label.parse::<AdaptationCategory>().unwrap(), *category);
        }
        assert!("Somewhat Adaptive".parse::<AdaptationCategory>().is_err());
    }

    #[test]
    fn test_recommendations() {
        assert_eq!(AdaptationCategory::NonAdaptive.recommendations().len(), 5);
        assert_eq!(AdaptationCategory::ModeratelyAdaptive.recommendations().len(), 4);
        assert!(AdaptationCategory::HighlyAdaptive.recommendations()[0].starts_with("Maintain"));
    }
}
