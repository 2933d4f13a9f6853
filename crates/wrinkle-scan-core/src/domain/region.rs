//! Facial region names used by the multi-region analysis mode.

use serde::{Deserialize, Serialize};

/// One of the four anatomical regions scored independently in regions mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceRegion {
    /// Area above the eyebrows.
    Forehead,
    /// Area between the left eye line and the mouth, left of the nose.
    LeftCheek,
    /// Area between the right eye line and the mouth, right of the nose.
    RightCheek,
    /// Area below the lower lip.
    Chin,
}

impl FaceRegion {
    /// All regions, in reporting order.
    pub const ALL: [Self; 4] = [Self::Forehead, Self::LeftCheek, Self::RightCheek, Self::Chin];

    /// Returns the snake_case name used in responses and artifact filenames.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Forehead => "forehead",
            Self::LeftCheek => "left_cheek",
            Self::RightCheek => "right_cheek",
            Self::Chin => "chin",
        }
    }
}

impl std::fmt::Display for FaceRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_snake_case() {
        assert_eq!(FaceRegion::Forehead.as_str(), "forehead");
        assert_eq!(FaceRegion::LeftCheek.as_str(), "left_cheek");
        assert_eq!(FaceRegion::RightCheek.as_str(), "right_cheek");
        assert_eq!(FaceRegion::Chin.as_str(), "chin");
    }

    #[test]
    fn test_serde_names_match_as_str() {
        for region in FaceRegion::ALL {
            let json = serde_json::to_string(&region).expect("serialize");
            assert_eq!(json, format!("\"{}\"", region.as_str()));
        }
    }

    #[test]
    fn test_all_is_exhaustive_and_ordered() {
        assert_eq!(FaceRegion::ALL.len(), 4);
        let mut sorted = FaceRegion::ALL;
        sorted.sort();
        assert_eq!(sorted, FaceRegion::ALL);
    }
}
