use serde::Serialize;

/// Categorical per-frame flags. The declaration order is the order in which
/// flags appear in a quality record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityFlag {
    /// At least one streak was retained by the detector.
    SatStreakDetected,
    /// The masked area fraction exceeds the configured threshold.
    HighContamination,
}

impl QualityFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SatStreakDetected => "SAT_STREAK_DETECTED",
            Self::HighContamination => "HIGH_CONTAMINATION",
        }
    }
}

impl std::fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
