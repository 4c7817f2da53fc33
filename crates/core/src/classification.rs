//! Outcome classification results.

use serde::{Deserialize, Serialize};

/// Binary outcome predicted from retrieved context.
///
/// There is no "unknown" class: low-confidence predictions still carry the
/// argmax label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeLabel {
    Rejection,
    Registration,
}

impl OutcomeLabel {
    /// Parse the model-server label convention (`label_1` = rejection,
    /// `label_0` = registration) as well as plain names.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "label_1" | "1" | "rejection" | "reject" | "거절" => Some(Self::Rejection),
            "label_0" | "0" | "registration" | "register" | "등록" => Some(Self::Registration),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rejection => "rejection",
            Self::Registration => "registration",
        }
    }
}

impl std::fmt::Display for OutcomeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single classification, computed once per request from the top hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: OutcomeLabel,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
}

impl ClassificationResult {
    /// Build a result, clamping confidence into `[0, 1]` (NaN becomes 0).
    pub fn new(label: OutcomeLabel, confidence: f32) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self { label, confidence }
    }

    /// Argmax over a two-class probability pair `[registration, rejection]`.
    ///
    /// Ties resolve to registration, the less specialized path.
    pub fn from_probabilities(registration: f32, rejection: f32) -> Self {
        if rejection > registration {
            Self::new(OutcomeLabel::Rejection, rejection)
        } else {
            Self::new(OutcomeLabel::Registration, registration)
        }
    }

    pub fn is_rejection(&self) -> bool {
        self.label == OutcomeLabel::Rejection
    }
}
