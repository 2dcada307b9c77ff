/// Run phase definitions for tracking pipeline progress
///
/// This module defines every state a harvest run moves through, in order.
use std::fmt;

/// Represents the current phase of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    // ===== Initial State =====
    /// No run has started yet
    Idle,

    // ===== Stage States =====
    /// Extracting series from category pages
    ExtractingSeries,

    /// Extracting product stubs from series pages
    ExtractingProducts,

    /// Extracting detail records from product pages
    ExtractingDetails,

    /// Downloading and transcoding product images
    ProcessingImages,

    /// Calling the external enrichment capability
    Enriching,

    /// Writing exports
    Persisting,

    // ===== Terminal States =====
    /// Run finished and produced its statistics
    Done,

    /// Run aborted on a run-fatal error
    Failed,
}

impl RunPhase {
    /// Returns true if the run can no longer change phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if this phase performs per-item work
    pub fn is_stage(&self) -> bool {
        !matches!(self, Self::Idle | Self::Done | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    ///
    /// Stages advance strictly forward; enrichment may be skipped; any
    /// non-terminal phase may fail.
    pub fn can_transition_to(&self, next: RunPhase) -> bool {
        use RunPhase::*;

        if next == Failed {
            return !self.is_terminal();
        }

        matches!(
            (self, next),
            (Idle, ExtractingSeries)
                | (ExtractingSeries, ExtractingProducts)
                | (ExtractingSeries, Done)
                | (ExtractingProducts, ExtractingDetails)
                | (ExtractingProducts, Done)
                | (ExtractingDetails, ProcessingImages)
                | (ProcessingImages, Enriching)
                | (ProcessingImages, Persisting)
                | (Enriching, Persisting)
                | (Persisting, Done)
                // Nothing survived to persist
                | (ExtractingDetails, Done)
                | (ProcessingImages, Done)
                | (Enriching, Done)
                // Reprocessing starts from already persisted records
                | (Idle, Enriching)
                | (Idle, Persisting)
                | (Idle, Done)
        )
    }

    /// Coarse progress percentage reported when entering this phase
    pub fn progress_percent(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::ExtractingSeries => 10,
            Self::ExtractingProducts => 25,
            Self::ExtractingDetails => 45,
            Self::ProcessingImages => 65,
            Self::Enriching => 80,
            Self::Persisting => 95,
            Self::Done => 100,
            Self::Failed => 100,
        }
    }

    /// Human-readable label for status displays
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::ExtractingSeries => "Extracting series",
            Self::ExtractingProducts => "Extracting products",
            Self::ExtractingDetails => "Extracting product details",
            Self::ProcessingImages => "Processing images",
            Self::Enriching => "Enriching products",
            Self::Persisting => "Saving exports",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }

    /// Converts the phase to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ExtractingSeries => "series",
            Self::ExtractingProducts => "products",
            Self::ExtractingDetails => "details",
            Self::ProcessingImages => "images",
            Self::Enriching => "enrichment",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Parses a phase from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "series" => Some(Self::ExtractingSeries),
            "products" => Some(Self::ExtractingProducts),
            "details" => Some(Self::ExtractingDetails),
            "images" => Some(Self::ProcessingImages),
            "enrichment" => Some(Self::Enriching),
            "persisting" => Some(Self::Persisting),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all phases in pipeline order
    pub fn all_phases() -> Vec<Self> {
        vec![
            Self::Idle,
            Self::ExtractingSeries,
            Self::ExtractingProducts,
            Self::ExtractingDetails,
            Self::ProcessingImages,
            Self::Enriching,
            Self::Persisting,
            Self::Done,
            Self::Failed,
        ]
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
