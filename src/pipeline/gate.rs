//! Availability gate: decides whether a composite is worth exporting.

use std::fmt;

use super::reduce::Materialized;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No scene fell inside the window.
    NoScenes,
    /// Scenes existed but no pixel inside the region survived masking.
    AllMasked,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoScenes => write!(f, "no source scenes in window"),
            SkipReason::AllMasked => write!(f, "no valid pixels in region"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable(SkipReason),
}

/// Available iff the composite lists `band`.
pub fn check(composite: &Materialized, band: &str) -> Availability {
    if composite.image.band(band).is_some() {
        return Availability::Available;
    }

    if composite.source_count == 0 {
        Availability::Unavailable(SkipReason::NoScenes)
    } else {
        Availability::Unavailable(SkipReason::AllMasked)
    }
}

// -- Tests -------------------------------------------------------------------
