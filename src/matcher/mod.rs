//! Pairing loaded artifacts into playable collections.
//!
//! A matcher receives every artifact a scanner produces and hands back the
//! collections it could complete. Two strategies exist:
//!
//! - [`ArticulationMatcher`] pairs sequences and instrument sets by id and
//!   picks sample collections by articulation coverage (AKAO).
//! - [`FileGroupMatcher`] joins everything loaded from one file (N-SPC).

pub mod articulation;
pub mod file_group;
pub mod resolve;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::model::{Artifact, ArtifactInfo, Collection};

pub use articulation::ArticulationMatcher;
pub use file_group::FileGroupMatcher;
pub use resolve::resolve;

/// Result of planning a match for one sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// All referenced articulations are covered.
    Matched {
        /// Indices of the accepted sample collections, by first articulation.
        accepted: Vec<usize>,
    },
    /// Some articulations are still uncovered.
    Pending {
        /// Articulation ids no known collection covers.
        missing: BTreeSet<u32>,
    },
}

/// Incremental artifact matching.
pub trait Matcher: Send {
    /// Take ownership of `artifact` and return any collections completed by it.
    fn add(&mut self, artifact: Artifact, diag: &Diagnostics) -> Vec<Collection>;

    /// Drop artifacts that came from `container`; returns how many sequences
    /// or instrument sets were discarded.
    fn close_container(&mut self, container: &str, diag: &Diagnostics) -> usize;

    /// Sequences and instrument sets still waiting for a partner.
    fn pending(&self) -> Vec<ArtifactInfo>;
}

/// Matching strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatcherKind {
    /// Id pairing plus articulation coverage.
    Articulation,
    /// Everything from one file forms one group.
    FileGroup,
}

/// Create an empty matcher of `kind`.
pub fn matcher(kind: MatcherKind) -> Box<dyn Matcher> {
    match kind {
        MatcherKind::Articulation => Box::new(ArticulationMatcher::new()),
        MatcherKind::FileGroup => Box::new(FileGroupMatcher::new()),
    }
}
