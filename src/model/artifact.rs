//! Artifact identity and ownership.

use serde::Serialize;

use super::{InstrumentSet, SampleCollection, Sequence};
use crate::dialect::Dialect;

/// Artifact category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArtifactKind {
    /// Note/event data.
    Sequence,
    /// Instruments and regions.
    InstrumentSet,
    /// Articulations and sample data.
    SampleCollection,
}

/// Where an artifact was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Origin {
    /// File (or archive member) name.
    pub file: String,
    /// Closed-world container the file belongs to, if any.
    pub container: Option<String>,
}

impl Origin {
    /// Origin of a loose file.
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            file: name.into(),
            container: None,
        }
    }

    /// Origin of a member inside a container.
    pub fn member(container: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            file: name.into(),
            container: Some(container.into()),
        }
    }
}

/// Header-level description shared by every artifact kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactInfo {
    /// Category.
    pub kind: ArtifactKind,
    /// Source location.
    pub origin: Origin,
    /// Dialect-specific numeric id.
    pub id: u32,
    /// Offset of the header in the source.
    pub offset: u32,
    /// Byte length in the source.
    pub length: u32,
    /// Dialect tag.
    pub dialect: Dialect,
}

/// A loaded artifact, owned by whoever holds it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Artifact {
    /// Sequence.
    Sequence(Sequence),
    /// Instrument set.
    InstrumentSet(InstrumentSet),
    /// Sample collection.
    SampleCollection(SampleCollection),
}

impl Artifact {
    /// Header info.
    pub fn info(&self) -> &ArtifactInfo {
        match self {
            Artifact::Sequence(s) => &s.info,
            Artifact::InstrumentSet(i) => &i.info,
            Artifact::SampleCollection(c) => &c.info,
        }
    }
}
