//! Dialect-independent data model.
//!
//! Ownership is strictly tree-shaped: a [`Collection`] owns its sequence,
//! instrument set and sample collections, sequences own tracks, instruments
//! own regions. Cross references are indices ([`SampleRef`]).

mod artifact;
mod collection;
mod event;
mod instrument;
mod sample;
mod sequence;

pub use artifact::{Artifact, ArtifactInfo, ArtifactKind, Origin};
pub use collection::Collection;
pub use event::{EventKind, LfoTarget, SeqEvent};
pub use instrument::{Instrument, InstrumentSet, Region, SampleRef};
pub use sample::{Articulation, Codec, RawEnvelope, Sample, SampleCollection};
pub use sequence::{Sequence, Track, TrackEnd};
