//! Sequence, instrument and sample extraction for console sound drivers
//!
//! Finds the music data a game's sound driver keeps in memory or on disc,
//! decodes it and resolves it into a dialect-independent model of notes,
//! controller events, instrument regions, envelopes and sample references.
//! Rendering that model to MIDI, SF2 or DLS is left to an exporter.
//!
//! # Dialects
//! - **AKAO** (PlayStation): `AKAO`-signed sequences and sample collections,
//!   three header generations.
//! - **N-SPC** (Super Nintendo): song lists, instruments and BRR samples in
//!   SPC700 RAM, located by driver code patterns.
//!
//! # Layout
//! - [`source`]: bounds-checked byte reads
//! - [`dialect`]: per-dialect opcode tables and constants
//! - [`decoder`]: the generic track cursor
//! - [`envelope`]: ADSR, tuning and volume conversion
//! - [`codec`]: PSX ADPCM and BRR sample layout/decoding
//! - [`loader`]: header parsing and artifact construction
//! - [`matcher`]: pairing artifacts into [`Collection`]s
//! - [`scan`]: dispatch registry and scan sessions
//!
//! # Crate feature flags
//! - `archive` (default): scan `.zip` containers as closed-world units
//!   (enables the optional `zip` dep)
//!
//! # Quick start
//! ```no_run
//! use seqrip::{ScanConfig, ScanSession};
//!
//! let mut session = ScanSession::new(ScanConfig::default());
//! session.scan_file("ff7_bgm.bin")?;
//! let report = session.finish();
//! for c in &report.collections {
//!     println!("{} ({} samples)", c.name(), c.sample_count());
//! }
//! # Ok::<(), seqrip::SeqripError>(())
//! ```

#![warn(missing_docs)]

pub mod codec; // Sample data layout and decoding
pub mod config; // Scan settings
pub mod decoder; // Track cursor
pub mod diagnostics; // Diagnostics sink
pub mod dialect; // Opcode tables
pub mod envelope; // Envelope/tuning conversion
pub mod loader; // Artifact loaders
pub mod matcher; // Artifact matching
pub mod model; // Data model
pub mod scan; // Dispatch and sessions
pub mod source; // Byte access

/// Error types for scanning and extraction
#[derive(thiserror::Error, Debug)]
pub enum SeqripError {
    /// Read past the end of a source
    #[error("Read error: {0}")]
    Read(#[from] source::ReadError),

    /// Rejected header or table
    #[error("Load error: {0}")]
    Load(#[from] loader::LoadError),

    /// Track decode failure
    #[error("Decode error: {0}")]
    Decode(#[from] decoder::DecodeError),

    /// Envelope or tuning register out of range
    #[error("Envelope error: {0}")]
    Envelope(#[from] envelope::EnvelopeError),

    /// IO error from the filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration file
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Unreadable zip container
    #[cfg(feature = "archive")]
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// Result type for extraction operations
pub type Result<T> = std::result::Result<T, SeqripError>;

// Public API exports
pub use config::ScanConfig;
pub use diagnostics::{Diagnostic, Diagnostics, Level};
pub use dialect::{AkaoVersion, Dialect, NspcVersion};
pub use model::{Artifact, Collection, InstrumentSet, SampleCollection, SeqEvent, Sequence};
pub use scan::{ScanReport, ScanSession, Scanner};
pub use source::{ByteSource, MemorySource};
