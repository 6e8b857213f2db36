//! Artifact loaders.
//!
//! Loaders locate candidate headers inside a [`ByteSource`], validate them
//! and build [`Artifact`]s. A rejected candidate never produces an artifact;
//! scanners log the rejection at debug level and move on to the next
//! candidate offset.
//!
//! [`ByteSource`]: crate::source::ByteSource
//! [`Artifact`]: crate::model::Artifact

pub mod akao;
pub mod nspc;
pub mod pattern;

use std::ops::Range;

use thiserror::Error;

use crate::config::ScanConfig;
use crate::decoder::CursorOptions;
use crate::dialect::AkaoVersion;
use crate::model::Origin;
use crate::source::ReadError;

pub use pattern::BytePattern;

/// Errors that reject one candidate artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Signature mismatch, inconsistent size field or unknown version.
    #[error("invalid header at 0x{offset:06x}: {reason}")]
    HeaderInvalid {
        /// Offset of the candidate header.
        offset: u32,
        /// What failed validation.
        reason: String,
    },
    /// A record table is too large or runs past the end of the data.
    #[error("{table} table at 0x{offset:06x} out of range ({count} record(s))")]
    TableOutOfRange {
        /// Which table.
        table: &'static str,
        /// Offset of the table.
        offset: u32,
        /// Declared or counted records.
        count: u32,
    },
    /// A read fell outside the source.
    #[error(transparent)]
    Read(#[from] ReadError),
}

impl LoadError {
    pub(crate) fn header(offset: u32, reason: impl Into<String>) -> Self {
        LoadError::HeaderInvalid {
            offset,
            reason: reason.into(),
        }
    }
}

/// Result alias for loaders.
pub type Result<T> = std::result::Result<T, LoadError>;

/// What a scanner knows about the source it is scanning.
#[derive(Debug, Clone)]
pub struct ScanContext {
    /// File and container the source came from.
    pub origin: Origin,
    /// AKAO version to assume for ambiguous headers.
    pub version_hint: Option<AkaoVersion>,
    /// Session configuration.
    pub config: ScanConfig,
}

impl ScanContext {
    /// Context for `origin` under `config`.
    pub fn new(origin: Origin, config: &ScanConfig) -> Self {
        Self {
            origin,
            version_hint: config.akao_version,
            config: config.clone(),
        }
    }

    /// Cursor options for a track confined to `bounds`.
    pub fn cursor_options(&self, bounds: Range<u32>) -> CursorOptions {
        CursorOptions {
            max_events: self.config.max_events_per_track,
            volume_scale: self.config.volume_scale,
            ..CursorOptions::new(bounds)
        }
    }
}

/// Map a nom failure on a fixed-size header to [`LoadError::HeaderInvalid`].
pub(crate) fn header_parse_error(
    offset: u32,
    what: &str,
    err: nom::Err<nom::error::Error<&[u8]>>,
) -> LoadError {
    let kind = match err {
        nom::Err::Incomplete(_) => "truncated".to_string(),
        nom::Err::Error(e) | nom::Err::Failure(e) => format!("{:?}", e.code),
    };
    LoadError::header(offset, format!("{what}: {kind}"))
}
