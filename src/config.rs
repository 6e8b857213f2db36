//! Scan configuration.
//!
//! Loaded from JSON; every field is optional and falls back to
//! [`ScanConfig::default`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::decoder::CursorOptions;
use crate::dialect::{AkaoQuirks, AkaoVersion};
use crate::envelope::psx::{PS1_SAMPLE_RATE, PS2_SAMPLE_RATE};
use crate::envelope::VolumeScale;
use crate::Result;

/// Settings shared by every scanner in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// AKAO header generation to assume when the layout is ambiguous
    /// (V1 and V2 share a header shape). `None` means V1.
    pub akao_version: Option<AkaoVersion>,
    /// Game-specific AKAO opcode behaviour.
    pub akao_quirks: AkaoQuirks,
    /// Use the 48 kHz SPU2 rate for PSX envelopes and samples.
    pub ps2_sample_rate: bool,
    /// Mapping of hardware volume to MIDI volume.
    pub volume_scale: VolumeScale,
    /// Ceiling on decoded events per track.
    pub max_events_per_track: usize,
    /// File extensions treated as closed-world containers.
    pub closed_world_extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            akao_version: None,
            akao_quirks: AkaoQuirks::empty(),
            ps2_sample_rate: false,
            volume_scale: VolumeScale::default(),
            max_events_per_track: CursorOptions::DEFAULT_MAX_EVENTS,
            closed_world_extensions: vec!["zip".to_string()],
        }
    }
}

impl ScanConfig {
    /// Parse a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Sample rate for PSX ADPCM data and envelope timing.
    pub fn psx_sample_rate(&self) -> u32 {
        if self.ps2_sample_rate {
            PS2_SAMPLE_RATE
        } else {
            PS1_SAMPLE_RATE
        }
    }

    /// Returns `true` if files named `name` are closed-world containers.
    pub fn is_closed_world(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.closed_world_extensions
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(ext))
            })
    }
}
