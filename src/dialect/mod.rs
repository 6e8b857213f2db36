//! Sound-driver dialects and their opcode tables.
//!
//! A [`Dialect`] names one driver family at one version, plus the game-variant
//! quirks that change how individual opcodes behave. Every dialect resolves to
//! an immutable [`EventTable`]; [`event_table`] hands out one shared copy per
//! dialect.

pub mod akao;
pub mod nspc;
pub mod table;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use serde::Serialize;

pub use akao::{AkaoQuirks, AkaoVersion};
pub use nspc::NspcVersion;
pub use table::{
    build_event_table, DialectConstants, EnvelopeParam, EventTable, GateRule, JumpAnchor, Op,
    OpEntry, PackedNote,
};

/// Driver family, version and variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Dialect {
    /// Square's PlayStation sequencer (`AKAO` containers).
    Akao {
        /// Header/opcode generation.
        version: AkaoVersion,
        /// Per-game behaviour switches.
        quirks: AkaoQuirks,
    },
    /// Nintendo's SNES driver, found in SPC700 RAM images.
    Nspc {
        /// Driver generation.
        version: NspcVersion,
    },
}

impl Dialect {
    /// AKAO dialect without game-specific quirks.
    pub fn akao(version: AkaoVersion) -> Self {
        Dialect::Akao {
            version,
            quirks: AkaoQuirks::empty(),
        }
    }

    /// Standard N-SPC dialect.
    pub fn nspc() -> Self {
        Dialect::Nspc {
            version: NspcVersion::Standard,
        }
    }

    /// Short family name used in diagnostics.
    pub fn family(&self) -> &'static str {
        match self {
            Dialect::Akao { .. } => "akao",
            Dialect::Nspc { .. } => "nspc",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Akao { version, quirks } if quirks.is_empty() => {
                write!(f, "AKAO {version:?}")
            }
            Dialect::Akao { version, quirks } => write!(f, "AKAO {version:?} ({quirks:?})"),
            Dialect::Nspc { version } => write!(f, "N-SPC {version:?}"),
        }
    }
}

/// Shared, memoized event table for `dialect`.
pub fn event_table(dialect: Dialect) -> Arc<EventTable> {
    static CACHE: OnceLock<Mutex<HashMap<Dialect, Arc<EventTable>>>> = OnceLock::new();
    let mut cache = CACHE.get_or_init(Default::default).lock();
    cache
        .entry(dialect)
        .or_insert_with(|| Arc::new(build_event_table(dialect)))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memoized_tables_are_shared() {
        let a = event_table(Dialect::akao(AkaoVersion::V2));
        let b = event_table(Dialect::akao(AkaoVersion::V2));
        assert!(Arc::ptr_eq(&a, &b));

        let c = event_table(Dialect::akao(AkaoVersion::V3));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn quirks_select_distinct_tables() {
        let plain = event_table(Dialect::akao(AkaoVersion::V2));
        let quirky = event_table(Dialect::Akao {
            version: AkaoVersion::V2,
            quirks: AkaoQuirks::FE1C_TWO_OPERANDS,
        });
        assert_eq!(plain.lookup_extended(0x1C).operands, 1);
        assert_eq!(quirky.lookup_extended(0x1C).operands, 2);
    }
}
