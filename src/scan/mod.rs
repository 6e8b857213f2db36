//! Source dispatch and scan sessions.
//!
//! A [`Registry`] decides which [`Scanner`] handles a source and which
//! matching strategy its artifacts feed. A [`ScanSession`] drives sources
//! through scanners and matchers one at a time and collects the finished
//! [`Collection`]s.
//!
//! # Example
//! ```no_run
//! use seqrip::config::ScanConfig;
//! use seqrip::scan::ScanSession;
//!
//! let mut session = ScanSession::new(ScanConfig::default());
//! session.scan_file("bgm.bin")?;
//! let report = session.finish();
//! for collection in &report.collections {
//!     println!("{}: {} track(s)", collection.name(), collection.sequence.tracks.len());
//! }
//! # Ok::<(), seqrip::SeqripError>(())
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::config::ScanConfig;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::loader::akao::{self, AkaoScanner};
use crate::loader::nspc::{spc, NspcScanner};
use crate::loader::{BytePattern, ScanContext};
use crate::matcher::{matcher, Matcher, MatcherKind};
use crate::model::{Artifact, ArtifactInfo, Collection, Origin};
use crate::source::{ByteSource, MemorySource};
use crate::Result;

/// Locates artifacts inside one source.
pub trait Scanner: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Every artifact found in `source`, in discovery order.
    ///
    /// Rejected candidates are logged to `diag` and skipped.
    fn scan(&self, source: &dyn ByteSource, ctx: &ScanContext, diag: &Diagnostics)
        -> Vec<Artifact>;
}

struct Entry {
    scanner: Box<dyn Scanner>,
    matcher: MatcherKind,
}

/// Extension, signature and size rules mapping sources to scanners.
///
/// Rules are tried in order: signature at offset 0, extension, exact size,
/// then the fallback.
#[derive(Default)]
pub struct Registry {
    entries: Vec<Entry>,
    signatures: Vec<(BytePattern, usize)>,
    extensions: Vec<(String, usize)>,
    sizes: Vec<(u32, usize)>,
    fallback: Option<usize>,
}

impl Registry {
    /// Registry with no scanners.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a scanner and the matcher its artifacts go to; returns its handle.
    pub fn register(&mut self, scanner: Box<dyn Scanner>, matcher: MatcherKind) -> usize {
        self.entries.push(Entry { scanner, matcher });
        self.entries.len() - 1
    }

    /// Route sources starting with `signature` to `handle`.
    pub fn map_signature(&mut self, signature: BytePattern, handle: usize) {
        self.signatures.push((signature, handle));
    }

    /// Route files ending in `.{extension}` to `handle`.
    pub fn map_extension(&mut self, extension: &str, handle: usize) {
        self.extensions.push((extension.to_ascii_lowercase(), handle));
    }

    /// Route sources of exactly `len` bytes to `handle`.
    pub fn map_size(&mut self, len: u32, handle: usize) {
        self.sizes.push((len, handle));
    }

    /// Route anything unmatched to `handle`.
    pub fn set_fallback(&mut self, handle: usize) {
        self.fallback = Some(handle);
    }

    /// Scanner and matcher for `source`.
    pub fn lookup(&self, source: &dyn ByteSource) -> Option<(&dyn Scanner, MatcherKind)> {
        let head_len = self
            .signatures
            .iter()
            .map(|(p, _)| p.len() as u32)
            .max()
            .unwrap_or(0)
            .min(source.len());
        let head = source.bytes(0, head_len).unwrap_or_default();
        let extension = Path::new(source.name())
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let handle = self
            .signatures
            .iter()
            .find(|(p, _)| p.matches_at(head))
            .map(|&(_, h)| h)
            .or_else(|| {
                let ext = extension.as_deref()?;
                self.extensions
                    .iter()
                    .find(|(e, _)| e == ext)
                    .map(|&(_, h)| h)
            })
            .or_else(|| {
                self.sizes
                    .iter()
                    .find(|&&(len, _)| len == source.len())
                    .map(|&(_, h)| h)
            })
            .or(self.fallback)?;
        let entry = self.entries.get(handle)?;
        Some((entry.scanner.as_ref(), entry.matcher))
    }
}

/// Registry with the built-in dialects.
///
/// `.spc` files, SPC snapshots and bare 64 KiB RAM images go to the N-SPC
/// scanner. Everything else is searched for AKAO headers at every offset.
pub fn default_registry() -> Registry {
    let mut registry = Registry::empty();
    let nspc = registry.register(Box::new(NspcScanner), MatcherKind::FileGroup);
    let akao = registry.register(Box::new(AkaoScanner), MatcherKind::Articulation);
    registry.map_signature(BytePattern::exact(spc::SIGNATURE), nspc);
    registry.map_signature(BytePattern::exact(akao::SIGNATURE), akao);
    registry.map_extension("spc", nspc);
    registry.map_size(spc::RAM_SIZE, nspc);
    registry.set_fallback(akao);
    registry
}

/// Everything a session produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// Completed collections in completion order.
    pub collections: Vec<Collection>,
    /// Artifacts that never found a partner.
    pub pending: Vec<ArtifactInfo>,
    /// Every diagnostic recorded during the session.
    pub diagnostics: Vec<Diagnostic>,
}

/// Scans sources one at a time and matches their artifacts.
pub struct ScanSession {
    config: ScanConfig,
    registry: Registry,
    matchers: BTreeMap<MatcherKind, Box<dyn Matcher>>,
    collections: Vec<Collection>,
    diag: Diagnostics,
}

impl ScanSession {
    /// Session over the built-in dialects.
    pub fn new(config: ScanConfig) -> Self {
        Self::with_registry(config, default_registry())
    }

    /// Session over a custom registry.
    pub fn with_registry(config: ScanConfig, registry: Registry) -> Self {
        Self {
            config,
            registry,
            matchers: BTreeMap::new(),
            collections: Vec::new(),
            diag: Diagnostics::new(),
        }
    }

    /// Diagnostics recorded so far.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diag
    }

    /// Collections completed so far.
    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    /// Scan one source and feed its artifacts to the matching strategy.
    ///
    /// Returns the number of artifacts found.
    pub fn scan_source(&mut self, source: &dyn ByteSource, origin: Origin) -> usize {
        let Some((scanner, kind)) = self.registry.lookup(source) else {
            self.diag
                .debug("scan", format!("{}: no scanner registered", source.name()));
            return 0;
        };
        let ctx = ScanContext::new(origin, &self.config);
        let artifacts = scanner.scan(source, &ctx, &self.diag);
        tracing::debug!(
            source = source.name(),
            scanner = scanner.name(),
            artifacts = artifacts.len(),
            "scanned"
        );

        let found = artifacts.len();
        let target = self.matchers.entry(kind).or_insert_with(|| matcher(kind));
        for artifact in artifacts {
            let done = target.add(artifact, &self.diag);
            self.collections.extend(done);
        }
        found
    }

    /// Scan an in-memory file.
    pub fn scan_bytes(&mut self, name: &str, data: Vec<u8>) -> Result<usize> {
        #[cfg(feature = "archive")]
        if self.config.is_closed_world(name) {
            return self.scan_archive(name, std::io::Cursor::new(data));
        }
        let source = MemorySource::new(name, data);
        Ok(self.scan_source(&source, Origin::file(name)))
    }

    /// Read and scan a file from disk. Closed-world archives are opened and
    /// each member is scanned.
    pub fn scan_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let name = path.display().to_string();
        #[cfg(feature = "archive")]
        if self.config.is_closed_world(&name) {
            let file = std::fs::File::open(path)?;
            return self.scan_archive(&name, std::io::BufReader::new(file));
        }
        let data = std::fs::read(path)?;
        self.scan_bytes(&name, data)
    }

    /// Scan every member of a zip container, then discard whatever the
    /// container left unmatched.
    #[cfg(feature = "archive")]
    pub fn scan_archive<R>(&mut self, name: &str, reader: R) -> Result<usize>
    where
        R: std::io::Read + std::io::Seek,
    {
        use std::io::Read;

        let mut archive = zip::ZipArchive::new(reader)?;
        let mut found = 0;
        for i in 0..archive.len() {
            let mut member = archive.by_index(i)?;
            if member.is_dir() {
                continue;
            }
            let member_name = member.name().to_string();
            let mut data = Vec::with_capacity(member.size() as usize);
            member.read_to_end(&mut data)?;
            let source = MemorySource::new(member_name.clone(), data);
            found += self.scan_source(&source, Origin::member(name, member_name));
        }
        self.close_container(name);
        Ok(found)
    }

    /// Discard unmatched artifacts from `container` in every matcher.
    pub fn close_container(&mut self, container: &str) -> usize {
        self.matchers
            .values_mut()
            .map(|m| m.close_container(container, &self.diag))
            .sum()
    }

    /// Report leftovers and hand back everything produced.
    pub fn finish(self) -> ScanReport {
        let pending: Vec<ArtifactInfo> = self.matchers.values().flat_map(|m| m.pending()).collect();
        for info in &pending {
            self.diag.warn(
                "scan",
                format!(
                    "{}: {:?} {} at 0x{:06x} never matched",
                    info.origin.file, info.kind, info.id, info.offset
                ),
            );
        }
        ScanReport {
            collections: self.collections,
            pending,
            diagnostics: self.diag.entries(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArtifactKind;

    struct Fixed(&'static str);

    impl Scanner for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        fn scan(&self, _: &dyn ByteSource, _: &ScanContext, _: &Diagnostics) -> Vec<Artifact> {
            Vec::new()
        }
    }

    fn chosen(registry: &Registry, name: &str, data: Vec<u8>) -> Option<&'static str> {
        let source = MemorySource::new(name, data);
        registry.lookup(&source).map(|(s, _)| s.name())
    }

    #[test]
    fn lookup_order() {
        let mut r = Registry::empty();
        let a = r.register(Box::new(Fixed("a")), MatcherKind::Articulation);
        let b = r.register(Box::new(Fixed("b")), MatcherKind::FileGroup);
        r.map_signature(BytePattern::exact(b"SIG"), a);
        r.map_extension("SPC", b);
        r.map_size(4, b);

        assert_eq!(chosen(&r, "x.spc", b"SIG!".to_vec()), Some("a"));
        assert_eq!(chosen(&r, "x.Spc", vec![0; 8]), Some("b"));
        assert_eq!(chosen(&r, "x.bin", vec![0; 4]), Some("b"));
        assert_eq!(chosen(&r, "x.bin", vec![0; 5]), None);
        r.set_fallback(a);
        assert_eq!(chosen(&r, "x.bin", vec![0; 5]), Some("a"));
    }

    #[test]
    fn default_routes() {
        let r = default_registry();
        assert_eq!(chosen(&r, "song.spc", vec![0; 16]), Some("nspc"));
        assert_eq!(chosen(&r, "ram.bin", vec![0; 0x10000]), Some("nspc"));
        assert_eq!(chosen(&r, "disc.psf", b"AKAO".to_vec()), Some("akao"));
        assert_eq!(chosen(&r, "disc.img", vec![0; 100]), Some("akao"));
    }

    #[test]
    fn empty_source_yields_nothing() {
        let mut session = ScanSession::new(ScanConfig::default());
        assert_eq!(session.scan_bytes("empty.bin", Vec::new()).unwrap(), 0);
        let report = session.finish();
        assert!(report.collections.is_empty());
        assert!(report.pending.is_empty());
    }

    #[test]
    fn finish_reports_unmatched_artifacts() {
        // V1 sequence 3 with one track selecting program 5, and no samples
        // anywhere to cover it.
        let mut data = b"AKAO".to_vec();
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend_from_slice(&9u16.to_le_bytes());
        data.extend_from_slice(&[0; 8]);
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&[0xA1, 0x05, 0xA0]);

        let mut session = ScanSession::new(ScanConfig::default());
        session.scan_bytes("seq.bin", data).unwrap();
        let report = session.finish();
        assert!(report.collections.is_empty());
        assert!(report
            .pending
            .iter()
            .any(|i| i.kind == ArtifactKind::Sequence && i.id == 3));
        assert!(report.diagnostics.iter().any(|d| d.message.contains("never matched")));
    }
}
