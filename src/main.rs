mod cli {
    use std::env;
    use std::fs;
    use std::path::{Path, PathBuf};

    use anyhow::{bail, Context};
    use serde::Serialize;
    use tracing_subscriber::EnvFilter;

    use seqrip::dialect::AkaoVersion;
    use seqrip::{Collection, Level, ScanConfig, ScanReport, ScanSession};

    const USAGE: &str = "Usage:\n  seqrip [options] <file>...\n\nOptions:\n  --config <file.json>     Load scan settings\n  --akao-version <v1|v2|v3> Assume this AKAO header generation\n  --json <out.json>        Write the scan report as JSON\n  --events-csv <dir>       Write one event listing per collection\n  -h, --help               Show this help\n\nLogging is controlled by RUST_LOG (default: info).\n\nExamples:\n  seqrip --akao-version v2 bgm.bin\n  seqrip --json out.json songs.zip game.spc\n";

    #[derive(Default)]
    struct Args {
        files: Vec<PathBuf>,
        config: Option<PathBuf>,
        akao_version: Option<AkaoVersion>,
        json: Option<PathBuf>,
        events_csv: Option<PathBuf>,
        help: bool,
    }

    fn parse_version(value: &str) -> Option<AkaoVersion> {
        match value.to_ascii_lowercase().as_str() {
            "1" | "v1" => Some(AkaoVersion::V1),
            "2" | "v2" => Some(AkaoVersion::V2),
            "3" | "v3" => Some(AkaoVersion::V3),
            _ => None,
        }
    }

    fn parse_args() -> anyhow::Result<Args> {
        let mut parsed = Args::default();
        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .with_context(|| format!("{flag} requires an argument"))
            };
            match arg.as_str() {
                "--help" | "-h" => parsed.help = true,
                "--config" => parsed.config = Some(value("--config")?.into()),
                "--json" => parsed.json = Some(value("--json")?.into()),
                "--events-csv" => parsed.events_csv = Some(value("--events-csv")?.into()),
                "--akao-version" => {
                    let v = value("--akao-version")?;
                    parsed.akao_version =
                        Some(parse_version(&v).with_context(|| format!("unknown AKAO version: {v}"))?);
                }
                _ if arg.starts_with('-') => bail!("unknown flag: {arg}"),
                _ => parsed.files.push(arg.into()),
            }
        }
        Ok(parsed)
    }

    #[derive(Serialize)]
    struct EventRow<'a> {
        track: usize,
        time: u32,
        offset: String,
        length: u32,
        event: &'a str,
        detail: String,
    }

    fn write_events(dir: &Path, collection: &Collection) -> anyhow::Result<PathBuf> {
        let path = dir.join(format!("{}.csv", collection.name()));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("cannot create {}", path.display()))?;
        for track in &collection.sequence.tracks {
            for event in &track.events {
                let mut fields = match serde_json::to_value(&event.kind)? {
                    serde_json::Value::Object(map) => map,
                    _ => serde_json::Map::new(),
                };
                let name = match fields.remove("type") {
                    Some(serde_json::Value::String(name)) => name,
                    _ => String::new(),
                };
                let detail = if fields.is_empty() {
                    String::new()
                } else {
                    serde_json::Value::Object(fields).to_string()
                };
                writer.serialize(EventRow {
                    track: track.index,
                    time: event.time,
                    offset: format!("0x{:06x}", event.offset),
                    length: event.length,
                    event: &name,
                    detail,
                })?;
            }
        }
        writer.flush()?;
        Ok(path)
    }

    fn print_summary(report: &ScanReport) {
        for c in &report.collections {
            let events: usize = c.sequence.tracks.iter().map(|t| t.events.len()).sum();
            println!(
                "{:<16} {:<28} {:>2} track(s) {:>6} event(s) {:>3} instrument(s) {:>4} sample(s)",
                c.name(),
                c.sequence.info.origin.file,
                c.sequence.tracks.len(),
                events,
                c.instruments.instruments.len(),
                c.sample_count()
            );
        }
        let warnings = report
            .diagnostics
            .iter()
            .filter(|d| d.level >= Level::Warning)
            .count();
        println!(
            "\n{} collection(s), {} unmatched artifact(s), {} warning(s)",
            report.collections.len(),
            report.pending.len(),
            warnings
        );
    }

    pub fn run() -> anyhow::Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();

        let args = parse_args()?;
        if args.help || args.files.is_empty() {
            eprint!("{USAGE}");
            return Ok(());
        }

        let mut config = match &args.config {
            Some(path) => ScanConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => ScanConfig::default(),
        };
        if args.akao_version.is_some() {
            config.akao_version = args.akao_version;
        }

        let mut session = ScanSession::new(config);
        for file in &args.files {
            let found = session
                .scan_file(file)
                .with_context(|| format!("failed to scan {}", file.display()))?;
            tracing::info!(file = %file.display(), artifacts = found, "scanned");
        }
        let report = session.finish();
        print_summary(&report);

        if let Some(path) = &args.json {
            let text = serde_json::to_string_pretty(&report)?;
            fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))?;
            println!("Report written to {}", path.display());
        }
        if let Some(dir) = &args.events_csv {
            fs::create_dir_all(dir)?;
            for c in &report.collections {
                let path = write_events(dir, c)?;
                tracing::debug!(path = %path.display(), "event listing written");
            }
        }
        Ok(())
    }
}

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
