use crate::resolver::{self, ResolvedPayload};
use crate::scanner;
use crate::signatures::{FormatTag, SignatureTable};
use regex::bytes::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

/// How far before a match to look for an embedded ASCII filename. Known
/// limitation: in dense blobs the window can pick up a name that belongs to
/// an earlier payload; the hint is kept as-is rather than second-guessed.
pub const DEFAULT_NAME_LOOKBACK: usize = 200;

static NAME_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9_\-]+\.jpg").expect("name-hint pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingPolicy {
    /// Zero-padded global counter per carve: `image_0000.png`, ...
    Sequential,
    /// Embedded filename found in the lookback window before the match,
    /// with a synthetic fallback when none is present.
    NameHint { lookback: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct CarveConfig {
    pub max_payload_size: usize,
    pub naming: NamingPolicy,
}

impl Default for CarveConfig {
    fn default() -> Self {
        Self {
            max_payload_size: crate::signatures::DEFAULT_MAX_PAYLOAD,
            naming: NamingPolicy::Sequential,
        }
    }
}

/// A resolved payload with its suggested filename, borrowing the blob.
/// Bytes are only copied when written out.
#[derive(Debug)]
pub struct CarvedPayload<'a> {
    pub start: usize,
    pub end: usize,
    pub format: FormatTag,
    pub name: String,
    pub bytes: &'a [u8],
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CarveSummary {
    /// Candidates the scanner located.
    pub found: usize,
    /// Payloads emitted (or, after a write phase, successfully written).
    pub extracted: usize,
    /// Candidates the resolver dropped.
    pub rejected: usize,
    /// Payloads that could not be written out.
    pub failed_writes: usize,
}

#[derive(Debug)]
pub struct CarveReport {
    pub written: Vec<PathBuf>,
    pub summary: CarveSummary,
}

pub struct Carver {
    table: SignatureTable,
    config: CarveConfig,
}

impl Carver {
    pub fn new(table: SignatureTable, config: CarveConfig) -> Self {
        Self { table, config }
    }

    /// Scan, resolve and name every payload in the blob. Deterministic for a
    /// given blob and configuration. Rejections are counted, never fatal.
    pub fn carve<'a>(&self, blob: &'a [u8]) -> (Vec<CarvedPayload<'a>>, CarveSummary) {
        let mut candidates = scanner::scan(blob, &self.table);
        // overlap suppression is only well-defined over ascending offsets,
        // so this phase stays single-threaded and ordered
        candidates.sort_by_key(|c| c.offset);

        let mut summary = CarveSummary {
            found: candidates.len(),
            ..CarveSummary::default()
        };
        let mut accepted: Vec<ResolvedPayload> = Vec::new();
        let mut covered_end = 0usize;

        for candidate in &candidates {
            if candidate.offset < covered_end {
                debug!(
                    offset = candidate.offset,
                    format = %candidate.format,
                    "sub-match inside an accepted payload, skipped"
                );
                continue;
            }
            match resolver::resolve(blob, candidate, self.config.max_payload_size) {
                Ok(payload) => {
                    debug!(
                        start = payload.start,
                        end = payload.end,
                        format = %payload.format,
                        "payload accepted"
                    );
                    covered_end = covered_end.max(payload.end);
                    accepted.push(payload);
                }
                Err(rejection) => {
                    warn!("{rejection}");
                    summary.rejected += 1;
                }
            }
        }

        let payloads = self.name_payloads(blob, &accepted);
        summary.extracted = payloads.len();
        (payloads, summary)
    }

    /// Top-level entry point: carve and write each payload into the output
    /// directory. A failed write is a warning for that payload only.
    pub fn carve_to_dir(&self, blob: &[u8], output_dir: &Path) -> std::io::Result<CarveReport> {
        fs::create_dir_all(output_dir)?;
        let (payloads, mut summary) = self.carve(blob);
        summary.extracted = 0;

        let mut written = Vec::with_capacity(payloads.len());
        for payload in &payloads {
            let path = output_dir.join(&payload.name);
            match fs::write(&path, payload.bytes) {
                Ok(()) => {
                    summary.extracted += 1;
                    written.push(path);
                }
                Err(e) => {
                    warn!(name = %payload.name, error = %e, "failed to write payload");
                    summary.failed_writes += 1;
                }
            }
        }
        Ok(CarveReport { written, summary })
    }

    fn name_payloads<'a>(
        &self,
        blob: &'a [u8],
        accepted: &[ResolvedPayload],
    ) -> Vec<CarvedPayload<'a>> {
        accepted
            .iter()
            .enumerate()
            .map(|(index, payload)| {
                let name = match self.config.naming {
                    NamingPolicy::Sequential => {
                        format!("image_{index:04}.{}", payload.format.extension())
                    }
                    NamingPolicy::NameHint { lookback } => {
                        let window = &blob[payload.start.saturating_sub(lookback)..payload.start];
                        match NAME_HINT.find(window) {
                            Some(hit) => String::from_utf8_lossy(hit.as_bytes()).into_owned(),
                            None => format!("image_{index:04}.jpg"),
                        }
                    }
                };
                CarvedPayload {
                    start: payload.start,
                    end: payload.end,
                    format: payload.format,
                    name,
                    bytes: &blob[payload.start..payload.end],
                }
            })
            .collect()
    }
}
