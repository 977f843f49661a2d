//! In-process line scanner backed by a bounded rayon pool

use super::patterns::PatternTable;
use super::{RawHit, ScanEngine, ScanError};
use crate::models::CandidateFile;
use rayon::prelude::*;
use std::path::Path;
use tracing::debug;

pub struct InProcessScanner {
    workers: usize,
}

impl InProcessScanner {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }
}

impl ScanEngine for InProcessScanner {
    fn name(&self) -> &'static str {
        "in-process"
    }

    fn scan(
        &self,
        _root: &Path,
        candidates: &[CandidateFile],
        table: &PatternTable,
    ) -> Result<Vec<RawHit>, ScanError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()?;

        let per_file: Vec<Vec<RawHit>> = pool.install(|| {
            candidates
                .par_iter()
                .map(|candidate| scan_file(candidate, table))
                .collect()
        });

        Ok(per_file.into_iter().flatten().collect())
    }
}

/// Scan one file; unreadable files contribute nothing
///
/// Lines are matched as raw bytes and decoded lossily only for the hit text.
pub(crate) fn scan_file(candidate: &CandidateFile, table: &PatternTable) -> Vec<RawHit> {
    let bytes = match std::fs::read(&candidate.abs_path) {
        Ok(b) => b,
        Err(e) => {
            debug!("Skipping unreadable {}: {}", candidate.rel_path, e);
            return Vec::new();
        }
    };
    let mut hits = Vec::new();
    for (idx, line) in bytes.split(|&b| b == b'\n').enumerate() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let mut text = None;
        for pattern in table.matching(line) {
            let text = text.get_or_insert_with(|| String::from_utf8_lossy(line).into_owned());
            hits.push(RawHit {
                file: candidate.rel_path.clone(),
                line: (idx + 1) as u32,
                text: text.clone(),
                pattern,
            });
        }
    }
    hits
}
