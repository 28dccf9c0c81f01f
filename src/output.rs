//! Result types reported by an extraction run.

use crate::error::CandidateError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Terminal state of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateStatus {
    /// A success or error record already existed; nothing was sent.
    Skipped,
    /// Parsed JSON was written to the output folder.
    Succeeded,
    /// The raw response was written to the errors folder.
    Failed,
}

/// What happened to one candidate image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    /// Image file name; the record key.
    pub name: String,
    /// 1-based page number.
    pub page: usize,
    /// Slice index when the page was split.
    pub slice: Option<usize>,
    pub status: CandidateStatus,
    /// Where this run wrote the record, None when skipped. Success records
    /// move to the final folder on commit.
    pub record: Option<PathBuf>,
    /// Why the candidate was quarantined.
    pub error: Option<CandidateError>,
    /// Wall-clock time of the inference call, 0 when skipped.
    pub duration_ms: u64,
}

/// Which folders hold results after [`crate::workspace::Workspace::commit`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReport {
    /// The final output folder, if it holds at least one record.
    pub final_dir: Option<PathBuf>,
    /// The errors folder, if it holds at least one quarantined response.
    pub errors_dir: Option<PathBuf>,
}

/// Summary of a whole extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Absolute path of the source PDF (or of the staging folder when the
    /// run started from already-staged images).
    pub document: PathBuf,
    /// Pages rasterised (or staged) for this run.
    pub pages: usize,
    /// Per-candidate results in page/slice order.
    pub candidates: Vec<CandidateResult>,
    pub commit: CommitReport,
    pub total_duration_ms: u64,
}

impl RunSummary {
    fn count(&self, status: CandidateStatus) -> usize {
        self.candidates.iter().filter(|c| c.status == status).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(CandidateStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(CandidateStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(CandidateStatus::Skipped)
    }

    /// Candidates actually sent to the service in this run.
    pub fn dispatched(&self) -> usize {
        self.succeeded() + self.failed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, status: CandidateStatus) -> CandidateResult {
        CandidateResult {
            name: name.into(),
            page: 1,
            slice: None,
            status,
            record: None,
            error: None,
            duration_ms: 0,
        }
    }

    #[test]
    fn counts_by_status() {
        let summary = RunSummary {
            document: PathBuf::from("/tmp/a.pdf"),
            pages: 3,
            candidates: vec![
                result("a_1.png", CandidateStatus::Succeeded),
                result("a_2.png", CandidateStatus::Failed),
                result("a_3.png", CandidateStatus::Skipped),
                result("a_4.png", CandidateStatus::Succeeded),
            ],
            commit: CommitReport::default(),
            total_duration_ms: 10,
        };
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.dispatched(), 3);
    }

    #[test]
    fn summary_serialises() {
        let summary = RunSummary {
            document: PathBuf::from("/tmp/a.pdf"),
            pages: 0,
            candidates: vec![],
            commit: CommitReport::default(),
            total_duration_ms: 0,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["pages"], 0);
        assert!(json["commit"]["final_dir"].is_null());
    }
}
