use crate::error::SaveError;
use crate::gateway::{ReportId, SubmitReceipt};

/// Sent by a save worker when its submission finishes.
#[derive(Debug)]
pub enum SaveOutcome {
    Saved {
        report: ReportId,
        receipt: SubmitReceipt,
    },
    Failed {
        report: ReportId,
        error: SaveError,
    },
}

impl SaveOutcome {
    pub fn report(&self) -> ReportId {
        match self {
            SaveOutcome::Saved { report, .. } | SaveOutcome::Failed { report, .. } => *report,
        }
    }

    pub fn into_result(self) -> Result<SubmitReceipt, SaveError> {
        match self {
            SaveOutcome::Saved { receipt, .. } => Ok(receipt),
            SaveOutcome::Failed { error, .. } => Err(error),
        }
    }
}
