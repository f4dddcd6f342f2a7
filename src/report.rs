use uuid::Uuid;

use crate::transfer::TransferOutcome;

/// One per-key failure, kept so the summary can name every key that did
/// not make it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub key: String,
    pub reason: String,
}

/// Aggregate counters for one migration run. Mutated only by the
/// orchestrator; read-only once the run completes.
#[derive(Clone, Debug)]
pub struct MigrationReport {
    pub run_id: Uuid,
    pub attempted: u64,
    pub migrated: u64,
    pub skipped: u64,
    pub failed: u64,
    pub failures: Vec<Failure>,
}

impl MigrationReport {
    pub fn new() -> MigrationReport {
        MigrationReport {
            run_id: Uuid::new_v4(),
            attempted: 0,
            migrated: 0,
            skipped: 0,
            failed: 0,
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: &TransferOutcome) {
        self.attempted += 1;
        match outcome {
            TransferOutcome::Migrated { .. } => self.migrated += 1,
            TransferOutcome::Skipped { .. } => self.skipped += 1,
            TransferOutcome::Failed { key, reason } => {
                self.failed += 1;
                self.failures.push(Failure {
                    key: key.clone(),
                    reason: reason.clone(),
                });
            }
        }
    }
}

impl Default for MigrationReport {
    fn default() -> Self {
        Self::new()
    }
}
