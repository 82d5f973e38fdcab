//! Create-or-merge reconciliation of candidate records, keyed by name.

use chrono::{DateTime, Utc};
use pharmadir_core::{Candidate, Pharmacy, merge};
use tracing::{debug, info};

use crate::StoreError;

/// The persistence operations reconciliation needs. Implemented for a DuckDB
/// connection, which is also what a transaction derefs to.
pub trait PharmacyRepo {
    /// First row whose name equals `name` exactly.
    fn find_by_name(&self, name: &str) -> Result<Option<Pharmacy>, StoreError>;

    /// Insert a new row built from `candidate`, both timestamps `now`.
    fn insert(&self, candidate: &Candidate, now: DateTime<Utc>) -> Result<Pharmacy, StoreError>;

    /// Overwrite the stored row with `pharmacy` (matched by id).
    fn update(&self, pharmacy: &Pharmacy) -> Result<(), StoreError>;
}

/// Reconcile `candidates` against `repo` in order.
///
/// Each candidate either merges into the first row with the same name or
/// becomes a new row. Candidates run sequentially, so a later candidate sees
/// whatever an earlier one in the same batch wrote. The first error aborts the
/// batch; committing or rolling back is the caller's job.
pub fn reconcile<R: PharmacyRepo + ?Sized>(
    repo: &R,
    candidates: &[Candidate],
    now: DateTime<Utc>,
) -> Result<usize, StoreError> {
    let mut processed = 0;
    for candidate in candidates {
        match repo.find_by_name(&candidate.name)? {
            Some(mut existing) => {
                merge(&mut existing, &candidate.to_patch(), now);
                repo.update(&existing)?;
                debug!(id = existing.id, name = %existing.name, "pharmacy merged");
            }
            None => {
                let created = repo.insert(candidate, now)?;
                debug!(id = created.id, name = %created.name, "pharmacy created");
            }
        }
        processed += 1;
    }
    info!(processed, "reconciliation pass complete");
    Ok(processed)
}
