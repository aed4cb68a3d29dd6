//! Anycast destination selection via trial reservations.

use crate::error::MultipathError;
use crate::model::{CreateOutcome, Path, ReservationSpec};
use crate::observability;
use crate::service::CircuitService;

use super::MultipathClient;

struct Trial {
    destination: String,
    path_count: usize,
    hop_total: usize,
}

impl<S: CircuitService> MultipathClient<S> {
    /// Run one full disjoint-path trial per candidate, in input order, and
    /// keep only the winner: greatest path count, ties broken by smallest
    /// total hop count, earlier candidate on a full tie.
    ///
    /// A candidate that reserved at least one path — even short of the
    /// requested N — stays in the running (flexible acceptance, preserved
    /// deliberately). Trials are exploratory and always torn down; the
    /// winning destination gets one fresh reservation with the original N.
    pub(super) async fn select_anycast(
        &self,
        spec: &ReservationSpec,
        candidates: &[String],
    ) -> Result<CreateOutcome, MultipathError> {
        debug_assert!(candidates.len() > 1, "single candidates dispatch directly");

        let mut best: Option<Trial> = None;
        for (i, candidate) in candidates.iter().enumerate() {
            tracing::info!(
                destination = %candidate,
                trial = i + 1,
                of = candidates.len(),
                "running anycast trial"
            );
            metrics::counter!(observability::ANYCAST_TRIALS_TOTAL).increment(1);

            let (outcome, snapshots) = self.create_multipath_inner(spec, candidate).await?;
            let path_count = snapshots
                .iter()
                .filter(|s| {
                    s.status.is_successful()
                        && s.details.as_ref().is_some_and(|d| d.path.is_some())
                })
                .count();
            let hop_total: usize = snapshots
                .iter()
                .filter_map(|s| s.details.as_ref()?.path.as_ref())
                .map(Path::hop_count)
                .sum();

            self.teardown_trial(&outcome).await;

            if path_count == 0 {
                tracing::info!(destination = %candidate, "trial reserved nothing, candidate out");
                continue;
            }
            tracing::info!(destination = %candidate, paths = path_count, hops = hop_total, "trial scored");

            let better = match &best {
                None => true,
                Some(b) => {
                    path_count > b.path_count
                        || (path_count == b.path_count && hop_total < b.hop_total)
                }
            };
            if better {
                best = Some(Trial {
                    destination: candidate.clone(),
                    path_count,
                    hop_total,
                });
            }
        }

        let Some(winner) = best else {
            tracing::warn!("no anycast candidate could reserve a path");
            return Ok(CreateOutcome::Empty);
        };
        tracing::info!(
            destination = %winner.destination,
            paths = winner.path_count,
            hops = winner.hop_total,
            "anycast winner selected"
        );

        // The winning trial was torn down with the rest: issue the one
        // reservation that is kept, against the winner alone.
        self.create_single_destination(spec, &winner.destination).await
    }

    /// Cancel every trial member and drop the trial's group record.
    /// Teardown failures are logged and ignored — the score is already in
    /// hand and the reservation will age out remotely.
    async fn teardown_trial(&self, outcome: &CreateOutcome) {
        match outcome {
            CreateOutcome::Unicast(member) => {
                if let Err(e) = self.service.cancel(member.as_str()).await {
                    tracing::warn!(id = %member, error = %e, "failed to cancel trial reservation");
                }
            }
            CreateOutcome::Group { id, members, .. } => {
                for member in members {
                    if let Err(e) = self.service.cancel(member.as_str()).await {
                        tracing::warn!(id = %member, error = %e, "failed to cancel trial member");
                    }
                }
                if let Err(e) = self.registry.remove(*id).await {
                    tracing::warn!(group = %id, error = %e, "failed to drop trial group record");
                }
            }
            CreateOutcome::Empty => {}
        }
    }
}
