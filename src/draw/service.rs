use crate::draw::messages::SaveOutcome;
use crate::error::SaveError;
use crate::gateway::{PersistenceGateway, ReportId, ReportSubmission};
use std::collections::HashSet;
use once_cell::sync::Lazy;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Gateway instance (by address) and report of every save still running.
type InFlightKey = (usize, ReportId);

static IN_FLIGHT: Lazy<Mutex<HashSet<InFlightKey>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Runs report submissions on worker threads, at most one per report.
///
/// A second submission for a report whose save has not finished is rejected
/// with [`SaveError::InFlight`]; saves for different reports run side by side.
/// The in-flight slots belong to the gateway instance, so every coordinator
/// built over the same `Arc` sees the same saves.
#[derive(Clone)]
pub struct SaveCoordinator {
    gateway: Arc<dyn PersistenceGateway>,
}

impl SaveCoordinator {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<dyn PersistenceGateway> {
        &self.gateway
    }

    pub fn is_in_flight(&self, report: ReportId) -> bool {
        lock().contains(&self.key(report))
    }

    fn key(&self, report: ReportId) -> InFlightKey {
        (Arc::as_ptr(&self.gateway) as *const () as usize, report)
    }

    /// Starts the save and returns immediately. The outcome arrives on
    /// `reply`; if the receiver is gone by then it is dropped silently.
    pub fn submit(
        &self,
        report: ReportId,
        submission: ReportSubmission,
        reply: Sender<SaveOutcome>,
    ) -> Result<(), SaveError> {
        let guard =
            InFlightGuard::acquire(self.key(report)).ok_or(SaveError::InFlight { report })?;
        let gateway = Arc::clone(&self.gateway);

        tracing::info!(
            %report,
            with_annotation = submission.annotation_image.is_some(),
            shared = submission.share_with_patient,
            "report save submitted"
        );

        std::thread::Builder::new()
            .name(format!("report-save-{report}"))
            .spawn(move || {
                let result = gateway.submit(report, &submission);
                // Release before replying so the receiver can save again at once.
                drop(guard);
                let outcome = match result {
                    Ok(receipt) => {
                        tracing::info!(%report, "report save completed");
                        SaveOutcome::Saved { report, receipt }
                    }
                    Err(err) => {
                        tracing::error!(%report, error = %err, "report save failed");
                        SaveOutcome::Failed {
                            report,
                            error: SaveError::Gateway(err),
                        }
                    }
                };
                if reply.send(outcome).is_err() {
                    tracing::debug!(%report, "save outcome had no listener");
                }
            })
            .map_err(|err| {
                tracing::error!(%report, error = %err, "could not spawn save worker");
                SaveError::WorkerGone
            })?;
        Ok(())
    }
}

/// The worker keeps its gateway `Arc` alive until after this guard drops, so
/// the address in the key cannot be reused while the slot is held.
struct InFlightGuard {
    key: InFlightKey,
}

impl InFlightGuard {
    fn acquire(key: InFlightKey) -> Option<Self> {
        if !lock().insert(key) {
            tracing::warn!(report = %key.1, "save rejected, another save is still in flight");
            return None;
        }
        Some(Self { key })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock().remove(&self.key);
    }
}

fn lock() -> MutexGuard<'static, HashSet<InFlightKey>> {
    IN_FLIGHT.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::gateway::{ArtifactRef, ReportArtifacts, SubmitReceipt};
    use std::sync::mpsc;
    use std::time::Duration;

    /// Blocks every submit until the test releases it.
    struct GatedGateway {
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl PersistenceGateway for GatedGateway {
        fn load_report(&self, id: ReportId) -> Result<ReportArtifacts, GatewayError> {
            Err(GatewayError::NotFound {
                what: format!("report {id}"),
            })
        }

        fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, GatewayError> {
            Err(GatewayError::NotFound {
                what: artifact.0.clone(),
            })
        }

        fn submit(
            &self,
            _id: ReportId,
            submission: &ReportSubmission,
        ) -> Result<SubmitReceipt, GatewayError> {
            let _ = self.release.lock().expect("gate").recv();
            Ok(SubmitReceipt {
                shared: submission.share_with_patient,
                annotated_image_path: None,
            })
        }
    }

    #[test]
    fn second_save_for_same_report_is_rejected_until_first_finishes() {
        let (release_tx, release_rx) = mpsc::channel();
        let coordinator = SaveCoordinator::new(Arc::new(GatedGateway {
            release: Mutex::new(release_rx),
        }));
        let (reply_tx, reply_rx) = mpsc::channel();
        let report = ReportId(7);

        coordinator
            .submit(report, ReportSubmission::default(), reply_tx.clone())
            .expect("first save starts");
        assert!(coordinator.is_in_flight(report));

        let second = coordinator.submit(report, ReportSubmission::default(), reply_tx.clone());
        assert!(matches!(second, Err(SaveError::InFlight { report: r }) if r == report));

        release_tx.send(()).expect("release");
        let outcome = reply_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("outcome");
        assert_eq!(outcome.report(), report);
        assert!(outcome.into_result().is_ok());
        assert!(!coordinator.is_in_flight(report));

        coordinator
            .submit(report, ReportSubmission::default(), reply_tx)
            .expect("save after completion starts");
        release_tx.send(()).expect("release");
        reply_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("second outcome");
    }

    #[test]
    fn coordinators_over_one_gateway_share_in_flight_saves() {
        let (release_tx, release_rx) = mpsc::channel();
        let gateway: Arc<dyn PersistenceGateway> = Arc::new(GatedGateway {
            release: Mutex::new(release_rx),
        });
        let first = SaveCoordinator::new(Arc::clone(&gateway));
        let second = SaveCoordinator::new(Arc::clone(&gateway));
        let (reply_tx, reply_rx) = mpsc::channel();
        let report = ReportId(11);

        first
            .submit(report, ReportSubmission::default(), reply_tx.clone())
            .expect("first save starts");
        assert!(second.is_in_flight(report));
        assert!(matches!(
            second.submit(report, ReportSubmission::default(), reply_tx.clone()),
            Err(SaveError::InFlight { .. })
        ));

        let (_other_tx, other_rx) = mpsc::channel();
        let unrelated = SaveCoordinator::new(Arc::new(GatedGateway {
            release: Mutex::new(other_rx),
        }));
        assert!(!unrelated.is_in_flight(report));

        release_tx.send(()).expect("release");
        reply_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("outcome");
        assert!(!second.is_in_flight(report));
    }

    #[test]
    fn in_flight_error_is_retryable() {
        let err = SaveError::InFlight {
            report: ReportId(1),
        };
        assert!(err.is_retryable());
        assert!(!SaveError::WorkerGone.is_retryable());
    }
}
