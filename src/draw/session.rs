use crate::draw::composite::{decode_raster, detect_empty, flatten};
use crate::draw::input::SurfaceController;
use crate::draw::layer::AnnotationLayer;
use crate::draw::messages::SaveOutcome;
use crate::draw::model::{Point, Tool, ToolState};
use crate::draw::registration::{
    DisplaySize, LayerGeometry, RegistrationResolver, RestoreOutcome, RestoredLayer,
};
use crate::draw::render::DirtyRect;
use crate::draw::save::build_submission;
use crate::draw::service::SaveCoordinator;
use crate::draw::state::{can_transition, SessionPhase};
use crate::error::{AnnotationError, SaveError};
use crate::gateway::{PersistenceGateway, ReportId, SubmitReceipt};
use crate::viewer::ViewerRole;
use image::RgbaImage;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// One editor's annotation session on one report.
///
/// The session exclusively owns its layer; nothing here is shared with other
/// sessions or viewers.
pub struct ReviewSession {
    report: ReportId,
    layer: AnnotationLayer,
    geometry: LayerGeometry,
    viewport: DisplaySize,
    controller: SurfaceController,
    tools: ToolState,
    phase: SessionPhase,
    restore: RestoreOutcome,
    edited_since_snapshot: bool,
    pending_save: Option<Receiver<SaveOutcome>>,
    last_receipt: Option<SubmitReceipt>,
}

impl ReviewSession {
    /// Loads the report's base image and stored annotation through `gateway`
    /// and prepares a layer at the `displayed` size.
    pub fn open(
        gateway: &dyn PersistenceGateway,
        report: ReportId,
        role: ViewerRole,
        displayed: DisplaySize,
        resolver: RegistrationResolver,
        tools: ToolState,
    ) -> Result<Self, AnnotationError> {
        if !role.can_edit() {
            return Err(AnnotationError::ReadOnlyRole { role });
        }

        let artifacts = gateway.load_report(report)?;
        let base = gateway
            .fetch_artifact(&artifacts.base_image)
            .map_err(|err| AnnotationError::BaseImageUnavailable {
                reason: err.to_string(),
            })
            .and_then(|bytes| {
                decode_raster(&bytes).map_err(|err| AnnotationError::BaseImageUnavailable {
                    reason: err.to_string(),
                })
            })?;
        let natural = DisplaySize::new(base.width(), base.height());

        let stored = match &artifacts.annotation {
            Some(artifact) => match gateway.fetch_artifact(artifact) {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    tracing::warn!(%report, error = %err, "stored annotation unavailable, starting blank");
                    None
                }
            },
            None => None,
        };

        let restored = resolver
            .on_base_image_ready(natural, displayed)?
            .restore_persisted(stored.as_deref());
        Ok(Self::new(report, restored, tools))
    }

    /// Starts a session on an already restored layer.
    pub fn new(report: ReportId, restored: RestoredLayer, tools: ToolState) -> Self {
        let RestoredLayer {
            layer,
            geometry,
            outcome,
        } = restored;
        Self {
            report,
            layer,
            geometry,
            viewport: geometry.layer,
            controller: SurfaceController::new(),
            tools,
            phase: SessionPhase::Idle,
            restore: outcome,
            edited_since_snapshot: false,
            pending_save: None,
            last_receipt: None,
        }
    }

    pub fn report(&self) -> ReportId {
        self.report
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn layer(&self) -> &AnnotationLayer {
        &self.layer
    }

    pub fn geometry(&self) -> LayerGeometry {
        self.geometry
    }

    pub fn restore_outcome(&self) -> RestoreOutcome {
        self.restore
    }

    pub fn tools(&self) -> &ToolState {
        &self.tools
    }

    pub fn tools_mut(&mut self) -> &mut ToolState {
        &mut self.tools
    }

    pub fn last_receipt(&self) -> Option<&SubmitReceipt> {
        self.last_receipt.as_ref()
    }

    pub fn is_save_pending(&self) -> bool {
        self.pending_save.is_some()
    }

    /// Applies from the next stroke; an open stroke keeps its tool.
    pub fn set_tool(&mut self, tool: Tool) {
        self.tools.set_tool(tool);
    }

    /// Records a new viewport size. The layer keeps its size; subsequent
    /// pointer positions are rescaled into it.
    pub fn viewport_resized(&mut self, viewport: DisplaySize) {
        if viewport != self.viewport {
            tracing::debug!(
                width = viewport.width,
                height = viewport.height,
                "viewport resized, layer size kept"
            );
            self.viewport = viewport;
        }
    }

    pub fn start_stroke(&mut self, point: Point) {
        let point = self.geometry.pointer_to_layer(point, self.viewport);
        self.controller
            .start_stroke(&self.layer, point, self.tools.active());
        self.mark_edited();
    }

    pub fn extend_stroke(&mut self, point: Point) -> Option<DirtyRect> {
        let point = self.geometry.pointer_to_layer(point, self.viewport);
        self.controller.extend_stroke(&mut self.layer, point)
    }

    pub fn end_stroke(&mut self) {
        self.controller.end_stroke();
    }

    pub fn clear(&mut self) {
        self.controller.clear(&mut self.layer);
        self.mark_edited();
    }

    pub fn detect_empty(&self) -> bool {
        detect_empty(&self.layer)
    }

    pub fn flatten(&self) -> RgbaImage {
        flatten(&self.layer)
    }

    /// Flattens the layer and hands the submission to `coordinator`.
    ///
    /// Drawing may continue while the save is in flight. Only one save per
    /// session may be pending; the coordinator enforces the same per report.
    pub fn save(
        &mut self,
        coordinator: &SaveCoordinator,
        notes: &str,
        share_with_patient: bool,
    ) -> Result<(), SaveError> {
        if self.pending_save.is_some() {
            return Err(SaveError::InFlight {
                report: self.report,
            });
        }
        let submission = build_submission(&self.layer, notes, share_with_patient)
            .map_err(|err| SaveError::Encode(err.to_string()))?;

        let previous = self.phase;
        self.set_phase(SessionPhase::Flattening);
        let (reply_tx, reply_rx) = mpsc::channel();
        if let Err(err) = coordinator.submit(self.report, submission, reply_tx) {
            self.phase = previous;
            return Err(err);
        }
        self.edited_since_snapshot = false;
        self.pending_save = Some(reply_rx);
        Ok(())
    }

    /// Non-blocking check for the outcome of the pending save.
    pub fn poll_save(&mut self) -> Option<Result<SubmitReceipt, SaveError>> {
        let outcome = match self.pending_save.as_ref()?.try_recv() {
            Ok(outcome) => outcome.into_result(),
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(SaveError::WorkerGone),
        };
        Some(self.finish_save(outcome))
    }

    /// Waits up to `timeout` for the pending save to finish.
    pub fn wait_for_save(&mut self, timeout: Duration) -> Option<Result<SubmitReceipt, SaveError>> {
        let outcome = match self.pending_save.as_ref()?.recv_timeout(timeout) {
            Ok(outcome) => outcome.into_result(),
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => Err(SaveError::WorkerGone),
        };
        Some(self.finish_save(outcome))
    }

    fn finish_save(
        &mut self,
        outcome: Result<SubmitReceipt, SaveError>,
    ) -> Result<SubmitReceipt, SaveError> {
        self.pending_save = None;
        match &outcome {
            Ok(receipt) => {
                self.last_receipt = Some(receipt.clone());
                let next = if self.edited_since_snapshot {
                    SessionPhase::Editing
                } else {
                    SessionPhase::Idle
                };
                self.set_phase(next);
            }
            Err(err) => {
                tracing::warn!(report = %self.report, error = %err, "save failed, edits kept");
                self.set_phase(SessionPhase::Editing);
            }
        }
        outcome
    }

    fn mark_edited(&mut self) {
        self.edited_since_snapshot = true;
        if self.phase == SessionPhase::Idle {
            self.set_phase(SessionPhase::Editing);
        }
    }

    fn set_phase(&mut self, next: SessionPhase) {
        if !can_transition(self.phase, next) {
            tracing::warn!(from = ?self.phase, to = ?next, "ignored invalid session transition");
            return;
        }
        self.phase = next;
    }
}
