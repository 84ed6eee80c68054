//! Read path shared by every role: base image with the stored annotation on
//! top, at whatever size the viewer displays it.

use crate::draw::composite::{compose_for_viewing, decode_raster, placeholder};
use crate::draw::registration::{DisplaySize, ScaleFilter};
use crate::error::GatewayError;
use crate::gateway::{PersistenceGateway, ReportId};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Size used for the placeholder when the viewer gave no target size.
pub const DEFAULT_PLACEHOLDER_SIZE: DisplaySize = DisplaySize::new(512, 512);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerRole {
    Doctor,
    Patient,
    Lab,
    Admin,
}

impl ViewerRole {
    /// Only reviewing doctors may change the annotation layer.
    pub fn can_edit(self) -> bool {
        matches!(self, ViewerRole::Doctor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportView {
    Composed { image: RgbaImage, annotated: bool },
    Placeholder { image: RgbaImage, reason: String },
}

impl ReportView {
    pub fn image(&self) -> &RgbaImage {
        match self {
            ReportView::Composed { image, .. } | ReportView::Placeholder { image, .. } => image,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ReportView::Placeholder { .. })
    }
}

/// Renders a report for display. A missing or undecodable base image yields a
/// placeholder; a broken annotation is skipped and the base shown alone.
pub fn render_report(
    gateway: &dyn PersistenceGateway,
    report: ReportId,
    target: Option<DisplaySize>,
    filter: ScaleFilter,
) -> Result<ReportView, GatewayError> {
    let artifacts = gateway.load_report(report)?;

    let base = match gateway
        .fetch_artifact(&artifacts.base_image)
        .map_err(|err| err.to_string())
        .and_then(|bytes| decode_raster(&bytes).map_err(|err| err.to_string()))
    {
        Ok(base) => base,
        Err(reason) => {
            tracing::warn!(%report, %reason, "base image unavailable, showing placeholder");
            let size = target.unwrap_or(DEFAULT_PLACEHOLDER_SIZE);
            return Ok(ReportView::Placeholder {
                image: placeholder(size),
                reason,
            });
        }
    };

    let annotation = artifacts.annotation.as_ref().and_then(|artifact| {
        gateway
            .fetch_artifact(artifact)
            .map_err(|err| err.to_string())
            .and_then(|bytes| decode_raster(&bytes).map_err(|err| err.to_string()))
            .map_err(|reason| {
                tracing::warn!(%report, %reason, "annotation unreadable, showing base only");
            })
            .ok()
    });

    let target = target.filter(|size| !size.is_empty());
    Ok(ReportView::Composed {
        annotated: annotation.is_some(),
        image: compose_for_viewing(&base, annotation.as_ref(), target, filter),
    })
}
