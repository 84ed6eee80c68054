use crate::draw::composite::{detect_empty, encode_png, flatten};
use crate::draw::layer::AnnotationLayer;
use crate::error::{AnnotationError, GatewayError};
use crate::gateway::ReportSubmission;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Local;

pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

pub fn timestamped_stem(now: chrono::DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

pub fn png_data_url(png: &[u8]) -> String {
    format!("{PNG_DATA_URL_PREFIX}{}", STANDARD.encode(png))
}

/// Extracts PNG bytes from a `data:image/...;base64,` URL or from bare base64.
pub fn decode_annotation_payload(payload: &str) -> Result<Vec<u8>, GatewayError> {
    let trimmed = payload.trim();
    let encoded = match trimmed.split_once(',') {
        Some((header, body)) => {
            if !header.starts_with("data:image") {
                return Err(GatewayError::InvalidPayload(format!(
                    "unexpected data URL header {header:?}"
                )));
            }
            body
        }
        None => trimmed,
    };
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|err| GatewayError::InvalidPayload(format!("annotation is not base64: {err}")))?;
    if bytes.is_empty() {
        return Err(GatewayError::InvalidPayload("annotation is empty".into()));
    }
    Ok(bytes)
}

/// Flattens the layer into a wire payload; `None` when nothing is painted.
pub fn annotation_payload(layer: &AnnotationLayer) -> Result<Option<String>, AnnotationError> {
    if detect_empty(layer) {
        return Ok(None);
    }
    let png = encode_png(&flatten(layer))?;
    Ok(Some(png_data_url(&png)))
}

pub fn build_submission(
    layer: &AnnotationLayer,
    notes: impl Into<String>,
    share_with_patient: bool,
) -> Result<ReportSubmission, AnnotationError> {
    Ok(ReportSubmission {
        notes: notes.into(),
        annotation_image: annotation_payload(layer)?,
        share_with_patient,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::composite::decode_raster;
    use crate::draw::input::SurfaceController;
    use crate::draw::model::{Color, Point, Tool};
    use chrono::TimeZone;

    #[test]
    fn stem_formats_timestamp() {
        let dt = Local
            .with_ymd_and_hms(2026, 1, 2, 3, 4, 5)
            .single()
            .expect("date time");
        assert_eq!(timestamped_stem(dt), "20260102_030405");
    }

    #[test]
    fn empty_layer_submits_no_annotation() {
        let layer = AnnotationLayer::new(16, 16);
        let submission = build_submission(&layer, "clear scan", true).expect("submission");
        assert_eq!(submission.annotation_image, None);
        assert_eq!(submission.notes, "clear scan");
        assert!(submission.share_with_patient);
    }

    #[test]
    fn painted_layer_submits_decodable_png_url() {
        let mut layer = AnnotationLayer::new(16, 16);
        let mut controller = SurfaceController::new();
        controller.start_stroke(
            &layer,
            Point::new(2.0, 2.0),
            Tool::Pen {
                color: Color::GREEN,
                width: 2,
            },
        );
        controller.extend_stroke(&mut layer, Point::new(12.0, 12.0));
        controller.end_stroke();

        let submission = build_submission(&layer, "", false).expect("submission");
        let url = submission.annotation_image.expect("annotation present");
        assert!(url.starts_with(PNG_DATA_URL_PREFIX));

        let png = decode_annotation_payload(&url).expect("payload");
        let decoded = decode_raster(&png).expect("png");
        assert_eq!(&decoded, layer.image());
    }

    #[test]
    fn bare_base64_is_accepted() {
        let encoded = STANDARD.encode([1_u8, 2, 3]);
        assert_eq!(decode_annotation_payload(&encoded).expect("bytes"), vec![1, 2, 3]);
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(decode_annotation_payload("data:text/plain;base64,AAAA").is_err());
        assert!(decode_annotation_payload("data:image/png;base64,@@@").is_err());
        assert!(decode_annotation_payload("").is_err());
    }
}
