use anyhow::Context;
use scan_annotate::draw::DisplaySize;
use scan_annotate::{logging, render_report, AnnotationSettings, FsGateway, ReportId};
use std::path::PathBuf;

const USAGE: &str = "usage: scan_annotate <report-id> <out.png> [width height]";

fn main() -> anyhow::Result<()> {
    let settings = AnnotationSettings::load("settings.json")?;
    logging::init(settings.debug_logging, settings.log_file.clone());

    let mut args = std::env::args().skip(1);
    let report = args
        .next()
        .context(USAGE)?
        .parse::<u64>()
        .context("report id must be a number")?;
    let out = PathBuf::from(args.next().context(USAGE)?);
    let target = match (args.next(), args.next()) {
        (Some(width), Some(height)) => Some(DisplaySize::new(
            width.parse().context("width must be a number")?,
            height.parse().context("height must be a number")?,
        )),
        (None, None) => None,
        _ => anyhow::bail!(USAGE),
    };

    let gateway = FsGateway::open(&settings.data_root)?;
    let view = render_report(&gateway, ReportId(report), target, settings.restore_filter)?;
    view.image()
        .save(&out)
        .with_context(|| format!("write {}", out.display()))?;

    tracing::info!(
        report,
        placeholder = view.is_placeholder(),
        out = %out.display(),
        "report view written"
    );
    Ok(())
}
