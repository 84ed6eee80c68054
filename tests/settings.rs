use scan_annotate::draw::{Color, ScaleFilter, Tool};
use scan_annotate::AnnotationSettings;
use tempfile::tempdir;

#[test]
fn missing_or_empty_file_gives_defaults() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    let settings = AnnotationSettings::load(missing.to_str().unwrap()).unwrap();
    assert_eq!(settings, AnnotationSettings::default());

    let empty = dir.path().join("empty.json");
    std::fs::write(&empty, "  \n").unwrap();
    let settings = AnnotationSettings::load(empty.to_str().unwrap()).unwrap();
    assert_eq!(settings.default_color, Color::RED);
    assert_eq!(settings.default_line_width, 3);
    assert_eq!(settings.restore_filter, ScaleFilter::Nearest);
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(AnnotationSettings::load(path.to_str().unwrap()).is_err());
}

#[test]
fn saved_settings_load_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let settings = AnnotationSettings {
        default_color: Color::MAGENTA,
        default_line_width: 5,
        restore_filter: ScaleFilter::Triangle,
        data_root: dir.path().join("data"),
        log_file: Some(dir.path().join("annotate.log")),
        ..AnnotationSettings::default()
    };
    settings.save(path.to_str().unwrap()).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"#FF00FF\""), "{text}");

    let loaded = AnnotationSettings::load(path.to_str().unwrap()).unwrap();
    assert_eq!(loaded, settings);
    assert_eq!(
        loaded.tool_state().active(),
        Tool::Pen {
            color: Color::MAGENTA,
            width: 5
        }
    );
}
