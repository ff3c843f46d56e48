use base::{format_epoch_millis, format_record, parse_level, StdoutLogger};
use log::{Level, LevelFilter, Log};

#[test]
fn test_parse_level_accepts_known_names() {
    assert_eq!(parse_level("info"), Some(LevelFilter::Info));
    assert_eq!(parse_level(" DEBUG "), Some(LevelFilter::Debug));
    assert_eq!(parse_level("warning"), Some(LevelFilter::Warn));
    assert_eq!(parse_level("off"), Some(LevelFilter::Off));
}

#[test]
fn test_parse_level_rejects_garbage() {
    assert_eq!(parse_level("loud"), None);
    assert_eq!(parse_level(""), None);
}

#[test]
fn test_logger_filters_below_level() {
    let logger = StdoutLogger::new(LevelFilter::Warn);
    let info = log::MetadataBuilder::new().level(Level::Info).build();
    let error = log::MetadataBuilder::new().level(Level::Error).build();
    assert!(!logger.enabled(&info));
    assert!(logger.enabled(&error));
}

#[test]
fn test_default_logger_is_info() {
    assert_eq!(StdoutLogger::default().level(), LevelFilter::Info);
}

#[test]
fn test_format_epoch_millis() {
    assert_eq!(format_epoch_millis(0), "1970-01-01T00:00:00.000");
    // 2000-02-29T12:34:56.789
    assert_eq!(format_epoch_millis(951_827_696_789), "2000-02-29T12:34:56.789");
}

#[test]
fn test_format_record_layout() {
    let record = log::RecordBuilder::new()
        .level(Level::Info)
        .file(Some("model.rs"))
        .line(Some(42))
        .args(format_args!("stage ready"))
        .build();
    let line = format_record(&record);
    assert!(line.contains("[INFO]"));
    assert!(line.contains("model.rs:42"));
    assert!(line.ends_with("- stage ready"));
}
