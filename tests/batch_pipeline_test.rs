//! Recording files in, CSV rows out: loader, discovery, batch runner and sink together.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use disc_probe::batch::{run_batch, RecordingStatus};
use disc_probe::config::ProbeConfig;
use disc_probe::discovery::discover_recordings;
use disc_probe::recording::{JsonRecordingLoader, Position, RecordingLoader};
use disc_probe::sink::{CsvSink, OutputRow, RunHeader};
use disc_probe::sync::Direction;
use disc_probe::synthetic::SyntheticRecording;
use tempfile::TempDir;

fn config() -> ProbeConfig {
    let mut config = ProbeConfig::default();
    config.analysis.theta_min = -0.3;
    config.analysis.theta_max = 0.3;
    config.analysis.theta_step = 0.1;
    config.batch.workers = 2;
    config
}

fn write_synthetic(dir: &Path, name: &str, direction: Direction, x: f64) {
    SyntheticRecording::new(4, 3600)
        .rotations(5)
        .direction(direction)
        .position(Position { x, y: -1.0, z: 0.0 })
        .noise(0.01, 3)
        .build()
        .save_json(&dir.join(name))
        .unwrap();
}

fn read_rows(path: &Path) -> Vec<OutputRow> {
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .from_path(path)
        .unwrap();
    reader.deserialize().map(|r| r.unwrap()).collect()
}

#[test]
fn test_json_recording_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ccw.json");
    let saved = SyntheticRecording::new(3, 1200)
        .rotations(4)
        .direction(Direction::Ccw)
        .noise(0.05, 11)
        .build();
    saved.save_json(&path).unwrap();

    let loaded = JsonRecordingLoader.load(&path).unwrap();
    assert_eq!(loaded.id, path.display().to_string());
    assert_eq!(loaded.edges, saved.edges);
    assert_eq!(loaded.metadata.wires.len(), 3);
    assert_eq!(loaded.metadata.description, saved.metadata.description);
    assert_eq!(loaded.samples(), saved.samples());
    for (a, b) in loaded.current.iter().zip(&saved.current) {
        assert!((a - b).abs() < 1e-12);
    }
}

#[tokio::test]
async fn test_batch_writes_csv_and_reports_failures() {
    let dir = TempDir::new().unwrap();
    write_synthetic(dir.path(), "scan_001.json", Direction::Cw, 0.0);
    write_synthetic(dir.path(), "scan_002.json", Direction::Ccw, 0.5);
    fs::write(dir.path().join("scan_003.json"), r#"{"metadata": {}}"#).unwrap();
    write_synthetic(dir.path(), "scan_004.json", Direction::Cw, 1.5);
    fs::write(dir.path().join("README.txt"), "not a recording").unwrap();

    let mut config = config();
    config.analysis.ignore.insert(2);
    let paths = discover_recordings(&[dir.path()], &config.batch.extension).unwrap();
    assert_eq!(paths.len(), 4);

    let out = dir.path().join("out").join("profile.csv");
    let header = RunHeader::new(config.analysis.grid(), config.analysis.statistic);
    let sink = CsvSink::create(&out, &header).unwrap();
    let (report, sink) = run_batch(paths, Arc::new(JsonRecordingLoader), &config, sink)
        .await
        .unwrap();
    sink.into_inner().unwrap();

    let statuses: Vec<_> = report.outcomes.iter().map(|o| &o.status).collect();
    assert_eq!(statuses[0], &RecordingStatus::Clean);
    assert_eq!(statuses[1], &RecordingStatus::Clean);
    assert!(matches!(statuses[2], RecordingStatus::Failed { .. }));
    assert_eq!(statuses[3], &RecordingStatus::Clean);
    assert!(report.outcomes[2].id.ends_with("scan_003.json"));
    assert_eq!(report.outcomes[2].rows, 0);

    // three wires of six bins per accepted recording
    let rows = read_rows(&out);
    assert_eq!(rows.len(), 3 * 18);
    assert_eq!(report.rows_written(), rows.len());

    // contiguous per recording, in input order
    let xs: Vec<f64> = rows.chunks(18).map(|c| c[0].x).collect();
    assert_eq!(xs, [0.0, 0.5, 1.5]);
    for chunk in rows.chunks(18) {
        assert!(chunk.iter().all(|r| r.x == chunk[0].x && r.y == -1.0));
    }

    // wire 2 has radius 0.015
    assert!(rows.iter().all(|r| (r.wire_radius - 0.015).abs() > 1e-9));

    let text = fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("# {"));
    assert!(text.contains("\"statistic\": \"mean\""));
    assert!(text.contains("wire_radius,x,y,theta,value"));
}

#[tokio::test]
async fn test_batch_with_only_failures_writes_header_only() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("broken.json"), "[1, 2").unwrap();

    let paths = discover_recordings(&[dir.path()], "json").unwrap();
    let out = dir.path().join("profile.csv");
    let header = RunHeader::new(config().analysis.grid(), config().analysis.statistic);
    let sink = CsvSink::create(&out, &header).unwrap();
    let (report, sink) = run_batch(paths, Arc::new(JsonRecordingLoader), &config(), sink)
        .await
        .unwrap();
    sink.into_inner().unwrap();

    assert_eq!(report.failed().count(), 1);
    assert_eq!(report.succeeded(), 0);
    assert!(read_rows(&out).is_empty());
}
