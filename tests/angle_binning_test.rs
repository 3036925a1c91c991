//! End-to-end tests of the synchronization engine on synthetic recordings.
//!
//! Synthetic current is `gain(w) * theta` around each wire, so the binned mean of
//! every bin should sit on `gain(w) * centre` for either spin direction.

use std::f64::consts::PI;

use disc_probe::analysis::analyze_recording;
use disc_probe::config::AnalysisConfig;
use disc_probe::sync::{
    synchronize, AngleBinner, AngleGrid, AngleSynchronizer, Direction, EngineSettings, Rotation,
    SpeedPolicy, Statistic, StatsTable,
};
use disc_probe::synthetic::SyntheticRecording;
use disc_probe::ProbeError;

fn config() -> AnalysisConfig {
    AnalysisConfig {
        theta_min: -0.3,
        theta_max: 0.3,
        theta_step: 0.1,
        ..Default::default()
    }
}

#[test]
fn test_four_wire_recording_bins_every_wire() {
    let rec = SyntheticRecording::new(4, 3600).rotations(6).build();
    let analysis = analyze_recording(&rec, &config()).unwrap();
    let table = analysis.table();

    assert_eq!(analysis.sync.direction, Direction::Cw);
    assert_eq!(analysis.sync.rotations, 6);
    assert_eq!(table.wires(), 4);
    assert_eq!(table.bins(), 6);

    // 343 samples per full pass. Wire 1 also catches the start of the recording
    // before the first reference, wire 2 is cut short by the end.
    let counts: Vec<usize> = (0..4).map(|w| table.wire_count(w)).collect();
    assert_eq!(counts, [6 * 343, 6 * 343 + 172, 6 * 343 + 171, 6 * 343]);
    assert_eq!(analysis.sync.samples_binned, counts.iter().sum::<usize>());

    for wire in 0..4 {
        for bin in 0..6 {
            assert!(table.get(wire, bin).unwrap().count > 0, "wire {} bin {} empty", wire, bin);
        }
    }

    // Wire 0 only sees full passes: 57 samples per bin and pass away from theta = 0
    for bin in [0, 1, 4, 5] {
        assert_eq!(table.get(0, bin).unwrap().count, 6 * 57);
    }
}

#[test]
fn test_single_rotation_sawtooth_round_trip() {
    let rec = SyntheticRecording::new(4, 3600).rotations(3).build();
    let grid = AngleGrid::new(-0.3, 0.3, 0.1).unwrap();
    let rotation = Rotation {
        index: rec.edges[1],
        duration: 3600,
    };

    let sync = AngleSynchronizer::new(Direction::Cw, 4, grid, rec.samples());
    let windows = sync.rotation_windows(rotation);
    let mut binner = AngleBinner::new(grid, 4);
    for window in &windows {
        binner.accumulate(window, &rec.current);
    }
    let table = StatsTable::aggregate(&grid, binner.into_bins());

    for (wire, window) in windows.iter().enumerate() {
        assert_eq!(table.wire_count(wire), window.len());
        let gain = SyntheticRecording::gain(wire);
        for (bin, &theta) in table.theta.iter().enumerate() {
            let stats = table.get(wire, bin).unwrap();
            assert!((stats.mean - gain * theta).abs() < 0.002 * gain);
            assert!(stats.min >= gain * (theta - 0.05) - 1e-9);
            assert!(stats.max < gain * (theta + 0.05) + 1e-9);
        }
    }
}

#[test]
fn test_binned_means_recover_sawtooth() {
    let rec = SyntheticRecording::new(4, 3600).rotations(6).build();
    let analysis = analyze_recording(&rec, &config()).unwrap();
    let table = analysis.table();

    for wire in 0..4 {
        let gain = SyntheticRecording::gain(wire);
        for (bin, &theta) in table.theta.iter().enumerate() {
            let mean = table.get(wire, bin).unwrap().mean;
            assert!(
                (mean - gain * theta).abs() < 0.002 * gain,
                "wire {} bin {}: mean {} expected {}",
                wire,
                bin,
                mean,
                gain * theta
            );
        }
    }
}

#[test]
fn test_clockwise_and_counter_clockwise_agree() {
    let cw = SyntheticRecording::new(4, 3600).rotations(8).build();
    let ccw = SyntheticRecording::new(4, 3600)
        .rotations(8)
        .direction(Direction::Ccw)
        .build();

    let a = analyze_recording(&cw, &config()).unwrap();
    let b = analyze_recording(&ccw, &config()).unwrap();
    assert_eq!(b.sync.direction, Direction::Ccw);
    assert_eq!(a.table().theta, b.table().theta);

    for wire in 0..4 {
        for bin in 0..6 {
            let ma = a.table().get(wire, bin).unwrap().mean;
            let mb = b.table().get(wire, bin).unwrap().mean;
            assert!((ma - mb).abs() < 0.005, "wire {} bin {}: {} vs {}", wire, bin, ma, mb);
        }
    }
}

#[test]
fn test_fast_rotation_leaves_empty_bins() {
    // 36 samples per rotation: the angle step exceeds the bin width
    let rec = SyntheticRecording::new(4, 36).rotations(10).build();
    let cfg = AnalysisConfig {
        statistic: Statistic::Mean,
        ..config()
    };
    let analysis = analyze_recording(&rec, &cfg).unwrap();
    let table = analysis.table();

    for wire in 0..4 {
        for bin in [0, 5] {
            let stats = table.get(wire, bin).unwrap();
            assert_eq!(stats.count, 0);
            assert!(stats.mean.is_nan());
            assert!(stats.std.is_nan());
        }
        assert!(table.wire_count(wire) > 0);
    }

    // empty bins are still emitted
    let rows = analysis.rows(&cfg);
    assert_eq!(rows.len(), 24);
    assert!(rows[0].value.is_nan());
}

#[test]
fn test_speed_drift_respects_policy() {
    let rec = SyntheticRecording::new(4, 3600).rotations(10).drift(0.004).build();

    let err = analyze_recording(&rec, &config()).unwrap_err();
    match err.root() {
        ProbeError::RotationSpeed { ratio, .. } => assert!(*ratio > 1.01),
        other => panic!("unexpected error: {:?}", other),
    }

    let cfg = AnalysisConfig {
        speed_policy: SpeedPolicy::Warn,
        ..config()
    };
    let analysis = analyze_recording(&rec, &cfg).unwrap();
    assert!(analysis.sync.is_degraded());
    assert_eq!(analysis.rows(&cfg).len(), 24);
}

#[test]
fn test_full_spacing_grid_counts_each_sample_once() {
    // Each wire window spans the whole quarter turn between wires.
    let cfg = AnalysisConfig {
        theta_min: -PI / 4.0,
        theta_max: PI / 4.0,
        theta_step: PI / 40.0,
        ..Default::default()
    };

    for direction in [Direction::Cw, Direction::Ccw] {
        let rec = SyntheticRecording::new(4, 3601)
            .rotations(6)
            .direction(direction)
            .build();
        let analysis = analyze_recording(&rec, &cfg).unwrap();
        let binned = analysis.sync.samples_binned;
        assert!(
            binned <= rec.samples(),
            "{}: binned {} of {} samples",
            direction,
            binned,
            rec.samples()
        );
        assert!(binned * 100 > rec.samples() * 99);
    }
}

#[test]
fn test_slowing_disc_does_not_double_count_rotation_boundaries() {
    // Every rotation is a little longer than the one before, within tolerance.
    let rec = SyntheticRecording::new(4, 3600).rotations(6).drift(0.0015).build();
    let cfg = AnalysisConfig {
        theta_min: -PI / 4.0,
        theta_max: PI / 4.0,
        theta_step: PI / 40.0,
        ..Default::default()
    };
    let analysis = analyze_recording(&rec, &cfg).unwrap();
    assert!(!analysis.sync.is_degraded());
    assert!(analysis.sync.speed.ratio > 1.0);
    assert!(analysis.sync.samples_binned <= rec.samples());
}

#[test]
fn test_wide_grid_is_rejected_for_many_wires() {
    let rec = SyntheticRecording::new(16, 3600).rotations(4).build();
    let grid = disc_probe::sync::AngleGrid::new(-0.3, 0.3, 0.1).unwrap();
    let err = synchronize(&rec.edges, &rec.current, &EngineSettings::new(grid, 16)).unwrap_err();
    assert!(matches!(err, ProbeError::Configuration(_)));
}
