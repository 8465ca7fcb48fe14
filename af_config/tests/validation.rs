use af_config::{load_file, load_toml, ConfigError};

const FULL_FILE: &str = r#"
conf_epsilon = 8
conf_thresh = 16
conf_clip = 512
skip_frames = 5
map = [[0.0, 445.0], [15.0, 925.0]]

[ranges.normal]
min = 0.0
max = 12.0
default = 1.0

[ranges.macro]
min = 3.0
max = 15.0
default = 4.0

[speeds.normal]
step_coarse = 1.0
step_fine = 0.25
contrast_ratio = 0.75
pdaf_gain = -0.02
pdaf_squelch = 0.125
max_slew = 2.0
pdaf_frames = 20
dropout_frames = 6
step_frames = 4

[speeds.fast]
step_coarse = 1.5
max_slew = 4.0
"#;

#[test]
fn full_file_parses() {
    let tuning = load_toml(FULL_FILE).unwrap();

    let ranges = tuning.ranges.unwrap();
    assert_eq!(ranges.normal.unwrap().max, Some(12.0));
    assert_eq!(ranges.macro_.unwrap().min, Some(3.0));
    assert!(ranges.full.is_none());

    let speeds = tuning.speeds.unwrap();
    assert_eq!(speeds.normal.unwrap().pdaf_gain, Some(-0.02));
    let fast = speeds.fast.unwrap();
    assert_eq!(fast.max_slew, Some(4.0));
    assert_eq!(fast.pdaf_frames, None);

    assert_eq!(tuning.conf_clip, Some(512));
    assert_eq!(tuning.map.unwrap(), vec![[0.0, 445.0], [15.0, 925.0]]);
}

#[test]
fn empty_file_is_valid_and_all_optional() {
    let tuning = load_toml("").unwrap();
    assert!(tuning.ranges.is_none());
    assert!(tuning.speeds.is_none());
    assert!(tuning.conf_epsilon.is_none());
    assert!(tuning.map.is_none());
}

#[test]
fn sparse_file_keeps_unset_leaves_as_none() {
    let tuning = load_toml("[speeds.normal]\nstep_coarse = 2.0").unwrap();
    let normal = tuning.speeds.unwrap().normal.unwrap();
    assert_eq!(normal.step_coarse, Some(2.0));
    assert_eq!(normal.step_fine, None);
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let err = load_toml("[speeds.normal\nstep_coarse = 2.0").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn unknown_keys_are_rejected() {
    assert!(load_toml("[speeds.normal]\nstep_corase = 2.0").is_err());
    assert!(load_toml("surprise = 1").is_err());
}

#[test]
fn wrong_types_are_rejected() {
    assert!(load_toml("conf_epsilon = \"eight\"").is_err());
    assert!(load_toml("map = [[0.0], [15.0, 925.0]]").is_err());
}

#[test]
fn load_file_round_trips_and_reports_io_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("af.toml");
    std::fs::write(&path, FULL_FILE).unwrap();

    let tuning = load_file(&path).unwrap();
    assert_eq!(tuning.skip_frames, Some(5));

    let err = load_file(&dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
