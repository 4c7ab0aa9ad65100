use std::ffi::OsString;

use audiosync_node::{
    BEAT_PERIOD_MS, SyntheticSource, config_from_args, describe,
    net::{
        SyncConfig, SyncMode,
        proto::{self, PacketFormat, SyncState},
    },
};

#[test]
fn beats_keep_their_period() {
    let mut source = SyntheticSource::new();

    assert!(source.beat(0));
    assert!(!source.beat(20));
    assert!(!source.beat(BEAT_PERIOD_MS - 1));
    assert!(source.beat(BEAT_PERIOD_MS));
    assert!(!source.beat(BEAT_PERIOD_MS + 20));

    // across clock wraparound
    let mut source = SyntheticSource::new();
    assert!(source.beat(u32::MAX - 100));
    assert!(!source.beat(100));
    assert!(source.beat(BEAT_PERIOD_MS));
}

#[test]
fn synthetic_levels_survive_the_wire() {
    let source = SyntheticSource::new();

    for now in (0..8000).step_by(250) {
        let mut state = SyncState::new();
        state.levels = source.levels(now);

        let bytes = proto::encode(&state, false, 0);
        let decoded = proto::classify_and_decode(&bytes).unwrap();
        let levels = decoded.levels();

        assert_eq!(levels.volume_smth, state.levels.sample_avg);
        assert_eq!(levels.fft_result, state.levels.fft_result);
        assert_eq!(levels.fft_major_peak, state.levels.fft_major_peak);
        assert!((60. ..=2000.).contains(&levels.fft_major_peak));
    }
}

#[test]
fn describes_state() {
    let mut state = SyncState::new();
    assert!(describe(&state, false).starts_with("no sync"));

    state.received_format = Some(PacketFormat::V2);
    state.source_ip = Some("10.0.0.7".parse().unwrap());
    state.levels.fft_result = [255; proto::N_BANDS];
    state.peak.on_peak_observed(0);

    let line = describe(&state, true);
    assert!(line.starts_with("v2 from 10.0.0.7"));
    assert!(line.contains(&"█".repeat(proto::N_BANDS)));
    assert!(line.ends_with(" *"));

    // stale data isn't attributed to anyone
    assert!(describe(&state, false).starts_with("no sync"));
}

#[test]
fn config_path_is_optional() {
    let config = config_from_args([OsString::from("listener")].into_iter()).unwrap();
    assert_eq!(config, SyncConfig::default());
}

#[test]
fn config_is_read_from_first_argument() {
    let path = std::env::temp_dir().join(format!("audiosync-{}.toml", std::process::id()));
    std::fs::write(&path, "mode = \"send\"\nport = 12000\n").unwrap();

    let args = [OsString::from("broadcaster"), path.clone().into_os_string()];
    let config = config_from_args(args.into_iter());
    let _ = std::fs::remove_file(&path);

    let config = config.unwrap();
    assert_eq!(config.mode, SyncMode::Send);
    assert_eq!(config.port, 12000);
}
