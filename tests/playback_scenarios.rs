//! End-to-end scheduler and conversion scenarios with in-memory collaborators

use bgpcm::config::{PlayerConfig, DEFAULT_CHUNK_UNITS};
use bgpcm::convert::{ChannelMode, ConvertConfig, RateMode, SampleDepth};
use bgpcm::device::PLAY_CHANNEL;
use bgpcm::lyrics::LyricParser;
use bgpcm::scheduler::{PeriodicTimer, ThreadTimer, TickOutcome};
use bgpcm::{
    AudioDevice, Display, FormatConverter, HeapAllocator, HotKeys, LatchedKeys, PcmBuffer,
    PlayRequest, PlaybackScheduler, PlayerError, Playlist, Session, SourceKind, Track,
};
use parking_lot::Mutex;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct FakeDevice {
    remaining: AtomicUsize,
    plays: Mutex<Vec<usize>>,
    pauses: AtomicUsize,
    resumes: AtomicUsize,
    stops: AtomicUsize,
    stop_delay: Duration,
    drains_instantly: bool,
}

impl FakeDevice {
    fn finish(&self) {
        self.remaining.store(0, Ordering::Release);
    }

    fn play_count(&self) -> usize {
        self.plays.lock().len()
    }
}

impl AudioDevice for FakeDevice {
    fn play(&self, request: PlayRequest) {
        let queued = if self.drains_instantly { 0 } else { request.length };
        self.remaining.store(queued, Ordering::Release);
        self.plays.lock().push(request.length);
    }

    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::Relaxed);
    }

    fn resume(&self) {
        self.resumes.fetch_add(1, Ordering::Relaxed);
    }

    fn stop(&self) {
        std::thread::sleep(self.stop_delay);
        self.stops.fetch_add(1, Ordering::Relaxed);
        self.remaining.store(0, Ordering::Release);
    }

    fn remaining(&self, channel: u8) -> usize {
        assert_eq!(channel, PLAY_CHANNEL);
        self.remaining.load(Ordering::Acquire)
    }
}

#[derive(Default)]
struct RecordingDisplay {
    puts: Mutex<Vec<(u16, u16, String)>>,
}

impl RecordingDisplay {
    fn texts(&self) -> Vec<String> {
        self.puts.lock().iter().map(|(_, _, text)| text.clone()).collect()
    }

    fn count(&self) -> usize {
        self.puts.lock().len()
    }
}

impl Display for RecordingDisplay {
    fn put(&self, row: u16, column: u16, _width: u16, text: &str) {
        self.puts.lock().push((row, column, text.to_string()));
    }
}

struct Rig {
    scheduler: PlaybackScheduler,
    device: Arc<FakeDevice>,
    display: Arc<RecordingDisplay>,
    keys: Arc<LatchedKeys>,
}

fn convert(config: ConvertConfig, source: &[u8]) -> PcmBuffer {
    let allocator = HeapAllocator::unbounded();
    let keys = LatchedKeys::new();
    let mut converter = FormatConverter::new(config, &allocator, DEFAULT_CHUNK_UNITS).unwrap();
    converter
        .convert(Cursor::new(source), SourceKind::Raw, source.len(), &keys, &mut |_| {})
        .unwrap()
}

/// Silent stereo 16-bit track of `duration_ms`, with optional KMD text
fn track(name: &str, duration_ms: usize, kmd: Option<&str>) -> Track {
    let source = vec![0u8; 176_400 * duration_ms / 1000];
    let buffer = convert(ConvertConfig::default(), &source);
    let lyrics = kmd.map(|text| LyricParser::parse_bytes(text.as_bytes()).unwrap());
    Track::new(PathBuf::from(name), buffer, 8, lyrics)
}

fn rig(tracks: Vec<Track>, config: &PlayerConfig) -> Rig {
    let mut playlist = Playlist::new(config.shuffle, config.quiet);
    for t in tracks {
        playlist.push(t).unwrap();
    }
    let device = Arc::new(FakeDevice::default());
    let display = Arc::new(RecordingDisplay::default());
    let keys = Arc::new(LatchedKeys::new());
    let scheduler =
        PlaybackScheduler::new(playlist, config, device.clone(), display.clone(), keys.clone())
            .unwrap();
    scheduler.start();
    Rig {
        scheduler,
        device,
        display,
        keys,
    }
}

fn tick_n(scheduler: &PlaybackScheduler, n: usize) {
    for _ in 0..n {
        scheduler.tick();
    }
}

/// Tick until an outcome containing `flag` or `limit` ticks have passed
fn tick_until(scheduler: &PlaybackScheduler, flag: TickOutcome, limit: usize) -> Option<TickOutcome> {
    (0..limit)
        .map(|_| scheduler.tick())
        .find(|outcome| outcome.contains(flag))
}

#[test]
fn test_end_of_track_advances() {
    let config = PlayerConfig::default();
    let lyric = "KMD100\nx0,y0,s0:1:0,e0:2:0,\"second\"\n";
    let rig = rig(
        vec![track("a.s44", 1000, None), track("b.s44", 1000, Some(lyric))],
        &config,
    );
    assert_eq!(rig.device.play_count(), 1);

    tick_n(&rig.scheduler, 100);
    assert_eq!(rig.scheduler.state().elapsed_ms(), 1000);
    assert_eq!(rig.scheduler.state().current(), 0);

    rig.device.finish();
    let cycle = config.cycle_ticks as usize + 1;
    assert!(tick_until(&rig.scheduler, TickOutcome::ADVANCED, cycle).is_some());

    let state = rig.scheduler.state();
    assert_eq!(state.current(), 1);
    assert_eq!(state.elapsed_ms(), 0);
    assert!(!state.is_paused());
    assert_eq!(rig.device.play_count(), 2);

    let current = rig.scheduler.current_track().unwrap();
    assert_eq!(current.lyrics().unwrap().cursor(), 0);
    assert!(rig.display.texts().contains(&"b.s44".to_string()));
}

#[test]
fn test_advance_wraps_to_first_track() {
    let config = PlayerConfig::default();
    let rig = rig(vec![track("a.s44", 100, None), track("b.s44", 100, None)], &config);
    let cycle = config.cycle_ticks as usize + 1;

    for expected in [1, 0, 1] {
        rig.device.finish();
        assert!(tick_until(&rig.scheduler, TickOutcome::ADVANCED, cycle).is_some());
        assert_eq!(rig.scheduler.state().current(), expected);
    }
}

#[test]
fn test_early_stop_aborts() {
    let config = PlayerConfig::default();
    let rig = rig(vec![track("a.s44", 5000, None), track("b.s44", 1000, None)], &config);

    tick_n(&rig.scheduler, 300);
    assert_eq!(rig.scheduler.state().elapsed_ms(), 3000);

    rig.device.finish();
    let cycle = config.cycle_ticks as usize + 1;
    let outcome = tick_until(&rig.scheduler, TickOutcome::ABORTED, cycle);
    assert!(outcome.is_some());
    assert!(!outcome.unwrap().contains(TickOutcome::ADVANCED));

    let state = rig.scheduler.state();
    assert!(state.is_paused());
    assert_eq!(state.current(), 0);
    assert!(rig.display.texts().contains(&"\u{266a}ABORTED".to_string()));

    // Paused: no accrual, no further advance
    let frozen = state.elapsed_ms();
    tick_n(&rig.scheduler, 3 * cycle);
    assert_eq!(rig.scheduler.state().elapsed_ms(), frozen);
    assert_eq!(rig.device.play_count(), 1);
}

#[test]
fn test_pause_and_resume_keys() {
    let config = PlayerConfig::default();
    let rig = rig(vec![track("a.s44", 5000, None)], &config);
    let cycle = config.cycle_ticks as usize + 1;

    rig.keys.press(HotKeys::MODIFIER | HotKeys::PAUSE);
    assert!(tick_until(&rig.scheduler, TickOutcome::PAUSED, cycle).is_some());
    assert!(rig.scheduler.state().is_paused());
    assert_eq!(rig.device.pauses.load(Ordering::Relaxed), 1);
    assert!(rig.display.texts().contains(&"\u{266a}PAUSED".to_string()));

    let frozen = rig.scheduler.state().elapsed_ms();
    tick_n(&rig.scheduler, cycle);
    assert_eq!(rig.scheduler.state().elapsed_ms(), frozen);

    rig.keys.press(HotKeys::MODIFIER | HotKeys::PAUSE);
    assert!(tick_until(&rig.scheduler, TickOutcome::RESUMED, cycle).is_some());
    assert!(!rig.scheduler.state().is_paused());
    assert_eq!(rig.device.resumes.load(Ordering::Relaxed), 1);
}

#[test]
fn test_hot_key_needs_modifier() {
    let config = PlayerConfig::default();
    let rig = rig(vec![track("a.s44", 5000, None)], &config);

    rig.keys.press(HotKeys::PAUSE);
    tick_n(&rig.scheduler, 2 * (config.cycle_ticks as usize + 1));
    assert!(!rig.scheduler.state().is_paused());
}

#[test]
fn test_skip_restarts_elapsed() {
    let config = PlayerConfig::default();
    let rig = rig(vec![track("a.s44", 5000, None), track("b.s44", 5000, None)], &config);
    let cycle = config.cycle_ticks as usize + 1;

    tick_n(&rig.scheduler, 50);
    assert!(rig.scheduler.state().elapsed_ms() > 0);

    rig.keys.press(HotKeys::MODIFIER | HotKeys::SKIP);
    assert!(tick_until(&rig.scheduler, TickOutcome::ADVANCED, cycle).is_some());
    assert_eq!(rig.scheduler.state().current(), 1);
    assert_eq!(rig.scheduler.state().elapsed_ms(), 0);
    assert_eq!(rig.device.stops.load(Ordering::Relaxed), 1);
}

#[test]
fn test_skip_clears_pause() {
    let config = PlayerConfig::default();
    let rig = rig(vec![track("a.s44", 5000, None), track("b.s44", 5000, None)], &config);
    let cycle = config.cycle_ticks as usize + 1;

    rig.keys.press(HotKeys::MODIFIER | HotKeys::PAUSE);
    assert!(tick_until(&rig.scheduler, TickOutcome::PAUSED, cycle).is_some());

    rig.keys.press(HotKeys::MODIFIER | HotKeys::SKIP);
    assert!(tick_until(&rig.scheduler, TickOutcome::ADVANCED, cycle).is_some());
    assert!(!rig.scheduler.state().is_paused());
}

#[test]
fn test_elapsed_non_decreasing_between_advances() {
    let config = PlayerConfig::default();
    let rig = rig(vec![track("a.s44", 5000, None)], &config);

    let mut last = rig.scheduler.state().elapsed_ms();
    for _ in 0..200 {
        rig.scheduler.tick();
        let now = rig.scheduler.state().elapsed_ms();
        assert!(now >= last);
        last = now;
    }
}

#[test]
fn test_one_lyric_per_tick() {
    let config = PlayerConfig::default();
    let kmd = "KMD100\n\
               x0,y0,s0:1:0,e0:3:0,\"first\"\n\
               x0,y1,s0:1:0,e0:3:0,\"second\"\n\
               x0,y2,s0:1:0,e0:3:0,\"third\"\n";
    let rig = rig(vec![track("a.s44", 5000, Some(kmd))], &config);

    let mut shown = Vec::new();
    for tick in 1..=110 {
        let outcome = rig.scheduler.tick();
        if outcome.contains(TickOutcome::LYRIC) {
            shown.push(tick);
        }
    }
    // Elapsed reaches 1000 ms on tick 100; one caption per tick from then on
    assert_eq!(shown, vec![100, 101, 102]);

    let texts = rig.display.texts();
    for caption in ["first", "second", "third"] {
        assert!(texts.contains(&caption.to_string()));
    }
}

#[test]
fn test_lyric_placed_at_row_and_column() {
    let config = PlayerConfig::default();
    let kmd = "KMD100\nx12,y2,s0:1:50,e0:3:0,\"placed\"\n";
    let rig = rig(vec![track("a.s44", 5000, Some(kmd))], &config);

    tick_n(&rig.scheduler, 120);
    let puts = rig.display.puts.lock();
    let placed = puts.iter().find(|(_, _, text)| text == "placed").unwrap();
    assert_eq!((placed.0, placed.1), (3, 12));
}

#[test]
fn test_early_lyrics_discarded() {
    let config = PlayerConfig::default();
    let kmd = "KMD100\n\
               x0,y0,s0:0:50,e0:1:0,\"too early\"\n\
               x0,y0,s0:1:0,e0:2:0,\"on time\"\n";
    let rig = rig(vec![track("a.s44", 5000, Some(kmd))], &config);

    let first = rig.scheduler.tick();
    assert!(first.contains(TickOutcome::LYRIC_DISCARDED));

    tick_n(&rig.scheduler, 150);
    let texts = rig.display.texts();
    assert!(!texts.contains(&"too early".to_string()));
    assert!(texts.contains(&"on time".to_string()));
}

#[test]
fn test_paused_holds_lyrics() {
    let config = PlayerConfig::default();
    let kmd = "KMD100\nx0,y0,s0:1:0,e0:2:0,\"held\"\n";
    let rig = rig(vec![track("a.s44", 5000, Some(kmd))], &config);
    let cycle = config.cycle_ticks as usize + 1;

    rig.keys.press(HotKeys::MODIFIER | HotKeys::PAUSE);
    assert!(tick_until(&rig.scheduler, TickOutcome::PAUSED, cycle).is_some());
    tick_n(&rig.scheduler, 200);
    assert!(!rig.display.texts().contains(&"held".to_string()));
}

#[test]
fn test_quiet_mode_draws_nothing() {
    let config = PlayerConfig {
        quiet: true,
        ..PlayerConfig::default()
    };
    let kmd = "KMD100\nx0,y0,s0:1:0,e0:2:0,\"silent\"\n";
    let rig = rig(vec![track("a.s44", 1000, Some(kmd)), track("b.s44", 1000, None)], &config);

    tick_n(&rig.scheduler, 150);
    rig.device.finish();
    tick_n(&rig.scheduler, config.cycle_ticks as usize + 1);

    assert_eq!(rig.scheduler.state().current(), 1);
    assert_eq!(rig.display.count(), 0);
}

#[test]
fn test_shuffle_stays_in_range() {
    let config = PlayerConfig {
        shuffle: true,
        ..PlayerConfig::default()
    };
    let tracks = (0..4).map(|i| track(&format!("{i}.s44"), 100, None)).collect();
    let rig = rig(tracks, &config);
    let cycle = config.cycle_ticks as usize + 1;

    for _ in 0..10 {
        rig.device.finish();
        assert!(tick_until(&rig.scheduler, TickOutcome::ADVANCED, cycle).is_some());
        assert!(rig.scheduler.state().current() < 4);
        assert_eq!(rig.scheduler.state().elapsed_ms(), 0);
    }
}

#[test]
fn test_empty_playlist_rejected() {
    let config = PlayerConfig::default();
    let result = PlaybackScheduler::new(
        Playlist::new(false, false),
        &config,
        Arc::new(FakeDevice::default()),
        Arc::new(RecordingDisplay::default()),
        Arc::new(LatchedKeys::new()),
    );
    assert!(result.is_err());
}

#[test]
fn test_converted_length_for_every_format() {
    let units = 1000;
    let source = vec![0u8; units * 2];
    for channels in [ChannelMode::Mono, ChannelMode::Stereo] {
        for rate in [RateMode::Full, RateMode::Half] {
            for depth in [SampleDepth::Bits16, SampleDepth::Bits8] {
                let config = ConvertConfig::new(channels, rate, depth);
                let buffer = convert(config, &source);
                let c = if channels == ChannelMode::Mono { 2 } else { 1 };
                let r = if rate == RateMode::Half { 2 } else { 1 };
                let d = if depth == SampleDepth::Bits8 { 2 } else { 1 };
                assert_eq!(buffer.byte_len(), units * 2 / c / r / d, "{config:?}");
            }
        }
    }
}

#[test]
fn test_mono_half_rate_scenario() {
    // Four stereo pairs; only pairs 0 and 2 survive, each averaged
    let samples: [i16; 8] = [100, 201, -7, -7, -300, -101, 9, 9];
    let source: Vec<u8> = samples.iter().flat_map(|s| s.to_be_bytes()).collect();
    let config = ConvertConfig::new(ChannelMode::Mono, RateMode::Half, SampleDepth::Bits16);

    let buffer = convert(config, &source);
    assert_eq!(buffer.byte_len(), 4);
    assert_eq!(buffer.sample(0), Some(150));
    assert_eq!(buffer.sample(1), Some(-200));
}

#[test]
fn test_session_runs_and_tears_down() {
    let config = PlayerConfig::default();
    let mut playlist = Playlist::new(false, false);
    playlist.push(track("a.s44", 1000, None)).unwrap();
    let device = Arc::new(FakeDevice::default());
    let scheduler = PlaybackScheduler::new(
        playlist,
        &config,
        device.clone(),
        Arc::new(RecordingDisplay::default()),
        Arc::new(LatchedKeys::new()),
    )
    .unwrap();

    let session = Session::start(scheduler, Box::new(ThreadTimer::new()), &config).unwrap();
    assert_eq!(device.play_count(), 1);

    std::thread::sleep(Duration::from_millis(100));
    assert!(session.scheduler().unwrap().state().elapsed_ms() > 0);

    let report = session.teardown();
    assert_eq!(report.tracks, 1);
    assert_eq!(report.bytes, 176_400);
    assert!(device.stops.load(Ordering::Relaxed) >= 1);
    assert_eq!(device.remaining(PLAY_CHANNEL), 0);
}

#[test]
fn test_timer_conflict_leaves_nothing_resident() {
    let config = PlayerConfig::default();
    let mut playlist = Playlist::new(false, false);
    playlist.push(track("a.s44", 1000, None)).unwrap();
    let device = Arc::new(FakeDevice::default());
    let scheduler = PlaybackScheduler::new(
        playlist,
        &config,
        device.clone(),
        Arc::new(RecordingDisplay::default()),
        Arc::new(LatchedKeys::new()),
    )
    .unwrap();

    let busy = ThreadTimer::new();
    busy.install(Duration::from_millis(50), Box::new(|| {})).unwrap();

    let result = Session::start(scheduler, Box::new(busy), &config);
    assert!(matches!(result, Err(PlayerError::TimerInstall(_))));
    assert_eq!(device.remaining(PLAY_CHANNEL), 0);
    assert_eq!(Arc::strong_count(&device), 1);
}

#[test]
fn test_teardown_stops_ticks_before_device() {
    let config = PlayerConfig {
        tick_interval_ms: 1,
        cycle_ticks: 1,
        ..PlayerConfig::default()
    };
    let mut playlist = Playlist::new(false, false);
    playlist.push(track("a.s44", 1000, None)).unwrap();
    let device = Arc::new(FakeDevice {
        stop_delay: Duration::from_millis(50),
        ..FakeDevice::default()
    });
    let display = Arc::new(RecordingDisplay::default());
    let scheduler = PlaybackScheduler::new(
        playlist,
        &config,
        device.clone(),
        display.clone(),
        Arc::new(LatchedKeys::new()),
    )
    .unwrap();

    let session = Session::start(scheduler, Box::new(ThreadTimer::new()), &config).unwrap();
    std::thread::sleep(Duration::from_millis(20));
    session.teardown();

    assert_eq!(device.play_count(), 1);
    assert_eq!(device.remaining(PLAY_CHANNEL), 0);
    assert!(!display.texts().contains(&"\u{266a}ABORTED".to_string()));
}

/// Stop the device with `short_ms` of the first track left and run one cycle tick
fn stop_short_of_end(short_ms: usize) -> (Rig, TickOutcome) {
    let config = PlayerConfig::default();
    // Cycle ticks fall on 1, 18, 35, ..., so tick 341 runs the cycle at 3410 ms
    let rig = rig(
        vec![track("a.s44", 3410 + short_ms, None), track("b.s44", 1000, None)],
        &config,
    );
    tick_n(&rig.scheduler, 340);
    rig.device.finish();
    let outcome = rig.scheduler.tick();
    assert!(outcome.contains(TickOutcome::CYCLE));
    assert_eq!(rig.scheduler.state().elapsed_ms(), 3410);
    (rig, outcome)
}

#[test]
fn test_abort_at_exact_margin() {
    let (rig, outcome) = stop_short_of_end(1500);
    assert!(outcome.contains(TickOutcome::ABORTED));
    assert!(rig.scheduler.state().is_paused());
    assert_eq!(rig.scheduler.state().current(), 0);
}

#[test]
fn test_advance_just_inside_margin() {
    let (rig, outcome) = stop_short_of_end(1490);
    assert!(outcome.contains(TickOutcome::ADVANCED));
    assert!(!outcome.contains(TickOutcome::ABORTED));
    assert_eq!(rig.scheduler.state().current(), 1);
}

#[test]
fn test_shuffle_on_timer_thread() {
    let config = PlayerConfig {
        shuffle: true,
        tick_interval_ms: 1,
        cycle_ticks: 1,
        ..PlayerConfig::default()
    };
    let mut playlist = Playlist::new(true, false);
    for i in 0..3 {
        playlist.push(track(&format!("{i}.s44"), 100, None)).unwrap();
    }
    let device = Arc::new(FakeDevice {
        drains_instantly: true,
        ..FakeDevice::default()
    });
    let scheduler = PlaybackScheduler::new(
        playlist,
        &config,
        device.clone(),
        Arc::new(RecordingDisplay::default()),
        Arc::new(LatchedKeys::new()),
    )
    .unwrap();

    let session = Session::start(scheduler, Box::new(ThreadTimer::new()), &config).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert!(session.scheduler().unwrap().state().current() < 3);
    session.teardown();

    assert!(device.play_count() > 1);
}
