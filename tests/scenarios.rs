//! End-to-end scenario tests driving the wired-together `Core` through its
//! mock collaborators, one test per scenario in SPEC_FULL.md §8.

use std::sync::Arc;
use std::time::Duration;

use musicbox_core::audio::mock::MockAudioBackend;
use musicbox_core::broadcast::ClientId;
use musicbox_core::core::{ControlAction, Core};
use musicbox_core::error::CoreError;
use musicbox_core::hardware::mock::{MockGpioHardware, MockNfcHardware};
use musicbox_core::model::{EventData, EventType, NfcTagUid, PlaybackState, Playlist, PlaylistId, Room, SessionState, Track};
use musicbox_core::repository::mock::MockRepository;
use musicbox_core::CoreConfig;

const RECV_TIMEOUT: Duration = Duration::from_millis(500);

fn track(id: &str, number: u32, title: &str, path: &str, duration_ms: Option<u64>) -> Track {
    Track::new(id, number, title, path, duration_ms)
}

fn p1() -> Playlist {
    let mut p = Playlist::new(
        "P1",
        "First Mix",
        vec![
            track("t1", 1, "T1", "songs/t1.mp3", Some(180_000)),
            track("t2", 2, "T2", "songs/t2.mp3", Some(200_000)),
        ],
    );
    p.nfc_tag_uid = Some(NfcTagUid("04a1b2c3".into()));
    p
}

fn p2() -> Playlist {
    Playlist::new("P2", "Second Mix", vec![track("t3", 1, "T3", "songs/t3.mp3", Some(150_000))])
}

async fn next_event(rx: &mut tokio::sync::mpsc::Receiver<musicbox_core::model::EventEnvelope>) -> musicbox_core::model::EventEnvelope {
    tokio::time::timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("event should arrive before timeout")
        .expect("channel should stay open")
}

struct Harness {
    core: Arc<Core>,
    backend: Arc<MockAudioBackend>,
    nfc_hardware: Arc<MockNfcHardware>,
}

fn build(playlists: impl IntoIterator<Item = Playlist>) -> Harness {
    let repository = Arc::new(MockRepository::with_playlists(playlists));
    let backend = Arc::new(MockAudioBackend::new());
    let nfc_hardware = Arc::new(MockNfcHardware::new());
    let gpio_hardware = Arc::new(MockGpioHardware::new());

    let core = Core::new(
        CoreConfig::default(),
        repository,
        Arc::clone(&backend) as Arc<dyn musicbox_core::audio::AudioBackend>,
        Arc::clone(&nfc_hardware) as Arc<dyn musicbox_core::hardware::NfcHardware>,
        Some(gpio_hardware),
    );
    core.start().expect("core should start cleanly");

    Harness { core, backend, nfc_hardware }
}

#[tokio::test]
async fn scenario_1_tag_triggered_playback() {
    let h = build([p1()]);
    let mut player = h.core.subscribe(ClientId("c1".into()), Room::Player).await;
    let _snapshot = next_event(&mut player).await; // state:player on subscribe

    h.nfc_hardware.simulate_tag_detected("04a1b2c3");

    let e1 = next_event(&mut player).await;
    let e2 = next_event(&mut player).await;
    let e3 = next_event(&mut player).await;

    let types: Vec<EventType> = vec![e1.event_type, e2.event_type, e3.event_type];
    assert!(types.contains(&EventType::PlaylistStarted));
    assert!(types.contains(&EventType::PlayerStateChanged));
    assert!(types.contains(&EventType::TrackChanged));
    assert!(e1.server_seq < e2.server_seq);
    assert!(e2.server_seq < e3.server_seq);

    let status = h.core.get_status().await;
    assert!(matches!(status.state, PlaybackState::Playing { track_index: 0, .. }));

    h.core.shutdown().await.unwrap();
}

#[tokio::test]
async fn scenario_2_association_then_play() {
    let h = build([p2()]);
    let mut nfc_room = h.core.subscribe(ClientId("c1".into()), Room::Nfc).await;
    let _snapshot = next_event(&mut nfc_room).await;

    let session = h.core.start_nfc_association(PlaylistId("P2".into()), 60).await.expect("session starts");

    h.nfc_hardware.simulate_tag_detected("deadbeef12");

    let event = next_event(&mut nfc_room).await;
    match event.data {
        EventData::NfcAssociated { session_id, playlist_id, uid } => {
            assert_eq!(session_id, session.session_id);
            assert_eq!(playlist_id, PlaylistId("P2".into()));
            assert_eq!(uid, "deadbeef12");
        }
        other => panic!("expected nfc_associated, got {other:?}"),
    }

    let status = h.core.get_nfc_status();
    let s = status.sessions.iter().find(|s| s.session_id == session.session_id).unwrap();
    assert_eq!(s.state, SessionState::Success);

    // No playback was started as a side effect of the association.
    assert!(matches!(h.core.get_status().await.state, PlaybackState::Stopped));

    h.core.shutdown().await.unwrap();
}

#[tokio::test]
async fn scenario_3_duplicate_association() {
    let h = build([p1(), p2()]);
    let mut nfc_room = h.core.subscribe(ClientId("c1".into()), Room::Nfc).await;
    let _snapshot = next_event(&mut nfc_room).await;

    let session = h.core.start_nfc_association(PlaylistId("P2".into()), 60).await.expect("session starts");
    h.nfc_hardware.simulate_tag_detected("04a1b2c3"); // already bound to P1

    let event = next_event(&mut nfc_room).await;
    match event.data {
        EventData::NfcDuplicate { session_id, playlist_id, conflict_playlist_id } => {
            assert_eq!(session_id, session.session_id);
            assert_eq!(playlist_id, PlaylistId("P2".into()));
            assert_eq!(conflict_playlist_id, PlaylistId("P1".into()));
        }
        other => panic!("expected nfc_duplicate, got {other:?}"),
    }

    let status = h.core.get_nfc_status();
    let s = status.sessions.iter().find(|s| s.session_id == session.session_id).unwrap();
    assert_eq!(s.state, SessionState::Duplicate);
    assert_eq!(s.conflict_playlist_id, Some(PlaylistId("P1".into())));

    h.core.shutdown().await.unwrap();
}

#[tokio::test]
async fn association_rejects_unknown_playlist() {
    let h = build([p1()]);
    let result = h.core.start_nfc_association(PlaylistId("ghost".into()), 60).await;
    assert_eq!(result.unwrap_err(), CoreError::NotFound("ghost".into()));
    h.core.shutdown().await.unwrap();
}

#[tokio::test]
async fn scenario_4_track_end_advances() {
    let h = build([p1()]);
    h.core.play_playlist(PlaylistId("P1".into()), None, None).await.unwrap();

    let mut player = h.core.subscribe(ClientId("c1".into()), Room::Player).await;
    let _snapshot = next_event(&mut player).await;

    h.backend.simulate_track_ended();

    let event = next_event(&mut player).await;
    match event.data {
        EventData::TrackChanged { track_index, track, .. } => {
            assert_eq!(track_index, 1);
            assert_eq!(track.id.0, "t2");
        }
        other => panic!("expected track_changed, got {other:?}"),
    }

    assert_eq!(h.backend.current_path().unwrap().as_str(), "songs/t2.mp3");
    let status = h.core.get_status().await;
    assert!(matches!(status.state, PlaybackState::Playing { track_index: 1, .. }));

    h.core.shutdown().await.unwrap();
}

#[tokio::test]
async fn scenario_5_race_next_and_track_end() {
    // P1 has exactly two tracks, so two advances from track 1 land on Stopped.
    let h = build([p1()]);
    h.core.play_playlist(PlaylistId("P1".into()), None, None).await.unwrap();

    let coordinator_next = h.core.control(ControlAction::Next, None);
    let track_ended = async { h.backend.simulate_track_ended() };
    let (next_result, ()) = tokio::join!(coordinator_next, track_ended);
    next_result.unwrap();

    // Give the queued OnTrackEnded message a chance to land after `next`.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let status = h.core.get_status().await;
    assert!(matches!(status.state, PlaybackState::Stopped), "expected Stopped after two advances, got {status:?}");

    h.core.shutdown().await.unwrap();
}

#[tokio::test]
async fn scenario_6_subscription_snapshot() {
    let h = build([p1()]);
    h.core.play_playlist(PlaylistId("P1".into()), Some(2), None).await.unwrap();
    h.core.control(ControlAction::Pause, None).await.unwrap();
    h.core.seek(45_000).await.unwrap();

    let mut player = h.core.subscribe(ClientId("c1".into()), Room::Player).await;
    let snapshot = next_event(&mut player).await;

    match &snapshot.data {
        EventData::StatePlayer { status } => match &status.state {
            PlaybackState::Paused { playlist_id, track_index, position_ms } => {
                assert_eq!(*playlist_id, PlaylistId("P1".into()));
                assert_eq!(*track_index, 1);
                assert_eq!(*position_ms, 45_000);
            }
            other => panic!("expected Paused, got {other:?}"),
        },
        other => panic!("expected state:player snapshot, got {other:?}"),
    }
    let snapshot_seq = snapshot.server_seq;

    h.core.control(ControlAction::Resume, None).await.unwrap();
    let follow_up = next_event(&mut player).await;
    assert!(follow_up.server_seq > snapshot_seq);

    h.core.shutdown().await.unwrap();
}

#[tokio::test]
async fn coordinator_rejects_commands_before_start_and_after_shutdown() {
    let repository = Arc::new(MockRepository::with_playlists([p1()]));
    let backend = Arc::new(MockAudioBackend::new());
    let nfc_hardware = Arc::new(MockNfcHardware::new());

    let core = Core::new(
        CoreConfig::default(),
        repository,
        backend as Arc<dyn musicbox_core::audio::AudioBackend>,
        nfc_hardware as Arc<dyn musicbox_core::hardware::NfcHardware>,
        None,
    );

    let before_start = core.play_playlist(PlaylistId("P1".into()), None, None).await;
    assert_eq!(before_start.unwrap_err(), CoreError::BackendNotStarted);

    core.start().unwrap();
    core.play_playlist(PlaylistId("P1".into()), None, None).await.unwrap();
    core.shutdown().await.unwrap();

    let after_shutdown = core.control(ControlAction::Pause, None).await;
    assert_eq!(after_shutdown.unwrap_err(), CoreError::BackendNotStarted);
}
