//! Thin demonstration binary (spec §1: "present only as a thin
//! demonstration binary; it is not where the specified behavior lives").
//! Wires the in-memory mocks together, loads one playlist, and drives a
//! scan-to-playback scenario so the core's event stream can be observed.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::Context;
use color_eyre::Result;

use musicbox_core::audio::mock::MockAudioBackend;
use musicbox_core::broadcast::ClientId;
use musicbox_core::core::Core;
use musicbox_core::hardware::mock::{MockGpioHardware, MockNfcHardware};
use musicbox_core::model::{Playlist, Room, Track};
use musicbox_core::repository::mock::MockRepository;
use musicbox_core::CoreConfig;

#[derive(Parser)]
struct Cli {
    /// NFC tag uid to simulate a scan for once the demo playlist is loaded.
    #[clap(long, default_value = "04a1b2c3")]
    tag_uid: String,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    color_eyre::install().unwrap();
    setup_tracing();

    let cli = Cli::parse();

    let playlist = demo_playlist(&cli.tag_uid);
    let repository = Arc::new(MockRepository::with_playlists([playlist]));
    let backend = Arc::new(MockAudioBackend::new());
    let nfc_hardware = Arc::new(MockNfcHardware::new());
    let gpio_hardware = Arc::new(MockGpioHardware::new());

    let core = Core::new(
        CoreConfig::default(),
        repository,
        backend,
        nfc_hardware.clone(),
        Some(gpio_hardware),
    );
    core.start().wrap_err("failed to start core")?;

    let mut player_room = core.subscribe(ClientId("demo".into()), Room::Player).await;
    tokio::spawn(async move {
        while let Some(event) = player_room.recv().await {
            tracing::info!(?event, "player event");
        }
    });

    tracing::info!(uid = %cli.tag_uid, "simulating nfc scan");
    nfc_hardware.simulate_tag_detected(cli.tag_uid);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let status = core.get_status().await;
    tracing::info!(?status, "final status");

    core.shutdown().await.wrap_err("failed to shut down core")?;
    Ok(())
}

fn demo_playlist(tag_uid: &str) -> Playlist {
    let mut playlist = Playlist::new(
        "demo-playlist",
        "Kitchen Mix",
        vec![
            Track::new("t1", 1, "Morning Coffee", "demos/audio/morning-coffee.mp3", Some(180_000)),
            Track::new("t2", 2, "Afternoon Sun", "demos/audio/afternoon-sun.mp3", Some(200_000)),
        ],
    );
    playlist.nfc_tag_uid = Some(musicbox_core::model::NfcTagUid(tag_uid.to_string()));
    playlist
}

fn setup_tracing() {
    use tracing_subscriber::filter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = filter::EnvFilter::builder().from_env().unwrap();
    let fmt = fmt::layer().pretty().with_line_number(true);

    let _ignore_err = tracing_subscriber::registry().with(fmt).with(filter).try_init();
}
