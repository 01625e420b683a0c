//! NullOutput against real files
//!
//! WAV fixtures are generated with hound; the daemon probes them with
//! symphonia and plays them against the clock.

mod helpers;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use geisha_common::ipc::ResponseBody;
use geisha_common::{Method, Status};
use geishad::audio::NullOutput;
use helpers::TestDaemon;

fn write_wav(dir: &Path, name: &str, millis: u32) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..(8 * millis) {
        let sample = ((i as f32 * 0.05).sin() * 8000.0) as i16;
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
    path
}

#[tokio::test]
async fn test_wav_plays_to_natural_end() {
    let dir = tempfile::tempdir().unwrap();
    let short = write_wav(dir.path(), "short.wav", 300);
    let short = short.to_str().unwrap();

    let server = TestDaemon::start(Arc::new(NullOutput::new())).await;
    let mut subscriber = server.connect().await;
    subscriber.send_line(r#"{"method":2}"#).await;
    server.wait_for_subscribers(1).await;

    let mut client = server.connect().await;
    assert_eq!(client.call(Method::Enqueue, &[short]).await.status, Status::Ok);

    match client.call(Method::GetState, &[]).await.result {
        Some(ResponseBody::State(state)) => {
            assert_eq!(state.current, 1);
            assert_eq!(state.path, short);
            assert!(!state.paused);
        }
        other => panic!("Expected state body, got {other:?}"),
    }

    assert_eq!(subscriber.read_line().await.unwrap(), "queue:change");
    assert_eq!(subscriber.read_line().await.unwrap(), "song:play");
    assert_eq!(subscriber.read_line().await.unwrap(), "song:done");

    match client.call(Method::GetState, &[]).await.result {
        Some(ResponseBody::State(state)) => assert_eq!(state.current, -1),
        other => panic!("Expected state body, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_and_corrupt_files_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_wav(dir.path(), "good.wav", 2000);
    let corrupt = dir.path().join("corrupt.mp3");
    std::fs::write(&corrupt, b"definitely not audio").unwrap();

    let server = TestDaemon::start(Arc::new(NullOutput::new())).await;
    let mut client = server.connect().await;
    client
        .call(
            Method::Enqueue,
            &[
                "/no/such/file.mp3",
                corrupt.to_str().unwrap(),
                good.to_str().unwrap(),
            ],
        )
        .await;

    match client.call(Method::GetQueue, &[]).await.result {
        Some(ResponseBody::Queue(queue)) => {
            assert_eq!(queue.current, 3);
            assert_eq!(queue.queue.len(), 1);
            assert_eq!(queue.queue[0].song, good.to_str().unwrap());
        }
        other => panic!("Expected queue body, got {other:?}"),
    }
}

#[tokio::test]
async fn test_reports_probed_duration_and_pauses() {
    let dir = tempfile::tempdir().unwrap();
    let track = write_wav(dir.path(), "three.wav", 3000);

    let server = TestDaemon::start(Arc::new(NullOutput::new())).await;
    let mut client = server.connect().await;
    client
        .call(Method::Enqueue, &[track.to_str().unwrap()])
        .await;
    // PAUSE
    client.call(Method::Ctrl, &["1"]).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    match client.call(Method::GetState, &[]).await.result {
        Some(ResponseBody::State(state)) => {
            assert_eq!(state.total, 3);
            assert_eq!(state.elapsed, 0);
            assert!(state.paused);
        }
        other => panic!("Expected state body, got {other:?}"),
    }
}
