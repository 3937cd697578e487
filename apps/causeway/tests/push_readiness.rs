use std::time::Duration;

use causeway::pending::PendingConnectionTracker;
use causeway::readiness::{PushReadiness, ReadinessOutcome, ReadinessStrategy};
use futures_util::{SinkExt, StreamExt};
use isle_sdk::types::IslandEndpoint;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

/// One-shot loopback readiness channel: accepts a single socket, pushes the
/// scripted frames, then either closes the stream or holds it open forever.
async fn serve_frames(frames: Vec<String>, close_after: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.expect("accept");
        let mut stream = tokio_tungstenite::accept_async(socket)
            .await
            .expect("ws handshake");
        for frame in frames {
            if stream.send(Message::text(frame)).await.is_err() {
                return;
            }
        }
        if close_after {
            let _ = stream.close(None).await;
        } else {
            // Stall until the client gives up.
            while let Some(Ok(_)) = stream.next().await {}
        }
    });

    format!("ws://{addr}")
}

fn frame(status: &str, addr: Option<(&str, u16)>, ready: bool) -> String {
    match addr {
        Some((host, port)) => format!(
            r#"{{"status":"{status}","internal_ip_address":"{host}","internal_port":{port},"minecraft_ready":{ready}}}"#
        ),
        None => format!(r#"{{"status":"{status}","minecraft_ready":{ready}}}"#),
    }
}

#[tokio::test]
async fn warming_frames_are_skipped_until_the_ready_one() {
    let ws_base = serve_frames(
        vec![
            frame("PENDING_START", None, false),
            frame("RUNNING", Some(("10.0.0.5", 25566)), false),
            frame("RUNNING", Some(("10.0.0.5", 25566)), true),
        ],
        true,
    )
    .await;
    let tracker = PendingConnectionTracker::new();
    let run = tracker.try_begin(Uuid::new_v4()).expect("free slot");

    let readiness = PushReadiness::new(ws_base, Duration::from_secs(5));
    let outcome = readiness.await_ready(&run).await;

    assert_eq!(
        outcome,
        ReadinessOutcome::Ready(IslandEndpoint {
            host: "10.0.0.5".into(),
            port: 25566,
        })
    );
}

#[tokio::test]
async fn close_without_a_terminal_frame_times_out() {
    let ws_base = serve_frames(vec![frame("PENDING_START", None, false)], true).await;
    let tracker = PendingConnectionTracker::new();
    let run = tracker.try_begin(Uuid::new_v4()).expect("free slot");

    let readiness = PushReadiness::new(ws_base, Duration::from_secs(5));
    assert_eq!(readiness.await_ready(&run).await, ReadinessOutcome::TimedOut);
}

#[tokio::test]
async fn stalled_channel_hits_the_wait_ceiling() {
    let ws_base = serve_frames(Vec::new(), false).await;
    let tracker = PendingConnectionTracker::new();
    let run = tracker.try_begin(Uuid::new_v4()).expect("free slot");

    let readiness = PushReadiness::new(ws_base, Duration::from_millis(200));
    assert_eq!(readiness.await_ready(&run).await, ReadinessOutcome::TimedOut);
}

#[tokio::test]
async fn error_status_frame_ends_the_wait() {
    let ws_base = serve_frames(vec![frame("ERROR_START", None, false)], false).await;
    let tracker = PendingConnectionTracker::new();
    let run = tracker.try_begin(Uuid::new_v4()).expect("free slot");

    let readiness = PushReadiness::new(ws_base, Duration::from_secs(5));
    assert!(matches!(
        readiness.await_ready(&run).await,
        ReadinessOutcome::IslandError(_)
    ));
}

#[tokio::test]
async fn cancelled_run_abandons_the_channel() {
    let ws_base = serve_frames(Vec::new(), false).await;
    let player = Uuid::new_v4();
    let tracker = PendingConnectionTracker::new();
    let run = tracker.try_begin(player).expect("free slot");
    tracker.cancel(player);

    let readiness = PushReadiness::new(ws_base, Duration::from_secs(5));
    assert_eq!(
        readiness.await_ready(&run).await,
        ReadinessOutcome::Cancelled
    );
}
