use bytes::Bytes;
use futures::{stream, Stream};
use std::{convert::Infallible, time::Duration};
use tokio::{
    sync::{broadcast, watch},
    time::sleep,
};
use tracing::instrument;

const FRAME_BOUNDARY: &str = "frame";

/// Multipart MJPEG stream over the latest overlay surface.
pub struct VideoStream {
    pub overlay: watch::Receiver<Option<Bytes>>,
    pub video_stream_delay: u64,
    pub shutdown: broadcast::Receiver<()>,
}

impl VideoStream {
    pub fn new(
        overlay: watch::Receiver<Option<Bytes>>,
        video_stream_delay: u64,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            overlay,
            video_stream_delay,
            shutdown,
        }
    }

    pub fn content_type() -> String {
        format!("multipart/x-mixed-replace; boundary={}", FRAME_BOUNDARY)
    }

    /// Emits one part per pacing interval while a surface is available; ends
    /// when the session goes away or the server shuts down.
    #[instrument(skip(self))]
    pub fn generate_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> {
        let delay = Duration::from_millis(self.video_stream_delay);

        stream::unfold(
            (self.overlay, self.shutdown),
            move |(mut overlay, mut shutdown)| async move {
                loop {
                    tokio::select! {
                        _ = shutdown.recv() => return None,
                        _ = sleep(delay) => {}
                    }
                    let latest = overlay.borrow_and_update().clone();
                    match latest {
                        Some(frame) => {
                            return Some((Ok(encode_part(&frame)), (overlay, shutdown)));
                        }
                        // Cleared surface: wait for the next one instead of polling.
                        None => tokio::select! {
                            _ = shutdown.recv() => return None,
                            changed = overlay.changed() => {
                                if changed.is_err() {
                                    return None;
                                }
                            }
                        },
                    }
                }
            },
        )
    }
}

fn encode_part(frame: &[u8]) -> Bytes {
    let part_header = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        FRAME_BOUNDARY,
        frame.len()
    );
    let mut body = part_header.into_bytes();
    body.extend_from_slice(frame);
    body.extend_from_slice(b"\r\n");
    Bytes::from(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_encode_part() {
        let part = encode_part(b"jpg");
        assert_eq!(
            &part[..],
            b"--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 3\r\n\r\njpg\r\n"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_follows_overlay() {
        let (tx, rx) = watch::channel(Some(Bytes::from_static(b"one")));
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let mut stream = Box::pin(VideoStream::new(rx, 33, shutdown_rx).generate_stream());

        let first = stream.next().await.unwrap().unwrap();
        assert!(first.ends_with(b"one\r\n"));

        tx.send_replace(Some(Bytes::from_static(b"two")));
        let second = stream.next().await.unwrap().unwrap();
        assert!(second.ends_with(b"two\r\n"));

        tx.send_replace(None);
        drop(tx);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_ends_on_shutdown_while_cleared() {
        let (_overlay_tx, rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let mut stream = Box::pin(VideoStream::new(rx, 33, shutdown_rx).generate_stream());

        let next = tokio::spawn(async move { stream.next().await.is_none() });
        sleep(Duration::from_millis(200)).await;
        assert!(!next.is_finished());

        shutdown_tx.send(()).unwrap();
        assert!(next.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_ends_on_shutdown_while_streaming() {
        let (_overlay_tx, rx) = watch::channel(Some(Bytes::from_static(b"jpg")));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let mut stream = Box::pin(VideoStream::new(rx, 33, shutdown_rx).generate_stream());

        assert!(stream.next().await.is_some());
        shutdown_tx.send(()).unwrap();
        assert!(stream.next().await.is_none());
    }
}
