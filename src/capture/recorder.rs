//! Recording buffer and device ownership.

use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::debug;

use crate::adapters::{AudioInput, DeviceHandle};

/// A finished recording, ready for transcription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudio {
    bytes: Vec<u8>,
    mime_type: String,
}

impl EncodedAudio {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// File extension matching the MIME type
    pub fn file_extension(&self) -> &'static str {
        let subtype = self
            .mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match subtype.as_str() {
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "audio/webm" => "webm",
            "audio/ogg" => "ogg",
            "audio/mpeg" => "mp3",
            "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
            "audio/flac" => "flac",
            _ => "bin",
        }
    }

    /// Short content hash for log correlation (12 hex chars)
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        hex::encode(digest)[..12].to_string()
    }
}

/// Owns an open device and releases it exactly once.
///
/// Release happens on [`DeviceGuard::release`] or, failing that, on drop, so
/// every exit path (stop, error, teardown, panic unwinding) closes the
/// device.
pub struct DeviceGuard {
    handle: Option<Box<dyn DeviceHandle>>,
}

impl DeviceGuard {
    pub fn new(handle: Box<dyn DeviceHandle>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Let the device flush pending audio without releasing it
    pub async fn finish(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            handle.finish().await;
        }
    }

    pub fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.release();
        }
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_none()
    }
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// An in-progress recording: the device plus its chunk stream
pub struct ActiveRecording {
    device: DeviceGuard,
    chunks: mpsc::UnboundedReceiver<Vec<u8>>,
    mime_type: String,
}

impl ActiveRecording {
    pub fn new(input: AudioInput) -> Self {
        Self {
            device: DeviceGuard::new(input.handle),
            chunks: input.chunks,
            mime_type: input.mime_type,
        }
    }

    /// Stop the device, release it, and concatenate every chunk received,
    /// in arrival order.
    pub async fn finish(mut self) -> EncodedAudio {
        self.device.finish().await;
        self.device.release();

        // No more sends are accepted; buffered chunks are still delivered.
        self.chunks.close();
        let mut bytes = Vec::new();
        let mut chunk_count = 0usize;
        while let Some(chunk) = self.chunks.recv().await {
            bytes.extend_from_slice(&chunk);
            chunk_count += 1;
        }

        debug!(chunk_count, bytes = bytes.len(), "Recording finalized");
        EncodedAudio::new(bytes, std::mem::take(&mut self.mime_type))
    }

    /// Release the device and discard the audio
    pub fn abandon(mut self) {
        self.device.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandle(Arc<AtomicUsize>);

    impl DeviceHandle for CountingHandle {
        fn release(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_guard_releases_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let mut guard = DeviceGuard::new(Box::new(CountingHandle(released.clone())));

        guard.release();
        guard.release();
        assert!(guard.is_released());
        drop(guard);

        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        {
            let _guard = DeviceGuard::new(Box::new(CountingHandle(released.clone())));
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_finish_concatenates_in_order() {
        let released = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(b"RIFF".to_vec()).unwrap();
        tx.send(b"data".to_vec()).unwrap();

        let recording = ActiveRecording::new(AudioInput {
            chunks: rx,
            handle: Box::new(CountingHandle(released.clone())),
            mime_type: "audio/wav".to_string(),
        });

        // Sender is still alive: finish must not wait for it.
        let audio = recording.finish().await;
        drop(tx);

        assert_eq!(audio.bytes(), b"RIFFdata");
        assert_eq!(audio.mime_type(), "audio/wav");
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_extension_and_fingerprint() {
        let audio = EncodedAudio::new(vec![0, 1, 2], "audio/webm;codecs=opus");
        assert_eq!(audio.file_extension(), "webm");
        assert_eq!(audio.fingerprint().len(), 12);
        assert_eq!(
            audio.fingerprint(),
            EncodedAudio::new(vec![0, 1, 2], "audio/wav").fingerprint()
        );
    }
}
