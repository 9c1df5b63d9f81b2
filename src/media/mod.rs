//! Media collaborators for the grid.
//!
//! The layout core never touches pixels. Intrinsic sizes and decoded images
//! come from a [`MediaProvider`]; this module defines that seam plus the
//! file-system implementation used by the binary:
//! - `probe` - parallel intrinsic-size probing with fallback tiles
//! - `decode_queue` - worker pool producing decoded images off the render path
//! - `cache` - byte-bounded LRU of post-processed images
//! - `fs_provider` - image files on disk, decoded with the `image` crate

pub mod cache;
pub mod decode_queue;
pub mod fs_provider;
pub mod probe;

use flume::{Receiver, Sender, TryRecvError};

use crate::error::MediaError;
use crate::models::MediaId;

pub use cache::ImageCache;
pub use decode_queue::DecodeQueue;
pub use fs_provider::FsMediaProvider;
pub use probe::ProbePool;

/// Source of intrinsic sizes and decoded images.
///
/// `probe_size` may be called from several probe workers at once.
pub trait MediaProvider: Send + Sync {
    /// Decoded image handed to the renderer. Cloning should be cheap.
    type Image: Clone + Send + 'static;

    /// Intrinsic `(width, height)` of an item.
    fn probe_size(&self, id: &MediaId) -> Result<(f64, f64), MediaError>;

    /// Starts decoding an item, bounded to roughly `max_width x max_height`.
    fn decode(&self, id: &MediaId, max_width: f64, max_height: f64) -> DecodeHandle<Self::Image>;

    /// Fits a decoded image to the tile it will be drawn into.
    fn post_process(&self, image: Self::Image, max_height: f64, max_width: f64) -> Self::Image;

    /// Previously stored image for an item, if still cached.
    fn cached(&self, id: &MediaId) -> Option<Self::Image>;

    /// Keeps a post-processed image for later frames.
    fn store(&self, id: &MediaId, image: Self::Image);
}

/// Progress of one decode request.
#[derive(Debug)]
pub enum DecodeStatus<I> {
    Pending,
    Ready(I),
    Failed(MediaError),
}

/// Consumer side of a decode request.
///
/// Dropping the handle cancels the request: workers skip requests whose
/// handle is gone.
#[derive(Debug)]
pub struct DecodeHandle<I> {
    id: MediaId,
    rx: Receiver<Result<I, MediaError>>,
}

/// Producer side of a decode request, owned by whoever does the decoding.
#[derive(Debug)]
pub struct DecodeReply<I> {
    tx: Sender<Result<I, MediaError>>,
}

impl<I> DecodeHandle<I> {
    /// Creates a linked reply/handle pair.
    pub fn channel(id: MediaId) -> (DecodeReply<I>, Self) {
        let (tx, rx) = flume::bounded(1);
        (DecodeReply { tx }, Self { id, rx })
    }

    /// A handle that is already complete.
    pub fn ready(id: MediaId, image: I) -> Self {
        let (reply, handle) = Self::channel(id);
        reply.send(Ok(image));
        handle
    }

    /// A handle that already failed.
    pub fn failed(id: MediaId, error: MediaError) -> Self {
        let (reply, handle) = Self::channel(id);
        reply.send(Err(error));
        handle
    }

    pub fn id(&self) -> &MediaId {
        &self.id
    }

    /// Non-blocking poll.
    ///
    /// A producer that went away without answering reports
    /// [`MediaError::Cancelled`]; the request may be submitted again.
    pub fn try_take(&self) -> DecodeStatus<I> {
        match self.rx.try_recv() {
            Ok(Ok(image)) => DecodeStatus::Ready(image),
            Ok(Err(e)) => DecodeStatus::Failed(e),
            Err(TryRecvError::Empty) => DecodeStatus::Pending,
            Err(TryRecvError::Disconnected) => DecodeStatus::Failed(MediaError::Cancelled),
        }
    }

    /// Blocks until the request completes.
    pub fn wait(self) -> Result<I, MediaError> {
        self.rx.recv().map_err(|_| MediaError::Cancelled)?
    }
}

impl<I> DecodeReply<I> {
    /// True once the consumer dropped its handle.
    pub fn is_cancelled(&self) -> bool {
        self.tx.is_disconnected()
    }

    /// Delivers the result. Returns false if nobody is listening any more.
    pub fn send(self, result: Result<I, MediaError>) -> bool {
        self.tx.try_send(result).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_pending_then_ready() {
        let (reply, handle) = DecodeHandle::<u32>::channel("a.png".into());
        assert!(matches!(handle.try_take(), DecodeStatus::Pending));
        assert!(reply.send(Ok(7)));
        assert!(matches!(handle.try_take(), DecodeStatus::Ready(7)));
    }

    #[test]
    fn test_dropped_reply_reports_cancelled() {
        let (reply, handle) = DecodeHandle::<u32>::channel("a.png".into());
        drop(reply);
        assert!(matches!(
            handle.try_take(),
            DecodeStatus::Failed(MediaError::Cancelled)
        ));
    }

    #[test]
    fn test_dropped_handle_cancels_reply() {
        let (reply, handle) = DecodeHandle::<u32>::channel("a.png".into());
        assert!(!reply.is_cancelled());
        drop(handle);
        assert!(reply.is_cancelled());
        assert!(!reply.send(Ok(1)));
    }

    #[test]
    fn test_prebuilt_handles() {
        let handle = DecodeHandle::ready("a.png".into(), 3u8);
        assert_eq!(handle.id().as_str(), "a.png");
        assert_eq!(handle.wait(), Ok(3));

        let handle: DecodeHandle<u8> =
            DecodeHandle::failed("b.png".into(), MediaError::decode_failed("b.png", "bad"));
        assert!(matches!(handle.try_take(), DecodeStatus::Failed(_)));
    }
}
