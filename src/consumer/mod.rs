use crate::error::ConsumerError;
use crate::protocol::frame::SensorFrame;

pub mod callback;
pub mod file;
pub mod queue;

pub use callback::CallbackConsumer;
pub use file::FileConsumer;
pub use queue::{FrameReceiver, QueueConsumer};

/// What the run loop should do after a frame was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Continue,
    /// End the session. This is an ordinary value, not an error; the run
    /// loop reports it as a normal stop after cleanup.
    Stop,
}

/// A consumer strategy. Exactly one is active per session; every decoded
/// frame is handed to it exactly once, and the frame is owned by the
/// strategy from then on.
///
/// Errors are treated by the run loop as a deliberate stop: the session is
/// torn down, cleanup runs, and the error is surfaced to the caller.
#[allow(async_fn_in_trait)]
pub trait FrameConsumer: Send {
    async fn on_frame(&mut self, frame: SensorFrame) -> Result<Disposition, ConsumerError>;

    /// Called exactly once when the session ends, on every exit path.
    /// Strategies flush and release their resources here: the file strategy
    /// flushes and closes its handle, the queue strategy wakes any blocked
    /// receivers.
    async fn finish(&mut self);
}
