use log::debug;
use tokio::sync::mpsc;

use crate::consumer::{Disposition, FrameConsumer};
use crate::error::ConsumerError;
use crate::protocol::frame::SensorFrame;

/// Build a bounded queue pair: the [`QueueConsumer`] goes into the run loop,
/// the [`FrameReceiver`] goes to an independent worker thread or task.
///
/// `capacity` is the single backpressure control on this path: when the queue
/// is full, `on_frame` waits for the worker to drain a slot instead of
/// dropping the frame; when it is empty, the worker's pop blocks.
pub fn bounded(capacity: usize) -> (QueueConsumer, FrameReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (QueueConsumer { tx: Some(tx) }, FrameReceiver { rx })
}

/// Consumer strategy that pushes every frame onto a bounded queue shared
/// with an independent worker. Termination for this strategy is driven
/// externally (cancellation or the worker dropping its receiver), never by
/// queue state.
pub struct QueueConsumer {
    tx: Option<mpsc::Sender<SensorFrame>>,
}

impl FrameConsumer for QueueConsumer {
    async fn on_frame(&mut self, frame: SensorFrame) -> Result<Disposition, ConsumerError> {
        let tx = self.tx.as_ref().ok_or(ConsumerError::QueueClosed)?;
        tx.send(frame).await.map_err(|_| ConsumerError::QueueClosed)?;
        Ok(Disposition::Continue)
    }

    async fn finish(&mut self) {
        // Dropping the sender closes the channel, so a worker blocked on an
        // empty queue wakes up with `None` instead of hanging forever.
        if self.tx.take().is_some() {
            debug!("Frame queue closed");
        }
    }
}

/// Receiving end of the frame queue, for the independent worker.
pub struct FrameReceiver {
    rx: mpsc::Receiver<SensorFrame>,
}

impl FrameReceiver {
    /// Wait for the next frame. `None` once the session has ended and the
    /// queue has drained.
    pub async fn recv(&mut self) -> Option<SensorFrame> {
        self.rx.recv().await
    }

    /// Blocking pop for plain worker threads outside the async runtime.
    pub fn blocking_recv(&mut self) -> Option<SensorFrame> {
        self.rx.blocking_recv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    fn numbered_frame(seq: u32) -> SensorFrame {
        let mut frame = SensorFrame::new(seq as f64);
        frame.insert("seq", seq);
        frame
    }

    #[tokio::test]
    async fn full_queue_blocks_the_producer_until_drained() {
        let (mut consumer, mut receiver) = bounded(2);

        consumer.on_frame(numbered_frame(0)).await.unwrap();
        consumer.on_frame(numbered_frame(1)).await.unwrap();

        // Queue is at capacity: the third push must wait.
        let blocked = timeout(Duration::from_millis(50), consumer.on_frame(numbered_frame(2))).await;
        assert!(blocked.is_err(), "push into a full queue should block");

        // Draining one slot releases the producer.
        let first = receiver.recv().await.unwrap();
        assert_eq!(first.get_f64("seq"), Some(0.0));
        consumer.on_frame(numbered_frame(2)).await.unwrap();

        consumer.finish().await;

        // Nothing was dropped and order is preserved.
        let mut seqs = vec![];
        while let Some(frame) = receiver.recv().await {
            seqs.push(frame.get_f64("seq").unwrap() as u32);
        }
        assert_eq!(seqs, vec![1, 2]);
    }

    #[tokio::test]
    async fn finish_wakes_a_blocked_receiver() {
        let (mut consumer, mut receiver) = bounded(4);

        let drain = tokio::spawn(async move {
            let mut count = 0;
            while receiver.recv().await.is_some() {
                count += 1;
            }
            count
        });

        consumer.on_frame(numbered_frame(0)).await.unwrap();
        consumer.on_frame(numbered_frame(1)).await.unwrap();
        consumer.finish().await;

        let count = timeout(Duration::from_secs(1), drain)
            .await
            .expect("receiver should wake when the queue closes")
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn push_after_worker_goes_away_reports_queue_closed() {
        let (mut consumer, receiver) = bounded(1);
        drop(receiver);

        let err = consumer.on_frame(numbered_frame(0)).await.unwrap_err();
        assert!(matches!(err, ConsumerError::QueueClosed));
    }

    #[tokio::test]
    async fn worker_thread_drains_with_blocking_recv() {
        let (mut consumer, mut receiver) = bounded(3);

        let worker = std::thread::spawn(move || {
            let mut seqs = vec![];
            while let Some(frame) = receiver.blocking_recv() {
                seqs.push(frame.get_f64("seq").unwrap() as u32);
            }
            seqs
        });

        for seq in 0..6 {
            consumer.on_frame(numbered_frame(seq)).await.unwrap();
        }
        consumer.finish().await;

        let seqs = worker.join().unwrap();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4, 5]);
    }
}
