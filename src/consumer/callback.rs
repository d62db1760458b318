use crate::consumer::{Disposition, FrameConsumer};
use crate::error::ConsumerError;
use crate::protocol::frame::SensorFrame;

/// Consumer strategy that delegates every frame to a caller-supplied
/// closure. No built-in side effects; the closure decides when to stop by
/// returning [`Disposition::Stop`] or an error.
pub struct CallbackConsumer<F> {
    callback: F,
}

impl<F> CallbackConsumer<F>
where
    F: FnMut(SensorFrame) -> Result<Disposition, ConsumerError> + Send,
{
    pub fn new(callback: F) -> Self {
        CallbackConsumer { callback }
    }
}

impl<F> FrameConsumer for CallbackConsumer<F>
where
    F: FnMut(SensorFrame) -> Result<Disposition, ConsumerError> + Send,
{
    async fn on_frame(&mut self, frame: SensorFrame) -> Result<Disposition, ConsumerError> {
        (self.callback)(frame)
    }

    async fn finish(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn callback_sees_every_frame_and_controls_termination() {
        let mut seen = 0u32;
        {
            let mut consumer = CallbackConsumer::new(|frame: SensorFrame| {
                seen += 1;
                if frame.get_f64("pressure") == Some(0.0) {
                    Ok(Disposition::Stop)
                } else {
                    Ok(Disposition::Continue)
                }
            });

            let mut frame = SensorFrame::new(1.0);
            frame.insert("pressure", 101_325.0);
            assert_eq!(consumer.on_frame(frame).await.unwrap(), Disposition::Continue);

            let mut last = SensorFrame::new(2.0);
            last.insert("pressure", 0.0);
            assert_eq!(consumer.on_frame(last).await.unwrap(), Disposition::Stop);

            consumer.finish().await;
        }
        assert_eq!(seen, 2);
    }
}
