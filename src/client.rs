use log::{info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::address;
use crate::config::types::{BleConfig, DatabotConfig};
use crate::consumer::{Disposition, FrameConsumer};
use crate::device::session::ConnectionSession;
use crate::device::types::SessionEvent;
use crate::error::RunError;
use crate::protocol::decode::FrameDecoder;
use crate::protocol::encode::encode_config;

/// Why a run ended. Expected termination is a value, not an error; callers
/// inspect this to tell a deliberate stop from a dropped link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The active consumer returned [`Disposition::Stop`].
    ConsumerStop,
    /// The link dropped or the notification stream ended.
    LinkClosed,
    /// External cancellation was requested through the cancel token.
    Cancelled,
}

/// The device client: one configuration, one consumer strategy, one session.
///
/// [`Databot::run`] drives the whole pipeline: resolve the address, open the
/// session, decode every notification, hand each frame to the consumer, and
/// tear everything down on the way out. Whatever the exit path, the link is
/// unsubscribed and the consumer's `finish` has run by the time `run`
/// returns.
pub struct Databot<C> {
    config: DatabotConfig,
    ble: BleConfig,
    consumer: C,
    cancel: CancellationToken,
}

impl<C: FrameConsumer> Databot<C> {
    pub fn new(config: DatabotConfig, consumer: C) -> Self {
        Databot {
            config,
            ble: BleConfig::default(),
            consumer,
            cancel: CancellationToken::new(),
        }
    }

    /// Use a non-default service/characteristic triple.
    pub fn with_ble(mut self, ble: BleConfig) -> Self {
        self.ble = ble;
        self
    }

    /// Token for requesting a cooperative stop from outside the run loop.
    /// Observed between frame dispatches; in-flight work is not preempted.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drive the pipeline until the consumer stops it, the link drops,
    /// cancellation is requested, or a fault surfaces.
    pub async fn run(mut self) -> Result<StopReason, RunError> {
        let result = self.run_session().await;

        // Cleanup that must happen on every exit path, including failures
        // before a session existed: flush/close the consumer so file handles
        // are released and queue waiters wake up.
        self.consumer.finish().await;

        match &result {
            Ok(reason) => info!("Run ended: {:?}", reason),
            Err(err) => warn!("Run failed: {}", err),
        }
        result
    }

    async fn run_session(&mut self) -> Result<StopReason, RunError> {
        // Config problems surface before any link activity.
        let command = encode_config(&self.config)?;

        let address = match &self.config.address {
            Some(address) => address.clone(),
            None => address::resolve(&self.ble, false).await?,
        };

        let (session, mut events) = ConnectionSession::open(&address, &self.ble, &command).await?;
        info!("Streaming (expected frame length {} bytes)", crate::protocol::layout::frame_len(&self.config));

        let mut decoder = FrameDecoder::new(&self.config);
        let result = dispatch_events(&mut events, &mut decoder, &mut self.consumer, &self.cancel).await;

        session.close().await;
        result
    }
}

/// The dispatch loop proper: session events in, consumer calls out.
///
/// Kept free of any real link so the decode/dispatch path can be exercised
/// end to end with synthetic fragments.
async fn dispatch_events<C: FrameConsumer>(
    events: &mut mpsc::Receiver<SessionEvent>,
    decoder: &mut FrameDecoder,
    consumer: &mut C,
    cancel: &CancellationToken,
) -> Result<StopReason, RunError> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Cancellation requested");
                return Ok(StopReason::Cancelled);
            },
            event = events.recv() => match event {
                None | Some(SessionEvent::Dropped) => {
                    return Ok(StopReason::LinkClosed);
                },
                Some(SessionEvent::Notification(bytes)) => {
                    match decoder.push(&bytes) {
                        // Corrupt reassembly: the decoder has already reset;
                        // resynchronize on the next fragment.
                        Err(err) => warn!("Recovering from protocol error: {}", err),
                        Ok(None) => {},
                        Ok(Some(frame)) => match consumer.on_frame(frame).await {
                            Ok(Disposition::Continue) => {},
                            Ok(Disposition::Stop) => return Ok(StopReason::ConsumerStop),
                            Err(source) => return Err(RunError::Consumer { source }),
                        },
                    }
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::consumer::CallbackConsumer;
    use crate::error::ConsumerError;
    use crate::protocol::frame::SensorFrame;

    fn pressure_config() -> DatabotConfig {
        let mut config = DatabotConfig::default();
        config.pressure = true;
        config.refresh = 100;
        config
    }

    fn pressure_frame_bytes(value: f32) -> Vec<u8> {
        value.to_le_bytes().to_vec()
    }

    fn collecting_consumer() -> (Arc<Mutex<Vec<SensorFrame>>>, CallbackConsumer<impl FnMut(SensorFrame) -> Result<Disposition, ConsumerError> + Send>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let consumer = CallbackConsumer::new(move |frame: SensorFrame| {
            sink.lock().unwrap().push(frame);
            Ok(Disposition::Continue)
        });
        (seen, consumer)
    }

    #[tokio::test]
    async fn pressure_frame_reaches_the_consumer_exactly_once() {
        let config = pressure_config();
        let (tx, mut rx) = mpsc::channel(8);
        let mut decoder = FrameDecoder::new(&config);
        let (seen, mut consumer) = collecting_consumer();
        let cancel = CancellationToken::new();

        tx.send(SessionEvent::Notification(pressure_frame_bytes(101_325.0))).await.unwrap();
        tx.send(SessionEvent::Dropped).await.unwrap();

        let reason = dispatch_events(&mut rx, &mut decoder, &mut consumer, &cancel).await.unwrap();
        assert_eq!(reason, StopReason::LinkClosed);

        let frames = seen.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].get_f64("pressure"), Some(101_325.0));
        assert!(frames[0].epoch > 0.0);
    }

    #[tokio::test]
    async fn fragmented_frame_is_reassembled_before_dispatch() {
        let mut config = DatabotConfig::default();
        config.gyro = true;
        config.magneto = true;

        let (tx, mut rx) = mpsc::channel(8);
        let mut decoder = FrameDecoder::new(&config);
        let (seen, mut consumer) = collecting_consumer();
        let cancel = CancellationToken::new();

        let bytes: Vec<u8> = [1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        assert_eq!(bytes.len(), 24);

        // Delivered as a 20-byte fragment plus the remainder.
        tx.send(SessionEvent::Notification(bytes[..20].to_vec())).await.unwrap();
        tx.send(SessionEvent::Notification(bytes[20..].to_vec())).await.unwrap();
        drop(tx);

        let reason = dispatch_events(&mut rx, &mut decoder, &mut consumer, &cancel).await.unwrap();
        assert_eq!(reason, StopReason::LinkClosed);

        let frames = seen.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].get_f64("mag_z"), Some(6.0));
    }

    #[tokio::test]
    async fn consumer_stop_ends_the_loop() {
        let config = pressure_config();
        let (tx, mut rx) = mpsc::channel(8);
        let mut decoder = FrameDecoder::new(&config);
        let cancel = CancellationToken::new();

        let mut remaining = 2u32;
        let mut consumer = CallbackConsumer::new(move |_frame| {
            remaining -= 1;
            if remaining == 0 {
                Ok(Disposition::Stop)
            } else {
                Ok(Disposition::Continue)
            }
        });

        for _ in 0..5 {
            tx.send(SessionEvent::Notification(pressure_frame_bytes(1.0))).await.unwrap();
        }

        let reason = dispatch_events(&mut rx, &mut decoder, &mut consumer, &cancel).await.unwrap();
        assert_eq!(reason, StopReason::ConsumerStop);
    }

    #[tokio::test]
    async fn consumer_error_surfaces_after_the_frame() {
        let config = pressure_config();
        let (tx, mut rx) = mpsc::channel(8);
        let mut decoder = FrameDecoder::new(&config);
        let cancel = CancellationToken::new();

        let mut consumer = CallbackConsumer::new(|_frame| {
            Err(ConsumerError::Callback("boom".to_string()))
        });

        tx.send(SessionEvent::Notification(pressure_frame_bytes(1.0))).await.unwrap();

        let err = dispatch_events(&mut rx, &mut decoder, &mut consumer, &cancel).await.unwrap_err();
        assert!(matches!(err, RunError::Consumer { .. }));
    }

    #[tokio::test]
    async fn protocol_errors_recover_without_losing_later_frames() {
        let config = pressure_config();
        let (tx, mut rx) = mpsc::channel(8);
        let mut decoder = FrameDecoder::new(&config);
        let (seen, mut consumer) = collecting_consumer();
        let cancel = CancellationToken::new();

        // 6 bytes overflow the 4-byte pressure frame, then a clean frame.
        tx.send(SessionEvent::Notification(vec![0, 1, 2, 3, 4, 5])).await.unwrap();
        tx.send(SessionEvent::Notification(pressure_frame_bytes(7.5))).await.unwrap();
        drop(tx);

        let reason = dispatch_events(&mut rx, &mut decoder, &mut consumer, &cancel).await.unwrap();
        assert_eq!(reason, StopReason::LinkClosed);

        let frames = seen.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].get_f64("pressure"), Some(7.5));
    }

    #[tokio::test]
    async fn cancellation_is_observed_between_dispatches() {
        let config = pressure_config();
        let (_tx, mut rx) = mpsc::channel::<SessionEvent>(8);
        let mut decoder = FrameDecoder::new(&config);
        let (_seen, mut consumer) = collecting_consumer();
        let cancel = CancellationToken::new();

        cancel.cancel();
        let reason = dispatch_events(&mut rx, &mut decoder, &mut consumer, &cancel).await.unwrap();
        assert_eq!(reason, StopReason::Cancelled);
    }
}
