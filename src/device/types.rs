/// Lifecycle of one [`crate::device::session::ConnectionSession`].
///
/// The session only ever moves forward through these states; there is no
/// reconnect. A dropped link ends in `Closed` and the caller starts a fresh
/// session if it wants to resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    /// Link established and the configuration command accepted by the device.
    Configured,
    /// Subscribed and receiving notifications.
    Streaming,
    Closed,
}

/// One event out of the session's notification reader task.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Raw payload of a single notification from the read characteristic.
    /// May be a fragment of a larger frame.
    Notification(Vec<u8>),
    /// The notification stream ended: the link dropped or the device went
    /// away. Fatal for this session.
    Dropped,
}
