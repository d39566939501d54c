/// The engine's outbound view of the transport (spec §6.3). The engine is the sole driver of
/// this trait; implementations own the actual socket and must not block the calling thread
/// indefinitely (a write that cannot complete immediately should be queued by the
/// implementation, the way `mqtt-sync-client`'s `Sender` blanket impl writes straight through a
/// `std::io::Write` and lets the OS buffer handle backpressure).
pub trait Transport {
    /// Begin connecting. Completion is reported asynchronously via `TransportEvents::connected`
    /// or `TransportEvents::connect_failed`.
    fn connect(&mut self);

    /// Write bytes produced by the codec. Order with respect to other `write` calls is
    /// preserved by the engine's single-threaded stimulus loop (spec §5).
    fn write(&mut self, bytes: &[u8]);

    /// Close the connection gracefully, without discarding unflushed writes. Not currently
    /// called by `Engine` — a user-initiated `Disconnect` aborts per spec §4.3/§4.4 — but kept as
    /// part of the transport's outbound surface (spec §6.3) for implementations that want it.
    fn close(&mut self);

    /// Abort the connection immediately, without waiting for in-flight writes to flush (used on
    /// protocol errors and ping timeout).
    fn abort(&mut self);
}

/// The engine's inbound view of the transport (spec §6.3). A `Transport` implementation calls
/// these on whatever thread it observes socket activity; delivering them to the engine (e.g. by
/// posting onto the single stimulus queue described in spec §5) is the collaborator's job, not
/// this trait's.
pub trait TransportEvents {
    fn connected(&mut self);
    fn connect_failed(&mut self);
    fn received(&mut self, bytes: &[u8]);
    fn closed(&mut self);
}

/// Opaque handle for a scheduled timer wakeup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// The engine's view of a timer scheduler (spec §6.4): single-shot wakeups only, no repeating
/// timers, no wall-clock dependency baked into the trait.
pub trait TimerScheduler {
    fn schedule_once(&mut self, ms: u64) -> TimerHandle;
    fn cancel(&mut self, handle: TimerHandle);
}

/// The sink application events are written to (part of spec §6.2's port).
pub trait ClientSink {
    fn emit(&mut self, event: crate::event::Event);
}
