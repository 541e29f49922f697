use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::hw::{PortBuffer, PortCallback};

/// Where a handle's single outstanding request stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Submitted,
    Completed,
    TimedOut,
    Failed,
}

/// Result of [`CompletionGate::wait`].
#[derive(Debug)]
pub enum WaitOutcome {
    Completed(PortBuffer),
    TimedOut,
}

#[derive(Debug)]
struct Slot {
    state: GateState,
    completed: bool,
    pending: Option<PortBuffer>,
}

/// Turns an output-port callback into a bounded blocking wait.
///
/// The callback side only parks the delivered buffer, raises the completion
/// flag and signals; the payload is copied by the waiter after it wakes. At
/// most one request is outstanding per gate.
#[derive(Debug)]
pub struct CompletionGate {
    slot: Mutex<Slot>,
    signal: Condvar,
}

impl CompletionGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(Slot {
                state: GateState::Idle,
                completed: false,
                pending: None,
            }),
            signal: Condvar::new(),
        })
    }

    pub fn state(&self) -> GateState {
        self.slot.lock().state
    }

    /// Back to `Idle`, dropping anything a late completion left behind.
    pub fn reset(&self) {
        let stale = {
            let mut slot = self.slot.lock();
            slot.state = GateState::Idle;
            slot.completed = false;
            slot.pending.take()
        };
        if stale.is_some() {
            log::debug!("Discarding completion left over from an earlier request");
        }
    }

    pub fn mark_submitted(&self) {
        let mut slot = self.slot.lock();
        slot.state = GateState::Submitted;
        slot.completed = false;
    }

    pub fn mark_failed(&self) {
        self.slot.lock().state = GateState::Failed;
    }

    /// Callback side. Empty buffers are released without signalling.
    pub fn complete(&self, buffer: PortBuffer) {
        if buffer.length() == 0 {
            return;
        }
        let previous = {
            let mut slot = self.slot.lock();
            slot.completed = true;
            slot.pending.replace(buffer)
        };
        self.signal.notify_one();
        drop(previous);
    }

    /// Blocks until the callback fires or `timeout` elapses.
    ///
    /// A timeout does not cancel the hardware operation; its completion may
    /// still arrive later and is discarded by the next [`reset`](Self::reset).
    pub fn wait(&self, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        while !slot.completed {
            if self.signal.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }

        match slot.pending.take() {
            Some(buffer) if slot.completed => {
                slot.state = GateState::Completed;
                slot.completed = false;
                WaitOutcome::Completed(buffer)
            }
            other => {
                slot.pending = other;
                slot.state = GateState::TimedOut;
                WaitOutcome::TimedOut
            }
        }
    }

    /// Hook for the output port.
    pub fn output_callback(self: &Arc<Self>) -> PortCallback {
        let gate = Arc::clone(self);
        Arc::new(move |buffer| gate.complete(buffer))
    }

    /// Hook for the input port: reclaims the buffer, never signals.
    pub fn input_callback() -> PortCallback {
        Arc::new(|buffer: PortBuffer| buffer.release())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::BufferPool;
    use std::thread;

    #[test]
    fn test_wait_times_out_without_signal() {
        let gate = CompletionGate::new();
        gate.mark_submitted();
        let started = Instant::now();
        assert!(matches!(
            gate.wait(Duration::from_millis(20)),
            WaitOutcome::TimedOut
        ));
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert_eq!(gate.state(), GateState::TimedOut);
    }

    #[test]
    fn test_completion_from_other_thread() {
        let pool = BufferPool::new("output", 1, 8).unwrap();
        let gate = CompletionGate::new();
        gate.mark_submitted();

        let callback = gate.output_callback();
        let mut buffer = pool.acquire().unwrap();
        buffer.fill(&[7, 7, 7]).unwrap();
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            callback(buffer);
        });

        match gate.wait(Duration::from_secs(1)) {
            WaitOutcome::Completed(buffer) => assert_eq!(buffer.payload(), &[7, 7, 7]),
            WaitOutcome::TimedOut => panic!("expected completion"),
        }
        worker.join().unwrap();
        assert_eq!(gate.state(), GateState::Completed);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_empty_buffer_does_not_signal() {
        let pool = BufferPool::new("output", 1, 8).unwrap();
        let gate = CompletionGate::new();
        gate.mark_submitted();
        gate.complete(pool.acquire().unwrap());
        assert!(matches!(
            gate.wait(Duration::from_millis(5)),
            WaitOutcome::TimedOut
        ));
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_reset_drops_late_completion() {
        let pool = BufferPool::new("output", 1, 8).unwrap();
        let gate = CompletionGate::new();
        gate.mark_submitted();
        assert!(matches!(
            gate.wait(Duration::from_millis(1)),
            WaitOutcome::TimedOut
        ));

        let mut late = pool.acquire().unwrap();
        late.fill(&[1]).unwrap();
        gate.complete(late);
        assert_eq!(pool.available(), 0);

        gate.reset();
        assert_eq!(gate.state(), GateState::Idle);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_input_callback_releases() {
        let pool = BufferPool::new("input", 1, 8).unwrap();
        let callback = CompletionGate::input_callback();
        callback(pool.acquire().unwrap());
        assert_eq!(pool.available(), 1);
    }
}
