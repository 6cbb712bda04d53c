//! Process-wide signal state.
//!
//! POSIX signal handlers can only safely touch atomics, so the two flags the
//! rest of the crate needs to observe from a handler context live here in
//! isolation from everything else.

use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPT: AtomicBool = AtomicBool::new(false);
static PIPE_INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Set by the Ctrl-C handler. Read by device threads and the coordinator.
pub fn interrupt_requested() -> bool {
    INTERRUPT.load(Ordering::SeqCst)
}

/// Returns `true` if this is the first interrupt request (caller should begin
/// a graceful shutdown), `false` if an interrupt had already been requested
/// (caller should escalate to immediate termination).
pub fn request_interrupt() -> bool {
    !INTERRUPT.swap(true, Ordering::SeqCst)
}

/// Set whenever a pipe sink worker observes a broken consumer. Pipe workers
/// clear it for themselves before re-entering `AwaitingConsumer`.
pub fn pipe_interrupted() -> bool {
    PIPE_INTERRUPTED.load(Ordering::SeqCst)
}

pub fn set_pipe_interrupted(v: bool) {
    PIPE_INTERRUPTED.store(v, Ordering::SeqCst);
}

/// Install the Ctrl-C handler. First signal requests a graceful shutdown via
/// `interrupt_requested`; a second signal exits the process immediately.
pub fn install_handler() {
    ctrlc::set_handler(|| {
        if !request_interrupt() {
            std::process::exit(130);
        }
    })
    .expect("failed to install signal handler");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_interrupt_is_edge_triggered() {
        // can't reset the real statics across tests reliably (global), so
        // just check the swap semantics directly.
        let flag = AtomicBool::new(false);
        let first = !flag.swap(true, Ordering::SeqCst);
        let second = !flag.swap(true, Ordering::SeqCst);
        assert!(first);
        assert!(!second);
    }
}
