//! Pipe Sink Worker (spec §4.G, Component G): one thread per output pipe,
//! each polling for a consumer, streaming pcap records, and recovering from
//! broken consumers without taking the whole process down.
//!
//! Pipe lifecycles differ per OS (spec §9 "Pipe-sink lifecycles differ per
//! OS"): grounded on `pipe.hpp`/`pipe.cpp` (`create` mkfifo's once, `open`
//! reopens write-only non-blocking each attempt).

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::capture_record::{self, DecodedPacket, RecordContext};
use crate::error::PipeError;
use crate::queue::BoundedQueue;
use crate::signals;

const POLL_BACKOFF: Duration = Duration::from_millis(10);
const OPEN_RETRY_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeSinkState {
    Created,
    AwaitingConsumer,
    Streaming,
    Broken,
}

/// Satisfied by every OS-specific named-pipe implementation (spec §9).
pub trait PipeEndpoint {
    fn create(&mut self, path: &Path) -> Result<(), PipeError>;
    fn open(&mut self, path: &Path) -> bool;
    fn write(&mut self, data: &[u8]) -> bool;
    fn close(&mut self);
    fn is_open(&self) -> bool;
}

/// POSIX FIFO: `mkfifo` once, then non-blocking write-only opens per
/// consumer connection.
#[cfg(unix)]
#[derive(Default)]
pub struct UnixFifo {
    file: Option<std::fs::File>,
}

#[cfg(unix)]
impl PipeEndpoint for UnixFifo {
    fn create(&mut self, path: &Path) -> Result<(), PipeError> {
        let _ = std::fs::remove_file(path);
        nix::unistd::mkfifo(path, nix::sys::stat::Mode::from_bits_truncate(0o666)).map_err(|e| PipeError::Create {
            path: path.display().to_string(),
            source: std::io::Error::from_raw_os_error(e as i32),
        })?;
        Ok(())
    }

    fn open(&mut self, path: &Path) -> bool {
        use std::os::unix::fs::OpenOptionsExt;
        match std::fs::OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
        {
            Ok(f) => {
                self.file = Some(f);
                true
            }
            Err(_) => false,
        }
    }

    fn write(&mut self, data: &[u8]) -> bool {
        match &mut self.file {
            Some(f) => f.write_all(data).is_ok(),
            None => false,
        }
    }

    fn close(&mut self) {
        self.file = None;
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }
}

/// One pipe-write item: a built record plus whether it originated from a
/// Transport-Key extraction (spec §4.F item 4 "carrying the is-key flag").
pub struct PipeItem {
    pub header: [u8; 16],
    pub body: Vec<u8>,
}

pub struct PipeSinkWorker<E: PipeEndpoint> {
    path: PathBuf,
    endpoint: E,
    state: PipeSinkState,
    pub queue: Arc<BoundedQueue<PipeItem>>,
}

impl<E: PipeEndpoint> PipeSinkWorker<E> {
    /// `queue` is shared with whoever feeds this worker (the Output
    /// Coordinator), since `run` takes ownership of `self` on its own thread.
    pub fn new(path: PathBuf, endpoint: E, queue: Arc<BoundedQueue<PipeItem>>) -> Self {
        Self {
            path,
            endpoint,
            state: PipeSinkState::Created,
            queue,
        }
    }

    pub fn state(&self) -> PipeSinkState {
        self.state
    }

    pub fn push(&self, packet: &DecodedPacket, ctx: &RecordContext, system_anchor_us: i64) {
        if let Ok((header, body)) = capture_record::build_record(packet, ctx, system_anchor_us) {
            self.queue.push(PipeItem { header, body });
        }
    }

    /// Runs until `still_running` returns false: create the FIFO, poll for a
    /// consumer once a second, write the global header, then stream queued
    /// records until the consumer breaks or shutdown is requested.
    pub fn run(&mut self, still_running: impl Fn() -> bool) {
        while still_running() {
            self.state = PipeSinkState::Created;
            if self.endpoint.create(&self.path).is_err() {
                return;
            }

            self.state = PipeSinkState::AwaitingConsumer;
            while still_running() && !self.endpoint.open(&self.path) {
                std::thread::sleep(OPEN_RETRY_INTERVAL);
            }
            if !self.endpoint.is_open() {
                return;
            }

            self.state = PipeSinkState::Streaming;
            self.endpoint.write(&capture_record::global_header());

            while still_running() && !signals::pipe_interrupted() {
                match self.queue.pop() {
                    Some(item) => {
                        if !self.endpoint.write(&item.header) || !self.endpoint.write(&item.body) {
                            break;
                        }
                    }
                    None => std::thread::sleep(POLL_BACKOFF),
                }
            }

            if signals::pipe_interrupted() {
                signals::set_pipe_interrupted(false);
                self.state = PipeSinkState::Broken;
            }
            self.endpoint.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockEndpoint {
        created: bool,
        opened: bool,
        written: Vec<u8>,
    }

    impl PipeEndpoint for MockEndpoint {
        fn create(&mut self, _path: &Path) -> Result<(), PipeError> {
            self.created = true;
            Ok(())
        }
        fn open(&mut self, _path: &Path) -> bool {
            self.opened = true;
            true
        }
        fn write(&mut self, data: &[u8]) -> bool {
            self.written.extend_from_slice(data);
            true
        }
        fn close(&mut self) {
            self.opened = false;
        }
        fn is_open(&self) -> bool {
            self.opened
        }
    }

    #[test]
    fn streams_one_queued_record_then_stops() {
        let queue = Arc::new(BoundedQueue::new(crate::queue::DEFAULT_CAPACITY));
        let mut worker = PipeSinkWorker::new(PathBuf::from("/tmp/irrelevant"), MockEndpoint::default(), queue);
        let packet = DecodedPacket {
            device_timestamp_us: 0,
            rssi: 1,
            payload: vec![1, 2, 3],
            fcs: 0x7F,
        };
        let ctx = RecordContext {
            port_label: "/dev/ttyACM0",
            channel: 20,
            radio_mode: 20,
        };
        worker.push(&packet, &ctx, 0);

        let calls = std::cell::Cell::new(0u32);
        worker.run(|| {
            let n = calls.get();
            calls.set(n + 1);
            n < 5
        });

        assert_eq!(worker.state(), PipeSinkState::Streaming);
        assert!(!worker.endpoint.written.is_empty());
    }
}
