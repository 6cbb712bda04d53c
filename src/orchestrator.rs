//! Multi-device orchestration (spec §4.K, Component K): builds a
//! `DeviceController` per configured device, connects and initializes the
//! ready ones, then runs the Output Coordinator and every device's stream
//! loop concurrently until shutdown.
//!
//! Grounded on `Sniffer` (`sniffer.hpp`/`.cpp`): `configureAllDevices` is
//! `connect`, `initAllDevices` spawns one init thread per ready device and
//! joins, `streamAll`/`streamAll(duration)` spawns the output-manager thread
//! plus one stream thread per ready device and joins everything on the way
//! out.

use std::sync::Arc;
use std::time::Duration;

use crate::config::RunConfig;
use crate::device::DeviceController;
use crate::output_coordinator::{DeviceMeta, OutputCoordinator};
use crate::pipe_sink::{PipeSinkWorker, UnixFifo};
use crate::queue::BoundedQueue;
use crate::signals;

/// Builds every configured `DeviceController`, connects the reachable ones,
/// and reports which indices failed to connect (spec §4.K
/// "configureAllDevices").
pub fn build_devices(config: &RunConfig) -> Vec<DeviceController> {
    config
        .devices
        .iter()
        .enumerate()
        .map(|(id, d)| DeviceController::new(id, d.port.clone(), d.channel as u16, d.radio_mode))
        .collect()
}

fn connect_all(devices: &mut [DeviceController]) -> Vec<bool> {
    devices
        .iter_mut()
        .map(|d| match d.connect() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(port = %d.port_label, error = %e, "device failed to connect");
                false
            }
        })
        .collect()
}

/// One init thread per ready device, joined before returning (spec §4.K
/// "initAllDevices"). Devices that fail `init` are marked not-ready.
fn init_all(devices: &mut [DeviceController], ready: &mut [bool]) {
    if !ready.iter().any(|&r| r) {
        return;
    }
    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for (device, is_ready) in devices.iter_mut().zip(ready.iter_mut()) {
            if !*is_ready {
                continue;
            }
            handles.push((scope.spawn(move || device.init()), is_ready));
        }
        for (handle, is_ready) in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "device failed to initialize");
                    *is_ready = false;
                }
                Err(_) => *is_ready = false,
            }
        }
    });
}

/// Runs the full capture session: connect, init, configure the Output
/// Coordinator and pipe sinks, then stream until `duration` elapses or the
/// process is interrupted (spec §4.K "streamAll").
pub fn run(config: RunConfig) -> std::io::Result<()> {
    let mut devices = build_devices(&config);
    let mut ready = connect_all(&mut devices);
    init_all(&mut devices, &mut ready);

    if !ready.iter().any(|&r| r) {
        tracing::error!("no device is ready, nothing to stream");
        return Ok(());
    }

    let frame_queue = Arc::new(BoundedQueue::new(crate::queue::DEFAULT_CAPACITY));
    let device_meta: Vec<DeviceMeta> = devices
        .iter()
        .zip(ready.iter())
        .filter(|(_, &r)| r)
        .map(|(d, _)| DeviceMeta {
            device_id: d.device_id,
            port_label: d.port_label.clone(),
            channel: d.channel,
            radio_mode: d.radio_mode,
        })
        .collect();

    let mut coordinator = OutputCoordinator::new(frame_queue.clone(), config.file.clone(), config.crypto.clone());
    coordinator.configure(device_meta.clone())?;
    coordinator.simulate_key_packets();

    let mut pipe_threads = Vec::new();
    if config.pipe.enabled {
        if config.pipe.split_devices_log {
            for meta in &device_meta {
                let path = std::path::PathBuf::from(&config.pipe.path)
                    .join(format!("{}_{}", config.pipe.base_name, meta.device_id));
                let queue = Arc::new(BoundedQueue::new(crate::queue::DEFAULT_CAPACITY));
                coordinator.register_pipe(Some(meta.device_id), queue.clone());
                pipe_threads.push(spawn_pipe_worker(path, queue));
            }
        } else {
            let path = std::path::PathBuf::from(&config.pipe.path).join(&config.pipe.base_name);
            let queue = Arc::new(BoundedQueue::new(crate::queue::DEFAULT_CAPACITY));
            coordinator.register_pipe(None, queue.clone());
            pipe_threads.push(spawn_pipe_worker(path, queue));
        }
    }

    let duration = if config.duration_secs >= 0 {
        Some(Duration::from_secs(config.duration_secs as u64))
    } else {
        None
    };

    std::thread::scope(|scope| {
        let coordinator_thread = scope.spawn(|| coordinator.run(|| !signals::interrupt_requested()));

        let mut stream_threads = Vec::new();
        for (device, &is_ready) in devices.iter_mut().zip(ready.iter()) {
            if !is_ready {
                continue;
            }
            let queue = &frame_queue;
            stream_threads.push(scope.spawn(move || {
                if device.start().is_ok() {
                    device.stream_for(queue, duration);
                    let _ = device.stop();
                }
            }));
        }
        for handle in stream_threads {
            let _ = handle.join();
        }

        signals::set_pipe_interrupted(false);
        let _ = coordinator_thread.join();
    });

    for handle in pipe_threads {
        let _ = handle.join();
    }

    Ok(())
}

fn spawn_pipe_worker(path: std::path::PathBuf, queue: Arc<BoundedQueue<crate::pipe_sink::PipeItem>>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut worker = PipeSinkWorker::new(path, UnixFifo::default(), queue);
        worker.run(|| !signals::interrupt_requested());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CryptoConfig, DeviceConfig, FileLogConfig, PipeLogConfig};

    #[test]
    fn build_devices_assigns_incrementing_ids() {
        let config = RunConfig {
            devices: vec![
                DeviceConfig { port: "/dev/ttyACM0".into(), radio_mode: 20, channel: 20 },
                DeviceConfig { port: "/dev/ttyACM1".into(), radio_mode: 20, channel: 11 },
            ],
            file: FileLogConfig::default(),
            pipe: PipeLogConfig::default(),
            crypto: CryptoConfig::default(),
            duration_secs: -1,
        };
        let devices = build_devices(&config);
        assert_eq!(devices[0].device_id, 0);
        assert_eq!(devices[1].device_id, 1);
        assert_eq!(devices[1].port_label, "/dev/ttyACM1");
    }

    #[test]
    fn connect_all_reports_failures_for_unreachable_ports() {
        let config = RunConfig {
            devices: vec![DeviceConfig { port: "/dev/definitely-not-a-real-port".into(), radio_mode: 20, channel: 20 }],
            file: FileLogConfig::default(),
            pipe: PipeLogConfig::default(),
            crypto: CryptoConfig::default(),
            duration_secs: -1,
        };
        let mut devices = build_devices(&config);
        let ready = connect_all(&mut devices);
        assert_eq!(ready, vec![false]);
    }
}
