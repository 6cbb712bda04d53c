//! tuxniffer: multi-device Zigbee/BLE sniffer-dongle host.
//!
//! Wire protocol engine (`frame_codec`), device lifecycle controller
//! (`device`), pcap-format capture-record synthesis (`capture_record`), and a
//! Zigbee key-extraction/CCM* decryption subsystem (`crypto`), composed by
//! `orchestrator` into a multi-device capture pipeline.

pub mod capture_record;
pub mod config;
pub mod crypto;
pub mod device;
pub mod error;
pub mod frame_codec;
pub mod key_store;
pub mod orchestrator;
pub mod output_coordinator;
pub mod payload_parser;
pub mod pipe_sink;
pub mod queue;
pub mod radio_mode;
pub mod serial_port;
pub mod signals;
pub mod simulation;
