//! Endpoint configuration: the pairing secret and link parameters, set once
//! at init and immutable thereafter.
//!
//! Every field is clamped to its valid range at construction. There is no
//! reporting channel for an out-of-range input (§7 of the design this
//! crate follows): a caller who asks for a 500 Hz frame rate silently gets
//! 120 Hz, the same way `dw1000::configs` clamps register fields to the
//! values the datasheet allows rather than rejecting the request.

use crate::channels::{generate_channels, CHANNELS_PER_TABLE};
use crate::codec::MAX_SLOTS;

const MIN_FRAME_RATE_HZ: u32 = 10;
const MAX_FRAME_RATE_HZ: u32 = 120;
const MIN_PACKET_SIZE: usize = 1;
const MAX_PACKET_SIZE: usize = 32;
const MAX_POWER_LEVEL: u8 = 3;

/// Number of frames between hops while locked.
pub const FRAMES_PER_HOP: u8 = 2;

/// A 3-byte radio pipe address.
pub type Address = [u8; 3];

/// Link parameters shared by both the Master and the Slave.
///
/// Constructed once via [`EndpointConfig::new`] and never mutated
/// afterwards; both peers must be constructed with the same
/// `master_addr`/`slave_addr`/`channel_low`/`channel_high`/`channel_seed`
/// for the link to come up at all — a mismatch here is invisible to the
/// core and manifests only as "the Slave never leaves Scanning".
#[derive(Clone, Copy, Debug)]
pub struct EndpointConfig {
    frame_rate_hz: u32,
    micros_per_frame: u32,
    packet_size: usize,
    n_send: usize,
    n_recv: usize,
    power_level: u8,
    master_addr: Address,
    slave_addr: Address,
    channels: [u8; CHANNELS_PER_TABLE],
}

impl EndpointConfig {
    /// Builds a config, clamping every field to its valid range.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        frame_rate_hz: u32,
        packet_size: usize,
        n_send: usize,
        n_recv: usize,
        power_level: u8,
        master_addr: Address,
        slave_addr: Address,
        channel_low: u8,
        channel_high: u8,
        channel_seed: u64,
    ) -> Self {
        let frame_rate_hz = frame_rate_hz.clamp(MIN_FRAME_RATE_HZ, MAX_FRAME_RATE_HZ);
        let packet_size = packet_size.clamp(MIN_PACKET_SIZE, MAX_PACKET_SIZE);
        let n_send = n_send.min(MAX_SLOTS);
        let n_recv = n_recv.min(MAX_SLOTS);
        let power_level = power_level.min(MAX_POWER_LEVEL);

        EndpointConfig {
            frame_rate_hz,
            micros_per_frame: 1_000_000 / frame_rate_hz,
            packet_size,
            n_send,
            n_recv,
            power_level,
            master_addr,
            slave_addr,
            channels: generate_channels(channel_low, channel_high, channel_seed),
        }
    }

    /// The clamped frame rate, in Hz.
    pub fn frame_rate_hz(&self) -> u32 {
        self.frame_rate_hz
    }

    /// `1_000_000 / frame_rate_hz`, the frame period in microseconds.
    pub fn micros_per_frame(&self) -> u32 {
        self.micros_per_frame
    }

    /// The clamped packet size, in bytes (1..=32).
    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// Number of outbound slots this endpoint owns (0..=3).
    pub fn n_send(&self) -> usize {
        self.n_send
    }

    /// Number of inbound slots this endpoint owns (0..=3).
    pub fn n_recv(&self) -> usize {
        self.n_recv
    }

    /// The clamped transmit power level (0..=3).
    pub fn power_level(&self) -> u8 {
        self.power_level
    }

    /// The pipe address the Master writes to and the Slave reads from.
    pub fn master_addr(&self) -> Address {
        self.master_addr
    }

    /// The pipe address the Slave writes to and the Master reads from.
    pub fn slave_addr(&self) -> Address {
        self.slave_addr
    }

    /// The shared 40-entry hop table derived from the pairing secret.
    pub fn channels(&self) -> &[u8; CHANNELS_PER_TABLE] {
        &self.channels
    }
}
