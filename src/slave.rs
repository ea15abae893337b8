//! The Slave: timing follower. Tracks the Master's frame boundary by
//! observing receive-interrupt timestamps, and reacquires lock after loss
//! through a three-state acquisition machine.

use crate::clock::FrameTimer;
use crate::codec::{header, PacketBuffer, MAX_SLOTS};
use crate::config::{EndpointConfig, FRAMES_PER_HOP};
use crate::radio::Radio;
use crate::stats::Stats;
use crate::sync::SyncLatch;
use crate::time::{DriftAdaptation, SlaveFrameClock};

/// Maximum packets drained from the radio in one receive pass.
const MAX_RECEIVES_PER_FRAME: usize = 3;

/// Consecutive failed frames, from any state, after which acquisition is
/// forced back to `Scanning`.
const FAILED_BEFORE_SCANNING: u32 = 50;

/// Consecutive successful frames in `PartialLock` after which acquisition
/// regresses to `Scanning` instead of promoting to `FullLock`.
const PARTIAL_LOCK_LIMIT: u32 = 10;

/// The Slave's acquisition state.
///
/// `PartialLock` is a one-frame hysteresis: a single successful frame from
/// `Scanning` is not enough to trust the lock, so it waits for one more
/// consecutive success before promoting to `FullLock`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AcquisitionState {
    /// No recent successful receive; hunting across hop phases.
    Scanning,
    /// One successful receive seen; awaiting a confirming second.
    PartialLock,
    /// Frame-locked and actively transmitting.
    FullLock,
}

/// The Slave endpoint.
pub struct Slave<'a, R, T> {
    radio: R,
    timer: T,
    config: EndpointConfig,
    clock: SlaveFrameClock,
    sync_latch: &'a SyncLatch,

    state: AcquisitionState,
    partial_lock_counter: u32,
    failed_counter: u32,

    current_channel_index: usize,
    channel_hop_counter: u8,
    hop_on_scan_counter: u32,
    hop_on_scan_value: u8,
    hop_on_lock_value: u8,

    send_slots: [PacketBuffer; MAX_SLOTS],
    recv_slots: [PacketBuffer; MAX_SLOTS],
    recv_available: [bool; MAX_SLOTS],
    received_packet_count: u32,
    stats: Stats,
}

impl<'a, R, T> Slave<'a, R, T>
where
    R: Radio,
    T: FrameTimer,
{
    /// Builds a new Slave over an already-constructed radio and timer, a
    /// caller-owned [`SyncLatch`] the receive ISR publishes into, and the
    /// drift-adaptation mode to run the frame clock in.
    pub fn new(
        mut radio: R,
        mut timer: T,
        config: EndpointConfig,
        sync_latch: &'a SyncLatch,
        drift_adaptation: DriftAdaptation,
    ) -> Result<Self, R::Error> {
        radio.configure(&config)?;
        let now = timer.now_micros();
        let clock = SlaveFrameClock::new(config.micros_per_frame(), now, drift_adaptation);
        radio.start_listening();

        Ok(Slave {
            radio,
            timer,
            config,
            clock,
            sync_latch,
            state: AcquisitionState::Scanning,
            partial_lock_counter: 0,
            failed_counter: 0,
            current_channel_index: 0,
            channel_hop_counter: 0,
            hop_on_scan_counter: 0,
            hop_on_scan_value: 0,
            hop_on_lock_value: FRAMES_PER_HOP - 1,
            send_slots: [PacketBuffer::new(); MAX_SLOTS],
            recv_slots: [PacketBuffer::new(); MAX_SLOTS],
            recv_available: [false; MAX_SLOTS],
            received_packet_count: 0,
            stats: Stats::new(config.frame_rate_hz()),
        })
    }

    /// Appends a typed value to the outbound payload of `slot`.
    pub fn add_next_packet_value<V>(&mut self, slot: usize, value: &V)
    where
        V: serde::Serialize,
    {
        if let Some(buffer) = self.send_slots.get_mut(slot) {
            buffer.append(self.config.packet_size(), value);
        }
    }

    /// Reads a typed value back from the inbound payload of `slot`.
    pub fn get_next_packet_value<V>(&mut self, slot: usize) -> V
    where
        V: for<'de> serde::Deserialize<'de> + Default,
    {
        match self.recv_slots.get_mut(slot) {
            Some(buffer) => buffer.extract(self.config.packet_size()),
            None => V::default(),
        }
    }

    /// True if a packet bearing `slot`'s id arrived during the current
    /// frame.
    pub fn is_new_packet(&self, slot: usize) -> bool {
        self.recv_available.get(slot).copied().unwrap_or(false)
    }

    /// The radio channel currently tuned in.
    pub fn current_channel(&self) -> u8 {
        self.config.channels()[self.current_channel_index]
    }

    /// The current acquisition state.
    pub fn acquisition_state(&self) -> AcquisitionState {
        self.state
    }

    /// Packets received in the second just published.
    pub fn received_per_second(&self) -> u32 {
        self.stats.received_per_second()
    }

    /// True for exactly the one frame on which per-second stats were just
    /// published.
    pub fn is_second_tick(&self) -> bool {
        self.stats.is_second_tick()
    }

    /// Blocks, cooperatively, until the current frame's boundary — taking
    /// the latest sync sample off the latch on every spin iteration, since
    /// the receive ISR may publish one at any point during the wait — then
    /// runs the hop scheduler and, if frame-locked, transmits every
    /// configured send slot.
    pub fn wait_and_send(&mut self, mut yield_now: impl FnMut()) {
        loop {
            let now = self.timer.now_micros();
            let sample = self.sync_latch.take();
            if self.clock.is_frame_ready(now, sample) {
                break;
            }
            yield_now();
        }

        let hopped = self.update_hop();

        if self.state == AcquisitionState::FullLock {
            if !hopped {
                self.radio.stop_listening();
            }

            for slot in 0..self.config.n_send() {
                let buffer = &mut self.send_slots[slot];
                // The Slave does not own the hop-counter field of the
                // header; the Master is the sole authority on it.
                buffer.set_header(header::encode(slot as u8, 0));
                let packet_size = self.config.packet_size();
                self.radio.write(buffer.as_slice(packet_size));
                self.stats.record_sent();
            }
        }

        self.radio.start_listening();

        for buffer in &mut self.send_slots {
            buffer.clear();
        }
    }

    /// Runs the hop scheduler for this frame's send phase.
    ///
    /// Returns true if a hop occurred this frame (and the radio was
    /// therefore already stopped and retuned by [`Slave::adjust_channel_index`]).
    fn update_hop(&mut self) -> bool {
        self.channel_hop_counter = (self.channel_hop_counter + 1) % FRAMES_PER_HOP;

        if self.state == AcquisitionState::Scanning && self.channel_hop_counter == self.hop_on_scan_value {
            self.adjust_channel_index(-1);
            return true;
        }

        if self.state == AcquisitionState::FullLock && self.channel_hop_counter == self.hop_on_lock_value {
            self.adjust_channel_index(1);
            return true;
        }

        false
    }

    /// Moves `current_channel_index` by `amount` (mod 40, handling
    /// negative values), retunes the radio, and — once every 40
    /// adjustments — rotates `hop_on_scan_value` so a long-unsynchronised
    /// Slave eventually explores every phase offset.
    fn adjust_channel_index(&mut self, amount: i32) {
        let len = self.config.channels().len() as i32;
        let shifted = self.current_channel_index as i32 + amount + len;
        self.current_channel_index = (shifted % len) as usize;

        self.hop_on_scan_counter += 1;
        if self.hop_on_scan_counter >= len as u32 {
            self.hop_on_scan_counter = 0;
            self.hop_on_scan_value = (self.hop_on_scan_value + 1) % FRAMES_PER_HOP;
            log::debug!(
                "hop_on_scan_value rotated to {} after a full sweep",
                self.hop_on_scan_value
            );
        }

        self.radio.stop_listening();
        self.radio.set_channel(self.current_channel());
        log::trace!("hopped to channel {}", self.current_channel());
    }

    /// Drains up to [`MAX_RECEIVES_PER_FRAME`] waiting packets, adopts the
    /// Master's hop counter from the last packet's header, and feeds the
    /// frame's success/failure into the acquisition machine.
    pub fn receive(&mut self) {
        for available in &mut self.recv_available {
            *available = false;
        }
        for buffer in &mut self.recv_slots {
            buffer.clear();
        }

        let packet_size = self.config.packet_size();
        let mut scratch = [0u8; crate::codec::MAX_PACKET_SIZE];
        let mut is_success = false;

        for _ in 0..MAX_RECEIVES_PER_FRAME {
            if !self.radio.available() {
                continue;
            }

            let read = self.radio.read(&mut scratch[..packet_size]);
            if read == 0 {
                continue;
            }

            is_success = true;
            self.received_packet_count += 1;
            self.stats.record_received();

            let header_byte = scratch[0];
            let slot = header::slot_id(header_byte) as usize;
            if let Some(buffer) = self.recv_slots.get_mut(slot) {
                buffer.copy_from_slice(&scratch[..read]);
                self.recv_available[slot] = true;
            }

            self.channel_hop_counter = header::hop_counter(header_byte);
        }

        self.update_scanning(is_success);
        self.stats.tick();
        if self.stats.is_second_tick() {
            log::trace!(
                "stats: received={}/s sent={}/s",
                self.stats.received_per_second(),
                self.stats.sent_per_second()
            );
        }
    }

    /// Advances the acquisition FSM per `is_success` (true iff at least one
    /// packet was read this frame), then applies the global
    /// failed-counter-driven reset to `Scanning`.
    fn update_scanning(&mut self, is_success: bool) {
        if is_success {
            match self.state {
                AcquisitionState::Scanning => {
                    self.adjust_channel_index(2);
                    self.radio.start_listening();
                    self.state = AcquisitionState::PartialLock;
                    self.partial_lock_counter = 0;
                    log::debug!("acquisition: Scanning -> PartialLock");
                }
                AcquisitionState::PartialLock => {
                    self.partial_lock_counter += 1;
                    if self.partial_lock_counter > PARTIAL_LOCK_LIMIT {
                        self.state = AcquisitionState::Scanning;
                        log::debug!("acquisition: PartialLock -> Scanning (stuck in partial lock)");
                    } else {
                        self.state = AcquisitionState::FullLock;
                        log::debug!("acquisition: PartialLock -> FullLock");
                    }
                }
                AcquisitionState::FullLock => {}
            }
        } else {
            self.failed_counter += 1;
        }

        if self.failed_counter >= FAILED_BEFORE_SCANNING {
            self.failed_counter = 0;
            self.state = AcquisitionState::Scanning;
            log::debug!("acquisition: forced -> Scanning after {FAILED_BEFORE_SCANNING} consecutive failures");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeRadio {
        channel: u8,
        written: Vec<Vec<u8>>,
        inbox: VecDeque<Vec<u8>>,
    }

    impl Radio for FakeRadio {
        type Error = core::convert::Infallible;

        fn configure(&mut self, _config: &EndpointConfig) -> Result<(), Self::Error> {
            Ok(())
        }
        fn power_down(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
        fn power_up(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
        fn set_channel(&mut self, channel: u8) {
            self.channel = channel;
        }
        fn start_listening(&mut self) {}
        fn stop_listening(&mut self) {}
        fn write(&mut self, buf: &[u8]) {
            self.written.push(buf.to_vec());
        }
        fn available(&mut self) -> bool {
            !self.inbox.is_empty()
        }
        fn read(&mut self, buf: &mut [u8]) -> usize {
            if let Some(packet) = self.inbox.pop_front() {
                let len = packet.len().min(buf.len());
                buf[..len].copy_from_slice(&packet[..len]);
                len
            } else {
                0
            }
        }
    }

    struct FakeTimer(u32);

    impl FrameTimer for FakeTimer {
        fn now_micros(&mut self) -> u32 {
            self.0
        }
    }

    fn config() -> EndpointConfig {
        EndpointConfig::new(100, 16, 1, 1, 0, [1, 2, 3], [4, 5, 6], 10, 50, 42)
    }

    #[test]
    fn scanning_success_promotes_to_partial_lock_with_channel_advance() {
        // S5, first half.
        let latch = SyncLatch::new(config().micros_per_frame());
        let radio = FakeRadio::default();
        let timer = FakeTimer(0);
        let mut slave = Slave::new(radio, timer, config(), &latch, DriftAdaptation::Fixed).unwrap();
        let start_index = slave.current_channel_index;

        slave.update_scanning(true);

        assert_eq!(slave.acquisition_state(), AcquisitionState::PartialLock);
        assert_eq!(slave.partial_lock_counter, 0);
        assert_eq!(
            slave.current_channel_index,
            (start_index + 2) % slave.config.channels().len()
        );
    }

    #[test]
    fn second_consecutive_success_promotes_to_full_lock() {
        // S5, second half.
        let latch = SyncLatch::new(config().micros_per_frame());
        let radio = FakeRadio::default();
        let timer = FakeTimer(0);
        let mut slave = Slave::new(radio, timer, config(), &latch, DriftAdaptation::Fixed).unwrap();

        slave.update_scanning(true);
        slave.update_scanning(true);

        assert_eq!(slave.acquisition_state(), AcquisitionState::FullLock);
    }

    #[test]
    fn fifty_consecutive_failures_force_rescan() {
        // S6.
        let latch = SyncLatch::new(config().micros_per_frame());
        let radio = FakeRadio::default();
        let timer = FakeTimer(0);
        let mut slave = Slave::new(radio, timer, config(), &latch, DriftAdaptation::Fixed).unwrap();
        slave.state = AcquisitionState::FullLock;

        for _ in 0..49 {
            slave.update_scanning(false);
        }
        assert_eq!(slave.acquisition_state(), AcquisitionState::FullLock);

        slave.update_scanning(false);
        assert_eq!(slave.acquisition_state(), AcquisitionState::Scanning);
        assert_eq!(slave.failed_counter, 0);
    }

    #[test]
    fn partial_lock_regresses_to_scanning_after_too_many_successes() {
        let latch = SyncLatch::new(config().micros_per_frame());
        let radio = FakeRadio::default();
        let timer = FakeTimer(0);
        let mut slave = Slave::new(radio, timer, config(), &latch, DriftAdaptation::Fixed).unwrap();
        slave.state = AcquisitionState::PartialLock;
        slave.partial_lock_counter = 10;

        slave.update_scanning(true);

        assert_eq!(slave.acquisition_state(), AcquisitionState::Scanning);
    }

    #[test]
    fn hop_on_scan_value_rotates_after_forty_adjustments() {
        let latch = SyncLatch::new(config().micros_per_frame());
        let radio = FakeRadio::default();
        let timer = FakeTimer(0);
        let mut slave = Slave::new(radio, timer, config(), &latch, DriftAdaptation::Fixed).unwrap();

        let channels = slave.config.channels().len() as u32;
        for _ in 0..channels {
            slave.adjust_channel_index(1);
        }

        assert_eq!(slave.hop_on_scan_value, 1 % FRAMES_PER_HOP);
    }

    #[test]
    fn receive_adopts_masters_hop_counter_from_header() {
        let latch = SyncLatch::new(config().micros_per_frame());
        let mut radio = FakeRadio::default();
        let mut packet = vec![0u8; 16];
        packet[0] = header::encode(0, 1);
        radio.inbox.push_back(packet);
        let timer = FakeTimer(0);
        let mut slave = Slave::new(radio, timer, config(), &latch, DriftAdaptation::Fixed).unwrap();

        slave.receive();

        assert_eq!(slave.channel_hop_counter, 1);
        assert!(slave.is_new_packet(0));
    }
}
