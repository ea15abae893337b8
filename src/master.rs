//! The Master: timing authority. Sends first, then listens, advancing the
//! hop table every `frames_per_hop` frames.

use crate::codec::{header, PacketBuffer, MAX_SLOTS};
use crate::clock::FrameTimer;
use crate::config::{EndpointConfig, FRAMES_PER_HOP};
use crate::radio::Radio;
use crate::stats::Stats;
use crate::time::FrameClock;

/// Maximum packets drained from the radio in one receive pass.
const MAX_RECEIVES_PER_FRAME: usize = 3;

/// The Master endpoint.
///
/// Owns the frame clock, the current position in the shared hop table, its
/// outbound/inbound packet slots, and the per-second stats accumulator.
pub struct Master<R, T> {
    radio: R,
    timer: T,
    config: EndpointConfig,
    clock: FrameClock,
    current_channel_index: usize,
    channel_hop_counter: u8,
    send_slots: [PacketBuffer; MAX_SLOTS],
    recv_slots: [PacketBuffer; MAX_SLOTS],
    recv_available: [bool; MAX_SLOTS],
    received_packet_count: u32,
    stats: Stats,
}

impl<R, T> Master<R, T>
where
    R: Radio,
    T: FrameTimer,
{
    /// Builds a new Master over an already-constructed radio and timer,
    /// applying `config` to the radio and starting the first frame at the
    /// timer's current reading.
    pub fn new(mut radio: R, mut timer: T, config: EndpointConfig) -> Result<Self, R::Error> {
        radio.configure(&config)?;
        let now = timer.now_micros();
        let clock = FrameClock::new(config.micros_per_frame(), now);
        radio.start_listening();

        Ok(Master {
            radio,
            timer,
            config,
            clock,
            current_channel_index: 0,
            channel_hop_counter: 0,
            send_slots: [PacketBuffer::new(); MAX_SLOTS],
            recv_slots: [PacketBuffer::new(); MAX_SLOTS],
            recv_available: [false; MAX_SLOTS],
            received_packet_count: 0,
            stats: Stats::new(config.frame_rate_hz()),
        })
    }

    /// Appends a typed value to the outbound payload of `slot`, advancing
    /// that slot's write cursor. A no-op if `slot` is out of range or the
    /// value would not fit before `packet_size`.
    pub fn add_next_packet_value<V>(&mut self, slot: usize, value: &V)
    where
        V: serde::Serialize,
    {
        if let Some(buffer) = self.send_slots.get_mut(slot) {
            buffer.append(self.config.packet_size(), value);
        }
    }

    /// Reads a typed value back from the inbound payload of `slot`,
    /// advancing that slot's read cursor. Returns the type's default if
    /// `slot` is out of range or the read would go past `packet_size`.
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

    /// Packets received in the second just published.
    pub fn received_per_second(&self) -> u32 {
        self.stats.received_per_second()
    }

    /// True for exactly the one frame on which per-second stats were just
    /// published.
    pub fn is_second_tick(&self) -> bool {
        self.stats.is_second_tick()
    }

    /// Blocks, cooperatively, until the current frame's boundary, calling
    /// `yield_now` once per spin iteration, then transmits every configured
    /// send slot, hops if due, and returns to listening.
    ///
    /// `yield_now` stands in for the host scheduler's cooperative yield; a
    /// bare spin loop is not permitted to block the executor per the
    /// design this crate follows.
    pub fn wait_and_send(&mut self, mut yield_now: impl FnMut()) {
        loop {
            let now = self.timer.now_micros();
            if self.clock.is_frame_ready(now) {
                break;
            }
            yield_now();
        }

        self.radio.stop_listening();

        for slot in 0..self.config.n_send() {
            let buffer = &mut self.send_slots[slot];
            buffer.set_header(header::encode(slot as u8, self.channel_hop_counter));
            let packet_size = self.config.packet_size();
            self.radio.write(buffer.as_slice(packet_size));
            self.stats.record_sent();
        }

        self.channel_hop_counter += 1;
        if self.channel_hop_counter >= FRAMES_PER_HOP {
            self.channel_hop_counter = 0;
            self.current_channel_index = (self.current_channel_index + 1) % self.config.channels().len();
            self.radio.set_channel(self.current_channel());
        }

        self.radio.start_listening();

        for buffer in &mut self.send_slots {
            buffer.clear();
        }
    }

    /// Drains up to [`MAX_RECEIVES_PER_FRAME`] waiting packets, dispatching
    /// each into its slot buffer by the header's slot id, then advances the
    /// per-second stats.
    pub fn receive(&mut self) {
        for available in &mut self.recv_available {
            *available = false;
        }
        for buffer in &mut self.recv_slots {
            buffer.clear();
        }

        let packet_size = self.config.packet_size();
        let mut scratch = [0u8; crate::codec::MAX_PACKET_SIZE];

        for _ in 0..MAX_RECEIVES_PER_FRAME {
            if !self.radio.available() {
                continue;
            }

            let read = self.radio.read(&mut scratch[..packet_size]);
            if read == 0 {
                continue;
            }

            let slot = header::slot_id(scratch[0]) as usize;
            if let Some(buffer) = self.recv_slots.get_mut(slot) {
                buffer.copy_from_slice(&scratch[..read]);
                self.recv_available[slot] = true;
                self.received_packet_count += 1;
                self.stats.record_received();
            }
        }

        self.stats.tick();
        if self.stats.is_second_tick() {
            log::trace!(
                "stats: received={}/s",
                self.stats.received_per_second()
            );
        }
    }
}
