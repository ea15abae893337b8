//! Packet layout and typed append/extract helpers.
//!
//! Every packet is `packet_size` bytes. Byte 0 is a header carrying the
//! slot id and the sender's hop counter; the remainder is an
//! application-defined payload, appended and read back through typed
//! cursors that advance as values are written or consumed.

use serde::{Deserialize, Serialize};

/// Largest payload a packet may carry, per the endpoint configuration's
/// clamp on `packet_size`.
pub const MAX_PACKET_SIZE: usize = 32;

/// Number of outbound/inbound packet slots an endpoint may configure.
pub const MAX_SLOTS: usize = 3;

/// One packet buffer: a fixed-capacity byte array plus the cursor tracking
/// how much of it has been written (for a send slot) or read back (for a
/// receive slot).
///
/// Cursors start at 1 on every clear, since byte 0 is reserved for the
/// header and is never part of the typed payload stream.
#[derive(Clone, Copy, Debug)]
pub struct PacketBuffer {
    bytes: [u8; MAX_PACKET_SIZE],
    cursor: usize,
}

impl PacketBuffer {
    /// Creates a zeroed buffer with the cursor reset to 1.
    pub fn new() -> Self {
        PacketBuffer { bytes: [0; MAX_PACKET_SIZE], cursor: 1 }
    }

    /// Zeroes the buffer and resets the cursor to 1, as happens at every
    /// frame boundary.
    pub fn clear(&mut self) {
        self.bytes = [0; MAX_PACKET_SIZE];
        self.cursor = 1;
    }

    /// The header byte (byte 0).
    pub fn header(&self) -> u8 {
        self.bytes[0]
    }

    /// Sets the header byte.
    pub fn set_header(&mut self, header: u8) {
        self.bytes[0] = header;
    }

    /// The raw packet bytes, up to `packet_size`.
    pub fn as_slice(&self, packet_size: usize) -> &[u8] {
        &self.bytes[..packet_size.min(MAX_PACKET_SIZE)]
    }

    /// Overwrites the raw packet bytes from a received frame.
    pub fn copy_from_slice(&mut self, data: &[u8]) {
        let len = data.len().min(MAX_PACKET_SIZE);
        self.bytes[..len].copy_from_slice(&data[..len]);
    }

    /// The write/read cursor, in `[1, packet_size]`.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Appends `value`'s raw bytes at the cursor and advances it, or
    /// silently does nothing if it would not fit before `packet_size`.
    pub fn append<T>(&mut self, packet_size: usize, value: &T)
    where
        T: Serialize,
    {
        let packet_size = packet_size.min(MAX_PACKET_SIZE);
        let remaining = &mut self.bytes[self.cursor..packet_size];
        match ssmarshal::serialize(remaining, value) {
            Ok(written) => self.cursor += written,
            Err(_) => {
                // Doesn't fit before `packet_size` ends; drop it silently,
                // per the link's best-effort contract.
            }
        }
    }

    /// Reads a value back from the cursor and advances it, or returns the
    /// type's default if it would read past `packet_size`.
    pub fn extract<T>(&mut self, packet_size: usize) -> T
    where
        T: for<'de> Deserialize<'de> + Default,
    {
        let packet_size = packet_size.min(MAX_PACKET_SIZE);
        if self.cursor >= packet_size {
            return T::default();
        }
        match ssmarshal::deserialize::<T>(&self.bytes[self.cursor..packet_size]) {
            Ok((value, read)) => {
                self.cursor += read;
                value
            }
            Err(_) => T::default(),
        }
    }
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Bit layout of the header byte (byte 0 of every packet).
///
/// ```text
/// bit:  7 6 5 4 3 2 1 0
///       [ hop  ][rsvd ][id]
/// ```
pub mod header {
    const SLOT_ID_MASK: u8 = 0b0000_0011;
    const HOP_COUNTER_SHIFT: u8 = 5;
    const HOP_COUNTER_MASK: u8 = 0b0000_0111;

    /// Builds a header byte from a slot id (0..2) and the sender's hop
    /// counter (0..7, though only `0..frames_per_hop` is ever used).
    pub fn encode(slot: u8, hop_counter: u8) -> u8 {
        (slot & SLOT_ID_MASK) | ((hop_counter & HOP_COUNTER_MASK) << HOP_COUNTER_SHIFT)
    }

    /// Extracts the slot id (bits [1:0]) from a header byte.
    pub fn slot_id(header: u8) -> u8 {
        header & SLOT_ID_MASK
    }

    /// Extracts the sender's hop counter (bits [7:5]) from a header byte.
    pub fn hop_counter(header: u8) -> u8 {
        (header >> HOP_COUNTER_SHIFT) & HOP_COUNTER_MASK
    }
}
