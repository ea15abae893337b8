//! The `Radio` trait: the boundary between this crate's frame-locked
//! hopping engine and an actual transceiver.
//!
//! Setup calls (`begin`, `power_up`, `power_down`, the one-time
//! `configure`) are fallible, mirroring how `dw1000::hl`'s `DW1000` surfaces
//! a driver `Error` from its state-transition methods. Per-frame hot-path
//! calls are not: a write that fails to reach the air is, by the link's own
//! error-handling contract, indistinguishable from a write that was lost in
//! flight, so the engine never branches on it.

use core::fmt;

use crate::config::EndpointConfig;

/// Capabilities the frame-locked hopping engine requires of a radio
/// transceiver.
///
/// Implemented by the caller over whatever packet-radio peripheral they
/// have; this crate never talks to hardware directly.
pub trait Radio {
    /// The error type surfaced by this radio's fallible setup calls.
    type Error: fmt::Debug;

    /// Brings the radio up and applies `config`'s channel, address-width,
    /// data-rate, auto-ack, retry, payload-size, and pipe-address settings.
    fn configure(&mut self, config: &EndpointConfig) -> Result<(), Self::Error>;

    /// Powers the radio down, e.g. on teardown.
    fn power_down(&mut self) -> Result<(), Self::Error>;

    /// Powers the radio back up after [`Radio::power_down`].
    fn power_up(&mut self) -> Result<(), Self::Error>;

    /// Retunes to one of the 40 entries in the shared channel table.
    ///
    /// Infallible by contract: a channel the caller's hardware cannot
    /// reach is a configuration error to catch at [`Radio::configure`]
    /// time, not a per-frame failure mode.
    fn set_channel(&mut self, channel: u8);

    /// Enters receive mode.
    fn start_listening(&mut self);

    /// Leaves receive mode so the transmit path can use the bus.
    fn stop_listening(&mut self);

    /// Fire-and-forget transmit. No acknowledgement, no retry: a send that
    /// is lost in the air looks identical to a successful one from the
    /// caller's perspective.
    fn write(&mut self, buf: &[u8]);

    /// Non-blocking poll: true if a packet is waiting to be read.
    fn available(&mut self) -> bool;

    /// Reads one waiting packet into `buf`, returning the number of bytes
    /// read. Only called after [`Radio::available`] returned true.
    fn read(&mut self, buf: &mut [u8]) -> usize;
}
