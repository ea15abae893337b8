//! A frame-locked, frequency-hopping link between a Master (timing
//! authority) and a Slave (timing follower), built over a packet-radio
//! transceiver with fixed-size payloads, no on-air acknowledgement, and no
//! automatic retransmission.
//!
//! The entry points are [`Master`] and [`Slave`]. Both are generic over a
//! [`Radio`] (the transceiver) and a [`FrameTimer`] (the free-running
//! microsecond source); neither the radio peripheral, its bus, interrupt
//! registration, task spawning, nor application payload logic are provided
//! by this crate — those are external collaborators the caller supplies.
//!
//! ```no_run
//! use fhss_link::{config::EndpointConfig, Master};
//! # use fhss_link::{Radio, FrameTimer};
//! # struct MyRadio;
//! # impl Radio for MyRadio {
//! #     type Error = core::convert::Infallible;
//! #     fn configure(&mut self, _: &EndpointConfig) -> Result<(), Self::Error> { Ok(()) }
//! #     fn power_down(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! #     fn power_up(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! #     fn set_channel(&mut self, _: u8) {}
//! #     fn start_listening(&mut self) {}
//! #     fn stop_listening(&mut self) {}
//! #     fn write(&mut self, _: &[u8]) {}
//! #     fn available(&mut self) -> bool { false }
//! #     fn read(&mut self, _: &mut [u8]) -> usize { 0 }
//! # }
//! # struct MyTimer;
//! # impl FrameTimer for MyTimer { fn now_micros(&mut self) -> u32 { 0 } }
//!
//! let config = EndpointConfig::new(
//!     100, 16, 1, 1, 0,
//!     [1, 2, 3], [4, 5, 6],
//!     10, 50, 42,
//! );
//!
//! let mut master = Master::new(MyRadio, MyTimer, config)?;
//! master.wait_and_send(|| {});
//! master.receive();
//! # Ok::<(), core::convert::Infallible>(())
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

pub mod channels;
pub mod clock;
pub mod codec;
pub mod config;
mod master;
pub mod radio;
mod slave;
pub mod stats;
pub mod sync;
pub mod time;

pub use clock::FrameTimer;
pub use master::Master;
pub use radio::Radio;
pub use slave::{AcquisitionState, Slave};
