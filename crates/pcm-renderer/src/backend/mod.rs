//! Sink server backends.
//!
//! [`cpal`] plays through the local audio host; [`null`] discards payload
//! and is useful for machines without audio devices.

pub mod cpal;
pub mod null;
