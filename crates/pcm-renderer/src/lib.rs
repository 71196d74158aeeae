pub mod backend;
pub mod bridge;
pub mod config;
pub mod connection;
pub mod error;
pub mod format;
pub mod mainloop;
pub mod port;
pub mod render;
pub mod renderer;
pub mod sink;
pub mod status;
pub mod stream;

#[cfg(test)]
pub(crate) mod testing;
