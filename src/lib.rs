//! Core library for nodestat, a small agent that samples host CPU and memory
//! utilization in the background and reports the latest values over a
//! mutually authenticated HTTP endpoint.

pub mod args;
pub mod monitor;
pub mod server;
pub mod tls;

pub mod utils {
    pub mod cancellation_token;
    pub mod logging;
}
