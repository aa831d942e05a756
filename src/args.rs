//! Command-line arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

const DEFAULT_CA_CERT_FILE: &str = "/etc/nodestat/ca.crt";
const DEFAULT_CERT_FILE: &str = "/etc/nodestat/node.crt";
const DEFAULT_KEY_FILE: &str = "/etc/nodestat/node.key";

/// Reports host CPU and memory utilization over a mutually authenticated
/// HTTP endpoint.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Address to serve on.
    #[arg(long, default_value = "localhost:4000")]
    pub addr: String,

    /// PEM file with the CA certificate(s) used to verify client
    /// certificates.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CA_CERT_FILE)]
    pub ca_cert: PathBuf,

    /// PEM file with the server certificate chain.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CERT_FILE)]
    pub cert: PathBuf,

    /// PEM file with the server private key.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_KEY_FILE)]
    pub key: PathBuf,

    /// How often to sample CPU usage, e.g. "5s" or "1m". Floored at 1s.
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration, default_value = "10s")]
    pub cpu_interval: Duration,

    /// How often to sample memory usage, e.g. "5s" or "1m". Floored at 1s.
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration, default_value = "10s")]
    pub mem_interval: Duration,
}
