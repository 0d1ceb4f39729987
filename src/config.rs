// src/config.rs
use clap::Parser;

#[derive(Parser, Debug)]
#[command(about = "NFC tag emulation and reader bridge")]
pub struct Args {
    /// Address the WebSocket bridge listens on
    #[arg(short, long, value_name = "ADDR", default_value = "127.0.0.1:3500")]
    pub listen_addr: String,

    /// PC/SC status-change wait before re-checking commands
    #[arg(long, value_name = "MS", default_value_t = 500)]
    pub poll_interval_ms: u64,

    /// Serve only the emulation bridge; do not open PC/SC readers
    #[arg(long)]
    pub no_reader: bool,
}
