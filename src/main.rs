mod cards;
mod config;
mod nfc_service;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::unbounded;
use log::{error, info};
use nfc_tag_service::session::TagSession;
use nfc_tag_service::types::{NfcCommand, OutgoingMessage};
use tokio::sync::broadcast;

#[tokio::main]
async fn main() {
    let args = config::Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let addr: SocketAddr = match args.listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid listen address {:?}: {}", args.listen_addr, e);
            std::process::exit(2);
        }
    };

    info!("Starting NFC tag service...");

    // The one staged message, shared by every emulation session
    let session = Arc::new(TagSession::new());

    // Channel: WS -> NFC (Commands)
    // Crossbeam (Sync) because the NFC thread is blocking
    let (cmd_tx, cmd_rx) = unbounded::<NfcCommand>();

    // Channel: NFC -> WS (Events)
    let (event_tx, event_rx) = broadcast::channel::<OutgoingMessage>(100);

    if args.no_reader {
        info!("PC/SC reader disabled");
        drop(cmd_rx);
    } else {
        let poll_interval = Duration::from_millis(args.poll_interval_ms);

        // Bridge NFC thread -> broadcast
        let (bridge_tx, bridge_rx) = unbounded::<OutgoingMessage>();

        std::thread::spawn(move || {
            nfc_service::run(bridge_tx, cmd_rx, poll_interval);
        });

        std::thread::spawn(move || {
            while let Ok(msg) = bridge_rx.recv() {
                let _ = event_tx.send(msg);
            }
        });
    }

    ws::start_server(addr, session, cmd_tx, event_rx).await;
}
