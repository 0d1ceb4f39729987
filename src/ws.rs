// src/ws.rs
use crossbeam_channel::Sender;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use nfc_tag_service::apdu::{ApduResponse, StatusWord};
use nfc_tag_service::hce::ApduEngine;
use nfc_tag_service::session::TagSession;
use nfc_tag_service::types::{IncomingMessage, NfcCommand, OutgoingMessage, TransmitMode};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use warp::Filter;

pub async fn start_server(
    addr: SocketAddr,
    session: Arc<TagSession>,
    nfc_cmd_tx: Sender<NfcCommand>,
    mut nfc_event_rx: broadcast::Receiver<OutgoingMessage>,
) {
    // Shared Broadcast Channel for WS Clients
    let (ws_tx, _) = broadcast::channel::<OutgoingMessage>(32);
    let ws_tx = Arc::new(ws_tx);

    // 1. Task to forward NFC Events -> All WS Clients
    let ws_tx_clone = ws_tx.clone();
    tokio::spawn(async move {
        while let Ok(msg) = nfc_event_rx.recv().await {
            let _ = ws_tx_clone.send(msg);
        }
    });

    // 2. Define WS Route (Matches root path "/")
    let ws_route = warp::path::end()
        .and(warp::ws())
        .map(move |ws: warp::ws::Ws| {
            let nfc_cmd_tx = nfc_cmd_tx.clone();
            let ws_tx = ws_tx.clone();
            let session = session.clone();

            ws.on_upgrade(move |socket| handle_connection(socket, session, nfc_cmd_tx, ws_tx))
        });

    let routes = ws_route.with(warp::cors().allow_any_origin());

    info!("WebSocket server running on ws://{}", addr);
    warp::serve(routes).run(addr).await;
}

async fn handle_connection(
    ws: warp::ws::WebSocket,
    session: Arc<TagSession>,
    nfc_cmd_tx: Sender<NfcCommand>,
    ws_tx: Arc<broadcast::Sender<OutgoingMessage>>,
) {
    let (mut client_ws_tx, mut client_ws_rx) = ws.split();
    let mut rx_broadcast = ws_tx.subscribe();

    // Replies meant for this client only (acks, APDU responses)
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<OutgoingMessage>();

    // Spawn task to send Broadcasts + Replies -> Client
    tokio::spawn(async move {
        while let Some(msg) = next_outgoing(&mut rx_broadcast, &mut reply_rx).await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to serialize {:?}: {}", msg, e);
                    continue;
                }
            };
            if client_ws_tx.send(warp::ws::Message::text(json)).await.is_err() {
                break;
            }
        }
    });

    // Every connection is one emulation session
    let mut engine = ApduEngine::new(session.clone());

    // Handle incoming messages from Client
    while let Some(Ok(msg)) = client_ws_rx.next().await {
        let Ok(text) = msg.to_str() else {
            continue;
        };
        let parsed = match serde_json::from_str::<IncomingMessage>(text) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Ignoring message {:?}: {}", text, e);
                continue;
            }
        };

        let reply = match parsed {
            IncomingMessage::GET_READER_STATUS => {
                match nfc_cmd_tx.send(NfcCommand::CheckReaderStatus) {
                    Ok(()) => None,
                    // Reader thread not running
                    Err(_) => Some(OutgoingMessage::READER_STATUS { success: false }),
                }
            }
            IncomingMessage::START_NFC { mode, data } => {
                let mode = TransmitMode::from_label(mode.as_deref());
                match session.start(mode, &data) {
                    Ok(()) => Some(OutgoingMessage::HCE_READY),
                    Err(e) => Some(OutgoingMessage::START_ERROR {
                        error: e.to_string(),
                    }),
                }
            }
            IncomingMessage::STOP_NFC => {
                session.stop();
                Some(OutgoingMessage::NFC_STOPPED)
            }
            IncomingMessage::APDU { hex: command_hex } => {
                let response = match hex::decode(&command_hex) {
                    Ok(command) => engine.process_raw(&command),
                    Err(_) => ApduResponse::status(StatusWord::UNKNOWN).to_bytes(),
                };
                Some(OutgoingMessage::APDU_RESPONSE {
                    hex: hex::encode_upper(response),
                })
            }
            IncomingMessage::DEACTIVATED => {
                engine.deactivate();
                None
            }
        };

        if let Some(reply) = reply {
            if reply_tx.send(reply).is_err() {
                break;
            }
        }
    }
}

// None once the client is gone (reply sender dropped) or the event source closed.
async fn next_outgoing(
    rx_broadcast: &mut broadcast::Receiver<OutgoingMessage>,
    reply_rx: &mut mpsc::UnboundedReceiver<OutgoingMessage>,
) -> Option<OutgoingMessage> {
    loop {
        tokio::select! {
            reply = reply_rx.recv() => return reply,
            event = rx_broadcast.recv() => match event {
                Ok(msg) => return Some(msg),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Client lagging, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn next_within(
        rx_broadcast: &mut broadcast::Receiver<OutgoingMessage>,
        reply_rx: &mut mpsc::UnboundedReceiver<OutgoingMessage>,
    ) -> Option<OutgoingMessage> {
        timeout(Duration::from_secs(1), next_outgoing(rx_broadcast, reply_rx))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn lagging_client_keeps_receiving_events() {
        let (event_tx, mut rx_broadcast) = broadcast::channel::<OutgoingMessage>(1);
        let (_reply_tx, mut reply_rx) = mpsc::unbounded_channel::<OutgoingMessage>();

        event_tx.send(OutgoingMessage::HCE_READY).unwrap();
        event_tx.send(OutgoingMessage::NFC_STOPPED).unwrap();

        let msg = next_within(&mut rx_broadcast, &mut reply_rx).await;
        assert_eq!(msg, Some(OutgoingMessage::NFC_STOPPED));

        event_tx
            .send(OutgoingMessage::READER_STATUS { success: true })
            .unwrap();
        let msg = next_within(&mut rx_broadcast, &mut reply_rx).await;
        assert_eq!(msg, Some(OutgoingMessage::READER_STATUS { success: true }));
    }

    #[tokio::test]
    async fn disconnected_client_stops_without_events() {
        // Sender kept alive and silent, as with the reader thread disabled
        let (_event_tx, mut rx_broadcast) = broadcast::channel::<OutgoingMessage>(4);
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<OutgoingMessage>();

        reply_tx.send(OutgoingMessage::NFC_STOPPED).unwrap();
        drop(reply_tx);

        let first = next_within(&mut rx_broadcast, &mut reply_rx).await;
        assert_eq!(first, Some(OutgoingMessage::NFC_STOPPED));

        let done = next_within(&mut rx_broadcast, &mut reply_rx).await;
        assert_eq!(done, None);
    }

    #[tokio::test]
    async fn closed_event_source_ends_forwarding() {
        let (event_tx, mut rx_broadcast) = broadcast::channel::<OutgoingMessage>(4);
        let (_reply_tx, mut reply_rx) = mpsc::unbounded_channel::<OutgoingMessage>();
        drop(event_tx);

        let done = next_within(&mut rx_broadcast, &mut reply_rx).await;
        assert_eq!(done, None);
    }
}
