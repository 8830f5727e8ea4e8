use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use courier_db::Database;
use courier_types::events::{GatewayCommand, GatewayEvent};
use courier_types::models::UserId;

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a client gets to send Identify before the socket is closed.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle a single WebSocket connection: Identify handshake, Ready, then
/// the event loop. Typing and heartbeat commands write through to the
/// store; everything else arrives via the dispatcher.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    jwt_secret: String,
    typing_ttl_secs: i64,
) {
    let (mut sender, mut receiver) = socket.split();

    let user_id = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(id) => id,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    info!("user {} connected to gateway", user_id);

    let ready = GatewayEvent::Ready { user_id };
    if sender
        .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
        .await
        .is_err()
    {
        return;
    }

    // Register the targeted channel, replay who is already online, then
    // announce ourselves.
    let (conn_id, mut user_rx) = dispatcher.register_user_channel(user_id).await;
    for uid in dispatcher.online_users().await {
        let event = GatewayEvent::PresenceUpdate {
            user_id: uid,
            online: true,
        };
        if sender
            .send(Message::Text(serde_json::to_string(&event).unwrap().into()))
            .await
            .is_err()
        {
            return;
        }
    }
    dispatcher.user_online(user_id).await;

    // Connecting counts as a heartbeat.
    record_heartbeat(&db, user_id).await;

    let mut broadcast_rx = dispatcher.subscribe();
    let dispatcher_recv = dispatcher.clone();
    let db_recv = db.clone();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward broadcasts + targeted events -> client, with ping liveness.
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };
                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                result = user_rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };
                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from the client.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&dispatcher_recv, &db_recv, user_id, typing_ttl_secs, cmd)
                            .await;
                    }
                    Err(e) => {
                        warn!(
                            "user {} bad command: {} -- raw: {}",
                            user_id,
                            e,
                            log_preview(&text, 200)
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.user_offline(user_id, conn_id).await;

    // A gone connection stops typing everywhere; online-ness simply decays
    // as heartbeats stop arriving.
    let cleanup_db = db.clone();
    let cleared = tokio::task::spawn_blocking(move || cleanup_db.clear_typing_for_user(user_id)).await;
    match cleared {
        Ok(Ok(n)) if n > 0 => debug!("cleared {} typing rows for user {}", n, user_id),
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!("typing cleanup for user {} failed: {}", user_id, e),
        Err(e) => warn!("typing cleanup join error: {}", e),
    }

    info!("user {} disconnected from gateway", user_id);
}

/// Clamp a client-supplied payload for logging. Cuts on a character
/// boundary; byte-slicing multi-byte input would panic.
fn log_preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

async fn wait_for_identify(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<UserId> {
    use courier_types::api::Claims;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    let timeout = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    let token_data = decode::<Claims>(
                        &token,
                        &DecodingKey::from_secret(jwt_secret.as_bytes()),
                        &Validation::default(),
                    )
                    .ok()?;

                    return Some(token_data.claims.sub);
                }
            }
        }
        None
    });

    timeout.await.ok().flatten()
}

async fn handle_command(
    dispatcher: &Dispatcher,
    db: &Arc<Database>,
    user_id: UserId,
    typing_ttl_secs: i64,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::Identify { .. } => {} // Already handled

        GatewayCommand::StartTyping { conversation_id } => {
            let db = db.clone();
            let result = tokio::task::spawn_blocking(move || {
                let conv = db.conversation_for_participant(conversation_id, user_id)?;
                db.set_typing(
                    conversation_id,
                    user_id,
                    typing_ttl_secs,
                    Utc::now().timestamp_millis(),
                )?;
                Ok::<_, courier_db::CoreError>(conv.peer_of(user_id))
            })
            .await;

            match result {
                Ok(Ok(peer)) => {
                    dispatcher
                        .send_to_user(
                            peer,
                            GatewayEvent::TypingStart {
                                conversation_id,
                                user_id,
                            },
                        )
                        .await;
                }
                Ok(Err(e)) => {
                    debug!("user {} typing in conversation {} rejected: {}", user_id, conversation_id, e);
                }
                Err(e) => warn!("typing join error: {}", e),
            }
        }

        GatewayCommand::StopTyping { conversation_id } => {
            let db = db.clone();
            let result = tokio::task::spawn_blocking(move || {
                let conv = db.conversation_for_participant(conversation_id, user_id)?;
                db.clear_typing(conversation_id, user_id)?;
                Ok::<_, courier_db::CoreError>(conv.peer_of(user_id))
            })
            .await;

            match result {
                Ok(Ok(peer)) => {
                    dispatcher
                        .send_to_user(
                            peer,
                            GatewayEvent::TypingStop {
                                conversation_id,
                                user_id,
                            },
                        )
                        .await;
                }
                Ok(Err(e)) => {
                    debug!("user {} typing-stop in conversation {} rejected: {}", user_id, conversation_id, e);
                }
                Err(e) => warn!("typing join error: {}", e),
            }
        }

        GatewayCommand::Heartbeat => {
            record_heartbeat(db, user_id).await;
        }
    }
}

async fn record_heartbeat(db: &Arc<Database>, user_id: UserId) {
    let db = db.clone();
    let result =
        tokio::task::spawn_blocking(move || db.heartbeat(user_id, Utc::now().timestamp_millis()))
            .await;
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("heartbeat for user {} failed: {}", user_id, e),
        Err(e) => warn!("heartbeat join error: {}", e),
    }
}
