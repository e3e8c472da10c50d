use crate::subscription::protocol::{ChannelEventMessage, ChannelMessage, ClientMessage, ErrorMessage};
use crate::subscription::router::{ChannelPusher, SubscriberId, SubscriptionRouter};
use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Pushes channel events onto a broadcast channel shared by all connections
#[derive(Clone)]
pub struct BroadcastPusher {
    tx: broadcast::Sender<ChannelMessage>,
}

impl BroadcastPusher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelMessage> {
        self.tx.subscribe()
    }
}

impl ChannelPusher for BroadcastPusher {
    fn push(&self, route: &str, event: &str, payload: Value) {
        // No connections is fine
        let _ = self.tx.send(ChannelMessage {
            route: route.to_string(),
            event: event.to_string(),
            payload,
            timestamp: Utc::now(),
        });
    }
}

/// Manages a single WebSocket connection and the channels it attached to
pub struct ConnectionManager {
    id: SubscriberId,

    /// Routes this connection is attached to
    routes: HashSet<String>,

    router: Arc<SubscriptionRouter>,
}

impl ConnectionManager {
    pub fn new(router: Arc<SubscriptionRouter>) -> Self {
        Self {
            id: Uuid::new_v4(),
            routes: HashSet::new(),
            router,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Handle WebSocket connection lifecycle
    pub async fn handle(
        mut self,
        mut socket: WebSocket,
        mut channel_rx: broadcast::Receiver<ChannelMessage>,
    ) {
        info!(subscriber = %self.id, "WebSocket connection established");

        loop {
            tokio::select! {
                // Handle incoming client messages
                Some(msg) = socket.recv() => {
                    match msg {
                        Ok(Message::Text(text)) => {
                            if let Err(e) = self.handle_client_message(&text) {
                                warn!(subscriber = %self.id, error = %e, "Invalid client message");
                                if let Err(e) = send_json(&mut socket, &ErrorMessage::new(e.to_string())).await {
                                    error!(error = %e, "Failed to send error message");
                                    break;
                                }
                            }
                        }
                        Ok(Message::Close(_)) => {
                            info!(subscriber = %self.id, "WebSocket client disconnected");
                            break;
                        }
                        Ok(Message::Ping(data)) => {
                            if let Err(e) = socket.send(Message::Pong(data)).await {
                                error!(error = %e, "Failed to send pong");
                                break;
                            }
                        }
                        Ok(_) => {
                            // Ignore binary, pong messages
                        }
                        Err(e) => {
                            warn!(error = %e, "WebSocket error");
                            break;
                        }
                    }
                }

                // Handle channel pushes from the router
                result = channel_rx.recv() => {
                    match result {
                        Ok(msg) => {
                            if self.should_forward(&msg) {
                                if let Err(e) = send_json(&mut socket, &ChannelEventMessage::from(msg)).await {
                                    error!(error = %e, "Failed to send channel event");
                                    break;
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped = skipped, "WebSocket lagged, skipped channel events");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            error!("Channel broadcast closed");
                            break;
                        }
                    }
                }

                else => {
                    break;
                }
            }
        }

        self.detach_all();
        info!(subscriber = %self.id, "WebSocket connection closed");
    }

    /// Handle client message (subscribe/unsubscribe)
    pub fn handle_client_message(&mut self, text: &str) -> anyhow::Result<()> {
        let msg: ClientMessage = serde_json::from_str(text)?;

        match msg {
            ClientMessage::Subscribe { route } => {
                info!(subscriber = %self.id, route = %route, "Client subscribed");
                self.router.attach(&route, self.id);
                self.routes.insert(route);
            }
            ClientMessage::Unsubscribe { route } => {
                info!(subscriber = %self.id, route = %route, "Client unsubscribed");
                self.router.detach(&route, self.id);
                self.routes.remove(&route);
            }
        }

        Ok(())
    }

    /// Only pushes on attached routes reach this connection
    pub fn should_forward(&self, msg: &ChannelMessage) -> bool {
        self.routes.contains(&msg.route)
    }

    /// Release every channel this connection held
    pub fn detach_all(&mut self) {
        for route in self.routes.drain() {
            self.router.detach(&route, self.id);
        }
    }
}

async fn send_json<T: serde::Serialize>(socket: &mut WebSocket, msg: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string(msg)?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}
