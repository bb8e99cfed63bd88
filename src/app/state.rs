//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{ConnectionDirectory, RoomRegistry};
use crate::ws::router::MessageRouter;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rooms: Arc<RoomRegistry>,
    pub connections: Arc<ConnectionDirectory>,
    pub router: MessageRouter,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Room registry and connection directory are shared by every socket
        let rooms = Arc::new(RoomRegistry::new(config.rules));
        let connections = Arc::new(ConnectionDirectory::new());

        let router = MessageRouter::new(rooms.clone(), connections.clone());

        Self {
            config,
            rooms,
            connections,
            router,
        }
    }
}
