//! Pages the worker controls or can open.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::{Result, SwError};

/// Client type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientType {
    #[default]
    Window,
    Worker,
    SharedWorker,
}

/// A client (page or worker) of this origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: String,
    pub url: Url,
    pub client_type: ClientType,
    pub focused: bool,
    /// Whether this worker controls the client.
    pub controlled: bool,
}

/// Access to the host's client list.
#[async_trait]
pub trait ClientHost: Send + Sync {
    /// Window clients, in the host's order. Uncontrolled ones are included
    /// only when asked for.
    async fn match_all(&self, include_uncontrolled: bool) -> Result<Vec<Client>>;

    /// Focus a window client.
    async fn focus(&self, id: &str) -> Result<Client>;

    /// Open a new window at `url`.
    async fn open_window(&self, url: &Url) -> Result<Client>;

    /// Take control of every client. Returns how many changed controller.
    async fn claim(&self) -> Result<usize>;
}

/// In-memory client list.
#[derive(Debug, Default)]
pub struct MemoryClients {
    clients: RwLock<Vec<Client>>,
    next_id: AtomicU64,
}

impl MemoryClients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an uncontrolled window at `url`, as if the user had opened it.
    pub async fn add_window(&self, url: Url) -> Client {
        let client = Client {
            id: self.allocate_id(),
            url,
            client_type: ClientType::Window,
            focused: false,
            controlled: false,
        };
        self.clients.write().await.push(client.clone());
        client
    }

    /// Add an arbitrary client.
    pub async fn add(&self, client: Client) {
        self.clients.write().await.push(client);
    }

    /// Get a client by ID.
    pub async fn get(&self, id: &str) -> Option<Client> {
        self.clients
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    /// Snapshot of all clients.
    pub async fn all(&self) -> Vec<Client> {
        self.clients.read().await.clone()
    }

    fn allocate_id(&self) -> String {
        format!("client-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[async_trait]
impl ClientHost for MemoryClients {
    async fn match_all(&self, include_uncontrolled: bool) -> Result<Vec<Client>> {
        Ok(self
            .clients
            .read()
            .await
            .iter()
            .filter(|c| c.client_type == ClientType::Window)
            .filter(|c| include_uncontrolled || c.controlled)
            .cloned()
            .collect())
    }

    async fn focus(&self, id: &str) -> Result<Client> {
        let mut clients = self.clients.write().await;
        let index = clients
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| SwError::client(format!("no client {id}")))?;
        if clients[index].client_type != ClientType::Window {
            return Err(SwError::client("Can only focus window clients"));
        }

        for client in clients.iter_mut() {
            client.focused = false;
        }
        clients[index].focused = true;
        Ok(clients[index].clone())
    }

    async fn open_window(&self, url: &Url) -> Result<Client> {
        let client = Client {
            id: self.allocate_id(),
            url: url.clone(),
            client_type: ClientType::Window,
            focused: true,
            controlled: true,
        };

        let mut clients = self.clients.write().await;
        for other in clients.iter_mut() {
            other.focused = false;
        }
        clients.push(client.clone());
        debug!(id = %client.id, %url, "Opened window");
        Ok(client)
    }

    async fn claim(&self) -> Result<usize> {
        let mut claimed = 0;
        for client in self.clients.write().await.iter_mut() {
            if !client.controlled {
                client.controlled = true;
                claimed += 1;
            }
        }
        Ok(claimed)
    }
}
