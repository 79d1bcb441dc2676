//! Client core: session identity, the cart store and its consumer views.

pub mod api;
pub mod error;
pub mod local;
pub mod session;
pub mod storage;
pub mod store;
pub mod surfaces;

use std::sync::Arc;

pub use api::{CartApi, StorefrontClient};
pub use error::CartError;
pub use local::LocalCartApi;
pub use session::{Scope, SessionProvider};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageError};
pub use store::{CartSnapshot, CartStore, LoadState};
pub use surfaces::{CartPage, CartPageRow, HeaderBadge};

use crate::config::ClientConfig;

/// Builds an HTTP-backed cart store with session state persisted per `config`.
pub fn connect(config: &ClientConfig) -> Result<CartStore<StorefrontClient>, CartError> {
    let storage: Arc<dyn KeyValueStorage> = match config.state_file() {
        Some(path) => Arc::new(FileStorage::new(path)),
        None => Arc::new(MemoryStorage::new()),
    };
    let session = Arc::new(SessionProvider::new(storage));
    Ok(CartStore::new(StorefrontClient::new(config, session)?))
}
