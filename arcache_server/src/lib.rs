pub mod client;
pub mod config;
pub mod dispatch;
pub mod handle;
pub mod server;
pub mod snapshot;
pub mod wire;

pub use client::Client;
pub use config::ServerConfig;
pub use dispatch::{Dispatcher, Response};
pub use handle::{Snapshot, StoreHandle};
pub use server::Server;
pub use wire::{RemoteError, Request, Status};
