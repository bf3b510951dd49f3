pub mod actors;
pub mod admin;
pub mod api;
pub mod catalog;
pub mod collections;
pub mod config;
pub mod error;
pub mod models;
pub mod profile;
pub mod session;
pub mod video;
pub mod watch;

pub use api::{HttpLacornApi, LacornApi, RequestAuth};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use session::{FileTokenStore, MemoryTokenStore, Session, TokenStore};
