pub mod client;
pub mod config;
pub mod error;
pub mod manager;
pub mod provider;
pub mod store;
pub mod token;

pub use config::TdConfig;
pub use error::TdAuthError;
pub use manager::{RequestMode, TokenManager, TokenManagerBuilder};
pub use provider::{AuthorizationCodeProvider, BrowserCodeProvider, StaticCodeProvider};
pub use store::{FileStore, MemoryStore, RefreshRecord, RefreshTokenStore};
pub use token::TokenState;
