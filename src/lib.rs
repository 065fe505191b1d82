//! storefront-session: authenticated session and token lifecycle for the
//! storefront API.
//!
//! Sign in with one of three flows (password, phone OTP, Google), keep the
//! resulting token pair on disk, renew it before it expires, and send
//! protected requests that recover from a single 401 by refreshing once.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use storefront_session::prelude::*;
//!
//! # async fn example() -> storefront_session::error::Result<()> {
//! let config = SessionConfig::from_env()?;
//! let store = Arc::new(FileTokenStore::new(TokenStoreConfig::new(config.store_dir.clone())));
//! let session = config.build_manager(store)?;
//!
//! session.establish(Proof::otp("+15550100", "123456")).await?;
//! let client = config.build_client(session);
//! let cart = client.get("/cart").await?;
//! println!("{}", cart.status());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod session;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
