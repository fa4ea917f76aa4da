// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.

mod inspect;
mod issue;
mod validate;
mod version;

pub use inspect::inspect;
pub use issue::issue;
pub use validate::validate;
pub use version::version;

use std::sync::Arc;

use tracing::{debug, info};
use warden_auth::TokenService;
use warden_config::WardenConfig;
use warden_core::{MemoryDirectory, MemoryKvStore, RedisKvStore, SharedKv};

use crate::cli::{Cli, Commands};
use crate::error::{BinError, BinResult};

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.command.clone() {
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Issue(args) => issue::issue(&cli, args),
        Commands::Inspect(args) => inspect::inspect(&cli, args).await,
        Commands::Version => version::version(&cli),
    }
}

/// Loads the configuration named on the command line.
pub(crate) fn load(cli: &Cli) -> BinResult<WardenConfig> {
    if !cli.config.exists() {
        return Err(BinError::config(format!(
            "Configuration file not found: {}",
            cli.config.display()
        )));
    }
    let config = warden_config::load_config(&cli.config)
        .map_err(|e| BinError::from(e).with_context("Failed to load configuration"))?;
    debug!(path = %cli.config.display(), "Configuration loaded");
    Ok(config)
}

/// Connects the configured key-value store, if any.
pub(crate) async fn connect_kv(config: &WardenConfig) -> BinResult<Option<SharedKv>> {
    match &config.store.redis_url {
        Some(url) => {
            let store = RedisKvStore::connect(url, config.store.key_prefix.clone())
                .await
                .map_err(|e| BinError::from(e).with_context("Failed to connect to Redis"))?;
            info!("Connected to shared key-value store");
            Ok(Some(Arc::new(store)))
        }
        None => Ok(None),
    }
}

/// Builds a token service for offline use.
///
/// The directory is empty; commands here never refresh. When the config
/// asks for rotation or revocation without a shared store, an in-memory
/// store stands in.
pub(crate) fn token_service(config: &WardenConfig, kv: Option<SharedKv>) -> BinResult<TokenService> {
    let kv = match kv {
        Some(kv) => Some(kv),
        None if config.token.needs_kv_store() => Some(Arc::new(MemoryKvStore::new()) as SharedKv),
        None => None,
    };
    let mut builder =
        TokenService::builder(config.token.clone()).directory(Arc::new(MemoryDirectory::new()));
    if let Some(kv) = kv {
        builder = builder.kv_store(kv);
    }
    Ok(builder.build()?)
}
