// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `inspect` command.

use chrono::Utc;
use warden_core::CallContext;

use crate::cli::{Cli, InspectArgs, OutputFormat};
use crate::error::{BinError, BinResult};

/// Executes the `inspect` command to validate a token and show its claims.
///
/// A rejected token is reported with its internal failure kind, which the
/// gate never reveals to clients.
pub async fn inspect(cli: &Cli, args: InspectArgs) -> BinResult<()> {
    let config = super::load(cli)?;

    let kv = if args.check_revoked {
        if !config.token.revocation_enabled {
            return Err(BinError::config(
                "--check-revoked requires token.revocation_enabled",
            ));
        }
        let kv = super::connect_kv(&config).await?;
        if kv.is_none() {
            return Err(BinError::config("--check-revoked requires store.redis_url"));
        }
        kv
    } else {
        None
    };
    let service = super::token_service(&config, kv)?;

    let claims = match service.validate(args.token.trim()) {
        Ok(claims) => claims,
        Err(err) => {
            if args.format == OutputFormat::Json {
                let output = serde_json::json!({
                    "valid": false,
                    "kind": err.kind().as_str(),
                    "reason": err.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            return Err(err.into());
        }
    };

    let revoked = if args.check_revoked {
        Some(service.is_revoked(&CallContext::new(), &claims.jti).await?)
    } else {
        None
    };
    let remaining = claims.remaining_secs(Utc::now().timestamp());

    match args.format {
        OutputFormat::Text => {
            println!("✓ Token is valid");
            println!();
            println!("  Kind:      {}", claims.kind);
            println!("  Subject:   {}", claims.sub);
            println!("  Handle:    {}", claims.handle);
            println!("  Roles:     {}", claims.roles.join(", "));
            println!("  Issuer:    {}", claims.iss);
            println!("  Token ID:  {}", claims.jti);
            println!("  Remaining: {}s", remaining);
            if let Some(revoked) = revoked {
                println!("  Revoked:   {}", if revoked { "yes" } else { "no" });
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "claims": claims,
                "remaining_secs": remaining,
                "revoked": revoked,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
