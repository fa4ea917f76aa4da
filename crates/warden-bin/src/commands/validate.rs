// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use warden_config::{FailurePolicy, RateLimitBackend, WardenConfig};

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config = super::load(cli)?;
    let warnings = collect_warnings(&config);

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", cli.config.display());
            println!();
            println!("Summary:");
            println!("  Issuer:          {}", config.token.issuer);
            println!("  Algorithm:       {}", config.token.algorithm);
            println!("  Access TTL:      {}s", config.token.access_ttl_secs);
            println!("  Refresh TTL:     {}s", config.token.refresh_ttl_secs);
            println!("  Rotation:        {}", enabled(config.token.rotate_refresh_tokens));
            println!("  Revocation:      {}", enabled(config.token.revocation_enabled));
            println!("  Cache TTL:       {}s", config.permissions.cache_ttl_secs);
            println!("  Rate limiting:   {}", enabled(config.rate_limit.enabled));
            println!("  Backend:         {:?}", config.rate_limit.backend);
            println!("  Route classes:   {}", config.rate_limit.routes.len());
            println!("  Store timeout:   {}ms", config.store.timeout_ms);

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": cli.config.display().to_string(),
                "summary": {
                    "issuer": config.token.issuer,
                    "algorithm": config.token.algorithm.as_str(),
                    "access_ttl_secs": config.token.access_ttl_secs,
                    "refresh_ttl_secs": config.token.refresh_ttl_secs,
                    "rotate_refresh_tokens": config.token.rotate_refresh_tokens,
                    "revocation_enabled": config.token.revocation_enabled,
                    "rate_limit_enabled": config.rate_limit.enabled,
                    "route_classes": config.rate_limit.routes.len(),
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::config(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}

/// Settings that are valid but usually a mistake in production.
pub(crate) fn collect_warnings(config: &WardenConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.rate_limit.enabled {
        warnings.push("Rate limiting is disabled".to_string());
    }
    if config.rate_limit.enabled && config.rate_limit.source.is_none() {
        warnings.push("No per-address limit before authentication".to_string());
    }
    if config.rate_limit.backend == RateLimitBackend::Shared && config.store.redis_url.is_none() {
        warnings.push("Shared rate-limit backend without store.redis_url".to_string());
    }
    if config.rate_limit.failure_policy == Some(FailurePolicy::FailOpen) {
        warnings.push("Rate limiter admits requests when the store is down (fail_open)".to_string());
    }
    if config.permissions.failure_policy == FailurePolicy::FailOpen {
        warnings.push(
            "Permission checks are skipped when the directory is down (fail_open)".to_string(),
        );
    }
    if config.token.needs_kv_store() && config.store.redis_url.is_none() {
        warnings.push(
            "Rotation or revocation without a shared store only holds within one process"
                .to_string(),
        );
    }
    if config.token.leeway_secs > 60 {
        warnings.push(format!(
            "Clock leeway of {}s extends every token's lifetime",
            config.token.leeway_secs
        ));
    }

    warnings
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_config::TokenConfig;

    fn config() -> WardenConfig {
        WardenConfig {
            token: TokenConfig::with_secret("test-secret-key-that-is-long-enough-for-testing"),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_have_no_warnings() {
        assert!(collect_warnings(&config()).is_empty());
    }

    #[test]
    fn test_fail_open_warns() {
        let mut config = config();
        config.permissions.failure_policy = FailurePolicy::FailOpen;
        config.rate_limit.enabled = false;
        let warnings = collect_warnings(&config);
        assert_eq!(warnings.len(), 2);
    }
}
