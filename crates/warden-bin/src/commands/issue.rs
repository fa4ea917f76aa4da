// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `issue` command.

use chrono::DateTime;
use tracing::info;
use warden_auth::TokenKind;
use warden_core::Principal;

use crate::cli::{Cli, IssueArgs, OutputFormat};
use crate::error::BinResult;

/// Executes the `issue` command to sign a token.
pub fn issue(cli: &Cli, args: IssueArgs) -> BinResult<()> {
    let config = super::load(cli)?;
    let service = super::token_service(&config, None)?;

    let handle = args.handle.clone().unwrap_or_else(|| args.subject.clone());
    let principal = Principal::new(args.subject.as_str(), handle);
    let kind: TokenKind = args.kind.into();
    let issued = service.issue(&principal, args.roles.clone(), kind)?;

    info!(principal = %principal.id, kind = %kind, jti = %issued.claims.jti, "Token issued from CLI");

    match args.format {
        OutputFormat::Text => {
            println!("{}", issued.token);
            eprintln!();
            eprintln!("  Kind:    {}", issued.claims.kind);
            eprintln!("  Subject: {}", issued.claims.sub);
            eprintln!("  Token ID: {}", issued.claims.jti);
            if let Some(expires) = DateTime::from_timestamp(issued.claims.exp, 0) {
                eprintln!("  Expires: {}", expires.to_rfc3339());
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&issued)?);
        }
    }

    Ok(())
}
