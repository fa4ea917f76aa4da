// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `validate`: Validate a configuration file
//! - `issue`: Issue a token from the configured secret
//! - `inspect`: Validate a token and show its claims
//! - `version`: Show version information

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// Warden - request-time security core
///
/// Token lifecycle, permission resolution and rate limiting for services
/// that authenticate callers with signed session tokens.
#[derive(Parser, Debug)]
#[command(
    name = "warden",
    author = "Sylvex <contact@sylvex.io>",
    version = warden_auth::VERSION,
    about = "Request-time security core",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "warden.yaml",
        env = "WARDEN_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        default_value = "warn",
        env = "WARDEN_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json, compact)
    #[arg(long, default_value = "text", env = "WARDEN_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Enable quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands for the warden CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Validate the configuration file
    ///
    /// Parses and validates the configuration without touching any store.
    Validate(ValidateArgs),

    /// Issue a token
    ///
    /// Signs a token with the configured secret. Intended for local testing
    /// and operational debugging.
    Issue(IssueArgs),

    /// Validate a token and print its claims
    Inspect(InspectArgs),

    /// Show detailed version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation (secret redacted)
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Strict mode: treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the `issue` command.
#[derive(Args, Debug, Clone)]
pub struct IssueArgs {
    /// Principal id (token subject)
    pub subject: String,

    /// Principal handle
    #[arg(long)]
    pub handle: Option<String>,

    /// Role names to embed (repeatable)
    #[arg(short, long = "role")]
    pub roles: Vec<String>,

    /// Token kind
    #[arg(short, long, default_value = "access")]
    pub kind: TokenKindArg,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `inspect` command.
#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Token to inspect
    pub token: String,

    /// Also consult the revocation list (requires a configured store)
    #[arg(long)]
    pub check_revoked: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<warden_config::LogFormat> for LogFormat {
    fn from(format: warden_config::LogFormat) -> Self {
        match format {
            warden_config::LogFormat::Text => Self::Text,
            warden_config::LogFormat::Json => Self::Json,
            warden_config::LogFormat::Compact => Self::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

/// Token kind selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TokenKindArg {
    /// Short-lived access token
    #[default]
    Access,
    /// Long-lived refresh token
    Refresh,
}

impl From<TokenKindArg> for warden_auth::TokenKind {
    fn from(kind: TokenKindArg) -> Self {
        match kind {
            TokenKindArg::Access => Self::Access,
            TokenKindArg::Refresh => Self::Refresh,
        }
    }
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective log level based on flags.
    pub fn effective_log_level(&self) -> &str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_command() {
        let cli = Cli::parse_from(["warden", "validate", "--show-config", "--strict"]);
        if let Commands::Validate(args) = cli.command {
            assert!(args.show_config);
            assert!(args.strict);
        } else {
            panic!("Expected Validate command");
        }
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["warden", "-c", "/etc/warden/warden.yaml", "version"]);
        assert_eq!(cli.config, PathBuf::from("/etc/warden/warden.yaml"));
    }

    #[test]
    fn test_issue_command() {
        let cli = Cli::parse_from([
            "warden", "issue", "u-1", "--handle", "alice", "-r", "admin", "-r", "ops", "-k",
            "refresh",
        ]);
        if let Commands::Issue(args) = cli.command {
            assert_eq!(args.subject, "u-1");
            assert_eq!(args.handle.as_deref(), Some("alice"));
            assert_eq!(args.roles, vec!["admin".to_string(), "ops".to_string()]);
            assert_eq!(args.kind, TokenKindArg::Refresh);
        } else {
            panic!("Expected Issue command");
        }
    }

    #[test]
    fn test_inspect_command() {
        let cli = Cli::parse_from(["warden", "inspect", "a.b.c", "--check-revoked", "-f", "json"]);
        if let Commands::Inspect(args) = cli.command {
            assert_eq!(args.token, "a.b.c");
            assert!(args.check_revoked);
            assert_eq!(args.format, OutputFormat::Json);
        } else {
            panic!("Expected Inspect command");
        }
    }

    #[test]
    fn test_quiet_and_verbose() {
        let cli = Cli::parse_from(["warden", "-q", "version"]);
        assert_eq!(cli.effective_log_level(), "error");

        let cli = Cli::parse_from(["warden", "-v", "version"]);
        assert_eq!(cli.effective_log_level(), "debug");
    }
}
