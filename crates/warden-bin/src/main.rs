// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Warden command-line entry point.

use warden_bin::{commands, error::report_error_and_exit, init_logging, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    init_logging(cli.effective_log_level(), cli.log_format);

    if let Err(err) = commands::execute(cli).await {
        report_error_and_exit(err);
    }
}
