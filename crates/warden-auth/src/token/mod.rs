// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Signed session tokens.

pub mod claims;
pub mod service;

pub use claims::{TokenClaims, TokenKind};
pub use service::{IssuedToken, TokenPair, TokenService, TokenServiceBuilder};
