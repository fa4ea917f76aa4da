// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Permission resolution and caching.

pub mod cache;
pub mod flight;
pub mod resolver;

pub use cache::PermissionCache;
pub use flight::{Flight, FlightFollower, FlightLeader, SingleFlight};
pub use resolver::PermissionResolver;
