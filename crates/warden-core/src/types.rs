// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core identity and authorization types.
//!
//! The role graph is modelled as plain records plus two association tables
//! ([`UserRole`] and [`RolePermission`]). Nothing here holds references into
//! other records; expansion happens explicitly in the resolver.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Identifiers
// =============================================================================

/// An opaque identifier for a principal.
///
/// # Examples
///
/// ```
/// use warden_core::types::PrincipalId;
///
/// let id = PrincipalId::new("u-1024");
/// assert_eq!(id.as_str(), "u-1024");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Creates a new principal ID.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the ID and returns the inner string.
    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PrincipalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PrincipalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for PrincipalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of a role as stored by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(String);

impl RoleId {
    /// Creates a new role ID.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RoleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// Records
// =============================================================================

/// An identity that requests act as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Opaque identifier (token subject).
    pub id: PrincipalId,
    /// Stable, human-facing handle.
    pub handle: String,
    /// Disabled principals cannot refresh tokens.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Principal {
    /// Creates an active principal.
    pub fn new(id: impl Into<PrincipalId>, handle: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handle: handle.into(),
            active: true,
        }
    }

    /// Marks the principal inactive.
    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }
}

/// A named bundle of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Directory identifier.
    pub id: RoleId,
    /// Unique role name; this is what token role snapshots carry.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

impl Role {
    /// Creates a role without a description.
    pub fn new(id: impl Into<RoleId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// An atomic authorization unit, named like `resource:action`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

impl Permission {
    /// Parses a permission name.
    ///
    /// Names are non-empty segments of `[A-Za-z0-9_*-]` separated by `:` or
    /// `.`, with at least one separator.
    ///
    /// ```
    /// use warden_core::types::Permission;
    ///
    /// assert!(Permission::parse("device:read").is_some());
    /// assert!(Permission::parse("billing.invoice:write").is_some());
    /// assert!(Permission::parse("admin").is_none());
    /// assert!(Permission::parse("device::read").is_none());
    /// ```
    pub fn parse(name: &str) -> Option<Self> {
        if is_valid_permission_name(name) {
            Some(Self {
                name: name.to_string(),
                description: None,
            })
        } else {
            None
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the permission name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn is_valid_permission_name(name: &str) -> bool {
    if !name.contains([':', '.']) {
        return false;
    }
    name.split([':', '.']).all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '*'))
    })
}

// =============================================================================
// Associations
// =============================================================================

/// Principal ↔ role assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRole {
    /// Assigned principal.
    pub principal_id: PrincipalId,
    /// Assigned role.
    pub role_id: RoleId,
}

/// Role ↔ permission grant, keyed by permission name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RolePermission {
    /// Granting role.
    pub role_id: RoleId,
    /// Granted permission name.
    pub permission: String,
}

// =============================================================================
// PermissionSet
// =============================================================================

/// The effective set of permission names for a principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    names: HashSet<String>,
}

impl PermissionSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a permission name.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    /// Returns `true` if the set grants `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Returns `true` if every name is granted.
    pub fn contains_all<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> bool {
        names.into_iter().all(|n| self.contains(n))
    }

    /// Unions another set into this one.
    pub fn extend(&mut self, other: impl IntoIterator<Item = String>) {
        self.names.extend(other);
    }

    /// Number of distinct permissions.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if nothing is granted.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates over permission names in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Returns the names sorted, for stable output.
    pub fn sorted(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.iter().collect();
        names.sort_unstable();
        names
    }
}

impl FromIterator<String> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<&'a str> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(str::to_string).collect()
    }
}
