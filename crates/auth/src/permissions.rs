use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Modeled as opaque strings (e.g. "pricing.adjust"). The wildcard `"*"`
/// grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub const CATALOG_READ: Permission = Permission(Cow::Borrowed("catalog.read"));
    pub const CATALOG_WRITE: Permission = Permission(Cow::Borrowed("catalog.write"));

    pub const PRICING_READ: Permission = Permission(Cow::Borrowed("pricing.read"));
    pub const PRICING_ADJUST: Permission = Permission(Cow::Borrowed("pricing.adjust"));

    pub const PROTECTION_READ: Permission = Permission(Cow::Borrowed("protection.read"));
    pub const PROTECTION_WRITE: Permission = Permission(Cow::Borrowed("protection.write"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
