//! Newtype wrappers for string identifiers, providing compile-time type safety.
//!
//! All newtypes serialize/deserialize as plain strings so they drop straight
//! into the JSON the API server speaks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Namespace used when an object does not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Name of a namespace.
    NamespaceName
);

string_newtype!(
    /// Name of an object, unique within its namespace and kind.
    ObjectName
);

string_newtype!(
    /// Opaque server-assigned token marking a point in an object's change history.
    ///
    /// A watch starts *after* this version, so history before it is not replayed.
    ResourceVersion
);

/// Identifier of a namespaced object: immutable for the object's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub namespace: NamespaceName,
    pub name: ObjectName,
}

impl ResourceRef {
    pub fn new(namespace: impl Into<NamespaceName>, name: impl Into<ObjectName>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_version_serializes_as_plain_string() {
        let rv = ResourceVersion::new("12345");
        let json = serde_json::to_string(&rv).unwrap();
        assert_eq!(json, "\"12345\"");
        let back: ResourceVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rv);
    }

    #[test]
    fn empty_resource_version_derefs_to_empty_str() {
        let rv = ResourceVersion::default();
        assert!(rv.is_empty());
    }

    #[test]
    fn resource_ref_display() {
        let r = ResourceRef::new("kube-system", "dns-0");
        assert_eq!(r.to_string(), "kube-system/dns-0");
        assert_eq!(r.name, "dns-0");
    }
}
