//! Newtype IDs for type-safe entity references.
//!
//! Every id in this system is an opaque string: user ids are issued by the auth
//! provider, order ids are push keys assigned by the document store, and
//! product ids are catalog slugs. Use the `define_id!` macro to create wrappers
//! that prevent accidentally mixing them.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use hapus_core::define_id;
/// define_id!(UserId);
/// define_id!(OrderId);
///
/// let user_id = UserId::new("uid-1");
/// let order_id = OrderId::new("-Nabc");
///
/// // These are different types, so this won't compile:
/// // let _: UserId = order_id;
/// assert_eq!(user_id.as_str(), "uid-1");
/// assert_eq!(order_id.to_string(), "-Nabc");
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the underlying string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(UserId);
define_id!(OrderId);
define_id!(ProductId);

impl OrderId {
    /// Short, human-friendly reference shown to customers and staff.
    ///
    /// The last six characters of the push key, upper-cased.
    #[must_use]
    pub fn short_ref(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        let start = chars.len().saturating_sub(6);
        chars
            .get(start..)
            .unwrap_or_default()
            .iter()
            .collect::<String>()
            .to_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_ref_takes_last_six_upper() {
        let id = OrderId::new("-NxyzAbCdEf");
        assert_eq!(id.short_ref(), "ABCDEF");
    }

    #[test]
    fn test_short_ref_short_id() {
        assert_eq!(OrderId::new("ab").short_ref(), "AB");
    }

    #[test]
    fn test_ids_are_case_sensitive() {
        assert_ne!(UserId::new("uid-A"), UserId::new("uid-a"));
    }

    #[test]
    fn test_serde_transparent() {
        let id = ProductId::new("royal-hapus");
        assert_eq!(
            serde_json::to_string(&id).ok().as_deref(),
            Some("\"royal-hapus\"")
        );
    }
}
