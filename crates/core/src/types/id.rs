//! Newtype names for type-safe ERP document references.
//!
//! The ERP identifies every document by a server-assigned string name
//! (e.g. `SAL-QTN-2026-00042`). Use the `define_name!` macro to create
//! wrappers that prevent mixing names of different document types.

/// Macro to define a type-safe document name wrapper.
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
/// # use tradedesk_core::define_name;
/// define_name!(InvoiceName);
/// define_name!(CustomerName);
///
/// let invoice = InvoiceName::new("ACC-SINV-0001");
/// let customer = CustomerName::new("ACME Corp");
///
/// // These are different types, so this won't compile:
/// // let _: InvoiceName = customer;
/// assert_eq!(invoice.as_str(), "ACC-SINV-0001");
/// ```
#[macro_export]
macro_rules! define_name {
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
            /// Create a new name from anything string-like.
            #[must_use]
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            /// Borrow the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the inner string.
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
            fn from(name: String) -> Self {
                Self(name)
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self(name.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Quotation document (the cart).
define_name!(QuotationName);
// Quotation child row.
define_name!(LineName);
define_name!(ItemCode);
define_name!(WarehouseName);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_raw_name() {
        let name = QuotationName::new("SAL-QTN-2026-00042");
        assert_eq!(name.to_string(), "SAL-QTN-2026-00042");
    }

    #[test]
    fn test_serde_transparent() {
        let code = ItemCode::from("WIDGET-10");
        let json = serde_json::to_string(&code).unwrap_or_default();
        assert_eq!(json, "\"WIDGET-10\"");
    }

    #[test]
    fn test_ordering_follows_string() {
        let a = LineName::new("a1");
        let b = LineName::new("b1");
        assert!(a < b);
    }
}
