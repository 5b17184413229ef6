//! Newtype IDs for type-safe entity references.
//!
//! Every table keys its rows by a UUID. The `define_id!` macro wraps that UUID
//! in a distinct type per entity so a `ProductId` can never be passed where an
//! `OrderId` is expected.

pub use uuid::Uuid;

/// Macro to define a type-safe UUID wrapper.
///
/// Creates a newtype wrapper around [`Uuid`] with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `new()`, `generate()`, `as_uuid()`
/// - `Display`, `FromStr`, `From<Uuid>` and `Into<Uuid>`
/// - `sqlx` `Type`, `Encode`, and `Decode` implementations (with `postgres` feature)
///
/// # Example
///
/// ```rust
/// # use warung_core::define_id;
/// define_id!(WidgetId);
/// define_id!(GadgetId);
///
/// let widget = WidgetId::generate();
/// let parsed: WidgetId = widget.to_string().parse().unwrap();
/// assert_eq!(widget, parsed);
///
/// // These are different types, so this won't compile:
/// // let _: GadgetId = widget;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name($crate::Uuid);

        impl $name {
            /// Wrap an existing UUID.
            #[must_use]
            pub const fn new(id: $crate::Uuid) -> Self {
                Self(id)
            }

            /// Generate a fresh random (v4) ID.
            #[must_use]
            pub fn generate() -> Self {
                Self($crate::Uuid::new_v4())
            }

            /// Get the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> $crate::Uuid {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::types::id::IdParseError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                $crate::Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| $crate::types::id::IdParseError(s.to_owned()))
            }
        }

        impl From<$crate::Uuid> for $name {
            fn from(id: $crate::Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for $crate::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <$crate::Uuid as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <$crate::Uuid as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let id = <$crate::Uuid as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(id))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <$crate::Uuid as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

/// Error returned when a string is not a valid entity ID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid id: {0}")]
pub struct IdParseError(pub String);

define_id!(UserId);
define_id!(AddressId);
define_id!(CategoryId);
define_id!(ProductId);
define_id!(CartItemId);
define_id!(OrderId);
define_id!(OrderItemId);
define_id!(ReviewId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let id = ProductId::generate();
        let parsed: ProductId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let raw = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        let parsed: OrderId = format!("  {raw} ").parse().unwrap();
        assert_eq!(parsed.to_string(), raw);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<UserId>().unwrap_err();
        assert_eq!(err.to_string(), "invalid id: not-a-uuid");
    }

    #[test]
    fn test_serde_is_transparent() {
        let raw = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let id = CategoryId::new(raw);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"67e55044-10b1-426f-9247-bb680e5fe0c8\"");
    }
}
