//! Derive macros for RASCL
//!
//! # Available Macros
//!
//! - `#[derive(Endpoint)]` - Names the endpoints of an API map with a fieldless enum
//!
//! # Example
//!
//! ```ignore
//! use rascl_macros::Endpoint;
//!
//! #[derive(Endpoint, Clone, Copy, Debug, PartialEq, Eq)]
//! enum Api {
//!     GetExample,
//!     #[endpoint(rename = "putExampleV2")]
//!     PutExample,
//! }
//!
//! assert_eq!(Api::GetExample.name(), "getExample");
//! assert_eq!(Api::PutExample.name(), "putExampleV2");
//! assert_eq!(Api::ALL.len(), 2);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use proc_macro::TokenStream;
use quote::quote;
use std::collections::HashMap;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, LitStr};

/// Derive macro for endpoint enums
///
/// Generates, for a fieldless enum:
/// - `ALL` - every variant in declaration order
/// - `name()` - the endpoint name: the variant name in lowerCamelCase
/// - `from_name()` - the variant for an endpoint name
/// - `AsRef<str>` and `Display`, so a variant can key `ApiMap` registration,
///   `ApiMap::get` and `ApiState::get` directly
///
/// # Attributes
///
/// - `#[endpoint(rename = "...")]` - Use an explicit endpoint name
///
/// # Panics
///
/// This macro will produce a compile error (not a runtime panic) if:
/// - Applied to a non-enum type or an enum without variants
/// - A variant has fields
/// - Two variants map to the same endpoint name
///
/// # Example
///
/// ```ignore
/// #[derive(Endpoint, Clone, Copy, Debug)]
/// enum Treasury {
///     GetBalance,
///     ListTransfers,
/// }
///
/// let api = ApiMap::builder()
///     .endpoint(Treasury::GetBalance, get_balance)
///     .endpoint(Treasury::ListTransfers, list_transfers)
///     .build()?;
/// assert!(api.get(Treasury::GetBalance).is_some());
/// ```
#[proc_macro_derive(Endpoint, attributes(endpoint))]
pub fn derive_endpoint(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let Data::Enum(data_enum) = &input.data else {
        return syn::Error::new_spanned(input, "#[derive(Endpoint)] can only be used on enums")
            .to_compile_error()
            .into();
    };

    if data_enum.variants.is_empty() {
        return syn::Error::new_spanned(input, "#[derive(Endpoint)] needs at least one variant")
            .to_compile_error()
            .into();
    }

    let mut variants = Vec::new();
    let mut names = Vec::new();
    let mut seen = HashMap::new();

    for variant in &data_enum.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return syn::Error::new_spanned(variant, "#[derive(Endpoint)] variants cannot have fields")
                .to_compile_error()
                .into();
        }

        let endpoint_name = match rename(&variant.attrs) {
            Ok(Some(renamed)) => renamed,
            Ok(None) => lower_camel_case(&variant.ident.to_string()),
            Err(error) => return error.to_compile_error().into(),
        };

        if let Some(previous) = seen.insert(endpoint_name.clone(), &variant.ident) {
            return syn::Error::new_spanned(
                variant,
                format!("Endpoint name '{endpoint_name}' is already used by {previous}"),
            )
            .to_compile_error()
            .into();
        }

        variants.push(&variant.ident);
        names.push(endpoint_name);
    }

    let count = variants.len();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            /// Every endpoint, in declaration order
            pub const ALL: [Self; #count] = [#(Self::#variants),*];

            /// Endpoint name as registered in the API map
            #[must_use]
            pub const fn name(&self) -> &'static str {
                match self {
                    #(Self::#variants => #names,)*
                }
            }

            /// Variant for an endpoint name
            #[must_use]
            pub fn from_name(name: &str) -> ::core::option::Option<Self> {
                match name {
                    #(#names => ::core::option::Option::Some(Self::#variants),)*
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl #impl_generics ::core::convert::AsRef<str> for #name #ty_generics #where_clause {
            fn as_ref(&self) -> &str {
                self.name()
            }
        }

        impl #impl_generics ::core::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.name())
            }
        }
    };

    TokenStream::from(expanded)
}

/// Value of `#[endpoint(rename = "...")]`, if present
fn rename(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut renamed = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("endpoint")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().is_empty() {
                    return Err(meta.error("endpoint name must not be empty"));
                }
                renamed = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported endpoint attribute, expected `rename`"))
            }
        })?;
    }
    Ok(renamed)
}

/// `GetExample` → `getExample`
fn lower_camel_case(ident: &str) -> String {
    let mut chars = ident.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_lowercase().chain(chars).collect()
    })
}
