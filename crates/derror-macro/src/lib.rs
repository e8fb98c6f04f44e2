// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use darling::FromDeriveInput;
use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;
use syn::parse_macro_input;

#[derive(FromDeriveInput)]
#[darling(attributes(derror))]
struct Args {
    leaf_data: Option<syn::Path>,
}

/// Generate a `DError` implementation given a tree-structured enum
/// where only leaf nodes hold additional data.
///
/// This lets a drop reason be reported as a short list of static
/// names (plus two words of leaf data) without calling `format!()` on
/// the hot path:
/// ```ignore
/// #[derive(DError)]
/// enum RecvDropReason {
///     NoBuffers,
///     Header(Ipv6HdrError),
/// }
///
/// #[derive(DError)]
/// #[derror(leaf_data = Ipv6HdrError::data)]
/// enum Ipv6HdrError {
///     Truncated { len: usize },
///     #[leaf]
///     BadVersion(u8),
/// }
/// ```
/// Every variant name becomes a `&'static str`. Single-element tuple
/// variants are walked into unless marked `#[leaf]`. A `leaf_data`
/// function fills in the `[u64; 2]` data segment of an `ErrorBlock`.
#[proc_macro_derive(DError, attributes(derror, leaf))]
pub fn derive_derror(
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let derive_input = parse_macro_input!(input);

    let parsed_args = match Args::from_derive_input(&derive_input) {
        Ok(o) => o,
        Err(e) => return e.write_errors().into(),
    };

    let DeriveInput { ident, data, .. } = derive_input;

    let syn::Data::Enum(data) = data else {
        return syn::Error::new_spanned(
            &ident,
            "cannot autoderive `DError` for struct or union",
        )
        .to_compile_error()
        .into();
    };

    let mut name_arms: Vec<TokenStream> = vec![];
    let mut child_arms: Vec<TokenStream> = vec![];

    for pair in data.variants.into_pairs() {
        let variant = pair.into_value();
        let var_name = variant.ident;
        let name_lit = syn::LitStr::new(&var_name.to_string(), var_name.span());

        let known_leaf =
            variant.attrs.iter().any(|v| v.path().is_ident("leaf"));

        let (name_block, child_block) = match variant.fields {
            syn::Fields::Unnamed(fields) => (
                quote! { Self::#var_name(..) => #name_lit, },
                if !known_leaf && fields.unnamed.len() == 1 {
                    quote! { Self::#var_name(f) => Some(f), }
                } else {
                    quote! { Self::#var_name(..) => None, }
                },
            ),
            syn::Fields::Named(_) => (
                quote! { Self::#var_name { .. } => #name_lit, },
                quote! { Self::#var_name { .. } => None, },
            ),
            syn::Fields::Unit => (
                quote! { Self::#var_name => #name_lit, },
                quote! { Self::#var_name => None, },
            ),
        };

        name_arms.push(name_block);
        child_arms.push(child_block);
    }

    let leaf_data_impl = if let Some(data_fn) = parsed_args.leaf_data {
        quote! {
            fn leaf_data(&self, data: &mut [u64]) {
                #data_fn(self, data);
            }
        }
    } else {
        quote! {}
    };

    quote! {
        impl DError for #ident {
            fn discriminant(&self) -> &'static str {
                match self {
                    #( #name_arms )*
                }
            }

            fn child(&self) -> Option<&dyn DError> {
                match self {
                    #( #child_arms )*
                }
            }

            #leaf_data_impl
        }
    }
    .into()
}
