// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use proc_macro::TokenStream;
use quote::format_ident;
use quote::quote;
use syn::DeriveInput;
use syn::Field;
use syn::FieldsNamed;
use syn::Ident;
use syn::parse_macro_input;

/// Generate a [`meshlwf::ddi::kstat::KStatProvider`] implementation
/// given a struct of named fields of type
/// [`meshlwf::ddi::kstat::KStatU64`].
///
/// ```Rust
/// #[derive(KStatProvider)]
/// struct DatapathStats {
///     rx_queued: KStatU64,
///     tx_queued: KStatU64,
/// }
/// ```
///
/// This macro generates the following code based on the struct above.
///
/// ```Rust
/// #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
/// pub struct DatapathStatsSnap {
///     pub rx_queued: u64,
///     pub tx_queued: u64,
/// }
///
/// impl KStatProvider for DatapathStats {
///     const NUM_FIELDS: u32 = 2;
///     type Snap = DatapathStatsSnap;
///
///     fn init(&mut self) -> Result<(), kstat::Error> {
///         self.rx_queued.init("rx_queued")?;
///         self.tx_queued.init("tx_queued")?;
///         Ok(())
///     }
///
///     fn new() -> Self {
///         Self {
///             rx_queued: KStatU64::new(),
///             tx_queued: KStatU64::new(),
///         }
///     }
///
///     fn snapshot(&self) -> Self::Snap { ... }
/// }
/// ````
#[proc_macro_derive(KStatProvider)]
pub fn derive_kstat_provider(input: TokenStream) -> TokenStream {
    let DeriveInput { ident, data, .. } = parse_macro_input!(input);
    let fields: Vec<Field> = match data {
        syn::Data::Struct(s) => match s.fields {
            syn::Fields::Named(FieldsNamed { named, .. }) => {
                named.into_iter().collect()
            }

            _ => {
                return syn::Error::new_spanned(
                    &ident,
                    "a KStatProvider must have named fields",
                )
                .to_compile_error()
                .into();
            }
        },

        _ => {
            return syn::Error::new_spanned(
                &ident,
                "only a struct may be a KStatProvider",
            )
            .to_compile_error()
            .into();
        }
    };

    let num_fields = fields.len() as u32;
    let fields_ident: Vec<Ident> =
        fields.iter().filter_map(|f| f.ident.clone()).collect();
    let ident_snap = format_ident!("{}Snap", ident);

    let output = quote! {
        #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
        pub struct #ident_snap {
            #( pub #fields_ident: u64, )*
        }

        impl ::meshlwf::ddi::kstat::KStatProvider for #ident {
            const NUM_FIELDS: u32 = #num_fields;
            type Snap = #ident_snap;

            fn init(
                &mut self
            ) -> core::result::Result<(), ::meshlwf::ddi::kstat::Error> {
                #( self.#fields_ident.init(stringify!(#fields_ident))?; )*
                Ok(())
            }

            fn new() -> Self {
                use ::meshlwf::ddi::kstat::KStatU64;

                Self {
                    #( #fields_ident: KStatU64::new(), )*
                }
            }

            fn snapshot(&self) -> Self::Snap {
                #ident_snap {
                    #( #fields_ident: self.#fields_ident.val(), )*
                }
            }
        }
    };

    output.into()
}
