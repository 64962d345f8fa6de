use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use std::collections::HashSet;
use syn::{
    Attribute, Ident, LitStr, Result, Token, braced,
    parse::{Parse, ParseStream},
    parse_macro_input,
    punctuated::Punctuated,
};

/// A named pass argument
struct PassArgSpec {
    name: Ident,
    description: LitStr,
}

/// One catalog entry
struct PassSpec {
    attrs: Vec<Attribute>,
    variant: Ident,
    option_name: LitStr,
    description: LitStr,
    args: Vec<PassArgSpec>,
}

/// The full pass_catalog input
struct PassCatalog {
    passes: Vec<PassSpec>,
}

impl Parse for PassArgSpec {
    fn parse(input: ParseStream) -> Result<Self> {
        let name: Ident = input.parse()?;
        input.parse::<Token![:]>()?;
        let description: LitStr = input.parse()?;
        Ok(PassArgSpec { name, description })
    }
}

impl Parse for PassCatalog {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut passes = Vec::new();
        let mut seen = HashSet::new();
        while !input.is_empty() {
            // Variant = "option-name": "description" [{ arg: "description", ... }];
            let attrs = input.call(Attribute::parse_outer)?;
            let variant: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            let option_name: LitStr = input.parse()?;
            if !seen.insert(option_name.value()) {
                return Err(syn::Error::new(
                    option_name.span(),
                    format!("duplicate pass option name: {}", option_name.value()),
                ));
            }
            input.parse::<Token![:]>()?;
            let description: LitStr = input.parse()?;

            let args = if input.peek(syn::token::Brace) {
                let content;
                braced!(content in input);
                let parsed: Punctuated<PassArgSpec, Token![,]> =
                    content.parse_terminated(PassArgSpec::parse, Token![,])?;
                parsed.into_iter().collect()
            } else {
                Vec::new()
            };
            input.parse::<Token![;]>()?;

            passes.push(PassSpec {
                attrs,
                variant,
                option_name,
                description,
                args,
            });
        }
        Ok(PassCatalog { passes })
    }
}

fn generate_descriptor(pass: &PassSpec) -> TokenStream2 {
    let option_name = &pass.option_name;
    let description = &pass.description;
    let args: Vec<_> = pass
        .args
        .iter()
        .map(|arg| {
            let name = arg.name.to_string();
            let description = &arg.description;
            quote! { PassArg { name: #name, description: #description } }
        })
        .collect();
    quote! {
        OptimizerPass {
            option_name: #option_name,
            description: #description,
            args: &[#(#args),*],
        }
    }
}

/// Declares the optimizer's pass catalog.
///
/// Generates a `PassId` enum with one variant per entry, the
/// `PASS_CATALOG` table of `OptimizerPass` descriptors in declaration
/// order, and `is_pass_option_name`. `OptimizerPass` and `PassArg` must be
/// in scope at the call site.
#[proc_macro]
pub fn pass_catalog(input: TokenStream) -> TokenStream {
    let catalog = parse_macro_input!(input as PassCatalog);
    let count = catalog.passes.len();

    let attrs: Vec<_> = catalog.passes.iter().map(|p| &p.attrs).collect();
    let variants: Vec<_> = catalog.passes.iter().map(|p| &p.variant).collect();
    let option_names: Vec<_> = catalog.passes.iter().map(|p| &p.option_name).collect();
    let indices: Vec<_> = (0..count).collect();
    let descriptors: Vec<_> = catalog.passes.iter().map(generate_descriptor).collect();

    let expanded = quote! {
        /// Identifies a pass in [`PASS_CATALOG`]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum PassId {
            #(#(#attrs)* #variants),*
        }

        impl PassId {
            /// Every pass, in catalog order
            pub const ALL: [PassId; #count] = [#(PassId::#variants),*];

            /// Looks a pass up by its option name
            pub fn from_option_name(name: &str) -> Option<PassId> {
                match name {
                    #(#option_names => Some(PassId::#variants),)*
                    _ => None,
                }
            }

            /// Option name without the leading '-'
            pub fn option_name(self) -> &'static str {
                self.descriptor().option_name
            }

            /// Catalog entry for this pass
            pub fn descriptor(self) -> &'static OptimizerPass {
                match self {
                    #(PassId::#variants => &PASS_CATALOG[#indices],)*
                }
            }
        }

        /// All passes the optimizer can run
        pub static PASS_CATALOG: [OptimizerPass; #count] = [#(#descriptors),*];

        /// Returns true if `name` is the option name of a catalog pass
        pub fn is_pass_option_name(name: &str) -> bool {
            PassId::from_option_name(name).is_some()
        }
    };

    TokenStream::from(expanded)
}
