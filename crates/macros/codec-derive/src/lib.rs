//! Derives `jam_stf_core::codec::Codec` for structs and enums. Structs encode/decode their
//! named fields in declaration order. Enums encode/decode as a tagged union: a `u8`
//! discriminant (the variant's declaration order) followed by the variant's payload, in the
//! order its fields are declared.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

#[proc_macro_derive(Codec)]
pub fn derive_codec(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Struct(data) => derive_struct(name, &data.fields),
        Data::Enum(data) => derive_enum(name, data),
        Data::Union(_) => {
            return syn::Error::new_spanned(&input, "Codec cannot be derived for unions")
                .to_compile_error()
                .into()
        }
    };

    let expanded = quote! {
        impl #impl_generics jam_stf_core::codec::Codec for #name #ty_generics #where_clause {
            #body
        }
    };
    expanded.into()
}

fn derive_struct(name: &syn::Ident, fields: &Fields) -> proc_macro2::TokenStream {
    match fields {
        Fields::Named(named) => {
            let field_idents: Vec<_> = named.named.iter().map(|f| f.ident.clone().unwrap()).collect();
            let encode_body = field_idents.iter().map(|ident| {
                quote! { jam_stf_core::codec::Codec::encode(&self.#ident, out); }
            });
            let decode_body = field_idents.iter().map(|ident| {
                quote! { #ident: jam_stf_core::codec::Codec::decode(scanner)?, }
            });
            quote! {
                fn encode(&self, out: &mut Vec<u8>) {
                    #(#encode_body)*
                }
                fn decode(scanner: &mut jam_stf_core::codec::Scanner<'_>) -> Result<Self, jam_stf_core::codec::CodecError> {
                    Ok(#name {
                        #(#decode_body)*
                    })
                }
            }
        }
        Fields::Unnamed(unnamed) => {
            let indices = 0..unnamed.unnamed.len();
            let indices2 = indices.clone();
            let encode_body = indices.map(|i| {
                let idx = syn::Index::from(i);
                quote! { jam_stf_core::codec::Codec::encode(&self.#idx, out); }
            });
            let decode_body = indices2.map(|_| {
                quote! { jam_stf_core::codec::Codec::decode(scanner)?, }
            });
            quote! {
                fn encode(&self, out: &mut Vec<u8>) {
                    #(#encode_body)*
                }
                fn decode(scanner: &mut jam_stf_core::codec::Scanner<'_>) -> Result<Self, jam_stf_core::codec::CodecError> {
                    Ok(#name(#(#decode_body)*))
                }
            }
        }
        Fields::Unit => quote! {
            fn encode(&self, _out: &mut Vec<u8>) {}
            fn decode(_scanner: &mut jam_stf_core::codec::Scanner<'_>) -> Result<Self, jam_stf_core::codec::CodecError> {
                Ok(#name)
            }
        },
    }
}

fn derive_enum(name: &syn::Ident, data: &syn::DataEnum) -> proc_macro2::TokenStream {
    let encode_arms = data.variants.iter().enumerate().map(|(tag, variant)| {
        let variant_ident = &variant.ident;
        let tag = tag as u8;
        match &variant.fields {
            Fields::Named(named) => {
                let idents: Vec<_> = named.named.iter().map(|f| f.ident.clone().unwrap()).collect();
                quote! {
                    #name::#variant_ident { #(#idents),* } => {
                        out.push(#tag);
                        #(jam_stf_core::codec::Codec::encode(#idents, out);)*
                    }
                }
            }
            Fields::Unnamed(unnamed) => {
                let idents: Vec<_> = (0..unnamed.unnamed.len())
                    .map(|i| syn::Ident::new(&format!("f{i}"), proc_macro2::Span::call_site()))
                    .collect();
                quote! {
                    #name::#variant_ident(#(#idents),*) => {
                        out.push(#tag);
                        #(jam_stf_core::codec::Codec::encode(#idents, out);)*
                    }
                }
            }
            Fields::Unit => quote! {
                #name::#variant_ident => {
                    out.push(#tag);
                }
            },
        }
    });

    let decode_arms = data.variants.iter().enumerate().map(|(tag, variant)| {
        let variant_ident = &variant.ident;
        let tag = tag as u8;
        match &variant.fields {
            Fields::Named(named) => {
                let idents: Vec<_> = named.named.iter().map(|f| f.ident.clone().unwrap()).collect();
                quote! {
                    #tag => Ok(#name::#variant_ident {
                        #(#idents: jam_stf_core::codec::Codec::decode(scanner)?,)*
                    }),
                }
            }
            Fields::Unnamed(unnamed) => {
                let decode_fields = (0..unnamed.unnamed.len()).map(|_| {
                    quote! { jam_stf_core::codec::Codec::decode(scanner)? }
                });
                quote! {
                    #tag => Ok(#name::#variant_ident(#(#decode_fields),*)),
                }
            }
            Fields::Unit => quote! {
                #tag => Ok(#name::#variant_ident),
            },
        }
    });

    quote! {
        fn encode(&self, out: &mut Vec<u8>) {
            match self {
                #(#encode_arms)*
            }
        }
        fn decode(scanner: &mut jam_stf_core::codec::Scanner<'_>) -> Result<Self, jam_stf_core::codec::CodecError> {
            let tag = scanner.read_byte()?;
            match tag {
                #(#decode_arms)*
                other => Err(jam_stf_core::codec::CodecError::InvalidFormat(format!("unknown enum tag {other}"))),
            }
        }
    }
}
