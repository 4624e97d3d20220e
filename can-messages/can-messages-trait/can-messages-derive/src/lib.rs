use darling::FromDeriveInput;
use proc_macro::{self, TokenStream};
use quote::quote;
use syn::{DeriveInput, Expr, Ident, Item, parse_macro_input};

/// Classic CAN data field size.
const MAX_PAYLOAD: usize = 8;

#[derive(FromDeriveInput)]
#[darling(attributes(can), supports(struct_named, struct_tuple))]
struct Can {
    ident: Ident,
    slot: Expr,
}

#[proc_macro_derive(CanMessage, attributes(can))]
pub fn derive(input: TokenStream) -> TokenStream {
    let input: DeriveInput = parse_macro_input!(input);

    let Can { ident, slot } = match Can::from_derive_input(&input) {
        Ok(can) => can,
        Err(e) => return e.write_errors().into(),
    };

    let output = quote! {
        #[automatically_derived]
        impl ::can_messages_trait::CanMessage for #ident {
            const SLOT: u16 = (#slot) as u16;
        }

        const _: () = ::core::assert!(
            ::core::mem::size_of::<#ident>() <= #MAX_PAYLOAD,
            "CAN payload longer than 8 bytes",
        );
    };
    output.into()
}

/// Turn a plain struct into a fixed-layout CAN payload answering at `slot`.
///
/// Fields must be byte-aligned, multi-byte values use the zerocopy
/// byte-order wrappers.
#[proc_macro_attribute]
pub fn can_message(attr: TokenStream, item: TokenStream) -> TokenStream {
    let slot: Expr = parse_macro_input!(attr);
    let item: Item = parse_macro_input!(item);

    if !matches!(item, Item::Struct(_)) {
        return syn::Error::new_spanned(item, "#[can_message] applies to structs only")
            .to_compile_error()
            .into();
    }

    let output = quote! {
        #[repr(C)]
        #[derive(Debug, TryFromBytes, IntoBytes, Immutable, KnownLayout, Unaligned, Clone, PartialEq, Eq, CanMessage)]
        #[can(slot = #slot)]
        #item
    };
    output.into()
}
