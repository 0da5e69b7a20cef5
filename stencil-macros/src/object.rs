use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, LitStr, parse_macro_input};

pub fn derive_object_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match input.data {
        syn::Data::Struct(data) => match data.fields {
            syn::Fields::Named(fields) => fields.named,
            _ => {
                return syn::Error::new_spanned(
                    name,
                    "Object only supports structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(name, "Object only supports structs")
                .to_compile_error()
                .into();
        }
    };

    let mut members = Vec::new();
    for field in &fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        match parse_field_attrs(field) {
            Ok((_, true)) => {}
            Ok((key, false)) => members.push((key, ident.clone())),
            Err(e) => return e.to_compile_error().into(),
        }
    }

    let arms = members.iter().map(|(key, ident)| {
        quote! { #key => ::std::option::Option::Some(::stencil::ToValue::to_value(&self.#ident)), }
    });
    let keys = members.iter().map(|(key, _)| key);
    let type_name = name.to_string();

    TokenStream::from(quote! {
        impl #impl_generics ::stencil::Object for #name #ty_generics #where_clause {
            fn type_name(&self) -> &'static str {
                #type_name
            }

            fn get_member(&self, name: &str) -> ::std::option::Option<::stencil::Value> {
                match name {
                    #(#arms)*
                    _ => ::std::option::Option::None,
                }
            }

            fn keys(&self) -> ::std::vec::Vec<::std::string::String> {
                ::std::vec![#(::std::string::String::from(#keys)),*]
            }
        }

        impl #impl_generics ::stencil::ToValue for #name #ty_generics #where_clause {
            fn to_value(&self) -> ::stencil::Value {
                ::stencil::Value::from_object(::std::clone::Clone::clone(self))
            }
        }
    })
}

/// Member name and skip flag from `#[object(...)]`.
fn parse_field_attrs(field: &syn::Field) -> syn::Result<(String, bool)> {
    let mut name = field
        .ident
        .as_ref()
        .map(|i| i.to_string().trim_start_matches("r#").to_string())
        .unwrap_or_default();
    let mut skip = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("object") {
            continue;
        }
        // #[object("custom_name")]
        if let Ok(s) = attr.parse_args::<LitStr>() {
            name = s.value();
            continue;
        }
        // #[object(skip)], #[object(rename = "xxx")]
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                let s: LitStr = meta.value()?.parse()?;
                name = s.value();
                Ok(())
            } else {
                Err(meta.error("expected `skip` or `rename = \"...\"`"))
            }
        })?;
    }
    Ok((name, skip))
}
