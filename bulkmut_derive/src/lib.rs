use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, parse_macro_input, spanned::Spanned};

/// Implements `bulkmut::Entity` and `bulkmut::EntityClass` for a struct with
/// named fields.
///
/// ```ignore
/// #[derive(Debug, BulkEntity)]
/// #[bulk(class = "Book", callbacks(on_create))]
/// struct Book {
///     id: Slot<i64>,
///     #[bulk(rename = "shortText")]
///     short_text: Option<String>,
///     #[bulk(skip)]
///     cache: Vec<u8>,
///     #[bulk(parent)]
///     base: Timestamps,
/// }
/// ```
#[proc_macro_derive(BulkEntity, attributes(bulk))]
pub fn derive_bulk_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_bulk_entity(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct EntityOptions {
    class: Option<String>,
    callbacks: Vec<Ident>,
}

#[derive(Default)]
struct FieldOptions {
    rename: Option<String>,
    skip: bool,
    parent: bool,
}

fn expand_bulk_entity(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            "BulkEntity does not support generic structs",
        ));
    }

    let options = parse_entity_options(&input.attrs)?;
    let class_name = options.class.unwrap_or_else(|| struct_name.to_string());

    let data_struct = match input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "BulkEntity can only be derived for structs",
            ));
        }
    };

    let named_fields = match data_struct.fields {
        Fields::Named(fields) => fields,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "BulkEntity requires named fields",
            ));
        }
    };

    let mut field_arms = Vec::<TokenStream2>::new();
    let mut seen_names = Vec::<String>::new();
    let mut parent: Option<Ident> = None;

    for field in named_fields.named {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "BulkEntity requires named fields"))?;
        let field_options = parse_field_options(&field.attrs)?;

        if field_options.parent {
            if parent.is_some() {
                return Err(syn::Error::new(
                    field.span(),
                    "Only one #[bulk(parent)] field is allowed",
                ));
            }
            parent = Some(ident);
            continue;
        }
        if field_options.skip {
            continue;
        }

        let name = field_options.rename.unwrap_or_else(|| ident.to_string());
        if seen_names.contains(&name) {
            return Err(syn::Error::new(
                field.span(),
                format!("Duplicate entity field name \"{name}\""),
            ));
        }
        seen_names.push(name.clone());

        field_arms.push(quote! {
            #name => ::std::option::Option::Some(::bulkmut::ToFieldValue::to_field_value(&self.#ident)),
        });
    }

    let field_fallback = match &parent {
        Some(parent) => quote! { ::bulkmut::Entity::field(&self.#parent, name) },
        None => quote! { ::std::option::Option::None },
    };

    let callback_fn = if options.callbacks.is_empty() && parent.is_none() {
        quote! {}
    } else {
        let callback_arms = options.callbacks.iter().map(|method| {
            let callback_name = method.to_string();
            quote! {
                #callback_name => {
                    self.#method();
                    ::std::result::Result::Ok(())
                }
            }
        });
        let callback_fallback = match &parent {
            Some(parent) => quote! { ::bulkmut::Entity::invoke_callback(&mut self.#parent, name) },
            None => quote! {
                ::std::result::Result::Err(::bulkmut::BulkError::CallbackNotFound {
                    class: #class_name.to_string(),
                    callback: name.to_string(),
                })
            },
        };

        quote! {
            fn invoke_callback(&mut self, name: &str) -> ::bulkmut::Result<()> {
                match name {
                    #(#callback_arms)*
                    _ => #callback_fallback,
                }
            }
        }
    };

    Ok(quote! {
        impl ::bulkmut::Entity for #struct_name {
            fn class_name(&self) -> &'static str {
                #class_name
            }

            fn field(&self, name: &str) -> ::std::option::Option<::bulkmut::FieldValue> {
                match name {
                    #(#field_arms)*
                    _ => #field_fallback,
                }
            }

            #callback_fn
        }

        impl ::bulkmut::EntityClass for #struct_name {
            const CLASS: &'static str = #class_name;
        }
    })
}

fn parse_entity_options(attrs: &[syn::Attribute]) -> syn::Result<EntityOptions> {
    let mut options = EntityOptions {
        class: None,
        callbacks: Vec::new(),
    };

    for attr in attrs {
        if !attr.path().is_ident("bulk") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("class") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                options.class = Some(lit.value());
                return Ok(());
            }

            if meta.path.is_ident("callbacks") {
                meta.parse_nested_meta(|callback| {
                    let ident = callback
                        .path
                        .get_ident()
                        .cloned()
                        .ok_or_else(|| callback.error("Expected a method name"))?;
                    options.callbacks.push(ident);
                    Ok(())
                })?;
                return Ok(());
            }

            Err(meta.error(
                "Unsupported #[bulk(...)] option on struct. Supported: class = \"...\", callbacks(method, ...)",
            ))
        })?;
    }

    Ok(options)
}

fn parse_field_options(attrs: &[syn::Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("bulk") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                options.skip = true;
                return Ok(());
            }

            if meta.path.is_ident("parent") {
                options.parent = true;
                return Ok(());
            }

            if meta.path.is_ident("rename") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                options.rename = Some(lit.value());
                return Ok(());
            }

            Err(meta.error(
                "Unsupported #[bulk(...)] option on field. Supported: skip, parent, rename = \"...\"",
            ))
        })?;

        if options.skip && (options.parent || options.rename.is_some()) {
            return Err(syn::Error::new(
                attr.span(),
                "#[bulk(skip)] cannot be combined with parent or rename",
            ));
        }
    }

    Ok(options)
}
