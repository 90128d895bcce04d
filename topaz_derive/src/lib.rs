use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Data, DeriveInput, Fields, GenericArgument, LitStr, PathArguments, Type, parse_macro_input,
    spanned::Spanned,
};

/// Implements `topaz::Model` from field attributes.
///
/// ```ignore
/// #[derive(Default, Model)]
/// #[model(table = "users")]
/// struct User {
///     id: i64,
///     #[prop(name = "user_name")]
///     name: String,
///     #[prop(has_one)]
///     address: Option<Address>,
///     #[prop(has_many)]
///     orders: Vec<Order>,
///     #[prop(skip)]
///     cache: Vec<u8>,
/// }
/// ```
#[proc_macro_derive(Model, attributes(model, prop))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_model(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct ModelOptions {
    table: Option<String>,
    no_constructor: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum RelationKind {
    HasOne,
    HasMany,
    BelongsTo,
}

#[derive(Default)]
struct PropOptions {
    name: Option<String>,
    relation: Option<RelationKind>,
    by_key: Option<String>,
    read_only: bool,
    skip: bool,
}

fn expand_model(input: DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let options = parse_model_options(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new(
                    input.span(),
                    "#[derive(Model)] requires a struct with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "#[derive(Model)] can only be used on structs",
            ));
        }
    };

    let mut registrations = Vec::new();
    for field in fields {
        let Some(field_ident) = &field.ident else {
            continue;
        };
        let prop = parse_prop_options(&field.attrs)?;
        if prop.skip {
            continue;
        }

        let name = field_ident.to_string();
        let name = name.strip_prefix("r#").unwrap_or(&name).to_string();
        let call = match prop.relation {
            None => {
                if prop.by_key.is_some() {
                    return Err(syn::Error::new(
                        field.span(),
                        "by_key only applies to has_one, has_many or belongs_to properties",
                    ));
                }
                if prop.read_only {
                    quote!(model.column_ro(#name, |m| &m.#field_ident))
                } else {
                    quote!(model.column(#name, |m| &m.#field_ident, |m, v| m.#field_ident = v))
                }
            }
            Some(kind) => relation_call(&name, field_ident, &field.ty, kind, prop.read_only)?,
        };

        let named = prop.name.as_ref().map(|target| quote!(.named(#target)));
        let by_key = prop.by_key.as_ref().map(|key| quote!(.by_key(#key)));
        registrations.push(quote! {
            #call #named #by_key;
        });
    }

    let constructor = if options.no_constructor {
        quote!()
    } else {
        quote!(model.constructor(<Self as ::core::default::Default>::default);)
    };
    let table = options.table.as_ref().map(|table| quote!(model.table(#table);));

    Ok(quote! {
        impl #impl_generics ::topaz::Model for #ident #ty_generics #where_clause {
            fn describe(model: &mut ::topaz::ModelDescriptor<Self>) {
                #constructor
                #table
                #(#registrations)*
            }
        }
    })
}

fn relation_call(
    name: &str,
    field: &syn::Ident,
    ty: &Type,
    kind: RelationKind,
    read_only: bool,
) -> syn::Result<TokenStream2> {
    let (get, set) = match kind {
        RelationKind::HasMany => {
            if wrapped_type(ty, "Vec").is_none() {
                return Err(syn::Error::new(
                    ty.span(),
                    "#[prop(has_many)] requires a Vec<_> field",
                ));
            }
            (
                quote!(|m| m.#field.last_mut()),
                quote!(|m, v| m.#field.push(v)),
            )
        }
        RelationKind::HasOne | RelationKind::BelongsTo => {
            if wrapped_type(ty, "Option").is_some() {
                (
                    quote!(|m| m.#field.as_mut()),
                    quote!(|m, v| m.#field = ::core::option::Option::Some(v)),
                )
            } else {
                (
                    quote!(|m| ::core::option::Option::Some(&mut m.#field)),
                    quote!(|m, v| m.#field = v),
                )
            }
        }
    };

    if read_only {
        let relation = match kind {
            RelationKind::HasOne => quote!(::topaz::model::Relation::HasOne),
            RelationKind::HasMany => quote!(::topaz::model::Relation::HasMany),
            RelationKind::BelongsTo => quote!(::topaz::model::Relation::BelongsTo),
        };
        return Ok(quote!(model.relation(#name, #relation, #get, ::core::option::Option::None)));
    }

    Ok(match kind {
        RelationKind::HasOne => quote!(model.has_one(#name, #get, #set)),
        RelationKind::HasMany => quote!(model.has_many(#name, #get, #set)),
        RelationKind::BelongsTo => quote!(model.belongs_to(#name, #get, #set)),
    })
}

/// Inner type of `Wrapper<T>` when `ty` is spelled that way.
fn wrapped_type<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn parse_model_options(attrs: &[syn::Attribute]) -> syn::Result<ModelOptions> {
    let mut options = ModelOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("model") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                options.table = Some(lit.value());
                return Ok(());
            }

            if meta.path.is_ident("no_constructor") {
                options.no_constructor = true;
                return Ok(());
            }

            Err(meta.error(
                "Unsupported model attribute. Supported: table = \"...\", no_constructor",
            ))
        })?;
    }

    Ok(options)
}

fn parse_prop_options(attrs: &[syn::Attribute]) -> syn::Result<PropOptions> {
    let mut options = PropOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("prop") {
            continue;
        }

        let mut set_relation = |kind: RelationKind, span: proc_macro2::Span| {
            if options.relation.replace(kind).is_some_and(|prev| prev != kind) {
                return Err(syn::Error::new(span, "A property can only have one relation kind"));
            }
            Ok(())
        };

        let mut name = None;
        let mut by_key = None;
        let mut read_only = false;
        let mut skip = false;

        attr.parse_nested_meta(|meta| {
            let span = meta.path.span();
            if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                name = Some(lit.value());
                return Ok(());
            }

            if meta.path.is_ident("by_key") {
                let lit: LitStr = meta.value()?.parse()?;
                by_key = Some(lit.value());
                return Ok(());
            }

            if meta.path.is_ident("has_one") || meta.path.is_ident("table") {
                return set_relation(RelationKind::HasOne, span);
            }

            if meta.path.is_ident("has_many") {
                return set_relation(RelationKind::HasMany, span);
            }

            if meta.path.is_ident("belongs_to") {
                return set_relation(RelationKind::BelongsTo, span);
            }

            if meta.path.is_ident("read_only") {
                read_only = true;
                return Ok(());
            }

            if meta.path.is_ident("skip") {
                skip = true;
                return Ok(());
            }

            Err(meta.error(
                "Unsupported #[prop(...)] option. Supported: name = \"...\", table, has_one, has_many, belongs_to, by_key = \"...\", read_only, skip",
            ))
        })?;

        if name.is_some() {
            options.name = name;
        }
        if by_key.is_some() {
            options.by_key = by_key;
        }
        options.read_only |= read_only;
        options.skip |= skip;
    }

    if options.skip && (options.name.is_some() || options.relation.is_some()) {
        return Err(syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[prop(skip)] cannot be combined with other options",
        ));
    }

    Ok(options)
}
