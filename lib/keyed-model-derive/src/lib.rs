use proc_macro::TokenStream;
use quote::quote;
use syn::{
    Data, DeriveInput, Fields, GenericArgument, LitStr, PathArguments, Type, parse_macro_input,
};

/// Options read from the `#[field(...)]` attributes of one struct field.
#[derive(Default)]
struct FieldAttrs {
    skip: bool,
    rename: Option<String>,
}

impl FieldAttrs {
    /// Parse every `#[field(...)]` on `field`, rejecting unknown options.
    fn parse(field: &syn::Field) -> Result<Self, syn::Error> {
        let mut attrs = FieldAttrs::default();
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("field")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    attrs.skip = true;
                    Ok(())
                } else if meta.path.is_ident("name") {
                    let name: LitStr = meta.value()?.parse()?;
                    attrs.rename = Some(name.value());
                    Ok(())
                } else {
                    Err(meta.error("expected `skip` or `name = \"...\"`"))
                }
            })?;
        }
        Ok(attrs)
    }
}

/// Last path segment of a type, e.g. `DateTime` for `chrono::DateTime<Utc>`
fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(path) if path.qself.is_none() => path.path.segments.last(),
        Type::Reference(reference) => last_segment(&reference.elem),
        _ => None,
    }
}

/// First generic argument of a segment, e.g. `T` for `Option<T>`
fn first_type_argument(segment: &syn::PathSegment) -> Option<&Type> {
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => args.args.iter().find_map(|arg| match arg {
            GenericArgument::Type(ty) => Some(ty),
            _ => None,
        }),
        _ => None,
    }
}

/// Map a Rust field type to the constraint expression registered for it
fn constraint_for_type(ty: &Type) -> Result<proc_macro2::TokenStream, syn::Error> {
    let segment = last_segment(ty)
        .ok_or_else(|| syn::Error::new_spanned(ty, "unsupported field type for Entity"))?;

    let constraint = match segment.ident.to_string().as_str() {
        "Box" => return constraint_for_type(inner_type(ty, segment)?),
        "Option" => {
            return Err(syn::Error::new_spanned(ty, "nested Option fields are not supported"));
        }
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" => {
            quote! { keyed_model::Constraint::integer() }
        }
        "f32" | "f64" => quote! { keyed_model::Constraint::number() },
        // Naive dates carry no offset, so they are not RFC 3339 dates
        "String" | "str" | "Cow" | "NaiveDate" | "NaiveDateTime" => {
            quote! { keyed_model::Constraint::string() }
        }
        "bool" => quote! { keyed_model::Constraint::boolean() },
        "DateTime" => quote! { keyed_model::Constraint::date() },
        "Vec" | "HashSet" | "BTreeSet" => {
            return Err(syn::Error::new_spanned(
                ty,
                "list fields have no registry constraint; mark them #[field(skip)]",
            ));
        }
        // Structs and maps serialize to objects
        _ => quote! { keyed_model::Constraint::object() },
    };

    Ok(constraint)
}

fn inner_type<'a>(ty: &Type, segment: &'a syn::PathSegment) -> Result<&'a Type, syn::Error> {
    first_type_argument(segment).ok_or_else(|| syn::Error::new_spanned(ty, "missing type argument"))
}

/// The registration call for one field; `Option<T>` registers `T` as an
/// optional field.
fn registration(name: &str, ty: &Type) -> Result<proc_macro2::TokenStream, syn::Error> {
    match last_segment(ty) {
        Some(segment) if segment.ident == "Option" => {
            let constraint = constraint_for_type(inner_type(ty, segment)?)?;
            Ok(quote! { .with_optional_field(#name, #constraint) })
        }
        _ => {
            let constraint = constraint_for_type(ty)?;
            Ok(quote! { .with_field(#name, #constraint) })
        }
    }
}

/// Derive macro for the Entity trait
///
/// Generates `key()` and `field_registry()` for a struct with named fields.
/// The struct must have a field named `key`, and its type must convert into
/// `KeyValue` (`i32`, `i64`, `u32`, `u64`, `f64`, `String`); both are checked
/// at compile time.
///
/// ## Field types
///
/// | Rust type | constraint |
/// |---|---|
/// | integers | `integer()` |
/// | `f32`, `f64` | `number()` |
/// | `String` | `string()` |
/// | `bool` | `boolean()` |
/// | `DateTime<_>` | `date()` |
/// | `Option<T>` | constraint of `T`, registered optional (`null` or absent) |
/// | anything else | `object()` |
///
/// Use `#[field(skip)]` to leave a field out of the registry and
/// `#[field(name = "...")]` to register it under another name (match any
/// serde rename).
///
/// ## Example
///
/// ```text
/// #[derive(Clone, Serialize, Deserialize, Entity)]
/// pub struct Ticket {
///     pub key: i64,
///     pub status: String,
///     pub priority: i32,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(field))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_entity(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand_entity(input: &DeriveInput) -> Result<proc_macro2::TokenStream, syn::Error> {
    let name = &input.ident;
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Entity only supports structs with named fields",
                ));
            }
        },
        _ => return Err(syn::Error::new_spanned(input, "Entity only supports structs")),
    };

    let mut has_key = false;
    let mut registrations = Vec::new();
    for field in fields.iter() {
        let attrs = FieldAttrs::parse(field)?;
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };

        if ident == "key" {
            if attrs.skip || attrs.rename.is_some() {
                return Err(syn::Error::new_spanned(
                    field,
                    "the `key` field cannot be skipped or renamed",
                ));
            }
            if last_segment(&field.ty).is_some_and(|s| s.ident == "Option") {
                return Err(syn::Error::new_spanned(&field.ty, "the `key` field cannot be optional"));
            }
            has_key = true;
        }
        if attrs.skip {
            continue;
        }

        let field_name = attrs.rename.unwrap_or_else(|| ident.to_string());
        registrations.push(registration(&field_name, &field.ty)?);
    }
    if !has_key {
        return Err(syn::Error::new_spanned(input, "Entity requires a field named `key`"));
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics keyed_model::Entity for #name #ty_generics #where_clause {
            fn key(&self) -> keyed_model::KeyValue {
                keyed_model::KeyValue::from(::core::clone::Clone::clone(&self.key))
            }

            fn field_registry() -> keyed_model::FieldRegistry {
                keyed_model::FieldRegistry::new()
                    #(#registrations)*
            }
        }
    })
}
