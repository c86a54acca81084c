//! Derive macro for the `Union` trait.
//!
//! `#[derive(Union)]` turns an enum into a sum type the `sumpack` resolver
//! can build a formatter for. It implements both `sumpack::Union` (the case
//! descriptors) and `sumpack::Formattable` (which routes resolution to the
//! union formatter builder).
//!
//! Cases are tagged by declaration index. Fields are keyed by declaration
//! index under int keys and by name under string keys; tuple fields are
//! named `"0"`, `"1"`, and so on.
//!
//! # Example
//!
//! ```ignore
//! use sumpack::Union;
//!
//! #[derive(Union)]
//! #[sumpack(int_keys)]
//! enum Shape {
//!     Circle { radius: f64 },
//!     Rectangle { width: f64, height: f64 },
//!     Polygon(Vec<(f64, f64)>),
//!     Empty,
//! }
//! ```
//!
//! # Container Attributes
//!
//! - `#[sumpack(int_keys)]`, `#[sumpack(string_keys)]`: pin the layout.
//! - `#[sumpack(value_kind)]`: nil and unknown case tags are decode errors.
//! - `#[sumpack(default)]`: a missing field of this type decodes to
//!   `Default::default()`.
//!
//! # Field Attributes
//!
//! - `#[sumpack(skip)]`: never written, always decoded to its default.

use proc_macro::TokenStream;
use quote::quote;
use syn::{
    Attribute, Data, DataEnum, DeriveInput, Fields, Ident, LitStr, Variant,
    parse_macro_input, spanned::Spanned,
};

#[derive(Default)]
struct ContainerOptions {
    value_kind: bool,
    layout: Option<proc_macro2::TokenStream>,
    default: bool,
}

fn parse_container_options(
    attrs: &[Attribute],
) -> syn::Result<ContainerOptions> {
    let mut options = ContainerOptions::default();

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("sumpack")) {
        attr.parse_nested_meta(|meta| {
            let layout = if meta.path.is_ident("int_keys") {
                quote!(::sumpack::LayoutMode::IntKeyed)
            } else if meta.path.is_ident("string_keys") {
                quote!(::sumpack::LayoutMode::StringKeyed)
            } else if meta.path.is_ident("value_kind") {
                options.value_kind = true;
                return Ok(());
            } else if meta.path.is_ident("default") {
                options.default = true;
                return Ok(());
            } else {
                return Err(meta.error("unknown sumpack container attribute"));
            };

            if options.layout.is_some() {
                return Err(meta.error("layout specified more than once"));
            }
            options.layout = Some(layout);
            Ok(())
        })?;
    }

    Ok(options)
}

/// Checks if a field has the `#[sumpack(skip)]` attribute.
fn should_skip(attrs: &[Attribute]) -> syn::Result<bool> {
    let mut skip = false;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("sumpack")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("unknown sumpack field attribute"))
            }
        })?;
    }

    Ok(skip)
}

/// Derive macro for `Union`.
///
/// Only enums with at least one variant are supported.
#[proc_macro_derive(Union, attributes(sumpack))]
pub fn derive_union(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match impl_union(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => err.to_compile_error().into(),
    }
}

fn impl_union(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let name_str = LitStr::new(&name.to_string(), name.span());

    let data_enum = match &input.data {
        Data::Enum(data_enum) if !data_enum.variants.is_empty() => data_enum,
        Data::Enum(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Union cannot be derived for enums without variants",
            ));
        }
        Data::Struct(_) | Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Union can only be derived for enums",
            ));
        }
    };

    let options = parse_container_options(&input.attrs)?;

    let (impl_generics, ty_generics, where_clause) =
        input.generics.split_for_impl();

    // Build where clause for Formattable bounds
    let mut where_clause =
        where_clause.cloned().unwrap_or_else(|| syn::parse_quote!(where));

    for param in &input.generics.params {
        if let syn::GenericParam::Type(type_param) = param {
            let ident = &type_param.ident;
            where_clause
                .predicates
                .push(syn::parse_quote!(#ident: ::sumpack::Formattable));
        }
    }

    let kind = if options.value_kind {
        quote!(::sumpack::UnionKind::Value)
    } else {
        quote!(::sumpack::UnionKind::Reference)
    };

    let layout = options.layout.map(|layout| quote!(.layout(#layout)));

    let cases = data_enum
        .variants
        .iter()
        .enumerate()
        .map(|(tag, variant)| impl_case(tag, variant))
        .collect::<syn::Result<Vec<_>>>()?;

    let case_tags = impl_case_tags(data_enum)?;

    let default_value = options.default.then(|| {
        quote! {
            fn default_value() -> ::core::option::Option<Self> {
                ::core::option::Option::Some(
                    <Self as ::core::default::Default>::default(),
                )
            }
        }
    });

    Ok(quote! {
        #[allow(clippy::trait_duplication_in_bounds)]
        impl #impl_generics ::sumpack::Union for #name #ty_generics #where_clause {
            fn descriptor() -> ::sumpack::UnionDescriptor<Self> {
                ::sumpack::UnionDescriptor::new(#name_str, #kind)
                    #layout
                    #(.case(#cases))*
            }

            fn case_tag(&self) -> i32 {
                #case_tags
            }
        }

        #[allow(clippy::trait_duplication_in_bounds)]
        impl #impl_generics ::sumpack::Formattable for #name #ty_generics #where_clause {
            fn build_formatter(
                resolver: &::sumpack::Resolver,
            ) -> ::core::result::Result<
                ::std::sync::Arc<dyn ::sumpack::Formatter<Self>>,
                ::sumpack::Error,
            > {
                ::sumpack::union::build_formatter::<Self>(resolver)
            }

            #default_value
        }
    })
}

struct CaseField {
    name: LitStr,
    binding: Ident,
    member: proc_macro2::TokenStream,
    ty: syn::Type,
    skip: bool,
}

fn case_fields(fields: &Fields) -> syn::Result<Vec<CaseField>> {
    fields
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let skip = should_skip(&field.attrs)?;
            let ty = field.ty.clone();

            Ok(match &field.ident {
                Some(ident) => CaseField {
                    name: LitStr::new(&ident.to_string(), ident.span()),
                    binding: ident.clone(),
                    member: quote!(#ident),
                    ty,
                    skip,
                },
                None => CaseField {
                    name: LitStr::new(&index.to_string(), field.span()),
                    binding: Ident::new(
                        &format!("field_{index}"),
                        proc_macro2::Span::call_site(),
                    ),
                    member: quote!(),
                    ty,
                    skip,
                },
            })
        })
        .collect()
}

fn impl_case(
    tag: usize,
    variant: &Variant,
) -> syn::Result<proc_macro2::TokenStream> {
    let variant_name = &variant.ident;
    let variant_str =
        LitStr::new(&variant_name.to_string(), variant_name.span());
    let tag = i32::try_from(tag).map_err(|_| {
        syn::Error::new_spanned(variant, "too many variants for an i32 tag")
    })?;

    let fields = case_fields(&variant.fields)?;

    let field_descriptors = fields.iter().map(|field| {
        let CaseField { name, ty, skip, .. } = field;
        let skipped = skip.then(|| quote!(.skipped()));
        quote! {
            .field(::sumpack::FieldDescriptor::new::<#ty>(#name) #skipped)
        }
    });

    let bindings = fields.iter().map(|field| &field.binding);
    let pattern = match &variant.fields {
        Fields::Named(_) => {
            quote!(Self::#variant_name { #(#bindings),* })
        }
        Fields::Unnamed(_) => quote!(Self::#variant_name(#(#bindings),*)),
        Fields::Unit => quote!(Self::#variant_name),
    };

    let values = fields.iter().map(|field| {
        let binding = &field.binding;
        quote!(#binding as &dyn ::core::any::Any)
    });

    let deconstruct = quote! {
        .deconstruct(|value| match value {
            #pattern => ::core::option::Option::Some(
                ::std::vec![#(#values),*],
            ),
            #[allow(unreachable_patterns)]
            _ => ::core::option::Option::None,
        })
    };

    let constructor = if fields.is_empty() {
        let value = match &variant.fields {
            Fields::Named(_) => quote!(Self::#variant_name {}),
            Fields::Unnamed(_) => quote!(Self::#variant_name()),
            Fields::Unit => quote!(Self::#variant_name),
        };

        quote!(::sumpack::Constructor::singleton(|| #value))
    } else {
        let parameters = fields.iter().map(|field| {
            let CaseField { name, ty, .. } = field;
            quote!(::sumpack::Parameter::new::<#ty>(#name))
        });

        let arguments = fields.iter().enumerate().map(|(position, field)| {
            let member = &field.member;
            if member.is_empty() {
                quote!(arguments.take(#position)?)
            } else {
                quote!(#member: arguments.take(#position)?)
            }
        });

        let value = match &variant.fields {
            Fields::Named(_) => quote!(Self::#variant_name { #(#arguments),* }),
            _ => quote!(Self::#variant_name(#(#arguments),*)),
        };

        quote! {
            ::sumpack::Constructor::factory(
                ::std::vec![#(#parameters),*],
                |arguments| ::core::result::Result::Ok(#value),
            )
        }
    };

    Ok(quote! {
        ::sumpack::CaseDescriptor::new(#tag, #variant_str)
            #(#field_descriptors)*
            #deconstruct
            .constructor(#constructor)
    })
}

fn impl_case_tags(
    data_enum: &DataEnum,
) -> syn::Result<proc_macro2::TokenStream> {
    let arms = data_enum
        .variants
        .iter()
        .enumerate()
        .map(|(tag, variant)| {
            let variant_name = &variant.ident;
            let tag = i32::try_from(tag).map_err(|_| {
                syn::Error::new_spanned(
                    variant,
                    "too many variants for an i32 tag",
                )
            })?;

            Ok(match &variant.fields {
                Fields::Named(_) => quote!(Self::#variant_name { .. } => #tag,),
                Fields::Unnamed(_) => quote!(Self::#variant_name(..) => #tag,),
                Fields::Unit => quote!(Self::#variant_name => #tag,),
            })
        })
        .collect::<syn::Result<Vec<_>>>()?;

    Ok(quote! {
        match self {
            #(#arms)*
        }
    })
}
