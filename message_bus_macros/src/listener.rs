use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, parse_quote, Attribute, FnArg, Ident, ItemTrait, ReturnType, TraitItem,
    TraitItemFn, Type, TypeParamBound,
};

struct ListenerMethod {
    name: Ident,
    arg_types: Vec<Type>,
}

pub fn expand_listener(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(Span::call_site(), "#[listener] takes no arguments")
            .to_compile_error()
            .into();
    }

    let mut item_trait = parse_macro_input!(item as ItemTrait);
    match expand(&mut item_trait) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(item_trait: &mut ItemTrait) -> syn::Result<TokenStream2> {
    if !item_trait.generics.params.is_empty() || item_trait.generics.where_clause.is_some() {
        return Err(syn::Error::new_spanned(
            &item_trait.generics,
            "listener traits cannot be generic",
        ));
    }

    add_thread_safety_bounds(item_trait);

    let mut methods = Vec::new();
    for item in item_trait.items.iter_mut() {
        match item {
            TraitItem::Fn(method) => methods.push(prepare_method(method)?),
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "listener traits may only declare methods",
                ))
            }
        }
    }

    let trait_ident = &item_trait.ident;
    let trait_name = trait_ident.to_string();
    let publisher_ident = format_ident!("__{}Publisher", trait_ident);

    let descriptors = methods.iter().enumerate().map(|(index, m)| {
        let name = m.name.to_string();
        let arity = m.arg_types.len();
        quote! {
            message_bus::MethodDescriptor { index: #index, name: #name, arity: #arity }
        }
    });

    let dispatch_arms = methods.iter().enumerate().map(|(index, m)| {
        let name = &m.name;
        let method_name = name.to_string();
        let arity = m.arg_types.len();
        let bindings = arg_bindings(arity);
        let positions = 0..arity;
        let types = &m.arg_types;
        quote! {
            #index => {
                message_bus::__private::check_arity(#trait_name, #method_name, #arity, args)?;
                #(
                    let #bindings = message_bus::__private::downcast_arg::<#types>(
                        #trait_name, #method_name, args, #positions,
                    )?;
                )*
                self.#name(#( ::core::clone::Clone::clone(#bindings) ),*);
                ::core::result::Result::Ok(())
            }
        }
    });

    let publisher_methods = methods.iter().enumerate().map(|(index, m)| {
        let name = &m.name;
        let bindings = arg_bindings(m.arg_types.len());
        let types = &m.arg_types;
        quote! {
            fn #name(&self, #( #bindings: #types ),*) {
                self.sink.publish(
                    #index,
                    ::std::vec![#( ::std::boxed::Box::new(#bindings) as message_bus::Arg ),*],
                );
            }
        }
    });

    let expanded = quote! {
        #item_trait

        impl message_bus::Listener for dyn #trait_ident {
            const NAME: &'static str = #trait_name;

            fn methods() -> &'static [message_bus::MethodDescriptor] {
                const METHODS: &[message_bus::MethodDescriptor] = &[
                    #(#descriptors),*
                ];
                METHODS
            }

            fn dispatch(
                &self,
                method: usize,
                args: &[message_bus::Arg],
            ) -> ::core::result::Result<(), message_bus::DispatchError> {
                match method {
                    #(#dispatch_arms)*
                    _ => ::core::result::Result::Err(message_bus::DispatchError::UnknownMethod {
                        listener: #trait_name,
                        index: method,
                    }),
                }
            }

            fn publisher(sink: message_bus::Publisher) -> ::std::sync::Arc<Self> {
                ::std::sync::Arc::new(#publisher_ident { sink })
            }
        }

        #[allow(non_camel_case_types)]
        struct #publisher_ident {
            sink: message_bus::Publisher,
        }

        impl #trait_ident for #publisher_ident {
            #(#publisher_methods)*
        }
    };

    Ok(expanded)
}

fn prepare_method(method: &mut TraitItemFn) -> syn::Result<ListenerMethod> {
    let sig = &method.sig;

    if !sig.generics.params.is_empty() || sig.generics.where_clause.is_some() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "listener methods cannot be generic",
        ));
    }
    if sig.asyncness.is_some() || sig.unsafety.is_some() || sig.variadic.is_some() {
        return Err(syn::Error::new_spanned(
            sig,
            "listener methods must be plain synchronous functions",
        ));
    }
    if !matches!(sig.output, ReturnType::Default) {
        return Err(syn::Error::new_spanned(
            &sig.output,
            "listener methods cannot return a value",
        ));
    }

    let mut inputs = sig.inputs.iter();
    match inputs.next() {
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some()
                && receiver.mutability.is_none()
                && receiver.colon_token.is_none() => {}
        _ => {
            return Err(syn::Error::new_spanned(
                sig,
                "listener methods must take `&self`",
            ))
        }
    }

    let arg_types = inputs
        .map(|arg| match arg {
            FnArg::Typed(pat_type) => Ok((*pat_type.ty).clone()),
            FnArg::Receiver(receiver) => Err(syn::Error::new_spanned(
                receiver,
                "unexpected receiver",
            )),
        })
        .collect::<syn::Result<Vec<_>>>()?;
    let name = sig.ident.clone();

    if take_optional_attr(&mut method.attrs) {
        if method.default.is_some() {
            return Err(syn::Error::new_spanned(
                &method.sig,
                "`#[optional]` methods get an empty body and cannot declare one",
            ));
        }
        method.default = Some(parse_quote!({}));
        method.semi_token = None;
        method.attrs.push(parse_quote!(#[allow(unused_variables)]));
    }

    Ok(ListenerMethod { name, arg_types })
}

fn take_optional_attr(attrs: &mut Vec<Attribute>) -> bool {
    let before = attrs.len();
    attrs.retain(|attr| !attr.path().is_ident("optional"));
    attrs.len() != before
}

fn add_thread_safety_bounds(item_trait: &mut ItemTrait) {
    for bound in ["Send", "Sync"] {
        let present = item_trait.supertraits.iter().any(|b| match b {
            TypeParamBound::Trait(t) => t
                .path
                .segments
                .last()
                .map_or(false, |segment| segment.ident == bound),
            _ => false,
        });
        if !present {
            let ident = Ident::new(bound, Span::call_site());
            item_trait
                .supertraits
                .push(parse_quote!(::core::marker::#ident));
        }
    }
    if item_trait.colon_token.is_none() {
        item_trait.colon_token = Some(Default::default());
    }
}

fn arg_bindings(arity: usize) -> Vec<Ident> {
    (0..arity).map(|i| format_ident!("__arg{}", i)).collect()
}
