use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one and inject a local
/// client over a fresh in-memory store.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`] and
/// `crate::store::Store`. Pass `host` or `voter` to have the client signed in
/// as `Identity::example_host()` or `Identity::example()` respectively.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract the parameters to inject and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Sign the client in if needed.
    let identity = match parse_macro_input!(args as Option<Ident>) {
        None => None,
        Some(arg) if arg == "host" => Some(format_ident!("example_host")),
        Some(arg) if arg == "voter" => Some(format_ident!("example")),
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `host` or `voter`")
                .into_compile_error()
                .into();
        }
    };
    let maybe_login = identity
        .map(|example| {
            quote! {{
                let identity = crate::model::common::identity::Identity::#example().to_string();
                let id_token = crate::model::api::auth::StaticIdentityProvider::token(&identity);
                let response = rocket_client
                    .post("/auth/session")
                    .header(rocket::http::ContentType::JSON)
                    .body(rocket::serde::json::json!({ "idToken": id_token }).to_string())
                    .dispatch()
                    .await;
                assert_eq!(response.status(), rocket::http::Status::Ok, "test sign-in failed");
            }}
        })
        .unwrap_or_default();

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (rocket::local::asynchronous::Client, crate::store::Store) {
                log4rs_test_utils::test_logging::init_logging_once_for(["ballotbox"], None, None);

                let store: crate::store::Store =
                    std::sync::Arc::new(crate::store::MemoryStore::new());
                let identities: crate::model::api::auth::Identities =
                    std::sync::Arc::new(crate::model::api::auth::StaticIdentityProvider);
                let rocket = crate::rocket_for(
                    crate::config::Config::example_figment(),
                    store.clone(),
                    identities,
                );
                let rocket_client = rocket::local::asynchronous::Client::tracked(rocket)
                    .await
                    .unwrap();

                #maybe_login

                (rocket_client, store)
            }

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                #[allow(unused_variables)]
                let (rocket_client, store) = setup().await;
                #new_name(#(#test_args),*).await;
            });
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_store = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                // The last path segment names the type however it was imported.
                if let Some(segment) = type_path.path.segments.last() {
                    if segment.ident == "Client" {
                        if has_client {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `rocket::local::asynchronous::Client`",
                            ));
                        }
                        has_client = true;
                        args.push(quote! { rocket_client });
                        continue;
                    } else if segment.ident == "Store" {
                        if has_store {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `Store`",
                            ));
                        }
                        has_store = true;
                        args.push(quote! { store });
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client` or `store_ident: Store`",
        ));
    }

    Ok(args)
}
