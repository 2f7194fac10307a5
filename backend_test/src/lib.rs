use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, Ident, ItemFn, Pat, PathArguments,
    Signature, Type,
};

/// Transform an asynchronous test into a synchronous one, inject dependencies,
/// and ensure that the database is dropped regardless of how the test terminates.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`],
/// [`mongodb::Database`], [`crate::model::mongodb::Coll<T>`], and, for
/// `#[backend_test(user)]`, a [`rocket::http::Header`] carrying the bearer
/// token of a freshly registered example user.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let injected = match check_sig(item_fn.sig.clone()) {
        Ok(injected) => injected,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };
    let Injected {
        args: test_args,
        collection_idents,
        collection_types,
        header_span,
    } = injected;

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Register and log in a user if needed.
    let login = parse_macro_input!(args as Option<Ident>);
    let maybe_login = match login {
        Some(arg) if arg == "user" => quote! {
            let response = rocket_client
                .post("/auth/register")
                .header(rocket::http::ContentType::JSON)
                .body(rocket::serde::json::json!(crate::model::api::auth::RegisterRequest::example()).to_string())
                .dispatch()
                .await;
            let token: crate::model::api::auth::TokenResponse = response.into_json().await.unwrap();
            auth_header = Some(rocket::http::Header::new(
                crate::model::api::auth::AUTHORIZATION_HEADER,
                format!("{}{}", crate::model::api::auth::BEARER_PREFIX, token.token),
            ));
        },
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `user` or no argument")
                .into_compile_error()
                .into();
        }
        None => {
            if let Some(span) = header_span {
                return syn::Error::new(span, "A `Header` can only be injected with `#[backend_test(user)]`")
                    .into_compile_error()
                    .into();
            }
            quote! {}
        }
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                mongodb::Database,
                Option<rocket::http::Header<'static>>,
            ) {
                // Tests exercise the handlers, so show what they log.
                log4rs_test_utils::test_logging::init_logging_once_for(["survey_backend"], None, None);

                let db_client = crate::db_client().await;
                let db_name = crate::database();
                let rocket_client = rocket::local::asynchronous::Client::tracked(crate::rocket_for_db(db_client.clone(), &db_name).await)
                    .await
                    .unwrap();
                let db = db_client.database(&db_name);

                #[allow(unused_mut)]
                let mut auth_header = None;
                #maybe_login

                (rocket_client, db, auth_header)
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            async fn cleanup(db: mongodb::Database) {
                db.drop(None).await.unwrap();
            }

            // Create an async runtime. We need a separate one for inside and
            // outside the `catch_unwind`.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup.
            let (rocket_client, db, auth_header) = outer_runtime.block_on(setup());

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let client_mutex = std::sync::Mutex::new(rocket_client);
            let db_mutex = std::sync::Mutex::new(db.clone());
            let header_mutex = std::sync::Mutex::new(auth_header);
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                let rocket_client = client_mutex.into_inner().unwrap();
                let db = db_mutex.into_inner().unwrap();
                #[allow(unused_variables)]
                let auth_header = header_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                #(
                    let #collection_idents = crate::model::mongodb::Coll::<#collection_types>::from_db(&db);
                )*

                runtime.block_on(#new_name(#(#test_args),* #(,#collection_idents)*));
            });

            // Run the cleanup.
            outer_runtime.block_on(cleanup(db));

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::panic_any(cause);
            }
        }
    }
    .into()
}

/// What a test asks to have injected.
struct Injected {
    /// Expressions for the client, database and header parameters, in order.
    args: Vec<TokenStream2>,
    collection_idents: Vec<Ident>,
    collection_types: Vec<Ident>,
    /// Where a `Header` was requested, if it was.
    header_span: Option<proc_macro2::Span>,
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
///
/// Collections must come after every other parameter.
fn check_sig(sig: Signature) -> Result<Injected, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_db = false;
    let mut injected = Injected {
        args: vec![],
        collection_idents: vec![],
        collection_types: vec![],
        header_span: None,
    };

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(pat_ident) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    if let Some(type_ident) = type_path.path.get_ident() {
                        if type_ident == "Client" {
                            if has_client {
                                return Err(syn::Error::new(input.span(), "Test cannot accept more than one `rocket::local::asynchronous::Client`"));
                            }
                            has_client = true;
                            injected.args.push(quote! { rocket_client });
                            continue;
                        } else if type_ident == "Database" {
                            if has_db {
                                return Err(syn::Error::new(
                                    input.span(),
                                    "Test cannot accept more than one `mongodb::Database`",
                                ));
                            }
                            has_db = true;
                            injected.args.push(quote! { db });
                            continue;
                        }
                    } else {
                        // Valid as the last path segment for any type is itself
                        let last_segment = type_path.path.segments.last().unwrap();
                        if last_segment.ident == "Header" {
                            if injected.header_span.is_some() {
                                return Err(syn::Error::new(
                                    input.span(),
                                    "Test cannot accept more than one `rocket::http::Header`",
                                ));
                            }
                            injected.header_span = Some(input.span());
                            injected.args.push(quote! { auth_header.unwrap() });
                            continue;
                        }
                        if last_segment.ident == "Coll" {
                            if let PathArguments::AngleBracketed(generics) = &last_segment.arguments
                            {
                                if let Some(GenericArgument::Type(Type::Path(type_path))) =
                                    generics.args.first()
                                {
                                    if let Some(type_ident) = type_path.path.get_ident() {
                                        injected.collection_idents.push(pat_ident.ident.clone());
                                        injected.collection_types.push(type_ident.clone());
                                        continue;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client`, `db_ident: Database`, `auth_ident: Header<'static>` or `collection_ident: Coll<T>`",
        ));
    }

    Ok(injected)
}
