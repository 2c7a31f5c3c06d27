use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one, inject dependencies,
/// and ensure that uploaded files are removed regardless of how the test terminates.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`], the
/// server's `MemoryStore`, and (given `admin` or `voter` as the macro argument)
/// the `Login` of a registered voter with those rights.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);
    let login_as = parse_macro_input!(args as Option<Ident>);

    // Work out who to log in as.
    let registration = match &login_as {
        None => None,
        Some(arg) if arg == "admin" => {
            Some(quote! { crate::model::api::voter::RegisterRequest::admin() })
        }
        Some(arg) if arg == "voter" => {
            Some(quote! { crate::model::api::voter::RegisterRequest::example() })
        }
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `admin` or `voter`")
                .into_compile_error()
                .into();
        }
    };

    // Extract injected parameters and reject invalid function signatures.
    let test_args = match check_sig(&item_fn.sig, registration.is_some()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Log in the client if needed.
    let maybe_login = match registration {
        Some(request) => quote! {
            let login = crate::api::testing::login_as(&rocket_client, #request).await;
        },
        None => quote! {
            let login = ();
        },
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup(
                upload_dir: std::path::PathBuf,
            ) -> (rocket::local::asynchronous::Client, crate::store::MemoryStore) {
                let store = crate::store::MemoryStore::new();
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_test(store.clone(), &upload_dir),
                )
                .await
                .unwrap();
                (rocket_client, store)
            }

            /// The test itself.
            #item_fn

            // Backend logs are useful when a test fails.
            log4rs_test_utils::test_logging::init_logging_once_for(
                ["voting_backend"],
                None,
                None,
            );

            // Every test gets its own upload directory.
            let upload_dir = std::env::temp_dir().join(format!(
                "voting-backend-test-{}-{}-{}",
                module_path!().replace("::", "-"),
                stringify!(#name),
                std::process::id(),
            ));

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup and test, catching any panics.
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                runtime.block_on(async {
                    let (rocket_client, store) = setup(upload_dir.clone()).await;
                    #maybe_login
                    let _ = (&rocket_client, &store, &login);
                    #new_name(#(#test_args),*).await;
                })
            }));

            // Run the cleanup.
            drop(runtime);
            let _ = std::fs::remove_dir_all(&upload_dir);

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::resume_unwind(cause);
            }
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: &Signature, has_login: bool) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_store = false;
    let mut wants_login = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                // Valid as the last path segment for any type is itself.
                let type_ident = &type_path.path.segments.last().unwrap().ident;
                let (seen, arg, what) = if type_ident == "Client" {
                    (&mut has_client, quote! { rocket_client }, "`Client`")
                } else if type_ident == "MemoryStore" {
                    (&mut has_store, quote! { store }, "`MemoryStore`")
                } else if type_ident == "Login" {
                    if !has_login {
                        return Err(syn::Error::new(
                            input.span(),
                            "A `Login` requires `#[backend_test(admin)]` or `#[backend_test(voter)]`",
                        ));
                    }
                    (&mut wants_login, quote! { login }, "`Login`")
                } else {
                    return Err(unexpected(input));
                };
                if *seen {
                    return Err(syn::Error::new(
                        input.span(),
                        format!("Test cannot accept more than one {what}"),
                    ));
                }
                *seen = true;
                args.push(arg);
                continue;
            }
        }

        return Err(unexpected(input));
    }

    Ok(args)
}

fn unexpected(input: &FnArg) -> syn::Error {
    syn::Error::new(
        input.span(),
        "Expected one of `client_ident: Client`, `store_ident: MemoryStore` or `login_ident: Login`",
    )
}
