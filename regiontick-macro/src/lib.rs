use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{Expr, ExprLit, ItemFn, Lit, Meta, MetaNameValue};

/// Publish a function as a named top-level operation of the host.
///
/// The function takes no arguments and returns
/// `Result<Value, InvokeError>`. It is registered in `HOST_EXPORTS` at link
/// time, which is where the scheduler's capability probe looks for the
/// region-threaded API.
///
/// # Examples
///
/// ```rust,ignore
/// use regiontick::{host_export, InvokeError, Value};
///
/// #[host_export(name = "global_region_scheduler")]
/// fn global_region_scheduler() -> Result<Value, InvokeError> {
///     Ok(Value::object(MyGlobalScheduler::instance()))
/// }
///
/// // The name defaults to the function name
/// #[host_export]
/// fn async_scheduler() -> Result<Value, InvokeError> {
///     Ok(Value::object(MyAsyncScheduler::instance()))
/// }
/// ```
///
/// # Parameters
///
/// - `name`: Operation name on the host surface (defaults to the function name)
#[proc_macro_attribute]
pub fn host_export(args: TokenStream, input: TokenStream) -> TokenStream {
    let attr_args = syn::parse_macro_input!(args with syn::punctuated::Punctuated::<Meta, syn::Token![,]>::parse_terminated);
    let input_fn = syn::parse_macro_input!(input as ItemFn);

    if !input_fn.sig.inputs.is_empty() {
        return syn::Error::new_spanned(
            &input_fn.sig.inputs,
            "host_export functions take no arguments",
        )
        .to_compile_error()
        .into();
    }

    let fn_name = &input_fn.sig.ident;
    let export_name = match parse_export_name(&attr_args) {
        Ok(name) => name.unwrap_or_else(|| fn_name.to_string()),
        Err(error) => return error.to_compile_error().into(),
    };

    // Generate unique registration static name
    let static_name = format_ident!(
        "__REGIONTICK_EXPORT_{}",
        fn_name.to_string().to_uppercase()
    );

    let expanded = quote! {
        #input_fn

        // Auto-registration using linkme
        #[::regiontick::regiontick_runtime::linkme::distributed_slice(::regiontick::regiontick_runtime::HOST_EXPORTS)]
        #[linkme(crate = ::regiontick::regiontick_runtime::linkme)]
        #[doc(hidden)]
        #[allow(non_upper_case_globals)]
        static #static_name: ::regiontick::regiontick_runtime::HostExport =
            ::regiontick::regiontick_runtime::HostExport {
                name: #export_name,
                resolve: #fn_name,
            };
    };

    TokenStream::from(expanded)
}

fn parse_export_name(
    args: &syn::punctuated::Punctuated<Meta, syn::Token![,]>,
) -> syn::Result<Option<String>> {
    let mut name = None;

    for arg in args {
        match arg {
            Meta::NameValue(MetaNameValue {
                path,
                value: Expr::Lit(ExprLit {
                    lit: Lit::Str(value),
                    ..
                }),
                ..
            }) if path.is_ident("name") => {
                let value = value.value();
                if value.is_empty() {
                    return Err(syn::Error::new_spanned(arg, "export name must not be empty"));
                }
                name = Some(value);
            }
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "expected `name = \"...\"`",
                ))
            }
        }
    }

    Ok(name)
}
