mod object;

use proc_macro::TokenStream;

/// Derives `stencil::Object` and `stencil::ToValue` for a struct with named
/// fields, exposing each field as a template member.
///
/// Field attributes:
/// - `#[object(rename = "name")]` or `#[object("name")]`: member name to use
/// - `#[object(skip)]`: hide the field from templates
///
/// The struct must be `Clone + Debug + Send + Sync + 'static`.
#[proc_macro_derive(Object, attributes(object))]
pub fn derive_object(input: TokenStream) -> TokenStream {
    object::derive_object_impl(input)
}
