pub mod error;
pub mod tpl;
pub mod value;

pub use error::{Error, FilterError, Position, Result};
pub use stencil_macros::Object;
pub use tpl::{
    Context, FilterRegistry, Options, TagRegistry, Template, TemplateSet, to_context,
};
pub use value::{Datum, Object, ObjectKind, Record, ToValue, Value};

/// Compiles `source` as a string template of the shared default set.
pub fn compile(source: &str, options: Options) -> Result<Template> {
    tpl::DEFAULT_SET.compile(tpl::STRING_TEMPLATE_NAME, source, options)
}

/// Builds a [`Context`] from `key => value` pairs; values go through
/// [`ToValue`].
///
/// ```
/// let ctx = stencil::context! { name => "World", count => 3 };
/// assert_eq!(ctx["count"].to_integer(), 3);
/// ```
#[macro_export]
macro_rules! context {
    () => {
        $crate::Context::new()
    };
    ($($key:ident => $value:expr),+ $(,)?) => {{
        let mut ctx = $crate::Context::new();
        $(
            ctx.insert(
                stringify!($key).to_string(),
                $crate::ToValue::to_value(&$value),
            );
        )+
        ctx
    }};
}
