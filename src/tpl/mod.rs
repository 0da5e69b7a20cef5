//! Template compilation and execution.
//!
//! Source text is lexed into [`lexer::Token`]s, parsed into a node tree with
//! tag parsers looked up in the owning [`TemplateSet`], and executed against an
//! [`render_context::ExecutionContext`] into a [`writer::TemplateWriter`].

pub mod ast;
mod filters;
pub mod lexer;
mod options;
pub mod parser;
mod render;
pub mod render_context;
mod set;
pub mod tags;
mod template;
mod whitespace;
pub mod writer;

pub use filters::{FilterFn, FilterRegistry, FilterResult};
pub use options::Options;
pub use render::{apply_filters, eval, render_nodes};
pub use set::{DEFAULT_SET, STRING_TEMPLATE_NAME, TemplateSet, TemplateSetBuilder};
pub use tags::{TagParser, TagRegistry};
pub use template::{Context, Template, to_context};
