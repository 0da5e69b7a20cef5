//! Built-in tags and the tag registry.
//!
//! A tag parser receives the document parser (to capture nested bodies with
//! [`Parser::wrap_until_tag`]), the tag-name token and a parser over the tag's
//! own arguments, and returns the node to execute.

mod control;
mod filter;
mod inherit;
pub(crate) mod macros;

use std::collections::HashMap;

use log::warn;

use crate::Result;
use crate::tpl::ast::TagNode;
use crate::tpl::lexer::Token;
use crate::tpl::parser::Parser;
use crate::tpl::render_context::ExecutionContext;
use crate::tpl::writer::TemplateWriter;

pub type TagParser =
    fn(doc: &mut Parser<'_>, start: &Token, args: &mut Parser<'_>) -> Result<Box<dyn TagNode>>;

/// Name to tag parser table, owned by a template set.
#[derive(Clone)]
pub struct TagRegistry {
    tags: HashMap<String, TagParser>,
}

impl Default for TagRegistry {
    /// A registry with every built-in tag.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("if", control::parse_if);
        registry.register("for", control::parse_for);
        registry.register("set", control::parse_set);
        registry.register("block", inherit::parse_block);
        registry.register("extends", inherit::parse_extends);
        registry.register("include", inherit::parse_include);
        registry.register("import", inherit::parse_import);
        registry.register("macro", macros::parse_macro);
        registry.register("filter", filter::parse_filter);
        registry.register("spaceless", filter::parse_spaceless);
        registry
    }
}

impl TagRegistry {
    pub fn empty() -> Self {
        Self {
            tags: HashMap::new(),
        }
    }

    /// Registers `parser` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: &str, parser: TagParser) {
        if self.tags.insert(name.to_string(), parser).is_some() {
            warn!("tag '{}' registered twice, replacing previous parser", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<TagParser> {
        self.tags.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }
}

/// Node for tags whose effect is fully applied at compile time.
#[derive(Debug)]
pub(crate) struct CompileTimeNode;

impl TagNode for CompileTimeNode {
    fn execute(&self, _: &mut ExecutionContext<'_>, _: &mut TemplateWriter<'_>) -> Result<()> {
        Ok(())
    }
}
