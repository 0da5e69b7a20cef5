use std::sync::Arc;

use crate::Result;
use crate::error::{Error, Position};
use crate::tpl::ast::{Expr, TagNode};
use crate::tpl::lexer::{Token, TokenKind};
use crate::tpl::parser::Parser;
use crate::tpl::render::{eval, render_nodes};
use crate::tpl::render_context::ExecutionContext;
use crate::tpl::tags::CompileTimeNode;
use crate::tpl::template::Template;
use crate::tpl::writer::TemplateWriter;

/* --------------------------------- block -------------------------------- */

#[derive(Debug)]
struct BlockNode {
    name: String,
}

impl TagNode for BlockNode {
    /// Runs the most-derived body registered for this block name.
    fn execute(&self, ctx: &mut ExecutionContext<'_>, writer: &mut TemplateWriter<'_>) -> Result<()> {
        match ctx.find_block(&self.name) {
            Some(body) => render_nodes(body, ctx, writer),
            None => Ok(()),
        }
    }
}

/// `{% block name %} ... {% endblock [name] %}`
pub(crate) fn parse_block(
    doc: &mut Parser<'_>,
    _: &Token,
    args: &mut Parser<'_>,
) -> Result<Box<dyn TagNode>> {
    let name = args.expect_kind(TokenKind::Identifier, "Block name must be an identifier")?;
    let (body, mut end) = doc.wrap_until_tag(&["endblock"])?;
    if let Some(closing) = end.args.match_kind(TokenKind::Identifier)
        && closing.val != name.val
    {
        return Err(Error::syntax(
            &closing.pos,
            format!(
                "Name for 'endblock' must equal to 'block'-tag's name ('{}' != '{}')",
                name.val, closing.val
            ),
        ));
    }
    if end.args.remaining() > 0 {
        return Err(end.args.error("Either no or only one argument (identifier) allowed for 'endblock'"));
    }

    if doc.doc.blocks.contains_key(&name.val) {
        return Err(Error::syntax(
            &name.pos,
            format!("Block named '{}' already defined", name.val),
        ));
    }
    doc.doc.blocks.insert(name.val.clone(), Arc::new(body));
    Ok(Box::new(BlockNode { name: name.val }))
}

/* -------------------------------- extends ------------------------------- */

/// `{% extends "parent" %}`; only valid at the top level, at most once.
pub(crate) fn parse_extends(
    doc: &mut Parser<'_>,
    start: &Token,
    args: &mut Parser<'_>,
) -> Result<Box<dyn TagNode>> {
    if doc.depth() > 1 {
        return Err(Error::syntax(
            &start.pos,
            "The 'extends' tag can only be defined on root level",
        ));
    }
    if doc.doc.parent.is_some() {
        return Err(Error::syntax(&start.pos, "This template has already one parent"));
    }
    let target = args.expect_kind(TokenKind::String, "Tag 'extends' requires a template name as string")?;
    let parent = doc.env().resolve(&target.val, &target.pos)?;
    doc.doc.parent = Some(parent);
    Ok(Box::new(CompileTimeNode))
}

/* -------------------------------- include ------------------------------- */

#[derive(Debug)]
struct IncludeNode {
    template: Arc<Template>,
    with: Vec<(String, Expr)>,
    only: bool,
    pos: Position,
}

impl TagNode for IncludeNode {
    fn execute(&self, ctx: &mut ExecutionContext<'_>, writer: &mut TemplateWriter<'_>) -> Result<()> {
        let mut vars = if self.only {
            Default::default()
        } else {
            ctx.snapshot()
        };
        for (key, expr) in &self.with {
            let value = eval(expr, ctx, &self.pos)?;
            vars.insert(key.clone(), value);
        }
        self.template.render_included(ctx, &vars, writer)
    }
}

/// `{% include "name" [with key=expr ...] [only] %}`
pub(crate) fn parse_include(
    doc: &mut Parser<'_>,
    start: &Token,
    args: &mut Parser<'_>,
) -> Result<Box<dyn TagNode>> {
    let target = args.expect_kind(TokenKind::String, "Tag 'include' requires a template name as string")?;

    let mut with = Vec::new();
    if args.match_one(TokenKind::Keyword, "with").is_some() {
        while let Some(key) = args.match_kind(TokenKind::Identifier) {
            args.expect(TokenKind::Symbol, "=", "Expected '=' after include variable name")?;
            with.push((key.val, args.parse_expression()?));
        }
        if with.is_empty() {
            return Err(args.error("Expected at least one 'key=value' after 'with'"));
        }
    }
    let only = args.match_one(TokenKind::Keyword, "only").is_some();

    let template = doc.env().resolve(&target.val, &target.pos)?;
    Ok(Box::new(IncludeNode {
        template,
        with,
        only,
        pos: start.pos.clone(),
    }))
}

/* -------------------------------- import -------------------------------- */

/// `{% import "name" macro [as alias], ... %}`; only exported macros can be
/// imported. Helpers an imported macro calls must be imported as well.
pub(crate) fn parse_import(
    doc: &mut Parser<'_>,
    _: &Token,
    args: &mut Parser<'_>,
) -> Result<Box<dyn TagNode>> {
    let target = args.expect_kind(TokenKind::String, "Tag 'import' requires a template name as string")?;
    let source = doc.env().resolve(&target.val, &target.pos)?;

    loop {
        let name = args.expect_kind(TokenKind::Identifier, "Expected macro name to import")?;
        let alias = if args.match_one(TokenKind::Keyword, "as").is_some() {
            args.expect_kind(TokenKind::Identifier, "Expected alias name")?.val
        } else {
            name.val.clone()
        };

        let Some(imported) = source.macros().get(&name.val).filter(|m| m.is_exported()) else {
            return Err(Error::syntax(
                &name.pos,
                format!("Macro '{}' not found or not exported in '{}'", name.val, target.val),
            ));
        };
        if doc.doc.macros.contains_key(&alias) {
            return Err(Error::syntax(
                &name.pos,
                format!("Macro '{}' already defined", alias),
            ));
        }
        doc.doc.macros.insert(alias, imported.clone());

        if args.match_one(TokenKind::Symbol, ",").is_none() {
            break;
        }
    }
    Ok(Box::new(CompileTimeNode))
}
