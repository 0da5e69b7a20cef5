use std::sync::Arc;

use crate::Result;
use crate::error::{Error, Position};
use crate::tpl::ast::{Expr, NodeList, TagNode};
use crate::tpl::lexer::{Token, TokenKind};
use crate::tpl::parser::Parser;
use crate::tpl::render::{eval, render_nodes};
use crate::tpl::render_context::ExecutionContext;
use crate::tpl::tags::CompileTimeNode;
use crate::tpl::tags::control::ensure_consumed;
use crate::tpl::writer::TemplateWriter;
use crate::value::Value;

/// A compiled `{% macro %}`: parameters with optional defaults and a body.
#[derive(Debug)]
pub struct Macro {
    name: String,
    params: Vec<(String, Option<Expr>)>,
    body: NodeList,
    exported: bool,
    pos: Position,
}

impl Macro {
    pub fn is_exported(&self) -> bool {
        self.exported
    }

    /// Renders the body with `args` bound to the parameters and returns the
    /// output as a safe string. The body sees the public scope and its own
    /// parameters, never the caller's private variables.
    ///
    /// Macro calls inside the body resolve against the calling template's
    /// chain, not the one the macro was defined in; an imported macro can
    /// only call macros the importing template also defines or imports.
    pub(crate) fn call(
        &self,
        args: Vec<Value>,
        ctx: &mut ExecutionContext<'_>,
        pos: &Position,
    ) -> Result<Value> {
        if args.len() > self.params.len() {
            return Err(Error::execution(
                pos,
                format!(
                    "Macro '{}' called with too many arguments ({} max, {} given)",
                    self.name,
                    self.params.len(),
                    args.len()
                ),
            ));
        }

        let mut bound = Vec::with_capacity(self.params.len());
        let mut args = args.into_iter();
        for (name, default) in &self.params {
            let value = match (args.next(), default) {
                (Some(v), _) => v,
                (None, Some(expr)) => eval(expr, ctx, &self.pos)?,
                (None, None) => Value::nil(),
            };
            bound.push((name, value));
        }

        let saved = ctx.enter_call(pos)?;
        for (name, value) in bound {
            ctx.push(name, value);
        }
        let pool = ctx.pool();
        let mut buf = pool.checkout();
        let res = {
            let mut writer = TemplateWriter::new(&mut *buf, ctx.autoescape());
            render_nodes(&self.body, ctx, &mut writer)
        };
        ctx.leave_call(saved);
        res?;
        Ok(Value::from(buf.as_str()).into_safe())
    }
}

/// `{% macro name(a, b=default) [export] %} ... {% endmacro %}`
pub(crate) fn parse_macro(
    doc: &mut Parser<'_>,
    start: &Token,
    args: &mut Parser<'_>,
) -> Result<Box<dyn TagNode>> {
    let name = args.expect_kind(TokenKind::Identifier, "Macro name must be an identifier")?;
    args.expect(TokenKind::Symbol, "(", "Expected '('")?;

    let mut params = Vec::new();
    if args.match_one(TokenKind::Symbol, ")").is_none() {
        loop {
            let param = args.expect_kind(TokenKind::Identifier, "Parameter must be an identifier")?;
            let default = if args.match_one(TokenKind::Symbol, "=").is_some() {
                Some(args.parse_variable_or_literal()?)
            } else {
                None
            };
            if params.iter().any(|(p, _): &(String, Option<Expr>)| *p == param.val) {
                return Err(Error::syntax(
                    &param.pos,
                    format!("Duplicate parameter '{}'", param.val),
                ));
            }
            params.push((param.val, default));
            if args.match_one(TokenKind::Symbol, ")").is_some() {
                break;
            }
            args.expect(TokenKind::Symbol, ",", "Expected ',' or ')'")?;
        }
    }
    let exported = args.match_one(TokenKind::Keyword, "export").is_some();

    let (body, end) = doc.wrap_until_tag(&["endmacro"])?;
    ensure_consumed(&end.args, "endmacro")?;

    if doc.doc.macros.contains_key(&name.val) {
        return Err(Error::syntax(
            &name.pos,
            format!("Macro '{}' already defined", name.val),
        ));
    }
    doc.doc.macros.insert(
        name.val.clone(),
        Arc::new(Macro {
            name: name.val,
            params,
            body,
            exported,
            pos: start.pos.clone(),
        }),
    );
    Ok(Box::new(CompileTimeNode))
}
