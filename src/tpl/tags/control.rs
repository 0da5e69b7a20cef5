use std::collections::HashMap;

use crate::Result;
use crate::error::Position;
use crate::tpl::ast::{Expr, NodeList, TagNode};
use crate::tpl::lexer::{Token, TokenKind};
use crate::tpl::parser::Parser;
use crate::tpl::render::{eval, render_nodes};
use crate::tpl::render_context::ExecutionContext;
use crate::tpl::writer::TemplateWriter;
use crate::value::Value;

/* ---------------------------------- if ---------------------------------- */

#[derive(Debug)]
struct IfNode {
    branches: Vec<(Expr, NodeList)>,
    otherwise: Option<NodeList>,
    pos: Position,
}

impl TagNode for IfNode {
    fn execute(&self, ctx: &mut ExecutionContext<'_>, writer: &mut TemplateWriter<'_>) -> Result<()> {
        for (cond, body) in &self.branches {
            if eval(cond, ctx, &self.pos)?.is_true() {
                return render_nodes(body, ctx, writer);
            }
        }
        match &self.otherwise {
            Some(body) => render_nodes(body, ctx, writer),
            None => Ok(()),
        }
    }
}

/// `{% if cond %} ... [{% elif cond %} ...] [{% else %} ...] {% endif %}`
pub(crate) fn parse_if(
    doc: &mut Parser<'_>,
    start: &Token,
    args: &mut Parser<'_>,
) -> Result<Box<dyn TagNode>> {
    let mut cond = args.parse_expression()?;
    let mut branches = Vec::new();
    let mut otherwise = None;

    loop {
        let (body, mut end) = doc.wrap_until_tag(&["elif", "else", "endif"])?;
        branches.push((cond, body));
        match end.name.as_str() {
            "elif" => {
                cond = end.args.parse_expression()?;
                ensure_consumed(&end.args, "elif")?;
            }
            "else" => {
                ensure_consumed(&end.args, "else")?;
                let (body, end) = doc.wrap_until_tag(&["endif"])?;
                ensure_consumed(&end.args, "endif")?;
                otherwise = Some(body);
                break;
            }
            _ => {
                ensure_consumed(&end.args, "endif")?;
                break;
            }
        }
    }

    Ok(Box::new(IfNode {
        branches,
        otherwise,
        pos: start.pos.clone(),
    }))
}

pub(crate) fn ensure_consumed(args: &Parser<'_>, tag: &str) -> Result<()> {
    if args.remaining() > 0 {
        return Err(args.error(format!("'{}' takes no arguments", tag)));
    }
    Ok(())
}

/* ---------------------------------- for --------------------------------- */

#[derive(Debug)]
struct ForNode {
    key: String,
    value: Option<String>,
    iterable: Expr,
    reversed: bool,
    sorted: bool,
    body: NodeList,
    empty: Option<NodeList>,
    pos: Position,
}

fn loop_info(idx: usize, count: usize, parent: &Value) -> Value {
    let mut info = HashMap::with_capacity(7);
    info.insert("Counter".to_string(), Value::from(idx + 1));
    info.insert("Counter0".to_string(), Value::from(idx));
    info.insert("Revcounter".to_string(), Value::from(count - idx));
    info.insert("Revcounter0".to_string(), Value::from(count - idx - 1));
    info.insert("First".to_string(), Value::from(idx == 0));
    info.insert("Last".to_string(), Value::from(idx + 1 == count));
    info.insert("Parentloop".to_string(), parent.clone());
    Value::from(info)
}

impl TagNode for ForNode {
    fn execute(&self, ctx: &mut ExecutionContext<'_>, writer: &mut TemplateWriter<'_>) -> Result<()> {
        let items = eval(&self.iterable, ctx, &self.pos)?;
        let parent = ctx.lookup("forloop").cloned().unwrap_or_default();

        let mut failure = None;
        let mut was_empty = false;
        items.iterate_order(
            |idx, count, key, value| {
                let mark = ctx.mark();
                ctx.push("forloop", loop_info(idx, count, &parent));
                ctx.push(&self.key, key.clone());
                if let Some(name) = &self.value {
                    ctx.push(name, value.cloned().unwrap_or_default());
                }
                let res = render_nodes(&self.body, ctx, writer);
                ctx.pop_to(mark);
                match res {
                    Ok(()) => true,
                    Err(e) => {
                        failure = Some(e);
                        false
                    }
                }
            },
            || was_empty = true,
            self.reversed,
            self.sorted,
        );

        if let Some(e) = failure {
            return Err(e);
        }
        match &self.empty {
            Some(body) if was_empty => render_nodes(body, ctx, writer),
            _ => Ok(()),
        }
    }
}

/// `{% for key[, value] in expr [reversed] [sorted] %} ... [{% empty %} ...] {% endfor %}`
pub(crate) fn parse_for(
    doc: &mut Parser<'_>,
    start: &Token,
    args: &mut Parser<'_>,
) -> Result<Box<dyn TagNode>> {
    let key = args.expect_kind(TokenKind::Identifier, "Expected an identifier as loop variable")?;
    let value = if args.match_one(TokenKind::Symbol, ",").is_some() {
        let v = args.expect_kind(TokenKind::Identifier, "Value name must be an identifier")?;
        Some(v.val)
    } else {
        None
    };
    args.expect(TokenKind::Keyword, "in", "Expected keyword 'in'")?;
    let iterable = args.parse_expression()?;

    let mut reversed = false;
    let mut sorted = false;
    loop {
        if args.match_one(TokenKind::Keyword, "reversed").is_some() {
            reversed = true;
        } else if args.match_one(TokenKind::Keyword, "sorted").is_some() {
            sorted = true;
        } else {
            break;
        }
    }

    let (body, end) = doc.wrap_until_tag(&["empty", "endfor"])?;
    let empty = if end.name == "empty" {
        ensure_consumed(&end.args, "empty")?;
        let (body, end) = doc.wrap_until_tag(&["endfor"])?;
        ensure_consumed(&end.args, "endfor")?;
        Some(body)
    } else {
        ensure_consumed(&end.args, "endfor")?;
        None
    };

    Ok(Box::new(ForNode {
        key: key.val,
        value,
        iterable,
        reversed,
        sorted,
        body,
        empty,
        pos: start.pos.clone(),
    }))
}

/* ---------------------------------- set --------------------------------- */

#[derive(Debug)]
struct SetNode {
    name: String,
    expr: Expr,
    pos: Position,
}

impl TagNode for SetNode {
    fn execute(&self, ctx: &mut ExecutionContext<'_>, _: &mut TemplateWriter<'_>) -> Result<()> {
        let value = eval(&self.expr, ctx, &self.pos)?;
        ctx.set(&self.name, value);
        Ok(())
    }
}

/// `{% set name = expr %}`
pub(crate) fn parse_set(
    _: &mut Parser<'_>,
    start: &Token,
    args: &mut Parser<'_>,
) -> Result<Box<dyn TagNode>> {
    let name = args.expect_kind(TokenKind::Identifier, "Expected an identifier")?;
    args.expect(TokenKind::Symbol, "=", "Expected '='")?;
    let expr = args.parse_expression()?;
    Ok(Box::new(SetNode {
        name: name.val,
        expr,
        pos: start.pos.clone(),
    }))
}
