use crate::Result;
use crate::tpl::ast::{FilterCall, NodeList, TagNode};
use crate::tpl::lexer::{Token, TokenKind};
use crate::tpl::parser::Parser;
use crate::tpl::render::{apply_filters, render_nodes};
use crate::tpl::render_context::ExecutionContext;
use crate::tpl::tags::control::ensure_consumed;
use crate::tpl::whitespace::collapse_spaceless;
use crate::tpl::writer::TemplateWriter;
use crate::value::Value;

/* -------------------------------- filter -------------------------------- */

#[derive(Debug)]
struct FilterNode {
    chain: Vec<FilterCall>,
    body: NodeList,
}

impl TagNode for FilterNode {
    fn execute(&self, ctx: &mut ExecutionContext<'_>, writer: &mut TemplateWriter<'_>) -> Result<()> {
        let pool = ctx.pool();
        let mut buf = pool.checkout();
        render_nodes(&self.body, ctx, &mut writer.redirect(&mut *buf))?;

        let value = apply_filters(Value::from(buf.as_str()), &self.chain, ctx)?;
        // the body was escaped while rendering
        writer.write_str(&value.to_string())
    }
}

/// `{% filter name[:arg]|name2 %} ... {% endfilter %}`
pub(crate) fn parse_filter(
    doc: &mut Parser<'_>,
    _: &Token,
    args: &mut Parser<'_>,
) -> Result<Box<dyn TagNode>> {
    let mut chain = vec![args.parse_filter_call()?];
    while args.match_one(TokenKind::Symbol, "|").is_some() {
        chain.push(args.parse_filter_call()?);
    }
    if args.remaining() > 0 {
        return Err(args.error("Malformed filter-tag arguments"));
    }

    let (body, end) = doc.wrap_until_tag(&["endfilter"])?;
    ensure_consumed(&end.args, "endfilter")?;
    Ok(Box::new(FilterNode { chain, body }))
}

/* ------------------------------- spaceless ------------------------------ */

#[derive(Debug)]
struct SpacelessNode {
    body: NodeList,
}

impl TagNode for SpacelessNode {
    fn execute(&self, ctx: &mut ExecutionContext<'_>, writer: &mut TemplateWriter<'_>) -> Result<()> {
        let pool = ctx.pool();
        let mut buf = pool.checkout();
        render_nodes(&self.body, ctx, &mut writer.redirect(&mut *buf))?;
        writer.write_str(&collapse_spaceless(&buf))
    }
}

/// `{% spaceless %} ... {% endspaceless %}`
pub(crate) fn parse_spaceless(
    doc: &mut Parser<'_>,
    _: &Token,
    args: &mut Parser<'_>,
) -> Result<Box<dyn TagNode>> {
    ensure_consumed(args, "spaceless")?;
    let (body, end) = doc.wrap_until_tag(&["endspaceless"])?;
    ensure_consumed(&end.args, "endspaceless")?;
    Ok(Box::new(SpacelessNode { body }))
}
