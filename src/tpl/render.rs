use std::cmp::Ordering;

use crate::Result;
use crate::error::{Error, Position};
use crate::tpl::ast::{Expr, FilterCall, Node, Op, UnaryOp};
use crate::tpl::render_context::ExecutionContext;
use crate::tpl::writer::TemplateWriter;
use crate::value::{Datum, Value, kind_name};

/// Executes `nodes` in order against the same context and writer.
pub fn render_nodes(
    nodes: &[Node],
    ctx: &mut ExecutionContext<'_>,
    writer: &mut TemplateWriter<'_>,
) -> Result<()> {
    for node in nodes {
        node.execute(ctx, writer)?;
    }
    Ok(())
}

impl Node {
    pub fn execute(&self, ctx: &mut ExecutionContext<'_>, writer: &mut TemplateWriter<'_>) -> Result<()> {
        match self {
            Node::Html(text) => writer.write_str(text),
            Node::Output { expr, pos } => {
                let value = eval(expr, ctx, pos)?;
                writer.write_value(&value)
            }
            Node::Tag(tag) => tag.execute(ctx, writer),
        }
    }
}

/// Evaluates an expression. `pos` attributes errors raised by operators.
pub fn eval(expr: &Expr, ctx: &mut ExecutionContext<'_>, pos: &Position) -> Result<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Var(name) => Ok(ctx.lookup(name).cloned().unwrap_or_default()),
        Expr::Member(base, name) => Ok(eval(base, ctx, pos)?.member(name)),
        Expr::Subscript(base, key) => {
            let base = eval(base, ctx, pos)?;
            let key = eval(key, ctx, pos)?;
            Ok(base.subscript(&key))
        }
        Expr::Slice(base, from, to) => {
            let base = eval(base, ctx, pos)?;
            let from = match from {
                Some(e) => slice_bound(&eval(e, ctx, pos)?, pos)?,
                None => 0,
            };
            let to = match to {
                Some(e) => slice_bound(&eval(e, ctx, pos)?, pos)?,
                None => base.len(),
            };
            Ok(base.slice(from, to))
        }
        Expr::Unary(UnaryOp::Not, inner) => Ok(eval(inner, ctx, pos)?.negate()),
        Expr::Unary(UnaryOp::Neg, inner) => negative(&eval(inner, ctx, pos)?, pos),
        Expr::Binary(Op::And, left, right) => {
            if !eval(left, ctx, pos)?.is_true() {
                return Ok(Value::from(false));
            }
            Ok(Value::from(eval(right, ctx, pos)?.is_true()))
        }
        Expr::Binary(Op::Or, left, right) => {
            if eval(left, ctx, pos)?.is_true() {
                return Ok(Value::from(true));
            }
            Ok(Value::from(eval(right, ctx, pos)?.is_true()))
        }
        Expr::Binary(op, left, right) => {
            let left = eval(left, ctx, pos)?;
            let right = eval(right, ctx, pos)?;
            binary(*op, &left, &right, pos)
        }
        Expr::Filtered(base, filters) => {
            let value = eval(base, ctx, pos)?;
            apply_filters(value, filters, ctx)
        }
        Expr::Call {
            name,
            args,
            pos: call_pos,
        } => {
            let Some(callee) = ctx.find_macro(name) else {
                return Err(Error::execution(
                    call_pos,
                    format!("Macro '{}' is not defined", name),
                ));
            };
            let values = args
                .iter()
                .map(|arg| eval(arg, ctx, call_pos))
                .collect::<Result<Vec<_>>>()?;
            callee.call(values, ctx, call_pos)
        }
    }
}

/// Applies a filter chain left to right. Each parameter is evaluated right
/// before its filter runs.
pub fn apply_filters(
    value: Value,
    filters: &[FilterCall],
    ctx: &mut ExecutionContext<'_>,
) -> Result<Value> {
    let mut value = value;
    for filter in filters {
        let param = match &filter.param {
            Some(expr) => eval(expr, ctx, &filter.pos)?,
            None => Value::nil(),
        };
        value = ctx
            .filters()
            .apply(&filter.name, &value, &param, &filter.pos)?;
    }
    Ok(value)
}

fn slice_bound(value: &Value, pos: &Position) -> Result<usize> {
    usize::try_from(value.to_integer())
        .map_err(|_| Error::execution(pos, format!("Negative slice bound {}", value)))
}

fn int_result(n: i128) -> Value {
    match i64::try_from(n) {
        Ok(small) => Value::from(small),
        Err(_) => Value::from(n),
    }
}

fn negative(value: &Value, pos: &Position) -> Result<Value> {
    match value.resolve() {
        Datum::F32(f) => Ok(Value::from(-*f)),
        Datum::F64(f) => Ok(Value::from(-*f)),
        _ => match value.int_value() {
            Some(n) => n
                .checked_neg()
                .map(int_result)
                .ok_or_else(|| Error::execution(pos, "Integer overflow")),
            None => Err(Error::execution(
                pos,
                format!("Cannot negate {}", kind_name(value.resolve())),
            )),
        },
    }
}

fn binary(op: Op, left: &Value, right: &Value, pos: &Position) -> Result<Value> {
    let ordering = || left.compare(right);
    let result = match op {
        Op::Eq => Value::from(left.equal_value_to(right)),
        Op::Ne => Value::from(!left.equal_value_to(right)),
        Op::Lt => Value::from(ordering() == Ordering::Less),
        Op::Le => Value::from(ordering() != Ordering::Greater),
        Op::Gt => Value::from(ordering() == Ordering::Greater),
        Op::Ge => Value::from(ordering() != Ordering::Less),
        Op::In => Value::from(right.contains(left)),
        _ => return arithmetic(op, left, right, pos),
    };
    Ok(result)
}

fn arithmetic(op: Op, left: &Value, right: &Value, pos: &Position) -> Result<Value> {
    if let (Some(a), Some(b)) = (left.int_value(), right.int_value()) {
        if b == 0 && matches!(op, Op::Div | Op::Mod) {
            return Err(Error::execution(pos, "Integer division by zero"));
        }
        let result = match op {
            Op::Add => a.checked_add(b),
            Op::Sub => a.checked_sub(b),
            Op::Mul => a.checked_mul(b),
            Op::Div => a.checked_div(b),
            _ => a.checked_rem(b),
        };
        return result
            .map(int_result)
            .ok_or_else(|| Error::execution(pos, "Integer overflow"));
    }

    if left.is_number() && right.is_number() {
        let (a, b) = (left.to_float(), right.to_float());
        let result = match op {
            Op::Add => a + b,
            Op::Sub => a - b,
            Op::Mul => a * b,
            Op::Div => a / b,
            _ => a % b,
        };
        return Ok(Value::from(result));
    }

    if op == Op::Add && (left.is_string() || right.is_string()) {
        return Ok(Value::from(format!("{}{}", left, right)));
    }

    Err(Error::execution(
        pos,
        format!(
            "Operator {:?} not supported for {} and {}",
            op,
            kind_name(left.resolve()),
            kind_name(right.resolve())
        ),
    ))
}
