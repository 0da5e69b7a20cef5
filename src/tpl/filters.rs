use std::collections::HashMap;
use std::sync::Arc;

use log::warn;

use crate::error::{Error, FilterError, Position};
use crate::tpl::writer::escape_html_string;
use crate::value::{Datum, Value};

pub type FilterResult = std::result::Result<Value, FilterError>;

/// A filter: `(input, param) -> output`. `param` is nil when the call gave none.
pub type FilterFn = Arc<dyn Fn(&Value, &Value) -> FilterResult + Send + Sync>;

/// Name to filter table, owned by a template set.
#[derive(Clone)]
pub struct FilterRegistry {
    filters: HashMap<String, FilterFn>,
}

impl Default for FilterRegistry {
    /// A registry with every built-in filter.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("safe", filter_safe);
        registry.register("escape", filter_escape);
        registry.register("e", filter_escape);
        registry.register("upper", filter_upper);
        registry.register("lower", filter_lower);
        registry.register("title", filter_title);
        registry.register("capfirst", filter_capfirst);
        registry.register("length", filter_length);
        registry.register("default", filter_default);
        registry.register("join", filter_join);
        registry.register("first", filter_first);
        registry.register("last", filter_last);
        registry.register("trim", filter_trim);
        registry.register("cut", filter_cut);
        registry.register("add", filter_add);
        registry
    }
}

impl FilterRegistry {
    pub fn empty() -> Self {
        Self {
            filters: HashMap::new(),
        }
    }

    /// Registers `filter` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: &str, filter: F)
    where
        F: Fn(&Value, &Value) -> FilterResult + Send + Sync + 'static,
    {
        if self
            .filters
            .insert(name.to_string(), Arc::new(filter))
            .is_some()
        {
            warn!("filter '{}' registered twice, replacing previous filter", name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Runs the named filter; unknown names and filter failures are
    /// execution errors at `pos`.
    pub fn apply(&self, name: &str, input: &Value, param: &Value, pos: &Position) -> crate::Result<Value> {
        let Some(filter) = self.filters.get(name) else {
            return Err(Error::execution(pos, format!("Filter '{}' does not exist", name)));
        };
        filter(input, param)
            .map_err(|e| Error::execution(pos, format!("Filter '{}' failed: {}", name, e)))
    }
}

fn filter_safe(input: &Value, _: &Value) -> FilterResult {
    Ok(input.clone().into_safe())
}

fn filter_escape(input: &Value, _: &Value) -> FilterResult {
    Ok(Value::from(escape_html_string(&input.to_string())).into_safe())
}

fn filter_upper(input: &Value, _: &Value) -> FilterResult {
    Ok(Value::from(input.to_string().to_uppercase()))
}

fn filter_lower(input: &Value, _: &Value) -> FilterResult {
    Ok(Value::from(input.to_string().to_lowercase()))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn filter_title(input: &Value, _: &Value) -> FilterResult {
    let lower = input.to_string().to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut word_start = true;
    for c in lower.chars() {
        if word_start && c.is_alphabetic() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        word_start = !c.is_alphanumeric();
    }
    Ok(Value::from(out))
}

fn filter_capfirst(input: &Value, _: &Value) -> FilterResult {
    Ok(Value::from(capitalize(&input.to_string())))
}

fn filter_length(input: &Value, _: &Value) -> FilterResult {
    Ok(Value::from(input.len()))
}

fn filter_default(input: &Value, param: &Value) -> FilterResult {
    if input.is_true() {
        Ok(input.clone())
    } else {
        Ok(param.clone())
    }
}

fn filter_join(input: &Value, param: &Value) -> FilterResult {
    if !input.can_slice() {
        return Err(FilterError::new("join requires a string or a sequence"));
    }
    let sep = param.to_string();
    let mut parts = Vec::with_capacity(input.len());
    input.iterate(
        |_, _, item, _| {
            parts.push(item.to_string());
            true
        },
        || {},
    );
    Ok(Value::from(parts.join(&sep)))
}

fn filter_first(input: &Value, _: &Value) -> FilterResult {
    if input.can_slice() && !input.is_empty() {
        return Ok(input.index(0));
    }
    Ok(Value::from(""))
}

fn filter_last(input: &Value, _: &Value) -> FilterResult {
    if input.can_slice() && !input.is_empty() {
        return Ok(input.index(input.len() - 1));
    }
    Ok(Value::from(""))
}

fn filter_trim(input: &Value, _: &Value) -> FilterResult {
    Ok(Value::from(input.to_string().trim()))
}

fn filter_cut(input: &Value, param: &Value) -> FilterResult {
    Ok(Value::from(input.to_string().replace(&param.to_string(), "")))
}

fn filter_add(input: &Value, param: &Value) -> FilterResult {
    if input.is_number() && param.is_number() {
        if input.is_integer() && param.is_integer() {
            return Ok(Value::from(input.to_integer().wrapping_add(param.to_integer())));
        }
        return Ok(Value::from(input.to_float() + param.to_float()));
    }
    match (input.resolve(), param.resolve()) {
        (Datum::List(a), Datum::List(b)) => {
            let mut joined = a.as_ref().clone();
            joined.extend(b.iter().cloned());
            Ok(Value::from(joined))
        }
        _ => Ok(Value::from(format!("{}{}", input, param))),
    }
}
