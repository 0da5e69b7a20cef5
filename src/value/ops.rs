use std::cmp::Ordering;

use log::warn;

use crate::value::{Datum, ObjectKind, Value, kind_name};

impl Value {
    /// Substring test for strings, member test for structs, key test for
    /// mappings, element test (via [`Value::equal_value_to`]) for sequences.
    /// Unsupported kinds yield false.
    pub fn contains(&self, other: &Value) -> bool {
        match self.resolve() {
            Datum::Nil => false,
            Datum::Str(s) => s.contains(other.to_string().as_str()),
            Datum::Map(map) => match other.resolve() {
                Datum::Str(key) => map.contains_key(key),
                _ => false,
            },
            Datum::List(items) => items.iter().any(|item| other.equal_value_to(item)),
            Datum::Object(obj) => match obj.kind() {
                ObjectKind::Struct => {
                    let name = other.to_string();
                    obj.keys().iter().any(|key| *key == name)
                }
                ObjectKind::Map => match other.resolve() {
                    Datum::Str(key) => obj.get_member(key).is_some(),
                    _ => false,
                },
                ObjectKind::Seq => (0..obj.len().unwrap_or(0))
                    .filter_map(|idx| obj.get_indexed(idx))
                    .any(|item| other.equal_value_to(&item)),
            },
            datum => {
                warn!("Value::contains() not available for {}", kind_name(datum));
                false
            }
        }
    }

    /// Value equality: integers compare numerically regardless of width and
    /// signedness, timestamps compare as instants, nil equals only nil.
    /// Aggregates are never equal.
    pub fn equal_value_to(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.int_value(), other.int_value()) {
            if let (Datum::U128(x), Datum::U128(y)) = (self.resolve(), other.resolve()) {
                return x == y;
            }
            return a == b;
        }
        if let (Some(a), Some(b)) = (self.time_value(), other.time_value()) {
            return a == b;
        }
        match (self.resolve(), other.resolve()) {
            (Datum::Nil, b) => matches!(b, Datum::Nil),
            (_, Datum::Nil) => false,
            (Datum::Str(a), Datum::Str(b)) => a == b,
            (Datum::Bool(a), Datum::Bool(b)) => a == b,
            (Datum::F32(a), Datum::F32(b)) => a == b,
            (Datum::F64(a), Datum::F64(b)) => a == b,
            _ => false,
        }
    }

    /// Sort order: numerically when both sides are numbers (mixed integer and
    /// float compare as floats), otherwise by string form.
    pub fn compare(&self, other: &Value) -> Ordering {
        if let (Some(a), Some(b)) = (self.int_value(), other.int_value()) {
            return a.cmp(&b);
        }
        if self.is_number() && other.is_number() {
            return self
                .to_float()
                .partial_cmp(&other.to_float())
                .unwrap_or(Ordering::Equal);
        }
        self.to_string().cmp(&other.to_string())
    }

    /// Iterates in natural order. See [`Value::iterate_order`].
    pub fn iterate<F, E>(&self, on_item: F, on_empty: E)
    where
        F: FnMut(usize, usize, &Value, Option<&Value>) -> bool,
        E: FnOnce(),
    {
        self.iterate_order(on_item, on_empty, false, false)
    }

    /// Calls `on_item(index, count, key, value)` per element, stopping early
    /// when it returns false, or `on_empty` once when there are no elements.
    ///
    /// Strings yield one rune per item, sequences their elements, mappings their
    /// keys together with the looked-up value. `value` is `None` for everything
    /// except mappings. Mapping order is only defined with `sorted`; `reverse`
    /// alone leaves mappings untouched.
    pub fn iterate_order<F, E>(&self, mut on_item: F, on_empty: E, reverse: bool, sorted: bool)
    where
        F: FnMut(usize, usize, &Value, Option<&Value>) -> bool,
        E: FnOnce(),
    {
        match self.resolve() {
            Datum::Nil => on_empty(),
            Datum::Str(s) => {
                let mut chars: Vec<char> = s.chars().collect();
                if sorted {
                    chars.sort();
                }
                if reverse {
                    chars.reverse();
                }
                let items = chars.into_iter().map(|c| Value::from(c.to_string())).collect();
                iterate_items(items, on_item, on_empty);
            }
            Datum::List(items) => {
                let items = order_items(items.as_ref().clone(), reverse, sorted);
                iterate_items(items, on_item, on_empty);
            }
            Datum::Map(map) => {
                let mut keys: Vec<Value> = map.keys().map(|k| Value::from(k.as_str())).collect();
                if sorted {
                    sort_values(&mut keys, reverse);
                }
                let count = keys.len();
                if count == 0 {
                    return on_empty();
                }
                for (idx, key) in keys.iter().enumerate() {
                    let value = map.get(&key.to_string()).cloned().unwrap_or_default();
                    if !on_item(idx, count, key, Some(&value)) {
                        return;
                    }
                }
            }
            Datum::Object(obj) => match obj.kind() {
                ObjectKind::Seq => {
                    let items = (0..obj.len().unwrap_or(0))
                        .map(|idx| obj.get_indexed(idx).unwrap_or_default())
                        .collect();
                    let items = order_items(items, reverse, sorted);
                    iterate_items(items, on_item, on_empty);
                }
                ObjectKind::Map => {
                    let mut keys: Vec<Value> = obj.keys().into_iter().map(Value::from).collect();
                    if sorted {
                        sort_values(&mut keys, reverse);
                    }
                    let count = keys.len();
                    if count == 0 {
                        return on_empty();
                    }
                    for (idx, key) in keys.iter().enumerate() {
                        let value = obj.get_member(&key.to_string()).unwrap_or_default();
                        if !on_item(idx, count, key, Some(&value)) {
                            return;
                        }
                    }
                }
                ObjectKind::Struct => {
                    warn!("Value::iterate() not available for {}", obj.type_name());
                    on_empty();
                }
            },
            datum => {
                warn!("Value::iterate() not available for {}", kind_name(datum));
                on_empty();
            }
        }
    }

    /// Member access as used by `a.b`: mapping key, struct field, or a numeric
    /// index into a sequence. Missing members are nil.
    pub fn member(&self, name: &str) -> Value {
        match self.resolve() {
            Datum::Map(map) => map.get(name).cloned().unwrap_or_default(),
            Datum::Object(obj) if obj.kind() != ObjectKind::Seq => {
                obj.get_member(name).unwrap_or_default()
            }
            _ if self.can_slice() => match name.parse::<usize>() {
                Ok(idx) => self.index(idx),
                Err(_) => Value::nil(),
            },
            _ => Value::nil(),
        }
    }

    /// Subscript access as used by `a[key]`.
    pub fn subscript(&self, key: &Value) -> Value {
        if key.is_integer() {
            return match usize::try_from(key.to_integer()) {
                Ok(idx) if self.can_slice() => self.index(idx),
                Ok(_) => self.member(&key.to_string()),
                Err(_) => Value::nil(),
            };
        }
        self.member(&key.to_string())
    }
}

fn order_items(mut items: Vec<Value>, reverse: bool, sorted: bool) -> Vec<Value> {
    if sorted {
        sort_values(&mut items, reverse);
    } else if reverse {
        items.reverse();
    }
    items
}

fn sort_values(items: &mut [Value], reverse: bool) {
    if reverse {
        items.sort_by(|a, b| b.compare(a));
    } else {
        items.sort_by(|a, b| a.compare(b));
    }
}

fn iterate_items<F, E>(items: Vec<Value>, mut on_item: F, on_empty: E)
where
    F: FnMut(usize, usize, &Value, Option<&Value>) -> bool,
    E: FnOnce(),
{
    let count = items.len();
    if count == 0 {
        return on_empty();
    }
    for (idx, item) in items.iter().enumerate() {
        if !on_item(idx, count, item, None) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn list(items: &[i64]) -> Value {
        Value::from(items.iter().map(|n| Value::from(*n)).collect::<Vec<_>>())
    }

    fn collect(v: &Value, reverse: bool, sorted: bool) -> (Vec<String>, usize) {
        let mut out = Vec::new();
        let mut empty = 0;
        v.iterate_order(
            |_, _, key, _| {
                out.push(key.to_string());
                true
            },
            || empty += 1,
            reverse,
            sorted,
        );
        (out, empty)
    }

    #[test]
    fn test_contains_kinds() {
        assert!(Value::from("Hello, World!").contains(&Value::from("World")));
        assert!(!Value::from("Hello").contains(&Value::from("x")));

        let mut map = HashMap::new();
        map.insert("a".to_string(), Value::from(1));
        let map = Value::from(map);
        assert!(map.contains(&Value::from("a")));
        assert!(!map.contains(&Value::from("b")));
        // key type must match
        assert!(!map.contains(&Value::from(1)));

        assert!(list(&[1, 2, 3]).contains(&Value::from(2u8)));
        assert!(!list(&[1, 2, 3]).contains(&Value::from("2")));
        assert!(!Value::from(true).contains(&Value::from(true)));
        assert!(!Value::nil().contains(&Value::from(1)));
    }

    #[test]
    fn test_equal_value_to_across_widths() {
        assert!(Value::from(3u64).equal_value_to(&Value::from(3i8)));
        assert!(!Value::from(3u64).equal_value_to(&Value::from(-3i64)));
        assert!(Value::nil().equal_value_to(&Value::nil()));
        assert!(!Value::nil().equal_value_to(&Value::from(0)));
        assert!(!Value::from(0).equal_value_to(&Value::nil()));
        assert!(Value::from("a").equal_value_to(&Value::from("a")));
        assert!(!list(&[1]).equal_value_to(&list(&[1])));
    }

    #[test]
    fn test_iterate_list_orders() {
        let v = list(&[3, 1, 2]);
        assert_eq!(collect(&v, false, false).0, vec!["3", "1", "2"]);
        assert_eq!(collect(&v, true, false).0, vec!["2", "1", "3"]);
        assert_eq!(collect(&v, false, true).0, vec!["1", "2", "3"]);
        assert_eq!(collect(&v, true, true).0, vec!["3", "2", "1"]);
    }

    #[test]
    fn test_iterate_mixed_numbers_sort_numerically() {
        let v = Value::from(vec![Value::from(10), Value::from(2.5f64), Value::from(3u8)]);
        assert_eq!(collect(&v, false, true).0, vec!["2.500000", "3", "10"]);
    }

    #[test]
    fn test_iterate_strings_by_rune() {
        let (items, empty) = collect(&Value::from("cäb"), false, true);
        assert_eq!(items, vec!["b", "c", "ä"]);
        assert_eq!(empty, 0);
    }

    #[test]
    fn test_iterate_empty_calls_on_empty_once() {
        assert_eq!(collect(&list(&[]), false, false), (vec![], 1));
        assert_eq!(collect(&Value::from(""), false, false), (vec![], 1));
        assert_eq!(collect(&Value::nil(), false, false), (vec![], 1));
        assert_eq!(collect(&Value::from(5), false, false), (vec![], 1));
    }

    #[test]
    fn test_iterate_map_sorted_with_values() {
        let mut map = HashMap::new();
        map.insert("b".to_string(), Value::from(2));
        map.insert("a".to_string(), Value::from(1));
        map.insert("c".to_string(), Value::from(3));
        let v = Value::from(map);

        let mut seen = Vec::new();
        v.iterate_order(
            |idx, count, key, value| {
                seen.push((idx, count, key.to_string(), value.map(|v| v.to_integer())));
                true
            },
            || panic!("not empty"),
            true,
            true,
        );
        assert_eq!(
            seen,
            vec![
                (0, 3, "c".to_string(), Some(3)),
                (1, 3, "b".to_string(), Some(2)),
                (2, 3, "a".to_string(), Some(1)),
            ]
        );
    }

    #[test]
    fn test_iterate_stops_early() {
        let mut seen = 0;
        list(&[1, 2, 3, 4]).iterate(
            |idx, _, _, _| {
                seen += 1;
                idx < 1
            },
            || {},
        );
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_member_and_subscript() {
        let mut map = HashMap::new();
        map.insert("name".to_string(), Value::from("x"));
        let v = Value::from(map);
        assert_eq!(v.member("name").to_string(), "x");
        assert!(v.member("missing").is_nil());
        assert_eq!(v.subscript(&Value::from("name")).to_string(), "x");

        let l = list(&[7, 8]);
        assert_eq!(l.member("1").to_integer(), 8);
        assert_eq!(l.subscript(&Value::from(0)).to_integer(), 7);
        assert!(l.subscript(&Value::from(-1)).is_nil());
    }
}
