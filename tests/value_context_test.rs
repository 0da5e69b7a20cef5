use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use stencil::{Context, Object, ObjectKind, TemplateSet, ToValue, Value, context, to_context};

#[derive(Debug, Clone, Object)]
struct User {
    name: String,
    age: u32,
    #[object(rename = "mail")]
    email: String,
    #[object(skip)]
    #[allow(dead_code)]
    password: String,
    tags: Vec<String>,
}

fn alice() -> User {
    User {
        name: "Alice".to_string(),
        age: 30,
        email: "a@example.com".to_string(),
        password: "hunter2".to_string(),
        tags: vec!["admin".to_string(), "ops".to_string()],
    }
}

fn render(source: &str, ctx: &Context) -> String {
    TemplateSet::new("values")
        .from_string(source)
        .expect("Failed to compile")
        .execute(ctx)
        .expect("Failed to render")
}

#[test]
fn test_derived_object_members() {
    let user = alice();
    assert_eq!(user.type_name(), "User");
    assert_eq!(user.keys(), vec!["name", "age", "mail", "tags"]);
    assert!(user.get_member("password").is_none());
    assert!(user.get_member("email").is_none());

    let ctx = context! { user => user };
    assert_eq!(
        render("{{ user.name }} ({{ user.age }}) <{{ user.mail }}>[{{ user.password }}]", &ctx),
        "Alice (30) &lt;a@example.com&gt;[]"
    );
    assert_eq!(render("{{ user.tags|join:\"/\" }}", &ctx), "admin/ops");
    assert_eq!(render("{% if user %}yes{% endif %}", &ctx), "yes");
}

#[test]
fn test_serialize_context() {
    #[derive(Serialize)]
    struct Order {
        id: u64,
        lines: Vec<Line>,
        note: Option<String>,
    }
    #[derive(Serialize)]
    struct Line {
        sku: &'static str,
        qty: i32,
    }
    let order = Order {
        id: 7,
        lines: vec![Line { sku: "A1", qty: 2 }, Line { sku: "B2", qty: 1 }],
        note: None,
    };
    let ctx = to_context(&order).unwrap();
    assert_eq!(
        render(
            "#{{ id }}:{% for l in lines %} {{ l.sku }}x{{ l.qty }}{% endfor %}{% if not note %} -{% endif %}",
            &ctx
        ),
        "#7: A1x2 B2x1 -"
    );
}

#[test]
fn test_json_context() {
    let json = serde_json::json!({
        "title": "Report",
        "rows": [{"k": "a", "v": 1.5}, {"k": "b", "v": 2}],
        "meta": {"draft": true}
    });
    let ctx = to_context(&json).unwrap();
    assert_eq!(
        render(
            "{{ title }}{% for r in rows %};{{ r.k }}={{ r.v }}{% endfor %};{{ meta.draft }}",
            &ctx
        ),
        "Report;a=1.500000;b=2;True"
    );
}

#[test]
fn test_host_conversions() {
    let mut scores = HashMap::new();
    scores.insert("x".to_string(), 1u8);
    let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    let ctx = context! {
        maybe => Some(5),
        nothing => Option::<i32>::None,
        scores => scores,
        shared => Arc::new(9i64),
        day => date,
    };
    assert_eq!(
        render("{{ maybe }}|{{ nothing }}|{{ scores.x }}|{{ shared }}|{{ day }}", &ctx),
        "5||1|9|2024-02-29"
    );
}

#[test]
fn test_value_truthiness() {
    for v in [
        Value::from(""),
        Value::from(0),
        Value::from(0.0),
        Value::from(false),
        Value::nil(),
        Value::from(Vec::<Value>::new()),
    ] {
        assert!(!v.is_true(), "{:?} should be false", v);
    }
    for v in [
        Value::from("x"),
        Value::from(-1),
        Value::from(0.1),
        Value::from(true),
        alice().to_value(),
    ] {
        assert!(v.is_true(), "{:?} should be true", v);
    }
}

#[derive(Debug)]
struct Countdown(usize);

impl Object for Countdown {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Seq
    }

    fn get_indexed(&self, idx: usize) -> Option<Value> {
        (idx < self.0).then(|| Value::from(self.0 - idx))
    }

    fn len(&self) -> Option<usize> {
        Some(self.0)
    }
}

#[test]
fn test_custom_sequence_object() {
    let mut ctx = Context::new();
    ctx.insert("c".to_string(), Value::from_object(Countdown(3)));
    assert_eq!(
        render("{% for n in c %}{{ n }}{% endfor %} {{ c|length }} {{ c[0] }} {{ 2 in c }}", &ctx),
        "321 3 3 True"
    );
}
