use std::sync::Arc;

use stencil::{Context, Error, TemplateSet, context};

fn site() -> TemplateSet {
    TemplateSet::builder("site")
        .template(
            "base.html",
            "<title>{% block title %}Base{% endblock %}</title>\
             <main>{% block body %}{% block inner %}base-inner{% endblock %}{% endblock %}</main>\
             {% block footer %}(c) {{ year }}{% endblock %}",
        )
        .template(
            "page.html",
            "{% extends \"base.html\" %}\
             ignored text\
             {% block title %}Page {{ title }}{% endblock %}\
             {% block inner %}page-inner{% endblock %}",
        )
        .template(
            "article.html",
            "{% extends \"page.html\" %}{% block title %}Article{% endblock %}",
        )
        .build()
}

#[test]
fn test_child_overrides_parent_blocks() {
    let set = site();
    let page = set.get_template("page.html").unwrap();
    let out = page
        .execute(&context! { title => "One", year => 2024 })
        .unwrap();
    assert_eq!(
        out,
        "<title>Page One</title><main>page-inner</main>(c) 2024"
    );
}

#[test]
fn test_three_level_chain() {
    let set = site();
    let article = set.get_template("article.html").unwrap();
    assert_eq!(
        article.parent().map(|p| p.name()),
        Some("page.html")
    );
    let out = article.execute(&context! { year => 1999 }).unwrap();
    assert_eq!(out, "<title>Article</title><main>page-inner</main>(c) 1999");
}

#[test]
fn test_parent_is_shared_through_cache() {
    let set = site();
    let page = set.get_template("page.html").unwrap();
    let article = set.get_template("article.html").unwrap();
    assert!(Arc::ptr_eq(article.parent().unwrap(), &page));
}

#[test]
fn test_execute_blocks_prefers_most_derived() {
    let set = site();
    let article = set.get_template("article.html").unwrap();
    let blocks = article
        .execute_blocks(
            &context! { title => "x", year => 3 },
            &["title", "inner", "footer", "missing"],
        )
        .unwrap();
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks["title"], "Article");
    assert_eq!(blocks["inner"], "page-inner");
    assert_eq!(blocks["footer"], "(c) 3");
    assert!(!blocks.contains_key("missing"));
}

#[test]
fn test_execute_blocks_nested_block_uses_override() {
    let set = site();
    let page = set.get_template("page.html").unwrap();
    let blocks = page.execute_blocks(&Context::new(), &["body"]).unwrap();
    assert_eq!(blocks["body"], "page-inner");
}

#[test]
fn test_extends_cycle_is_rejected() {
    let set = TemplateSet::builder("cycle")
        .template("a", "{% extends \"b\" %}")
        .template("b", "{% extends \"a\" %}")
        .template("me", "{% extends \"me\" %}")
        .build();
    for name in ["a", "me"] {
        match set.get_template(name) {
            Err(Error::Syntax { message, .. }) => assert!(message.contains("recursively")),
            other => panic!("Expected syntax error for {}, got {:?}", name, other),
        }
    }
}

#[test]
fn test_extends_rules() {
    let set = TemplateSet::builder("rules")
        .template("base", "{% block a %}{% endblock %}")
        .build();
    for src in [
        "{% extends \"base\" %}{% extends \"base\" %}",
        "{% if true %}{% extends \"base\" %}{% endif %}",
        "{% extends \"nope\" %}",
        "{% block a %}{% endblock %}{% block a %}{% endblock %}",
        "{% block a %}{% endblock b %}",
    ] {
        assert!(set.from_string(src).is_err(), "{} should not compile", src);
    }
}
