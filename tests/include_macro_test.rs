use stencil::{Context, Error, TemplateSet, context};

fn set() -> TemplateSet {
    TemplateSet::builder("partials")
        .global("site", "Example")
        .template("item.html", "[{{ name }}|{{ extra }}|{{ site }}]")
        .template(
            "macros.html",
            "{% macro shout(x) export %}{{ x|upper }}!{% endmacro %}\
             {% macro hidden() %}secret{% endmacro %}",
        )
        .build()
}

#[test]
fn test_include_sees_caller_context() {
    let set = set();
    let tpl = set
        .from_string("{% include \"item.html\" with extra=\"x\" %}")
        .unwrap();
    assert_eq!(
        tpl.execute(&context! { name => "N" }).unwrap(),
        "[N|x|Example]"
    );
}

#[test]
fn test_include_only_isolates_context() {
    let set = set();
    let tpl = set
        .from_string("{% include \"item.html\" with extra=name only %}")
        .unwrap();
    assert_eq!(
        tpl.execute(&context! { name => "N" }).unwrap(),
        "[|N|Example]"
    );
}

#[test]
fn test_include_sees_loop_variables() {
    let set = set();
    let tpl = set
        .from_string("{% for name in names %}{% include \"item.html\" %}{% endfor %}")
        .unwrap();
    assert_eq!(
        tpl.execute(&context! { names => vec!["a", "b"] }).unwrap(),
        "[a||Example][b||Example]"
    );
}

#[test]
fn test_missing_include_fails_at_compile_time() {
    let set = set();
    match set.from_string("{% include \"nope.html\" %}") {
        Err(Error::TemplateNotFound(name)) => assert_eq!(name, "nope.html"),
        other => panic!("Expected TemplateNotFound, got {:?}", other),
    }
}

#[test]
fn test_include_cycle_is_rejected() {
    let set = TemplateSet::builder("loop")
        .template("a", "{% include \"b\" %}")
        .template("b", "{% include \"a\" %}")
        .build();
    assert!(matches!(set.get_template("a"), Err(Error::Syntax { .. })));
}

#[test]
fn test_macro_with_defaults() {
    let set = set();
    let tpl = set
        .from_string(
            "{% macro greet(who, punct=\"!\") %}Hi {{ who }}{{ punct }}{% endmacro %}\
             {{ greet(\"<Bob>\") }} {{ greet(\"Al\", \"?\") }}",
        )
        .unwrap();
    assert_eq!(
        tpl.execute(&Context::new()).unwrap(),
        "Hi &lt;Bob&gt;! Hi Al?"
    );
}

#[test]
fn test_macro_does_not_see_caller_locals() {
    let set = set();
    let tpl = set
        .from_string(
            "{% macro show() %}[{{ local }}{{ name }}]{% endmacro %}\
             {% set local = \"L\" %}{{ show() }}",
        )
        .unwrap();
    assert_eq!(tpl.execute(&context! { name => "N" }).unwrap(), "[N]");
}

#[test]
fn test_macro_argument_errors() {
    let set = set();
    let tpl = set
        .from_string("{% macro one(a) %}{{ a }}{% endmacro %}{{ one(1, 2) }}")
        .unwrap();
    assert!(matches!(
        tpl.execute(&Context::new()),
        Err(Error::Execution { .. })
    ));
    assert!(
        set.from_string("{% macro dup(a, a) %}{% endmacro %}")
            .is_err()
    );
}

#[test]
fn test_recursive_macro_hits_depth_limit() {
    let set = set();
    let tpl = set
        .from_string("{% macro r(n) %}{{ r(n + 1) }}{% endmacro %}{{ r(0) }}")
        .unwrap();
    assert!(matches!(
        tpl.execute(&Context::new()),
        Err(Error::Execution { .. })
    ));
}

#[test]
fn test_import_exported_macro_with_alias() {
    let set = set();
    let tpl = set
        .from_string("{% import \"macros.html\" shout as yell, shout %}{{ yell(\"hey\") }} {{ shout(\"ho\") }}")
        .unwrap();
    assert_eq!(tpl.execute(&Context::new()).unwrap(), "HEY! HO!");
}

#[test]
fn test_import_unexported_macro_fails() {
    let set = set();
    assert!(matches!(
        set.from_string("{% import \"macros.html\" hidden %}"),
        Err(Error::Syntax { .. })
    ));
}

#[test]
fn test_context_key_clashing_with_exported_macro() {
    let set = set();
    let tpl = set.get_template("macros.html").unwrap();
    assert!(matches!(
        tpl.execute(&context! { shout => 1 }),
        Err(Error::Structural { .. })
    ));
    assert!(tpl.execute(&context! { hidden => 1 }).is_ok());
}

#[test]
fn test_imported_macro_resolves_helpers_in_importing_template() {
    let set = TemplateSet::builder("helpers")
        .template(
            "lib.html",
            "{% macro b() export %}B{% endmacro %}{% macro a() export %}a{{ b() }}{% endmacro %}",
        )
        .build();

    let only_a = set.from_string("{% import \"lib.html\" a %}{{ a() }}").unwrap();
    match only_a.execute(&Context::new()) {
        Err(Error::Execution { message, .. }) => assert!(message.contains("'b'")),
        other => panic!("Expected execution error, got {:?}", other),
    }

    let both = set.from_string("{% import \"lib.html\" a, b %}{{ a() }}").unwrap();
    assert_eq!(both.execute(&Context::new()).unwrap(), "aB");
}
