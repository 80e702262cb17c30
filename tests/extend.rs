
use fixtures::{User, bob, get_engine};
use stencil::{Engine, Expr, Options, Slot, Statement, StencilError, TemplateRoot};

fn unit(body: Statement) -> TemplateRoot {
    TemplateRoot::from_statement::<()>(body)
}

fn extend<const N: usize>(parent: &str, overrides: [(&str, Statement); N]) -> Statement {
    Statement::extend(parent, overrides).unwrap()
}

#[test]
#[ntest::timeout(100)]
fn test_extend_a_template() {
    let master = TemplateRoot::new::<User>([
        Statement::literal("<html><head>"),
        Statement::required_override("head"),
        Statement::literal("</head></html>"),
    ]);
    let page = TemplateRoot::from_statement::<User>(extend(
        "master",
        [(
            "head",
            Statement::block([
                Statement::literal("<title>"),
                Statement::write(Expr::field::<User>("Name").unwrap()),
                Statement::literal("</title>"),
            ]),
        )],
    ));
    let engine = get_engine([("master", master), ("page", page)]);

    assert_eq!(
        engine.render("page", &bob()).unwrap(),
        "<html><head><title>Bob</title></head></html>"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_missing_optional_override_renders_nothing() {
    let engine = get_engine([
        (
            "master",
            unit(Statement::block([
                Statement::literal("Hello"),
                Statement::optional_override("foo"),
            ])),
        ),
        ("page", unit(Statement::inherit("master"))),
    ]);
    assert_eq!(engine.render("page", &()).unwrap(), "Hello");
}

#[test]
#[ntest::timeout(100)]
fn test_missing_required_override_fails() {
    let engine = get_engine([
        (
            "master",
            unit(Statement::block([
                Statement::literal("Hello"),
                Statement::required_override("foo"),
            ])),
        ),
        ("page", unit(Statement::inherit("master"))),
    ]);
    assert_eq!(
        engine.render("page", &()),
        Err(StencilError::MissingOverride {
            template_name: "master".to_string(),
            override_name: "foo".to_string(),
        })
    );
}

#[test]
#[ntest::timeout(100)]
fn test_default_used_when_not_overridden() {
    let engine = get_engine([
        (
            "master",
            unit(Statement::block([
                Statement::literal("Hello "),
                Statement::default_override("foo", Statement::literal("World")),
            ])),
        ),
        ("page", unit(Statement::inherit("master"))),
    ]);
    assert_eq!(engine.render("page", &()).unwrap(), "Hello World");
}

fn greeting_chain() -> [(&'static str, TemplateRoot); 3] {
    [
        (
            "one",
            unit(Statement::block([
                Statement::required_override("start"),
                Statement::required_override("middle"),
                Statement::required_override("end"),
            ])),
        ),
        (
            "two",
            unit(extend(
                "one",
                [
                    ("start", Statement::literal("Hello ")),
                    ("middle", Statement::literal("there ")),
                    ("end", Statement::default_override("name", Statement::literal("world"))),
                ],
            )),
        ),
        (
            "three",
            unit(extend(
                "two",
                [
                    ("start", Statement::literal("Well hello ")),
                    ("name", Statement::literal("Bob")),
                ],
            )),
        ),
    ]
}

fn strict_engine<I>(templates: I) -> Engine
where
    I: IntoIterator<Item = (&'static str, TemplateRoot)>,
{
    let mut engine = Engine::with_options(Options::strict());
    for (name, root) in templates {
        engine.add_template(name, root).unwrap();
    }
    engine
}

#[test]
#[ntest::timeout(100)]
fn test_nested_extends() {
    let engine = get_engine(greeting_chain());

    assert_eq!(engine.render("two", &()).unwrap(), "Hello there world");
    assert_eq!(engine.render("three", &()).unwrap(), "Well hello there Bob");
}

#[test]
#[ntest::timeout(100)]
fn test_strict_mode_accepts_refilled_overrides_in_a_chain() {
    let engine = strict_engine(greeting_chain());

    assert_eq!(engine.render("two", &()).unwrap(), "Hello there world");
    assert_eq!(engine.render("three", &()).unwrap(), "Well hello there Bob");
}

#[test]
#[ntest::timeout(100)]
fn test_strict_mode_names_the_template_with_the_stray_fill() {
    let [one, two, _] = greeting_chain();
    let four = unit(extend(
        "two",
        [("name", Statement::literal("Bob")), ("finish", Statement::literal("!"))],
    ));
    let engine = strict_engine([one, two, ("four", four)]);

    assert_eq!(
        engine.render("four", &()),
        Err(StencilError::UnusedOverride {
            template_name: "four".to_string(),
            override_name: "finish".to_string(),
        })
    );
}

#[test]
#[ntest::timeout(100)]
fn test_extend_inside_fill_uses_its_own_overrides() {
    let engine = get_engine([
        (
            "layout",
            unit(Statement::block([
                Statement::required_override("title"),
                Statement::literal("|"),
                Statement::required_override("body"),
            ])),
        ),
        ("widget", unit(Statement::required_override("title"))),
        (
            "page",
            unit(extend(
                "layout",
                [
                    ("title", Statement::literal("Page")),
                    ("body", extend("widget", [("title", Statement::literal("Widget"))])),
                ],
            )),
        ),
    ]);

    assert_eq!(engine.render("page", &()).unwrap(), "Page|Widget");
}

#[test]
#[ntest::timeout(100)]
fn test_extend_inside_fill_in_strict_mode() {
    let engine = strict_engine([
        ("layout", unit(Statement::optional_override("body"))),
        ("widget", unit(Statement::optional_override("title"))),
        (
            "page",
            unit(extend(
                "layout",
                [(
                    "body",
                    extend(
                        "widget",
                        [("title", Statement::literal("W")), ("icon", Statement::literal("*"))],
                    ),
                )],
            )),
        ),
    ]);

    // The nested fills belong to the page, which supplied them.
    assert_eq!(
        engine.render("page", &()),
        Err(StencilError::UnusedOverride {
            template_name: "page".to_string(),
            override_name: "icon".to_string(),
        })
    );
}

#[test]
#[ntest::timeout(100)]
fn test_cyclic_extend() {
    let engine = get_engine([
        ("a", unit(Statement::inherit("b"))),
        ("b", unit(Statement::inherit("a"))),
    ]);
    assert_eq!(
        engine.render("a", &()),
        Err(StencilError::CyclicExtend {
            chain: vec!["a".to_string(), "b".to_string(), "a".to_string()]
        })
    );
}

#[test]
#[ntest::timeout(100)]
fn test_duplicate_override_name() {
    let result = Statement::extend(
        "master",
        [("head", Statement::literal("a")), ("head", Statement::literal("b"))],
    );
    assert_eq!(
        result,
        Err(StencilError::DuplicateOverride {
            override_name: "head".to_string()
        })
    );
}

#[test]
#[ntest::timeout(100)]
fn test_unused_override_only_rejected_in_strict_mode() {
    let templates = [
        ("master", unit(Statement::literal("Hello"))),
        (
            "page",
            unit(extend("master", [("typo", Statement::literal("ignored"))])),
        ),
    ];

    let lenient = get_engine(templates.clone());
    assert_eq!(lenient.render("page", &()).unwrap(), "Hello");

    let strict = strict_engine(templates);
    assert_eq!(
        strict.render("page", &()),
        Err(StencilError::UnusedOverride {
            template_name: "page".to_string(),
            override_name: "typo".to_string(),
        })
    );
}

#[test]
#[ntest::timeout(100)]
fn test_fill_can_include_other_templates() {
    let engine = get_engine([
        (
            "layout",
            TemplateRoot::new::<User>([
                Statement::literal("["),
                Statement::required_override("content"),
                Statement::literal("]"),
            ]),
        ),
        (
            "tag",
            TemplateRoot::new::<String>([
                Statement::literal("#"),
                Statement::write(Expr::this::<String>()),
            ]),
        ),
        (
            "page",
            TemplateRoot::from_statement::<User>(extend(
                "layout",
                [(
                    "content",
                    Statement::iterate(
                        Expr::field::<User>("Tags").unwrap(),
                        Statement::include("tag", Expr::this::<String>()),
                    ),
                )],
            )),
        ),
    ]);
    assert_eq!(engine.render("page", &bob()).unwrap(), "[#new#vip]");
}

#[test]
#[ntest::timeout(100)]
fn test_open_slots() {
    let engine = get_engine([
        (
            "one",
            unit(Statement::block([
                Statement::required_override("start"),
                Statement::default_override("middle", Statement::literal("-")),
                Statement::optional_override("end"),
                Statement::required_override("start"),
            ])),
        ),
        (
            "two",
            unit(extend("one", [("start", Statement::literal("Hi"))])),
        ),
    ]);

    assert_eq!(
        engine.open_slots("one").unwrap(),
        vec![
            Slot {
                name: "start".to_string(),
                required: true,
                has_default: false,
            },
            Slot {
                name: "middle".to_string(),
                required: false,
                has_default: true,
            },
            Slot {
                name: "end".to_string(),
                required: false,
                has_default: false,
            },
        ]
    );
    assert_eq!(engine.open_slots("two").unwrap().len(), 2);
    assert!(matches!(
        engine.open_slots("three"),
        Err(StencilError::MissingTemplate { .. })
    ));
}
