#![allow(
    clippy::tests_outside_test_module,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    reason = "benchmark"
)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::Value;
use stencil::{Engine, Expr, Expression, Model, Shape, Statement, TemplateRoot};

mod utils;

struct Account {
    name: String,
    age: i64,
    active: bool,
}

impl Model for Account {
    fn shape() -> Shape {
        Shape::of::<Self>()
            .field("name", |account| &account.name)
            .field("age", |account| &account.age)
            .field("active", |account| &account.active)
            .build()
    }
}

struct Entry {
    name: String,
    value: i64,
    special: bool,
}

impl Model for Entry {
    fn shape() -> Shape {
        Shape::of::<Self>()
            .field("name", |entry| &entry.name)
            .field("value", |entry| &entry.value)
            .field("special", |entry| &entry.special)
            .build()
    }
}

struct Profile {
    user: Account,
    items: Vec<Entry>,
    show_details: bool,
    has_access: bool,
}

impl Model for Profile {
    fn shape() -> Shape {
        Shape::of::<Self>()
            .field("user", |profile| &profile.user)
            .field("items", |profile| &profile.items)
            .field("show_details", |profile| &profile.show_details)
            .field("has_access", |profile| &profile.has_access)
            .build()
    }
}

fn user(member: &str) -> Expression {
    let outer = Expr::field::<Profile>("user").unwrap();
    Expr::sub_model(outer, Expr::field::<Account>(member).unwrap())
        .unwrap()
        .into()
}

fn profile_template() -> TemplateRoot {
    let item = Statement::block([
        Statement::literal("<li>"),
        Statement::write(Expr::field::<Entry>("name").unwrap()),
        Statement::literal(": "),
        Statement::write(Expr::field::<Entry>("value").unwrap()),
        Statement::conditional(
            Expr::field::<Entry>("special").unwrap(),
            Statement::literal(" *"),
            None,
        ),
        Statement::literal("</li>"),
    ]);

    TemplateRoot::new::<Profile>([
        Statement::literal("<h1>"),
        Statement::write(user("name")),
        Statement::literal("</h1><p>Age: "),
        Statement::write(user("age")),
        Statement::literal("</p>"),
        Statement::conditional(
            user("active"),
            Statement::literal("<p>Active</p>"),
            Some(Statement::literal("<p>Inactive</p>")),
        ),
        Statement::conditional(
            Expr::field::<Profile>("show_details").unwrap(),
            Statement::block([
                Statement::literal("<ul>"),
                Statement::iterate_or_else(
                    Expr::field::<Profile>("items").unwrap(),
                    item,
                    Statement::literal("<li>none</li>"),
                ),
                Statement::literal("</ul>"),
            ]),
            None,
        ),
        Statement::conditional(
            Expr::field::<Profile>("has_access").unwrap(),
            Statement::literal("<a href=\"/admin\">Admin</a>"),
            None,
        ),
    ])
}

// Convert JSON data to a typed profile
fn create_profile(json: &Value) -> Profile {
    let items = json["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| Entry {
            name: item["name"].as_str().unwrap().to_owned(),
            value: item["value"].as_i64().unwrap(),
            special: item["special"].as_bool().unwrap(),
        })
        .collect();

    Profile {
        user: Account {
            name: json["user"]["name"].as_str().unwrap().to_owned(),
            age: json["user"]["age"].as_i64().unwrap(),
            active: json["user"]["active"].as_bool().unwrap(),
        },
        items,
        show_details: json["show_details"].as_bool().unwrap(),
        has_access: json["has_access"].as_bool().unwrap(),
    }
}

fn stencil_benchmark(c: &mut Criterion) {
    let mut engine = Engine::new();
    engine.add_template("profile", profile_template()).unwrap();

    // Generate 100 random contexts
    let profiles: Vec<Profile> = utils::generate_random_contexts(100)
        .iter()
        .map(create_profile)
        .collect();

    utils::print_binary_size();

    let mut group = c.benchmark_group("Template Rendering");
    group.sample_size(50);

    group.bench_function("stencil_compile", |b| {
        b.iter(|| {
            black_box(stencil::compile::<Profile>(&profile_template(), &engine).unwrap());
        });
    });

    group.bench_function("stencil_render", |b| {
        let routine = engine.compile::<Profile>("profile").unwrap();
        b.iter(|| {
            for profile in &profiles {
                black_box(routine.render_to_string(profile).unwrap());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, stencil_benchmark);
criterion_main!(benches);
