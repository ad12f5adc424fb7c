use std::str::FromStr;

use ponzu::config::TransformerConfig;
use ponzu::json::{from_json, to_json};
use ponzu::script::{Interpreter, Map, Value};
use ponzu::transform::{
    transform, Condition, ConditionalTransformer, SwitchTransformer, Transform, Transformer,
    TwoWaysTransformer,
};
use serde_json::{json, Value as Json};

fn run(input: Json, template: Json) -> Json {
    let interp = Interpreter::new();
    let out = transform(&interp, &from_json(&input), &from_json(&template), &Map::new()).unwrap();
    to_json(&out)
}

fn person() -> Json {
    json!({ "name": "Jesús" })
}

// ── transform ─────────────────────────────────────────────────────────────────

#[test]
fn values_and_paths_of_the_source() {
    let input = json!({
        "name": "Jesús",
        "surname": "Seijas",
        "measures": { "age": 45, "height": 176, "weight": 75 },
        "data": [1, 2, 3]
    });
    let template = json!({
        "personalData": {
            "name": "@name",
            "surname": "@surname",
            "title": "Mr.",
            "age": "@measures.age",
            "control": "@@something"
        },
        "kpis": {
            "height": "@measures.height",
            "weight": "@measures.weight",
            "control": "@data[1]"
        },
        "kpisArr": ["@measures.height", "@measures.weight", "@data[1]"],
        "id": 7
    });
    assert_eq!(
        run(input, template),
        json!({
            "personalData": {
                "name": "Jesús",
                "surname": "Seijas",
                "title": "Mr.",
                "age": 45,
                "control": "@something"
            },
            "kpis": { "height": 176, "weight": 75, "control": 2 },
            "kpisArr": [176, 75, 2],
            "id": 7
        })
    );
}

#[test]
fn defaults_for_missing_fields() {
    for (expr, expected) in [
        ("@surname || \"Doe\"", json!("Doe")),
        ("@age || 45", json!(45)),
        ("@age || 45.4", json!(45.4)),
        ("@age || \"45.4\"", json!("45.4")),
        ("@age || true", json!(true)),
    ] {
        assert_eq!(
            run(person(), json!({ "personalData": { "name": "@name", "v": expr } })),
            json!({ "personalData": { "name": "Jesús", "v": expected } }),
            "{expr}"
        );
    }
}

#[test]
fn context_entries_are_visible() {
    let interp = Interpreter::new();
    let mut context = Map::new();
    context.insert("prefix".into(), Value::from("Dr. "));
    context.insert(
        "upper".into(),
        Value::native("upper", |_, args| {
            Ok(Value::from(args[0].to_string().to_uppercase()))
        }),
    );
    let out = transform(
        &interp,
        &from_json(&person()),
        &from_json(&json!({ "title": "@prefix + upper(name)" })),
        &context,
    )
    .unwrap();
    assert_eq!(to_json(&out), json!({ "title": "Dr. JESÚS" }));
}

#[test]
fn expressions_can_use_helpers() {
    assert_eq!(
        run(
            json!({ "items": [{ "n": 1 }, { "n": 2 }, { "n": 3 }] }),
            json!({ "ns": "@items.map((i) => i.n * 10)", "big": "@items.filter((i) => i.n > 1).length" })
        ),
        json!({ "ns": [10, 20, 30], "big": 2 })
    );
}

#[test]
fn rebinding_fields_leaves_source_alone() {
    let interp = Interpreter::new();
    let source = from_json(&json!({ "name": "Ada" }));
    let out = transform(
        &interp,
        &source,
        &from_json(&json!({ "x": "@name = 'Grace'", "y": "@$.added = 1", "z": "@name" })),
        &Map::new(),
    )
    .unwrap();
    assert_eq!(to_json(&out), json!({ "x": "Grace", "y": 1, "z": "Ada" }));
    assert_eq!(to_json(&source), json!({ "name": "Ada" }));
}

#[test]
fn script_errors_propagate() {
    let interp = Interpreter::new();
    let err = transform(
        &interp,
        &from_json(&person()),
        &from_json(&json!({ "bad": "@name +" })),
        &Map::new(),
    );
    assert!(err.is_err());
}

// ── Transformers ──────────────────────────────────────────────────────────────

#[test]
fn transformer_merges_default_context() {
    let mut defaults = Map::new();
    defaults.insert("country".into(), Value::from("ES"));
    defaults.insert("lang".into(), Value::from("es"));
    let t = Transformer::new(from_json(&json!({ "where": "@country + '/' + lang" })))
        .with_default_context(defaults);
    let mut ctx = Map::new();
    ctx.insert("lang".into(), Value::from("ca"));
    let out = t
        .transform(&Interpreter::new(), &from_json(&json!({})), &ctx)
        .unwrap();
    assert_eq!(to_json(&out), json!({ "where": "ES/ca" }));
}

#[test]
fn default_transformer_yields_empty_object() {
    let out = Transformer::default()
        .transform(&Interpreter::new(), &from_json(&person()), &Map::new())
        .unwrap();
    assert_eq!(to_json(&out), json!({}));
}

#[test]
fn conditional_sees_call_context() {
    let t = ConditionalTransformer::new(
        Condition::expression("role === 'admin'"),
        Transformer::new(from_json(&json!({ "who": "@name", "admin": true }))),
    );
    let interp = Interpreter::new();
    let mut ctx = Map::new();
    ctx.insert("role".into(), Value::from("admin"));
    assert!(t.matches(&interp, &from_json(&person()), &ctx).unwrap());
    assert_eq!(
        to_json(&t.transform(&interp, &from_json(&person()), &ctx).unwrap()),
        json!({ "who": "Jesús", "admin": true })
    );
    assert_eq!(
        to_json(&t.transform(&interp, &from_json(&person()), &Map::new()).unwrap()),
        person()
    );
}

#[test]
fn switch_options_in_order() {
    let mut switch = SwitchTransformer::new()
        .with_fallback(Transformer::new(from_json(&json!({ "band": "adult" }))));
    switch
        .add_option(
            Condition::predicate(|source, _| {
                matches!(source, Value::Object(o) if o.borrow().get("age").is_some_and(|a| a.to_number() < 13.0))
            }),
            from_json(&json!({ "band": "child" })),
            Map::new(),
        )
        .add_option(
            Condition::expression("age < 20"),
            from_json(&json!({ "band": "teen", "years": "@age + suffix" })),
            [("suffix".to_owned(), Value::from("y"))].into_iter().collect(),
        );
    let interp = Interpreter::new();
    let band = |age: i64| {
        to_json(
            &switch
                .transform(&interp, &from_json(&json!({ "age": age })), &Map::new())
                .unwrap(),
        )
    };
    assert_eq!(band(8), json!({ "band": "child" }));
    assert_eq!(band(15), json!({ "band": "teen", "years": "15y" }));
    assert_eq!(band(40), json!({ "band": "adult" }));
}

#[test]
fn two_ways_transformer_round_trips_a_mapping() {
    let t = TwoWaysTransformer::new(
        Transformer::new(from_json(&json!({ "fullName": "@first + ' ' + last" }))),
        Transformer::new(from_json(&json!({
            "first": "@fullName.split(' ')[0]",
            "last": "@fullName.split(' ')[1]"
        }))),
    );
    let interp = Interpreter::new();
    let api = t
        .transform_in(&interp, &from_json(&json!({ "first": "Ada", "last": "Lovelace" })), &Map::new())
        .unwrap();
    assert_eq!(to_json(&api), json!({ "fullName": "Ada Lovelace" }));
    let back = t.transform_out(&interp, &api, &Map::new()).unwrap();
    assert_eq!(to_json(&back), json!({ "first": "Ada", "last": "Lovelace" }));
}

#[test]
fn switch_from_config_file() {
    let cfg = TransformerConfig::from_str(
        r#"{
            "transformation": { "status": "@status ?? 'unknown'" },
            "options": [
                { "when": "code >= 500", "transformation": { "status": "error", "code": "@code" } },
                { "when": "code >= 200 && code < 300", "transformation": { "status": "ok" } }
            ]
        }"#,
    )
    .unwrap();
    let switch = cfg.build().unwrap();
    let interp = Interpreter::new();
    let run = |src: Json| {
        to_json(
            &switch
                .transform(&interp, &from_json(&src), &Map::new())
                .unwrap(),
        )
    };
    assert_eq!(run(json!({ "code": 503 })), json!({ "status": "error", "code": 503 }));
    assert_eq!(run(json!({ "code": 204 })), json!({ "status": "ok" }));
    assert_eq!(run(json!({ "code": 404 })), json!({ "status": "unknown" }));
    assert_eq!(run(json!({ "code": 404, "status": "gone" })), json!({ "status": "gone" }));
}
