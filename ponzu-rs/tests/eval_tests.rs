use std::any::Any;
use std::rc::Rc;

use ponzu::json::{from_json, to_json};
use ponzu::script::{
    evaluate, Binding, CollectedDiagnostics, Date, EvalError, HostObject, Interpreter, Map,
    OperatorTable, Value,
};
use serde_json::json;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn eval(src: &str) -> Value {
    evaluate(src, &mut Map::new()).unwrap()
}

fn bindings(pairs: &[(&str, Value)]) -> Map {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.clone()))
        .collect()
}

fn eval_in(src: &str, map: &mut Map) -> Value {
    evaluate(src, map).unwrap()
}

fn j(v: serde_json::Value) -> Value {
    from_json(&v)
}

/// Declaration state of `name` after running `src` in a fresh scope.
fn binding_after(src: &str, name: &str) -> Option<Binding> {
    let interp = Interpreter::new();
    let scope = interp.global_scope();
    interp.eval_scope(src, &scope).unwrap();
    scope.binding(name)
}

fn var(value: Value) -> Option<Binding> {
    Some(Binding {
        constant: false,
        value,
    })
}

// ── Vector host type ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct Vector(Vec<f64>);

impl HostObject for Vector {
    fn type_name(&self) -> &str {
        "Vector"
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn get(&self, key: &str) -> Option<Value> {
        match key {
            "length" => Some(Value::from(self.0.len())),
            "arr" => Some(self.to_array()),
            _ => None,
        }
    }
    fn duplicate(&self) -> Option<Rc<dyn HostObject>> {
        Some(Rc::new(self.clone()))
    }
    fn equals(&self, other: &dyn HostObject) -> bool {
        other.as_any().downcast_ref::<Vector>() == Some(self)
    }
}

impl Vector {
    fn to_array(&self) -> Value {
        Value::array(self.0.iter().map(|n| Value::from(*n)).collect())
    }
}

fn vector(v: &Value) -> Option<&Vector> {
    match v {
        Value::Host(h) => h.as_any().downcast_ref::<Vector>(),
        _ => None,
    }
}

fn vec_of(items: &[f64]) -> Value {
    Value::host(Vector(items.to_vec()))
}

fn vector_interp() -> Interpreter {
    let mut interp = Interpreter::new();
    interp.globals_mut().insert(
        "Vector".into(),
        Value::native("Vector", |_, args| {
            let items = match args.first() {
                Some(Value::Array(a)) => a.borrow().iter().map(Value::to_number).collect(),
                _ => Vec::new(),
            };
            Ok(Value::host(Vector(items)))
        }),
    );
    let not = |a: &Value| vector(a).map_or(0.0, |v| v.0.iter().sum()) <= 0.0;
    interp.operators_mut().register::<Vector>(
        OperatorTable::new()
            .with_add(|a, b| match (vector(a), vector(b)) {
                (Some(a), Some(b)) => {
                    vec_of(&a.0.iter().zip(&b.0).map(|(x, y)| x + y).collect::<Vec<_>>())
                }
                _ => Value::Number(f64::NAN),
            })
            .with_divide(|a, b| match (vector(a), vector(b)) {
                (Some(a), _) => {
                    let n = b.to_number();
                    vec_of(&a.0.iter().map(|x| x / n).collect::<Vec<_>>())
                }
                (None, Some(b)) => {
                    let n = a.to_number();
                    vec_of(&b.0.iter().map(|x| n / x).collect::<Vec<_>>())
                }
                _ => Value::Number(a.to_number() / b.to_number()),
            })
            .with_negate(|a| {
                let items: Vec<f64> = vector(a).map_or_else(Vec::new, |v| v.0.iter().map(|x| -x).collect());
                vec_of(&items)
            })
            .with_not(move |a| Value::Bool(not(a)))
            .with_and(move |a, b| {
                let side = |v: &Value| match vector(v) {
                    Some(_) => Value::Bool(!not(v)),
                    None => v.clone(),
                };
                let (a, b) = (side(a), side(b));
                if a.truthy() {
                    b
                } else {
                    a
                }
            }),
    );
    interp
}

fn arr(v: &Value) -> Vec<f64> {
    vector(v).map(|v| v.0.clone()).unwrap_or_default()
}

// ── Declarations ──────────────────────────────────────────────────────────────

#[test]
fn let_and_var_without_initializer() {
    assert_eq!(binding_after("let a;", "a"), var(Value::Undefined));
    assert_eq!(binding_after("var a;", "a"), var(Value::Undefined));
}

#[test]
fn const_without_initializer_is_a_parse_error() {
    let err = evaluate("const a;", &mut Map::new()).unwrap_err();
    assert!(matches!(err, EvalError::Parse(_)));
    assert_eq!(err.to_string(), "Missing initializer in const declaration (1:7)");
}

#[test]
fn declarations_with_values() {
    assert_eq!(binding_after("let a = 3;", "a"), var(3.into()));
    assert_eq!(binding_after("var a = 3;", "a"), var(3.into()));
    assert_eq!(
        binding_after("const a = 3;", "a"),
        Some(Binding {
            constant: true,
            value: 3.into()
        })
    );
    assert_eq!(binding_after("a = 3;", "a"), var(3.into()));
}

#[test]
fn reassignment() {
    for src in [
        "let a; a = 3;",
        "let a = 8; a = 3;",
        "var a; a = 3;",
        "var a = 8; a = 3;",
        "a = 8; a = 3;",
    ] {
        assert_eq!(binding_after(src, "a"), var(3.into()), "{src}");
    }
}

#[test]
fn assigning_a_constant_fails() {
    let err = evaluate("const a = 8; a = 3;", &mut Map::new()).unwrap_err();
    assert_eq!(err.to_string(), "Cannot assign to constant variable a");
}

#[test]
fn redeclaration_fails() {
    let err = evaluate("let a = 1; let a = 2;", &mut Map::new()).unwrap_err();
    assert!(matches!(err, EvalError::DuplicateBinding(ref n) if n == "a"));
}

#[test]
fn composite_initializers() {
    assert_eq!(binding_after("let a = { b: 7 };", "a"), var(j(json!({"b": 7}))));
    assert_eq!(binding_after("let a = [1, 2, 3];", "a"), var(j(json!([1, 2, 3]))));
    assert_eq!(
        binding_after("let a = { b: 7, c: [1,2,3] };", "a"),
        var(j(json!({"b": 7, "c": [1, 2, 3]})))
    );
}

#[test]
fn member_writes() {
    assert_eq!(
        binding_after("let a = [1, 2, 3]; a[1] = 7;", "a"),
        var(j(json!([1, 7, 3])))
    );
    assert_eq!(
        binding_after("const a = { b: 7, c: [{ d: 8 }] }; b = a.c[0].d;", "b"),
        var(8.into())
    );
    assert_eq!(
        binding_after("const a = { b: 7, c: [{ d: 8 }] }; a.c[0].d = 3;", "a"),
        Some(Binding {
            constant: true,
            value: j(json!({"b": 7, "c": [{"d": 3}]}))
        })
    );
}

#[test]
fn new_instance_of_host_type() {
    let interp = vector_interp();
    let scope = interp.global_scope();
    interp.eval_scope("let a = new Vector([1, 2, 3]);", &scope).unwrap();
    assert_eq!(arr(&scope.get("a")), vec![1.0, 2.0, 3.0]);
}

// ── Unary operators ───────────────────────────────────────────────────────────

#[test]
fn unary_over_literals() {
    assert_eq!(eval("+17"), Value::from(17));
    assert_eq!(eval("-17"), Value::from(-17));
    assert_eq!(eval("~17"), Value::from(-18));
    assert_eq!(eval("!false"), Value::Bool(true));
}

#[test]
fn unary_over_places() {
    for (src, expected) in [
        ("a = 17; +a", Value::from(17)),
        ("a = 17; -a", Value::from(-17)),
        ("a = 17; ~a", Value::from(-18)),
        ("a = false; !a", Value::Bool(true)),
        ("a = [1, 2, 17]; +a[2]", Value::from(17)),
        ("a = [1, 2, 17]; -a[2]", Value::from(-17)),
        ("a = [1,2,17]; ~a[2]", Value::from(-18)),
        ("a = [1,2,false]; !a[2]", Value::Bool(true)),
        ("a = { b: 17 }; +a.b", Value::from(17)),
        ("a = { b: 17 }; -a.b", Value::from(-17)),
        ("a = { b: 17 }; ~a.b", Value::from(-18)),
        ("a = { b: false }; !a.b", Value::Bool(true)),
        ("a = \"hello\"; +a", Value::from("hello")),
    ] {
        assert_eq!(eval(src), expected, "{src}");
    }
}

#[test]
fn unary_plus_copies_host_instance() {
    let interp = vector_interp();
    let scope = interp.global_scope();
    let result = interp
        .eval_scope("a = new Vector([1, 2, 3]); +a", &scope)
        .unwrap();
    assert_eq!(arr(&result), vec![1.0, 2.0, 3.0]);
    assert!(!result.strict_eq(&scope.get("a")));
    assert_eq!(result, scope.get("a"));
}

#[test]
fn unary_minus_uses_negate_handler() {
    let interp = vector_interp();
    let result = interp
        .eval("a = new Vector([1, 2, 3]); -a", &mut Map::new())
        .unwrap();
    assert_eq!(arr(&result), vec![-1.0, -2.0, -3.0]);
}

#[test]
fn not_and_and_handlers() {
    let interp = vector_interp();
    let mut map = Map::new();
    assert_eq!(
        interp.eval("!new Vector([-1, -2])", &mut map).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        interp.eval("new Vector([1]) && 5", &mut map).unwrap(),
        Value::from(5)
    );
    assert_eq!(
        interp.eval("new Vector([-1]) && 5", &mut map).unwrap(),
        Value::Bool(false)
    );
}

// ── Assignment operators ──────────────────────────────────────────────────────

#[test]
fn compound_assignment() {
    for (src, expected) in [
        ("a = 1; a += 7;", 8.0),
        ("a = 1; a -= 7;", -6.0),
        ("a = 3; a *= 7;", 21.0),
        ("a = 3; a /= 2;", 1.5),
        ("a = 3; a %= 2;", 1.0),
        ("a = 3; a |= 9;", 11.0),
        ("a = 12; a &= 5;", 4.0),
        ("a = 12; a ^= 5;", 9.0),
        ("a = 2; a **= 8;", 256.0),
        ("a = 5; a <<= 2;", 20.0),
        ("a = -5; a >>= 2;", -2.0),
        ("a = -5; a >>>= 2;", 1_073_741_822.0),
    ] {
        let mut map = Map::new();
        let result = eval_in(src, &mut map);
        assert_eq!(result, Value::from(expected), "{src}");
        assert_eq!(map["a"], Value::from(expected), "{src}");
    }
}

#[test]
fn logical_and_assignment() {
    let mut map = Map::new();
    let result = eval_in("a = 1; b = 0; a &&= 2; b &&= 2;", &mut map);
    assert_eq!(map["a"], Value::from(2));
    assert_eq!(map["b"], Value::from(0));
    assert_eq!(result, Value::from(0));
}

#[test]
fn logical_or_assignment() {
    for (src, expected) in [
        ("a = { duration: 50 }; a.duration ||= 10;", 50),
        ("a = { duration: 0 }; a.duration ||= 10;", 10),
        ("a = {}; a.duration ||= 10;", 10),
    ] {
        let mut map = Map::new();
        assert_eq!(eval_in(src, &mut map), Value::from(expected), "{src}");
        assert_eq!(map["a"], j(json!({ "duration": expected })), "{src}");
    }
}

#[test]
fn nullish_assignment() {
    for (src, expected) in [
        ("a = { duration: 50 }; a.duration ??= 10;", 50),
        ("a = { duration: 0 }; a.duration ??= 10;", 0),
        ("a = {}; a.duration ??= 10;", 10),
    ] {
        let mut map = Map::new();
        assert_eq!(eval_in(src, &mut map), Value::from(expected), "{src}");
        assert_eq!(map["a"], j(json!({ "duration": expected })), "{src}");
    }
}

// ── Binary operators ──────────────────────────────────────────────────────────

#[test]
fn equality() {
    assert_eq!(eval("1 == 1"), Value::Bool(true));
    assert_eq!(eval("2 == 1"), Value::Bool(false));
    assert_eq!(eval("1 === 1"), Value::Bool(true));
    assert_eq!(eval("2 === 1"), Value::Bool(false));
    assert_eq!(eval("1 != 1"), Value::Bool(false));
    assert_eq!(eval("2 != 1"), Value::Bool(true));
    assert_eq!(eval("1 !== 1"), Value::Bool(false));
    assert_eq!(eval("2 !== 1"), Value::Bool(true));
    assert_eq!(eval("'1' == 1"), Value::Bool(true));
    assert_eq!(eval("'1' === 1"), Value::Bool(false));
    assert_eq!(eval("null == undefined"), Value::Bool(true));
}

#[test]
fn arithmetic() {
    assert_eq!(eval("1 + 2"), Value::from(3));
    assert_eq!(eval("1 - 4"), Value::from(-3));
    assert_eq!(eval("2 ** 7"), Value::from(128));
    assert_eq!(eval("2 * 7"), Value::from(14));
    assert_eq!(eval("7 / 2"), Value::from(3.5));
    assert_eq!(eval("8 % 3"), Value::from(2));
    assert_eq!(eval("'a' + 1"), Value::from("a1"));
    assert_eq!(eval("'a' + 'b'"), Value::from("ab"));
}

#[test]
fn vector_addition_and_subtraction() {
    let interp = vector_interp();
    let mut map = bindings(&[
        ("a", vec_of(&[1.0, 2.0, 3.0, 4.0, 5.0])),
        ("b", vec_of(&[2.0, 4.0, 6.0, 8.0, 10.0])),
    ]);
    assert_eq!(
        arr(&interp.eval("a + b", &mut map).unwrap()),
        vec![3.0, 6.0, 9.0, 12.0, 15.0]
    );

    let mut map = bindings(&[
        ("a", vec_of(&[1.0, -1.0, 6.0, 8.0, 10.0])),
        ("b", vec_of(&[1.0, 2.0, 3.0, 4.0, 5.0])),
    ]);
    assert_eq!(
        arr(&interp.eval("a - b", &mut map).unwrap()),
        vec![0.0, -3.0, 3.0, 4.0, 5.0]
    );
}

#[test]
fn right_operand_handler_is_consulted() {
    let interp = vector_interp();
    let mut map = bindings(&[("v", vec_of(&[1.0, 2.0, 4.0]))]);
    assert_eq!(arr(&interp.eval("8 / v", &mut map).unwrap()), vec![8.0, 4.0, 2.0]);
    assert_eq!(arr(&interp.eval("v / 2", &mut map).unwrap()), vec![0.5, 1.0, 2.0]);
}

#[test]
fn relational() {
    assert_eq!(eval("1 < 2"), Value::Bool(true));
    assert_eq!(eval("2 < 1"), Value::Bool(false));
    assert_eq!(eval("1 <= 2"), Value::Bool(true));
    assert_eq!(eval("2 <= 1"), Value::Bool(false));
    assert_eq!(eval("2 <= 2"), Value::Bool(true));
    assert_eq!(eval("1 > 2"), Value::Bool(false));
    assert_eq!(eval("2 > 1"), Value::Bool(true));
    assert_eq!(eval("1 >= 2"), Value::Bool(false));
    assert_eq!(eval("2 >= 1"), Value::Bool(true));
    assert_eq!(eval("2 >= 2"), Value::Bool(true));
    assert_eq!(eval("'a' < 'b'"), Value::Bool(true));
}

#[test]
fn bitwise() {
    assert_eq!(eval("9 | 3"), Value::from(11));
    assert_eq!(eval("12 & 5"), Value::from(4));
    assert_eq!(eval("12 ^ 5"), Value::from(9));
    assert_eq!(eval("5 << 2"), Value::from(20));
    assert_eq!(eval("20 >> 2"), Value::from(5));
    assert_eq!(eval("-5 >>> 2"), Value::from(1_073_741_822));
}

#[test]
fn logical() {
    assert_eq!(eval("false || true"), Value::Bool(true));
    assert_eq!(eval("true || false"), Value::Bool(true));
    assert_eq!(eval("false || false"), Value::Bool(false));
    assert_eq!(eval("undefined || \"something\""), Value::from("something"));
    let mut map = bindings(&[("a", 0.into()), ("b", 7.into())]);
    assert_eq!(eval_in("a || b", &mut map), Value::from(7));
    let mut map = bindings(&[("a", (-1).into()), ("b", 7.into())]);
    assert_eq!(eval_in("a || b", &mut map), Value::from(-1));

    assert_eq!(eval("false && true"), Value::Bool(false));
    assert_eq!(eval("true && false"), Value::Bool(false));
    assert_eq!(eval("true && true"), Value::Bool(true));
    assert_eq!(eval("0 && 1"), Value::Bool(false));
}

#[test]
fn nullish_coalescing() {
    assert_eq!(eval("1 ?? 2"), Value::from(1));
    assert_eq!(eval("undefined ?? 2"), Value::from(2));
    assert_eq!(eval("null ?? 2"), Value::from(2));
    assert_eq!(eval("0 ?? 2"), Value::from(0));
}

#[test]
fn undefined_operand_yields_nan() {
    let mut map = bindings(&[("a", 1.into()), ("b", 2.into())]);
    assert!(eval_in("c + a", &mut map).to_number().is_nan());
    assert!(eval_in("a + c", &mut map).to_number().is_nan());
}

#[test]
fn arrays_in_operations() {
    let mut map = bindings(&[("a", 12.into()), ("b", 2.into())]);
    assert_eq!(eval_in("c = [a,b]; d = c[0] + c[1];", &mut map), Value::from(14));

    let mut map = bindings(&[("a", 12.into()), ("b", 2.into())]);
    assert_eq!(
        eval_in("c = [a, b]; d = e[0] + e[1];", &mut map),
        Value::Undefined
    );

    let mut map = bindings(&[("a", 12.into()), ("b", 2.into())]);
    assert!(eval_in("c = [a, b, d]; e = c[0] + c[1] + c[2];", &mut map)
        .to_number()
        .is_nan());
}

#[test]
fn this_binding() {
    let mut map = bindings(&[("this", j(json!({"a": 17})))]);
    assert_eq!(eval_in("this.a;", &mut map), Value::from(17));
}

#[test]
fn increment_and_decrement() {
    let interp = Interpreter::new();
    let scope = interp.global_scope();
    scope.seed(&bindings(&[("a", 17.into())]));
    assert_eq!(interp.eval_scope("a++;", &scope).unwrap(), Value::from(17));
    assert_eq!(scope.get("a"), Value::from(18));
    assert_eq!(interp.eval_scope("++a;", &scope).unwrap(), Value::from(19));
    assert_eq!(scope.get("a"), Value::from(19));
    assert_eq!(interp.eval_scope("a--;", &scope).unwrap(), Value::from(19));
    assert_eq!(interp.eval_scope("--a;", &scope).unwrap(), Value::from(17));
    assert_eq!(scope.get("a"), Value::from(17));
}

// ── Collection helpers ────────────────────────────────────────────────────────

#[test]
fn map_family() {
    for (src, expected) in [
        ("[1, 2, 3].map(function(n) { return n * 2 })", json!([2, 4, 6])),
        ("({a: 1, b: 2, c: 3}).map(function(n) { return n * 2 })", json!([2, 4, 6])),
        ("\"hola\".map(function(n) { return n.toUpperCase() })", json!(["H", "O", "L", "A"])),
        ("({a: 1, b: 2, c: 3}).mapSrc(function(n) { return n * 2 })", json!({"a": 2, "b": 4, "c": 6})),
        ("\"hola\".mapSrc(function(n) { return n.toUpperCase() })", json!("HOLA")),
        ("[1, 2, 3].mapRight(function(n) { return n * 2 })", json!([6, 4, 2])),
        ("({a: 1, b: 2, c: 3}).mapRight(function(n) { return n * 2 })", json!([6, 4, 2])),
        ("\"hola\".mapRight(function(n) { return n.toUpperCase() })", json!(["A", "L", "O", "H"])),
        ("({a: 1, b: 2, c: 3}).mapRightSrc(function(n) { return n * 2 })", json!({"a": 2, "b": 4, "c": 6})),
        ("\"hola\".mapRightSrc(function(n) { return n.toUpperCase() })", json!("ALOH")),
    ] {
        assert_eq!(eval(src), j(expected), "{src}");
    }
}

#[test]
fn index_filters() {
    let abc = || bindings(&[("a", 1.into()), ("b", 2.into()), ("c", 3.into())]);
    let arr = || bindings(&[("a", j(json!([1, 2, 3])))]);
    let text = || bindings(&[("a", "hola".into())]);
    for (src, mut map, expected) in [
        ("a.allowIndexes([0,2])", arr(), json!([1, 3])),
        ("({a, b, c}).allowIndexes([\"a\",\"c\"])", abc(), json!([1, 3])),
        ("a.allowIndexes([0,2])", text(), json!(["h", "l"])),
        ("({a, b, c}).allowIndexesSrc([\"a\",\"c\"])", abc(), json!({"a": 1, "c": 3})),
        ("a.allowIndexesSrc([0,2])", text(), json!("hl")),
        ("a.denyIndexes([0,2])", arr(), json!([2])),
        ("({a, b, c}).denyIndexes([\"a\",\"c\"])", abc(), json!([2])),
        ("a.denyIndexes([0,2])", text(), json!(["o", "a"])),
        ("({a, b, c}).denyIndexesSrc([\"a\",\"c\"])", abc(), json!({"b": 2})),
        ("a.denyIndexesSrc([0,2])", text(), json!("oa")),
    ] {
        assert_eq!(eval_in(src, &mut map), j(expected), "{src}");
    }
}

#[test]
fn every_helper() {
    let mut map = bindings(&[("a", j(json!([1, 2, 3])))]);
    assert_eq!(eval_in("a.every((x) => x > 0)", &mut map), Value::Bool(true));
    assert_eq!(eval_in("a.every((x) => x > 1)", &mut map), Value::Bool(false));

    let mut map = bindings(&[("a", j(json!({"b": 1, "c": 2, "d": 3})))]);
    assert_eq!(eval_in("a.every((x) => x > 0)", &mut map), Value::Bool(true));
    assert_eq!(eval_in("a.every((x) => x > 1)", &mut map), Value::Bool(false));

    let lower = "a.every((x) => x === x.toLowerCase())";
    let mut map = bindings(&[("a", "hola".into())]);
    assert_eq!(eval_in(lower, &mut map), Value::Bool(true));
    let mut map = bindings(&[("a", "hOla".into())]);
    assert_eq!(eval_in(lower, &mut map), Value::Bool(false));
}

#[test]
fn filter_helpers() {
    let lower = "(x) => x === x.toLowerCase()";
    let nums = || bindings(&[("a", j(json!({"b": 1, "c": 2, "d": 3})))]);
    let text = || bindings(&[("a", "hOLa".into())]);
    let mut map = bindings(&[("a", j(json!([1, 2, 3])))]);
    assert_eq!(eval_in("a.filter((x) => x > 1)", &mut map), j(json!([2, 3])));
    assert_eq!(eval_in("a.filter((x) => x > 1)", &mut nums()), j(json!([2, 3])));
    assert_eq!(
        eval_in(&format!("a.filter({lower})"), &mut text()),
        j(json!(["h", "a"]))
    );
    assert_eq!(
        eval_in("a.filterSrc((x) => x > 1)", &mut nums()),
        j(json!({"c": 2, "d": 3}))
    );
    assert_eq!(eval_in(&format!("a.filterSrc({lower})"), &mut text()), j(json!("ha")));
}

#[test]
fn for_each_visits_every_item() {
    // Inline functions see a copy of the bindings, so accumulate into a
    // shared array rather than a captured number.
    let result = eval("const acc = []; [1, 2, 3].forEach((x) => acc.push(x * 2)); acc");
    assert_eq!(result, j(json!([2, 4, 6])));
    assert_eq!(
        eval("let total = 0; [1, 2, 3].forEach((x) => { total += x }); total"),
        Value::from(0)
    );
}

// ── Functions and control flow ────────────────────────────────────────────────

#[test]
fn host_functions_in_expressions() {
    let mut map = bindings(&[
        ("n", 6.into()),
        (
            "foo",
            Value::native("foo", |_, args| Ok(Value::from(args[0].to_number() * 100.0))),
        ),
        ("obj", j(json!({"x": {"y": 555}}))),
    ]);
    assert_eq!(
        eval_in("3+4*foo(3+5) - obj[\"\"+\"x\"].y", &mut map),
        Value::from(2648)
    );
}

#[test]
fn function_declaration() {
    let src = r#"
        function splitString(str) {
          return str.split(/\r?\n/);
        }
        const input = 'hola\nadios';
        const output = splitString(input);
        output;
    "#;
    assert_eq!(eval(src), j(json!(["hola", "adios"])));
}

#[test]
fn arrow_function() {
    let src = r#"
        const splitString = (str) => str.split(/\r?\n/);
        const input = 'hola\nadios';
        const output = splitString(input);
        output;
    "#;
    assert_eq!(eval(src), j(json!(["hola", "adios"])));
}

#[test]
fn default_parameters() {
    let src = "function fn(a, b = 7) { return a + b; } const output = fn(2); output;";
    assert_eq!(eval(src), Value::from(9));
    let src = "const fn = (a, b = 7) => a + b; const output = fn(2); output;";
    assert_eq!(eval(src), Value::from(9));
}

#[test]
fn rest_parameters_and_spread() {
    assert_eq!(
        eval("const f = (a, ...rest) => rest.length + a; f(10, ...[1, 2, 3])"),
        Value::from(13)
    );
}

#[test]
fn ternary() {
    let mut map = bindings(&[("a", 12.into()), ("b", 2.into())]);
    eval_in("b === 2 ? a-- : a++;", &mut map);
    assert_eq!(map["a"], Value::from(11));

    let mut map = bindings(&[("a", 12.into()), ("b", 2.into())]);
    eval_in("b < 2 ? a-- : a++;", &mut map);
    assert_eq!(map["a"], Value::from(13));

    let mut map = bindings(&[("a", 12.into()), ("b", 2.into())]);
    assert_eq!(eval_in("c === 2 ? --a : ++a;", &mut map), Value::from(13));
}

#[test]
fn array_pattern_assignment() {
    let mut map = Map::new();
    let answer = eval_in("[a, b, c, d, e] = [1, 2, 3, 4, 5];", &mut map);
    assert_eq!(answer, j(json!([1, 2, 3, 4, 5])));
    for (i, name) in ["a", "b", "c", "d", "e"].iter().enumerate() {
        assert_eq!(map[*name], Value::from(i + 1));
    }

    let mut map = Map::new();
    assert_eq!(
        eval_in("[a, b, c, d] = [1, 2, 3, 4, 5];", &mut map),
        j(json!([1, 2, 3, 4]))
    );
    assert_eq!(map["d"], Value::from(4));

    let mut map = Map::new();
    let answer = eval_in("[a, b, c, d, e, f] = [1, 2, 3, 4, 5];", &mut map);
    assert_eq!(
        answer,
        Value::array(vec![1.into(), 2.into(), 3.into(), 4.into(), 5.into(), Value::Undefined])
    );
    assert_eq!(map.get("f").cloned().unwrap_or_default(), Value::Undefined);
}

#[test]
fn array_pattern_with_rest_and_holes() {
    let mut map = Map::new();
    assert_eq!(
        eval_in("[a, b, ...rest] = [1, 2, 3, 4, 5];", &mut map),
        j(json!([1, 2, [3, 4, 5]]))
    );
    assert_eq!(map["rest"], j(json!([3, 4, 5])));

    let mut map = Map::new();
    assert_eq!(
        eval_in("[a, , ...rest] = [1, 2, 3, 4, 5];", &mut map),
        j(json!([1, null, [3, 4, 5]]))
    );
    assert_eq!(map["a"], Value::from(1));
    assert_eq!(map["rest"], j(json!([3, 4, 5])));
}

#[test]
fn if_else() {
    let mut map = bindings(&[("a", 12.into()), ("b", 2.into())]);
    let result = eval_in("if (a > 10) { c = 7; b++ } else { c = 3; b-- }", &mut map);
    assert_eq!(result, Value::from(2));
    assert_eq!(map["c"], Value::from(7));
    assert_eq!(map["b"], Value::from(3));

    let mut map = bindings(&[("a", 12.into()), ("b", 2.into())]);
    let result = eval_in("if (a < 10) { c = 7; b++ } else { c = 3; b-- }", &mut map);
    assert_eq!(result, Value::from(2));
    assert_eq!(map["c"], Value::from(3));
    assert_eq!(map["b"], Value::from(1));
}

#[test]
fn if_without_else() {
    let mut map = bindings(&[("a", 12.into()), ("b", 2.into())]);
    assert_eq!(eval_in("if (a > 10) { c = 7; b++ }; d = 1;", &mut map), Value::from(1));
    assert_eq!(map["c"], Value::from(7));
    assert_eq!(map["b"], Value::from(3));

    let mut map = bindings(&[("a", 12.into()), ("b", 2.into())]);
    assert_eq!(eval_in("if (a < 10) { c = 7; b++ }; d = 1;", &mut map), Value::from(1));
    assert!(map.get("c").map_or(true, |c| *c == Value::Undefined));
    assert_eq!(map["b"], Value::from(2));
}

#[test]
fn new_date() {
    let result = eval("new Date('2020-01-01');");
    assert_eq!(result, Value::host(Date::parse("2020-01-01")));
    assert_eq!(
        eval("new Date('2020-01-01').toISOString()"),
        Value::from("2020-01-01T00:00:00.000Z")
    );
}

#[test]
fn prelude_is_not_written_back() {
    let mut map = Map::new();
    eval_in("let d = new Date(0);", &mut map);
    assert!(map.contains_key("d"));
    assert!(!map.contains_key("Date"));
}

#[test]
fn template_literals() {
    let mut map = bindings(&[("a", 12.into()), ("b", 2.into())]);
    assert_eq!(eval_in("`${a}-${b}`", &mut map), Value::from("12-2"));
    assert_eq!(eval_in("`a=${a}!`", &mut map), Value::from("a=12!"));
}

#[test]
fn tagged_template() {
    let tag = Value::native("tag", |_, args| {
        let literals = match args.first() {
            Some(Value::Array(items)) => items
                .borrow()
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join("-"),
            _ => String::new(),
        };
        Ok(Value::from(format!("{literals}-{}-{}", args[1], args[2])))
    });
    let mut map = bindings(&[("a", 12.into()), ("b", 2.into()), ("tag", tag)]);
    assert_eq!(
        eval_in("tag`Hello ${a}hi${b}`", &mut map),
        Value::from("Hello -hi--12-2")
    );
}

#[test]
fn empty_script_is_undefined() {
    assert_eq!(eval(""), Value::Undefined);
}

#[test]
fn optional_chaining() {
    let mut map = bindings(&[("a", j(json!({"b": {"c": 7}})))]);
    assert_eq!(eval_in("a?.b?.c", &mut map), Value::from(7));
    assert_eq!(eval_in("a?.x?.c", &mut map), Value::Undefined);
    assert_eq!(eval_in("a.x?.c.d.e", &mut map), Value::Undefined);
    assert_eq!(eval_in("a.b.nothing?.()", &mut map), Value::Undefined);
}

// ── Builtin methods ───────────────────────────────────────────────────────────

#[test]
fn string_methods() {
    assert_eq!(eval("'  Hi '.trim().toLowerCase()"), Value::from("hi"));
    assert_eq!(eval("'a,b,c'.split(',')"), j(json!(["a", "b", "c"])));
    assert_eq!(eval("'abc'.includes('b')"), Value::Bool(true));
    assert_eq!(eval("'abc'.slice(-2)"), Value::from("bc"));
    assert_eq!(eval("'7'.padStart(3, '0')"), Value::from("007"));
    assert_eq!(eval("'a-b-c'.replaceAll('-', '+')"), Value::from("a+b+c"));
    assert_eq!(eval("'abc'.length"), Value::from(3));
}

#[test]
fn array_methods() {
    assert_eq!(eval("[1, 2, 3].join('-')"), Value::from("1-2-3"));
    assert_eq!(eval("[1, 2, 3].reduce((acc, x) => acc + x, 0)"), Value::from(6));
    assert_eq!(eval("[1, 2, 3].find((x) => x > 1)"), Value::from(2));
    assert_eq!(eval("let a = [1]; a.push(2, 3); a"), j(json!([1, 2, 3])));
    assert_eq!(eval("[3, 1, 2].indexOf(2)"), Value::from(2));
}

#[test]
fn number_methods() {
    assert_eq!(eval("(3.14159).toFixed(2)"), Value::from("3.14"));
    assert_eq!(eval("(255).toString(16)"), Value::from("ff"));
}

#[test]
fn reduce_of_empty_array_is_a_hard_error() {
    let err = evaluate("[].reduce((a, b) => a + b)", &mut Map::new()).unwrap_err();
    assert!(matches!(err, EvalError::Native { .. }));
}

// ── Soft failures ─────────────────────────────────────────────────────────────

#[test]
fn soft_failures_are_reported_and_evaluation_continues() {
    let sink = Rc::new(CollectedDiagnostics::new());
    let interp = Interpreter::with_diagnostics(sink.clone());
    let mut map = bindings(&[("f", Value::native("f", |_, _| Ok(Value::Null)))]);
    let result = interp
        .eval("x = f.y; z = null; w = z.q; v = 5; q = v(); v", &mut map)
        .unwrap();
    assert_eq!(result, Value::from(5));
    assert_eq!(
        sink.take(),
        vec![
            "Failed to walk member object, object type is function",
            "Failed to walk member object, object is null",
            "Failed to walk call callee",
        ]
    );
    assert!(map.get("x").map_or(true, |x| *x == Value::Undefined));
}

#[test]
fn calling_a_missing_method_is_soft() {
    let sink = Rc::new(CollectedDiagnostics::new());
    let interp = Interpreter::with_diagnostics(sink.clone());
    let result = interp.eval("({}).nope(1)", &mut Map::new()).unwrap();
    assert_eq!(result, Value::Undefined);
    assert_eq!(
        sink.messages(),
        vec!["Failed to walk call callee, nope is not a function"]
    );
}

#[test]
fn falsy_properties_fall_back_to_builtin_methods() {
    let sink = Rc::new(CollectedDiagnostics::new());
    let interp = Interpreter::with_diagnostics(sink.clone());
    let mut map = Map::new();
    let result = interp
        .eval(
            "o = { map: 0, filter: '', a: 2 };
             m = o.map((v) => v + 1);
             f = o.filter((v) => v);
             h = ({ hasOwnProperty: false }).hasOwnProperty('hasOwnProperty');
             ({ map: 5 }).map((v) => v)",
            &mut map,
        )
        .unwrap();
    assert_eq!(result, Value::Undefined);
    assert_eq!(to_json(&map["m"]), json!([1, "1", 3]));
    assert_eq!(to_json(&map["f"]), json!([2]));
    assert_eq!(map["h"], Value::Bool(true));
    assert_eq!(
        sink.messages(),
        vec!["Failed to walk call callee, map is not a function"]
    );
}

#[test]
fn failed_eval_leaves_bindings_untouched() {
    let mut map = bindings(&[("a", 1.into())]);
    assert!(evaluate("a = 2; const k = 1; k = 3;", &mut map).is_err());
    assert_eq!(map["a"], Value::from(1));
    assert!(!map.contains_key("k"));
}
