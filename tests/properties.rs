//! The ten quantified invariants the engine must hold, independent of any one scenario.

use pizza3::forcefield::{RigidwallForcefield, WaterForcefield};
use pizza3::{Container, EvalConfig, Param, Pipescript, Script, ScriptObject, ScriptObjectGroup, Value};

fn container_to_param(c: &Container, cfg: EvalConfig) -> Param {
    Param::from_mapping(c.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(), cfg)
}

/// 1. Interpolation idempotence: `p.eval().eval() == p.eval()`.
#[test]
fn interpolation_is_idempotent() {
    let mut p = Param::new();
    p.set("a", Value::Int(2)).unwrap();
    p.set("b", Value::Str("${a}*3".to_string())).unwrap();
    p.set("c", Value::Str("$[1 2; 3 4]".to_string())).unwrap();

    let once = p.eval().unwrap();
    let twice = container_to_param(&once, p.config()).eval().unwrap();
    assert_eq!(once, twice);
}

/// 2 & 3. Order preservation and right-wins on concat, both at the `Container` level and at
/// the `Script` (`DEFINITIONS`) level that composition actually uses.
#[test]
fn concat_preserves_order_and_right_wins() {
    let mut a = Container::new();
    a.set("x", Value::Int(1)).unwrap();
    a.set("y", Value::Int(2)).unwrap();
    let mut b = Container::new();
    b.set("y", Value::Int(20)).unwrap();
    b.set("z", Value::Int(3)).unwrap();

    let c = a.concat(&b);
    assert_eq!(c.keys().collect::<Vec<_>>(), vec!["x", "y", "z"]);
    assert_eq!(*c.get("y").unwrap(), Value::Int(20));

    let mut sa = Script::new("a").with_line("noop");
    sa.definitions.set("x", Value::Int(1)).unwrap();
    sa.definitions.set("y", Value::Int(2)).unwrap();
    let mut sb = Script::new("b").with_line("noop");
    sb.definitions.set("y", Value::Int(20)).unwrap();
    sb.definitions.set("z", Value::Int(3)).unwrap();

    let merged = (sa + sb).definitions;
    assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["x", "y", "z"]);
    assert_eq!(*merged.get_raw("y").unwrap(), Value::Int(20));
}

/// 4. Escape neutrality: `\${x}` renders as the literal characters `${x}`.
#[test]
fn escape_neutrality() {
    let mut p = Param::new();
    p.set("x", Value::Int(7)).unwrap();
    p.set("line", Value::Str(r"keep \${x} and \${y} literal".to_string())).unwrap();

    let evaluated = p.eval().unwrap();
    assert_eq!(
        *evaluated.get("line").unwrap(),
        Value::Str("keep ${x} and ${y} literal".to_string())
    );
}

/// 5. Literal prefix: a raw value that is exactly `$identifier` renders to the bare
/// identifier text, unevaluated.
#[test]
fn literal_dollar_prefix_is_never_evaluated() {
    let mut p = Param::new();
    p.set("style", Value::Str("$hybrid".to_string())).unwrap();
    let evaluated = p.eval().unwrap();
    assert_eq!(*evaluated.get("style").unwrap(), Value::Str("hybrid".to_string()));
}

/// 6. Array equivalence: the three spellings of a flat row literal agree, and the
/// semicolon-separated spelling is their transpose.
#[test]
fn array_literal_spellings_agree() {
    let mut p = Param::new();
    p.set("a", Value::Str("$[1 2 3]".to_string())).unwrap();
    p.set("b", Value::Str("$[1,2,3]".to_string())).unwrap();
    p.set("c", Value::Str("$[1:3]".to_string())).unwrap();
    p.set("d", Value::Str("$[1;2;3]".to_string())).unwrap();

    let evaluated = p.eval().unwrap();
    let as_array = |key: &str| match evaluated.get(key).unwrap() {
        Value::Array(arr) => arr.clone(),
        other => panic!("expected an array for '{key}', found {other:?}"),
    };
    let (a, b, c, d) = (as_array("a"), as_array("b"), as_array("c"), as_array("d"));

    assert_eq!(a.shape(), &[1, 3]);
    assert_eq!(a, b);
    assert_eq!(a, c);
    assert_eq!(d.shape(), &[3, 1]);
    assert_eq!(d.iter().copied().collect::<Vec<_>>(), a.iter().copied().collect::<Vec<_>>());
}

fn group_of(n: u32) -> ScriptObjectGroup {
    let mut g = ScriptObjectGroup::new();
    for bt in 1..=n {
        let ff = if bt == 1 {
            RigidwallForcefield::new(bt).into()
        } else {
            WaterForcefield::new(bt).into()
        };
        g.add(ScriptObject::new(format!("obj{bt}"), bt, "f.data", ff)).unwrap();
    }
    g
}

/// 7. Pair matrix triangularity: `n(n+1)/2` pairs, each `i <= j`.
#[test]
fn pair_matrix_is_triangular() {
    for n in 1..=6u32 {
        let g = group_of(n);
        let pairs = g.interactions();
        assert_eq!(pairs.len() as u32, n * (n + 1) / 2);
        assert!(pairs.iter().all(|(i, j)| i <= j));
    }
}

/// 8. Pair emission order: off-diagonal pairs in column-then-row order.
#[test]
fn pair_emission_order_is_column_then_row() {
    let g = group_of(5);
    let offdiag: Vec<(u32, u32)> = g.interactions().into_iter().filter(|(i, j)| i != j).collect();
    assert_eq!(
        offdiag,
        vec![(1, 2), (1, 3), (2, 3), (1, 4), (2, 4), (3, 4), (1, 5), (2, 5), (3, 5), (4, 5)]
    );
}

/// 9. Pipescript accumulation: declaration order of the defining stage determines whether the
/// referencing stage observes it.
#[test]
fn pipescript_accumulation_is_order_sensitive() {
    let mut definer = Script::new("definer");
    definer.definitions.set("x", Value::Int(1)).unwrap();
    let user = Script::new("user").with_line("echo ${x}");

    let defines_first =
        Pipescript::new().pipe_script(definer.clone()).pipe_script(user.clone());
    assert!(defines_first.do_(None).unwrap().ends_with("echo 1"));

    let defines_after = Pipescript::new().pipe_script(user).pipe_script(definer);
    let rendered = defines_after.do_(None).unwrap();
    assert!(!rendered.contains("echo 1"));
    assert!(rendered.contains("<Error"));
}

/// 10. Round-trip persistence: `read(write(c)) == c` for every supported value type.
#[test]
fn round_trip_persistence() {
    let dir = std::env::temp_dir().join(format!("pizza3-properties-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("roundtrip.txt");

    let mut p = Param::new();
    p.set("n", Value::Int(-3)).unwrap();
    p.set("f", Value::Float(2.5)).unwrap();
    p.set("flag", Value::Bool(true)).unwrap();
    p.set("s", Value::Str("hello, world".to_string())).unwrap();
    p.set("formula", Value::Str("${n} + 1".to_string())).unwrap();
    p.set("lst", Value::List(vec![Value::Int(1), Value::Str("two".to_string())])).unwrap();

    p.write(&path).unwrap();
    let reread = Param::read(&path).unwrap();
    assert_eq!(reread.eval().unwrap(), p.eval().unwrap());

    let _ = std::fs::remove_dir_all(&dir);
}
