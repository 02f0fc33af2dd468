//! End-to-end scenarios: literal inputs through to their rendered/evaluated output, one
//! `#[test]` per scenario, exercising the public API the way a caller assembling a LAMMPS
//! deck actually would.

use pizza3::forcefield::{RigidwallForcefield, SolidfoodForcefield, WaterForcefield};
use pizza3::{Param, Script, ScriptObject, ScriptObjectGroup, Value};

#[test]
fn minimal_interpolation() {
    let mut p = Param::new();
    p.set("a", Value::Int(1)).unwrap();
    p.set("b", Value::Str("${a}+2".to_string())).unwrap();
    p.set("c", Value::Str("${a+b}".to_string())).unwrap();

    let evaluated = p.eval().unwrap();
    assert_eq!(*evaluated.get("a").unwrap(), Value::Int(1));
    assert_eq!(*evaluated.get("b").unwrap(), Value::Int(3));
    assert_eq!(*evaluated.get("c").unwrap(), Value::Int(4));
}

#[test]
fn array_shorthand_outer_product() {
    let mut p = Param::new();
    p.set("v", Value::Str("$[1 2 3]".to_string())).unwrap();
    p.set("w", Value::Str("@{v}.T @ @{v}".to_string())).unwrap();

    let evaluated = p.eval().unwrap();
    match evaluated.get("w").unwrap() {
        Value::Array(a) => {
            assert_eq!(a.shape(), &[3, 3]);
            assert_eq!(
                a.iter().copied().collect::<Vec<_>>(),
                vec![1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 3.0, 6.0, 9.0]
            );
        }
        other => panic!("expected an array, found {other:?}"),
    }
}

#[test]
fn literal_escape() {
    let mut p = Param::new();
    p.set("units", Value::Str("$si".to_string())).unwrap();
    p.set(
        "line",
        Value::Str(r"the units are \${units}, actually ${units}".to_string()),
    )
    .unwrap();

    let evaluated = p.eval().unwrap();
    assert_eq!(
        *evaluated.get("line").unwrap(),
        Value::Str("the units are ${units}, actually si".to_string())
    );
}

fn pair_matrix_group() -> ScriptObjectGroup {
    let mut g = ScriptObjectGroup::new();
    g.add(ScriptObject::new("wall", 1, "wall.data", RigidwallForcefield::new(1).into())).unwrap();
    g.add(ScriptObject::new("fluid", 2, "fluid.data", WaterForcefield::new(2).into())).unwrap();
    g.add(ScriptObject::new("solid1", 3, "solid.data", SolidfoodForcefield::new(3).into())).unwrap();
    g.add(ScriptObject::new("solid2", 4, "solid.data", SolidfoodForcefield::new(4).into())).unwrap();
    g
}

#[test]
fn pair_coefficient_matrix() {
    let g = pair_matrix_group();
    let rendered = g.forcefield().unwrap().do_(false).unwrap();
    let lines: Vec<&str> = rendered.lines().collect();

    assert!(lines[0].starts_with("pair_style hybrid/overlay smd/ulsph smd/tlsph smd/hertz"));
    assert_eq!(lines[1], "pair_coeff 1 1 none");
    assert!(lines[2].starts_with("pair_coeff 2 2 smd/ulsph *COMMON"));
    assert!(lines[2].ends_with("*END"));
    assert!(lines[3].starts_with("pair_coeff 3 3 smd/tlsph *COMMON"));
    assert!(lines[4].starts_with("pair_coeff 4 4 smd/tlsph *COMMON"));
    assert_eq!(
        lines[5..].to_vec(),
        vec![
            "pair_coeff 1 2 smd/hertz 10000000",
            "pair_coeff 1 3 smd/hertz 10000000",
            "pair_coeff 2 3 smd/hertz 10000000",
            "pair_coeff 1 4 smd/hertz 10000000",
            "pair_coeff 2 4 smd/hertz 10000000",
            "pair_coeff 3 4 smd/hertz 10000000",
        ]
    );
}

#[test]
fn group_emission() {
    let mut g = ScriptObjectGroup::new();
    g.add(
        ScriptObject::new("a", 1, "a.data", RigidwallForcefield::new(1).into())
            .in_group("rigid")
            .in_group("solid"),
    )
    .unwrap();
    g.add(
        ScriptObject::new("b", 2, "b.data", WaterForcefield::new(2).into())
            .in_group("fluid")
            .in_group("ulsph"),
    )
    .unwrap();
    g.add(
        ScriptObject::new("c", 3, "c.data", SolidfoodForcefield::new(3).into())
            .in_group("oscillating")
            .in_group("solid")
            .in_group("tlsph"),
    )
    .unwrap();
    g.add(
        ScriptObject::new("d", 4, "c.data", SolidfoodForcefield::new(4).into())
            .in_group("solid")
            .in_group("tlsph"),
    )
    .unwrap();

    let text = g.group().do_(false).unwrap();
    assert!(text.contains("group rigid type 1"));
    assert!(text.contains("group solid type 1 3 4"));
    assert!(text.contains("group fluid type 2"));
    assert!(text.contains("group ulsph type 2"));
    assert!(text.contains("group oscillating type 3"));
    assert!(text.contains("group tlsph type 3 4"));
}

#[test]
fn pipescript_with_user_override() {
    let mut s1 = Script::new("s1");
    s1.definitions.set("x", Value::Int(10)).unwrap();
    let s2 = Script::new("s2").with_line("x=${x}");
    let mut p = s1 | s2;

    assert!(p.do_(None).unwrap().ends_with("x=10"));

    p.user[1].set("x", Value::Int(42)).unwrap();
    assert!(p.do_(None).unwrap().ends_with("x=42"));

    p.scripts[1].user.set("x", Value::Int(99)).unwrap();
    p.user[1].set("x", Value::Empty).unwrap();
    assert!(p.do_(None).unwrap().ends_with("x=99"));
}
