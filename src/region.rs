//! Region/geometry codelets: concrete
//! `Script` builders for the LAMMPS `region` and `create_atoms` commands. Out-of-scope raster
//! drawing is not reimplemented here — these codelets only expose the
//! LAMMPS commands a caller would otherwise hand-write, and compose through the same `Script`
//! operator algebra as everything else.

use crate::container::Value;
use crate::script::Script;

/// A LAMMPS geometric primitive usable in a `region` command's style clause.
#[derive(Debug, Clone)]
pub enum Shape {
    Block { xlo: f64, xhi: f64, ylo: f64, yhi: f64, zlo: f64, zhi: f64 },
    Sphere { x: f64, y: f64, z: f64, radius: f64 },
    Cylinder { axis: char, c1: f64, c2: f64, radius: f64, lo: f64, hi: f64 },
}

impl Shape {
    fn style_clause(&self) -> String {
        match self {
            Self::Block { xlo, xhi, ylo, yhi, zlo, zhi } => {
                format!("block {xlo} {xhi} {ylo} {yhi} {zlo} {zhi}")
            }
            Self::Sphere { x, y, z, radius } => format!("sphere {x} {y} {z} {radius}"),
            Self::Cylinder { axis, c1, c2, radius, lo, hi } => {
                format!("cylinder {axis} {c1} {c2} {radius} {lo} {hi}")
            }
        }
    }
}

/// `region NAME STYLE ARGS ... [side in|out] [units box|lattice]`.
#[derive(Debug, Clone)]
pub struct Region {
    pub name: String,
    pub shape: Shape,
    pub side: Option<&'static str>,
    pub units: &'static str,
}

impl Region {
    #[must_use]
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self { name: name.into(), shape, side: None, units: "box" }
    }

    #[must_use]
    pub fn side_in(mut self) -> Self {
        self.side = Some("in");
        self
    }

    #[must_use]
    pub fn side_out(mut self) -> Self {
        self.side = Some("out");
        self
    }

    #[must_use]
    pub fn with_units(mut self, units: &'static str) -> Self {
        self.units = units;
        self
    }

    /// Renders this region as a `Script` codelet. DEFINITIONS carries the region's own name
    /// and shape text as named keys so a caller can override them through USER before
    /// calling `do()`, consistent with every other codelet in this crate.
    #[must_use]
    pub fn script(&self) -> Script {
        let mut line = format!("region ${{name}} {}", self.shape.style_clause());
        if let Some(side) = self.side {
            line.push_str(&format!(" side {side}"));
        }
        line.push_str(" units ${units}");

        let mut s = Script::new(format!("region:{}", self.name)).with_section("region").with_line(line);
        s.definitions.set("name", Value::Str(self.name.clone())).expect("region name is a valid identifier");
        s.definitions.set("units", Value::Str(self.units.to_string())).expect("static key");
        s
    }
}

/// `create_atoms TYPE region REGIONNAME [args...]`.
#[derive(Debug, Clone)]
pub struct CreateAtoms {
    pub beadtype: u32,
    pub region_name: String,
    pub extra_args: Vec<String>,
}

impl CreateAtoms {
    #[must_use]
    pub fn new(beadtype: u32, region_name: impl Into<String>) -> Self {
        Self { beadtype, region_name: region_name.into(), extra_args: Vec::new() }
    }

    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    #[must_use]
    pub fn script(&self) -> Script {
        let mut line = format!("create_atoms ${{beadtype}} region ${{region}}");
        for arg in &self.extra_args {
            line.push(' ');
            line.push_str(arg);
        }
        let mut s = Script::new(format!("create:{}", self.region_name)).with_section("create_atoms").with_line(line);
        s.definitions.set("beadtype", Value::Int(i64::from(self.beadtype))).expect("static key");
        s.definitions.set("region", Value::Str(self.region_name.clone())).expect("region name is a valid identifier");
        s
    }
}

/// A region together with the `create_atoms` command that populates it — the common case a
/// workshop script reaches for.
#[must_use]
pub fn region_with_atoms(region: &Region, beadtype: u32) -> Script {
    region.script() + CreateAtoms::new(beadtype, region.name.clone()).script()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_region_renders_style_clause() {
        let r = Region::new("box", Shape::Block { xlo: 0.0, xhi: 1.0, ylo: 0.0, yhi: 1.0, zlo: 0.0, zhi: 1.0 });
        let text = r.script().do_(false).unwrap();
        assert_eq!(text, "region box block 0 1 0 1 0 1 units box");
    }

    #[test]
    fn side_qualifier_is_rendered_when_present() {
        let r = Region::new("wall", Shape::Sphere { x: 0.0, y: 0.0, z: 0.0, radius: 2.0 }).side_out();
        let text = r.script().do_(false).unwrap();
        assert_eq!(text, "region wall sphere 0 0 0 2 side out units box");
    }

    #[test]
    fn region_and_create_atoms_compose() {
        let r = Region::new("drop", Shape::Sphere { x: 0.0, y: 0.0, z: 0.0, radius: 1.0 });
        let combined = region_with_atoms(&r, 2);
        let text = combined.do_(false).unwrap();
        assert_eq!(text, "region drop sphere 0 0 0 1 units box\ncreate_atoms 2 region drop");
    }
}
