//! Script objects and groups.
//!
//! A [`ScriptObject`] names one particle source: a bead type, the LAMMPS groups it belongs
//! to, the data file providing its atoms, and the forcefield governing its pair
//! interactions. A [`ScriptObjectGroup`] is the multiset of objects keyed by bead type; it
//! derives the `group` declarations and the full triangular `pair_coeff` matrix that make up
//! a LAMMPS input's forcefield section.

use crate::forcefield::{self, ForcefieldKind, ForcefieldVariant};
use crate::param::Param;
use crate::script::Script;
use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

/// Errors raised while assembling or rendering a [`ScriptObjectGroup`].
#[derive(Debug, Error)]
pub enum ScriptObjectError {
    /// Two objects declared the same bead type.
    #[error("bead type {0} is already used by object '{1}'")]
    DuplicateBeadtype(u32, String),
    /// A forcefield failed to render.
    #[error(transparent)]
    Forcefield(#[from] forcefield::ForcefieldError),
}

impl From<ScriptObjectError> for crate::error::Error {
    fn from(e: ScriptObjectError) -> Self {
        Self::General(e.to_string())
    }
}

/// A typed particle-source record.
#[derive(Debug, Clone)]
pub struct ScriptObject {
    /// Human-readable label.
    pub name: String,
    /// Bead type (LAMMPS atom `type` column); keys the forcefield.
    pub beadtype: u32,
    /// LAMMPS groups this object's atoms belong to, in declaration order.
    pub group: IndexSet<String>,
    /// The data file supplying this object's atoms.
    pub filename: String,
    /// This object's forcefield descriptor.
    pub forcefield: ForcefieldKind,
    /// Per-object overrides (not currently interpolated into anything the group derives;
    /// carried for parity with the other entities' `USER` field and for callers who build
    /// their own fragments off it).
    pub user: Param,
}

impl ScriptObject {
    #[must_use]
    pub fn new(name: impl Into<String>, beadtype: u32, filename: impl Into<String>, forcefield: ForcefieldKind) -> Self {
        Self {
            name: name.into(),
            beadtype,
            group: IndexSet::new(),
            filename: filename.into(),
            forcefield,
            user: Param::new(),
        }
    }

    /// Adds this object to an additional LAMMPS group.
    #[must_use]
    pub fn in_group(mut self, name: impl Into<String>) -> Self {
        self.group.insert(name.into());
        self
    }

    /// `b.script`: the `read_data` fragment for this object. `first_use`
    /// distinguishes the very first `read_data` for a file (plain) from subsequent reuses of
    /// the same file by a different object (`add append`).
    #[must_use]
    pub fn script(&self, first_use: bool) -> Script {
        let line = if first_use {
            format!("read_data {}", self.filename)
        } else {
            format!("read_data {} add append", self.filename)
        };
        Script::new(format!("read:{}", self.name)).with_line(line)
    }

    /// `b + b'`: starts a new group containing both objects.
    #[must_use]
    pub fn combine(self, other: Self) -> ScriptObjectGroup {
        ScriptObjectGroup::new().with_object(self).with_object_unchecked(other)
    }
}

impl std::ops::Add for ScriptObject {
    type Output = ScriptObjectGroup;
    fn add(self, rhs: ScriptObject) -> ScriptObjectGroup {
        self.combine(rhs)
    }
}

/// `b > b'`: the ordering predicate group assembly stabilizes on — by bead
/// type, lowest first.
impl PartialEq for ScriptObject {
    fn eq(&self, other: &Self) -> bool {
        self.beadtype == other.beadtype
    }
}
impl Eq for ScriptObject {}
impl PartialOrd for ScriptObject {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScriptObject {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.beadtype.cmp(&other.beadtype)
    }
}

/// A multiset of [`ScriptObject`]s keyed by bead type.
#[derive(Debug, Clone, Default)]
pub struct ScriptObjectGroup {
    /// Objects keyed by bead type, insertion order preserved for stable group emission.
    objects: IndexMap<u32, ScriptObject>,
}

impl ScriptObjectGroup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an object, rejecting a duplicate bead type.
    pub fn add(&mut self, object: ScriptObject) -> Result<(), ScriptObjectError> {
        if let Some(existing) = self.objects.get(&object.beadtype) {
            return Err(ScriptObjectError::DuplicateBeadtype(object.beadtype, existing.name.clone()));
        }
        self.objects.insert(object.beadtype, object);
        Ok(())
    }

    /// Builder-style [`ScriptObjectGroup::add`], panicking on a duplicate bead type — used
    /// when the caller already controls bead-type uniqueness (e.g. `b + b'` building a
    /// fresh two-object group).
    #[must_use]
    pub fn with_object(mut self, object: ScriptObject) -> Self {
        self.add(object).expect("fresh group cannot contain a duplicate bead type");
        self
    }

    fn with_object_unchecked(self, object: ScriptObject) -> Self {
        self.with_object(object)
    }

    /// Number of distinct bead types in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects sorted by ascending bead type.
    fn sorted_objects(&self) -> Vec<&ScriptObject> {
        let mut v: Vec<&ScriptObject> = self.objects.values().collect();
        v.sort_by_key(|o| o.beadtype);
        v
    }

    /// `G.select(spec)`: a subgroup matching a bead type, a group name, or
    /// an arbitrary predicate.
    #[must_use]
    pub fn select(&self, predicate: impl Fn(&ScriptObject) -> bool) -> Self {
        let mut out = Self::new();
        for obj in self.objects.values() {
            if predicate(obj) {
                out.objects.insert(obj.beadtype, obj.clone());
            }
        }
        out
    }

    #[must_use]
    pub fn select_beadtype(&self, beadtype: u32) -> Self {
        self.select(|o| o.beadtype == beadtype)
    }

    #[must_use]
    pub fn select_group(&self, name: &str) -> Self {
        self.select(|o| o.group.contains(name))
    }

    /// `groupid`: group-name → ordered set of bead types sharing that LAMMPS group.
    #[must_use]
    pub fn groupid(&self) -> IndexMap<String, IndexSet<u32>> {
        let mut out: IndexMap<String, IndexSet<u32>> = IndexMap::new();
        for obj in self.sorted_objects() {
            for g in &obj.group {
                out.entry(g.clone()).or_default().insert(obj.beadtype);
            }
        }
        out
    }

    /// `G.interactions()`: every ordered bead-type pair `(i, j)` with
    /// `i ≤ j`, diagonal pairs first in ascending bead-type order, then off-diagonal pairs in
    /// the column-then-row traversal `(1,2), (1,3), (2,3), (1,4), (2,4), (3,4), …`.
    #[must_use]
    pub fn interactions(&self) -> Vec<(u32, u32)> {
        let beadtypes: Vec<u32> = self.sorted_objects().iter().map(|o| o.beadtype).collect();
        let mut pairs: Vec<(u32, u32)> = beadtypes.iter().map(|&b| (b, b)).collect();
        // Column-then-row: for column j (2nd..last), row i ranges 1st..j (exclusive),
        // ascending — this is exactly (1,2),(1,3),(2,3),(1,4),(2,4),(3,4),...
        for jc in 1..beadtypes.len() {
            for ic in 0..jc {
                pairs.push((beadtypes[ic], beadtypes[jc]));
            }
        }
        pairs
    }

    /// `G.group()`: one `group NAME type T1 T2 …` line per derived group
    /// name, each preceded by a comment listing any other group with the exact same
    /// bead-type set ("similar groups").
    #[must_use]
    pub fn group(&self) -> Script {
        let groupid = self.groupid();
        let mut script = Script::new("groups").with_section("group");
        for (name, beadtypes) in &groupid {
            let similar: Vec<&str> = groupid
                .iter()
                .filter(|(other_name, other_set)| *other_name != name && *other_set == beadtypes)
                .map(|(other_name, _)| other_name.as_str())
                .collect();
            if !similar.is_empty() {
                script = script.with_line(format!("# {name} is similar to: {}", similar.join(", ")));
            }
            let types: Vec<String> = beadtypes.iter().map(ToString::to_string).collect();
            script = script.with_line(format!("group {name} type {}", types.join(" ")));
        }
        script
    }

    /// `G.forcefield()`: the `pair_style hybrid/overlay` header, the
    /// diagonal coefficients (bead-type ascending), then the off-diagonal coefficients in
    /// the order [`ScriptObjectGroup::interactions`] reproduces bit-for-bit.
    pub fn forcefield(&self) -> Result<Script, ScriptObjectError> {
        let objects = self.sorted_objects();
        let mut substyles: Vec<String> = Vec::new();
        let mut saw_offdiag = false;

        for obj in &objects {
            if let Some(style) = obj.forcefield.pair_style()? {
                if !substyles.contains(&style) {
                    substyles.push(style);
                }
            }
        }
        if objects.len() > 1 {
            saw_offdiag = true;
        }
        if saw_offdiag && !substyles.iter().any(|s| s.starts_with("smd/hertz")) {
            substyles.push(format!("smd/hertz {}", crate::container::format_float(1.5)));
        }

        let mut script = Script::new("forcefield").with_section("pair");
        script = script.with_line(format!("pair_style hybrid/overlay {}", substyles.join(" ")));

        for obj in &objects {
            script = script.with_line(format!("pair_coeff {0} {0} {1}", obj.beadtype, obj.forcefield.pair_diagcoeff()?));
        }

        let by_beadtype: IndexMap<u32, &ForcefieldKind> =
            objects.iter().map(|o| (o.beadtype, &o.forcefield)).collect();
        for (i, j) in self.interactions() {
            if i == j {
                continue;
            }
            let fi = by_beadtype[&i];
            let fj = by_beadtype[&j];
            let coeff = forcefield::pair_offdiagcoeff(fi, fj)?;
            script = script.with_line(format!("pair_coeff {i} {j} {coeff}"));
        }

        Ok(script)
    }

    /// `.script`: input-files section + group section + forcefield
    /// section, composed in that order.
    pub fn script(&self) -> Result<Script, ScriptObjectError> {
        let mut reads = Script::new("reads").with_section("read_data");
        let mut seen_files: IndexSet<&str> = IndexSet::new();
        for obj in self.sorted_objects() {
            let first_use = seen_files.insert(obj.filename.as_str());
            reads.template.extend(obj.script(first_use).template);
        }
        Ok(reads + self.group() + self.forcefield()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forcefield::{RigidwallForcefield, SolidfoodForcefield, WaterForcefield};

    fn group_s4() -> ScriptObjectGroup {
        let mut g = ScriptObjectGroup::new();
        g.add(ScriptObject::new("wall", 1, "wall.data", RigidwallForcefield::new(1).into())).unwrap();
        g.add(ScriptObject::new("fluid", 2, "fluid.data", WaterForcefield::new(2).into())).unwrap();
        g.add(ScriptObject::new("solid", 3, "solid.data", SolidfoodForcefield::new(3).into())).unwrap();
        g.add(ScriptObject::new("solid2", 4, "solid.data", SolidfoodForcefield::new(4).into())).unwrap();
        g
    }

    #[test]
    fn interactions_are_triangular_in_column_then_row_order() {
        let g = group_s4();
        let got = g.interactions();
        assert_eq!(got.len(), 4 * 5 / 2);
        assert!(got.iter().all(|(i, j)| i <= j));
        let offdiag: Vec<(u32, u32)> = got.into_iter().filter(|(i, j)| i != j).collect();
        assert_eq!(offdiag, vec![(1, 2), (1, 3), (2, 3), (1, 4), (2, 4), (3, 4)]);
    }

    #[test]
    fn duplicate_beadtype_rejected() {
        let mut g = ScriptObjectGroup::new();
        g.add(ScriptObject::new("a", 1, "a.data", RigidwallForcefield::new(1).into())).unwrap();
        let err = g.add(ScriptObject::new("b", 1, "b.data", RigidwallForcefield::new(1).into()));
        assert!(matches!(err, Err(ScriptObjectError::DuplicateBeadtype(1, _))));
    }

    #[test]
    fn forcefield_block_matches_scenario_s4_structure() {
        let g = group_s4();
        let rendered = g.forcefield().unwrap().do_(false).unwrap();
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[0].starts_with("pair_style hybrid/overlay smd/ulsph smd/tlsph smd/hertz"));
        assert_eq!(lines[1], "pair_coeff 1 1 none");
        assert!(lines[2].starts_with("pair_coeff 2 2 smd/ulsph"));
        assert!(lines[3].starts_with("pair_coeff 3 3 smd/tlsph"));
        assert!(lines[4].starts_with("pair_coeff 4 4 smd/tlsph"));
        assert_eq!(lines[5], "pair_coeff 1 2 smd/hertz 10000000");
        assert_eq!(lines[6], "pair_coeff 1 3 smd/hertz 10000000");
        assert_eq!(lines[7], "pair_coeff 2 3 smd/hertz 10000000");
        assert_eq!(lines[8], "pair_coeff 1 4 smd/hertz 10000000");
        assert_eq!(lines[9], "pair_coeff 2 4 smd/hertz 10000000");
        assert_eq!(lines[10], "pair_coeff 3 4 smd/hertz 10000000");
    }

    #[test]
    fn group_emission_lists_similar_groups() {
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
}
