//! Forcefield descriptors.
//!
//! A sum type over dirt-simple structs, one per style, glued together with `enum_dispatch`:
//! a closed list of known styles plus a `UserForcefield` escape hatch for user-extensible
//! styles, looked up through [`STYLE_REGISTRY`] by name rather than any class-name reflection.
//!
//! `water` and `solidfood` are not separate rendering strategies: physically they are
//! parameter presets of `smd/ulsph` and `smd/tlsph` respectively (water is simulated as an
//! updated-Lagrangian SPH fluid, solid food as a total-Lagrangian SPH solid), so
//! [`WaterForcefield`]/[`SolidfoodForcefield`] wrap a [`UlsphForcefield`]/[`TlsphForcefield`]
//! and delegate to it. This mirrors scenario S4: bead type 2's forcefield is `water` but the
//! rendered diagonal coefficient line reads `smd/ulsph *COMMON … *END`.

use crate::container::Value;
use crate::param::{render_template, Param};
use enum_dispatch::enum_dispatch;
use thiserror::Error;

/// Errors specific to forcefield construction and rendering.
#[derive(Debug, Error)]
pub enum ForcefieldError {
    /// Construction was asked for a style name not in [`STYLE_REGISTRY`].
    #[error("unknown forcefield style '{0}'")]
    UnknownStyle(String),
    /// A required parameter was missing or failed to evaluate cleanly.
    #[error("error rendering forcefield '{0}': {1}")]
    Render(String, String),
    /// Two cross-style forcefields had no generic contact fallback available.
    #[error("no contact coefficient available between '{0}' and '{1}'")]
    NoFallback(String, String),
}

impl From<ForcefieldError> for crate::error::Error {
    fn from(e: ForcefieldError) -> Self {
        Self::General(e.to_string())
    }
}

/// Default per-pair contact stiffness used by the generic `smd/hertz` fallback,
/// overridable per forcefield via `USER.contact_stiffness`.
const DEFAULT_CONTACT_STIFFNESS: f64 = 10_000_000.0;
/// Global cutoff-scale argument `smd/hertz` takes in the `pair_style hybrid/overlay` header.
const DEFAULT_CONTACT_SCALE: f64 = 1.5;

/// Fields shared by every concrete forcefield style.
#[derive(Debug, Clone)]
pub struct ForcefieldCore {
    /// Free-text description, carried through to disk/log output but not rendered.
    pub description: String,
    /// The bead type this descriptor's diagonal coefficient applies to.
    pub beadtype: u32,
    /// Style-specific coefficient defaults.
    pub parameters: Param,
    /// Free label distinguishing otherwise-identical descriptors.
    pub userid: String,
    /// Free-text version tag.
    pub version: String,
    /// User overrides; wins over `parameters` when both define the same key.
    pub user: Param,
}

impl ForcefieldCore {
    #[must_use]
    pub fn new(beadtype: u32) -> Self {
        Self {
            description: String::new(),
            beadtype,
            parameters: Param::new(),
            userid: String::new(),
            version: "1.0".to_string(),
            user: Param::new(),
        }
    }

    fn contact_stiffness(&self) -> f64 {
        self.contact_override().unwrap_or_else(|| {
            match self.parameters.get_raw("contact_stiffness") {
                Ok(Value::Float(f)) => *f,
                _ => DEFAULT_CONTACT_STIFFNESS,
            }
        })
    }

    /// The explicit `USER.contact_stiffness` override, if any.
    fn contact_override(&self) -> Option<f64> {
        match self.user.get_raw("contact_stiffness") {
            Ok(Value::Float(f)) => Some(*f),
            _ => None,
        }
    }
}

/// Capability set every forcefield variant implements.
///
/// `pair_offdiagcoeff` is deliberately not part of this trait: it is a function of *two*
/// forcefields, so it lives as the free function
/// [`pair_offdiagcoeff`] below instead of fighting `enum_dispatch`'s single-receiver shape.
#[enum_dispatch]
pub trait ForcefieldVariant {
    /// The LAMMPS pair style name this descriptor renders under (`"none"`, `"smd/ulsph"`, …).
    fn style_name(&self) -> &str;
    /// The bead type this descriptor applies to.
    fn beadtype(&self) -> u32;
    /// The substyle contribution to the group's `pair_style hybrid/overlay` header, if any.
    /// `None` for styles (`none`, `rigidwall`) that never participate in `hybrid/overlay`.
    fn pair_style(&self) -> Result<Option<String>, ForcefieldError>;
    /// The diagonal `pair_coeff i i …` payload (without the `pair_coeff i i` prefix).
    fn pair_diagcoeff(&self) -> Result<String, ForcefieldError>;
    /// Per-pair contact stiffness used when this forcefield participates in a generic
    /// cross-style fallback.
    fn contact_stiffness(&self) -> f64;
    /// The explicit per-forcefield override, if any.
    fn contact_override(&self) -> Option<f64>;
}

/// Inert style: contributes nothing to the pair-style header and renders `none` as its own
/// diagonal coefficient.
#[derive(Debug, Clone)]
pub struct NoneForcefield(pub ForcefieldCore);

impl NoneForcefield {
    #[must_use]
    pub fn new(beadtype: u32) -> Self {
        Self(ForcefieldCore::new(beadtype))
    }
}

impl ForcefieldVariant for NoneForcefield {
    fn style_name(&self) -> &str {
        "none"
    }
    fn beadtype(&self) -> u32 {
        self.0.beadtype
    }
    fn pair_style(&self) -> Result<Option<String>, ForcefieldError> {
        Ok(None)
    }
    fn pair_diagcoeff(&self) -> Result<String, ForcefieldError> {
        Ok("none".to_string())
    }
    fn contact_stiffness(&self) -> f64 {
        self.0.contact_stiffness()
    }
    fn contact_override(&self) -> Option<f64> {
        self.0.contact_override()
    }
}

/// Immovable boundary: mechanically inert in the pair-coefficient matrix (its interaction
/// with the fluid/solid is imposed through boundary-condition fixes, not a pair style), so
/// it renders identically to [`NoneForcefield`] but keeps its own name.
#[derive(Debug, Clone)]
pub struct RigidwallForcefield(pub ForcefieldCore);

impl RigidwallForcefield {
    #[must_use]
    pub fn new(beadtype: u32) -> Self {
        Self(ForcefieldCore::new(beadtype))
    }
}

impl ForcefieldVariant for RigidwallForcefield {
    fn style_name(&self) -> &str {
        "rigidwall"
    }
    fn beadtype(&self) -> u32 {
        self.0.beadtype
    }
    fn pair_style(&self) -> Result<Option<String>, ForcefieldError> {
        Ok(None)
    }
    fn pair_diagcoeff(&self) -> Result<String, ForcefieldError> {
        Ok("none".to_string())
    }
    fn contact_stiffness(&self) -> f64 {
        self.0.contact_stiffness()
    }
    fn contact_override(&self) -> Option<f64> {
        self.0.contact_override()
    }
}

const ULSPH_TEMPLATE: &str =
    "smd/ulsph *COMMON ${rho0} ${c0} ${q1} ${Cp} ${hg} *END";
const TLSPH_TEMPLATE: &str =
    "smd/tlsph *COMMON ${rho0} ${E} ${nu} ${q1} ${q2} ${hg} ${Cp} *STRENGTH_LINEAR_PLASTIC ${yield_stress} ${hardening} *EOS_LINEAR *END";

fn default_ulsph_parameters() -> Param {
    let mut p = Param::new();
    p.set("rho0", Value::Float(1000.0)).expect("static key");
    p.set("c0", Value::Float(10.0)).expect("static key");
    p.set("q1", Value::Float(1.0)).expect("static key");
    p.set("Cp", Value::Float(1.0)).expect("static key");
    p.set("hg", Value::Float(10.0)).expect("static key");
    p.set("contact_stiffness", Value::Float(DEFAULT_CONTACT_STIFFNESS)).expect("static key");
    p
}

fn default_tlsph_parameters() -> Param {
    let mut p = Param::new();
    p.set("rho0", Value::Float(1000.0)).expect("static key");
    p.set("E", Value::Float(5.0e6)).expect("static key");
    p.set("nu", Value::Float(0.3)).expect("static key");
    p.set("q1", Value::Float(1.0)).expect("static key");
    p.set("q2", Value::Float(0.0)).expect("static key");
    p.set("hg", Value::Float(10.0)).expect("static key");
    p.set("Cp", Value::Float(1.0)).expect("static key");
    p.set("yield_stress", Value::Float(1.0e5)).expect("static key");
    p.set("hardening", Value::Float(0.0)).expect("static key");
    p.set("contact_stiffness", Value::Float(DEFAULT_CONTACT_STIFFNESS)).expect("static key");
    p
}

/// Updated-Lagrangian SPH fluid.
#[derive(Debug, Clone)]
pub struct UlsphForcefield(pub ForcefieldCore);

impl UlsphForcefield {
    #[must_use]
    pub fn new(beadtype: u32) -> Self {
        let mut core = ForcefieldCore::new(beadtype);
        core.parameters = default_ulsph_parameters();
        Self(core)
    }
}

impl ForcefieldVariant for UlsphForcefield {
    fn style_name(&self) -> &str {
        "smd/ulsph"
    }
    fn beadtype(&self) -> u32 {
        self.0.beadtype
    }
    fn pair_style(&self) -> Result<Option<String>, ForcefieldError> {
        Ok(Some("smd/ulsph".to_string()))
    }
    fn pair_diagcoeff(&self) -> Result<String, ForcefieldError> {
        render_template(ULSPH_TEMPLATE, &self.0.parameters, &self.0.user)
            .map_err(|e| ForcefieldError::Render("smd/ulsph".to_string(), e.to_string()))
    }
    fn contact_stiffness(&self) -> f64 {
        self.0.contact_stiffness()
    }
    fn contact_override(&self) -> Option<f64> {
        self.0.contact_override()
    }
}

/// Total-Lagrangian SPH solid.
#[derive(Debug, Clone)]
pub struct TlsphForcefield(pub ForcefieldCore);

impl TlsphForcefield {
    #[must_use]
    pub fn new(beadtype: u32) -> Self {
        let mut core = ForcefieldCore::new(beadtype);
        core.parameters = default_tlsph_parameters();
        Self(core)
    }
}

impl ForcefieldVariant for TlsphForcefield {
    fn style_name(&self) -> &str {
        "smd/tlsph"
    }
    fn beadtype(&self) -> u32 {
        self.0.beadtype
    }
    fn pair_style(&self) -> Result<Option<String>, ForcefieldError> {
        Ok(Some("smd/tlsph".to_string()))
    }
    fn pair_diagcoeff(&self) -> Result<String, ForcefieldError> {
        render_template(TLSPH_TEMPLATE, &self.0.parameters, &self.0.user)
            .map_err(|e| ForcefieldError::Render("smd/tlsph".to_string(), e.to_string()))
    }
    fn contact_stiffness(&self) -> f64 {
        self.0.contact_stiffness()
    }
    fn contact_override(&self) -> Option<f64> {
        self.0.contact_override()
    }
}

/// Water, modeled as `smd/ulsph` with water-specific defaults.
#[derive(Debug, Clone)]
pub struct WaterForcefield(pub UlsphForcefield);

impl WaterForcefield {
    #[must_use]
    pub fn new(beadtype: u32) -> Self {
        let mut inner = UlsphForcefield::new(beadtype);
        inner.0.parameters.set("rho0", Value::Float(1000.0)).expect("static key");
        inner.0.parameters.set("c0", Value::Float(15.0)).expect("static key");
        Self(inner)
    }
}

impl ForcefieldVariant for WaterForcefield {
    fn style_name(&self) -> &str {
        self.0.style_name()
    }
    fn beadtype(&self) -> u32 {
        self.0.beadtype()
    }
    fn pair_style(&self) -> Result<Option<String>, ForcefieldError> {
        self.0.pair_style()
    }
    fn pair_diagcoeff(&self) -> Result<String, ForcefieldError> {
        self.0.pair_diagcoeff()
    }
    fn contact_stiffness(&self) -> f64 {
        self.0.contact_stiffness()
    }
    fn contact_override(&self) -> Option<f64> {
        self.0.contact_override()
    }
}

/// Solid food, modeled as `smd/tlsph` with food-specific defaults.
#[derive(Debug, Clone)]
pub struct SolidfoodForcefield(pub TlsphForcefield);

impl SolidfoodForcefield {
    #[must_use]
    pub fn new(beadtype: u32) -> Self {
        let mut inner = TlsphForcefield::new(beadtype);
        inner.0.parameters.set("rho0", Value::Float(1050.0)).expect("static key");
        inner.0.parameters.set("E", Value::Float(2.0e6)).expect("static key");
        Self(inner)
    }
}

impl ForcefieldVariant for SolidfoodForcefield {
    fn style_name(&self) -> &str {
        self.0.style_name()
    }
    fn beadtype(&self) -> u32 {
        self.0.beadtype()
    }
    fn pair_style(&self) -> Result<Option<String>, ForcefieldError> {
        self.0.pair_style()
    }
    fn pair_diagcoeff(&self) -> Result<String, ForcefieldError> {
        self.0.pair_diagcoeff()
    }
    fn contact_stiffness(&self) -> f64 {
        self.0.contact_stiffness()
    }
    fn contact_override(&self) -> Option<f64> {
        self.0.contact_override()
    }
}

/// Bare `smd/hertz` contact style, constructible directly when a bead type has no material
/// forcefield of its own beyond contact mechanics.
#[derive(Debug, Clone)]
pub struct SmdForcefield(pub ForcefieldCore);

impl SmdForcefield {
    #[must_use]
    pub fn new(beadtype: u32) -> Self {
        let mut core = ForcefieldCore::new(beadtype);
        core.parameters.set("contact_stiffness", Value::Float(DEFAULT_CONTACT_STIFFNESS)).expect("static key");
        Self(core)
    }
}

impl ForcefieldVariant for SmdForcefield {
    fn style_name(&self) -> &str {
        "smd/hertz"
    }
    fn beadtype(&self) -> u32 {
        self.0.beadtype
    }
    fn pair_style(&self) -> Result<Option<String>, ForcefieldError> {
        Ok(Some(format!("smd/hertz {}", crate::container::format_float(DEFAULT_CONTACT_SCALE))))
    }
    fn pair_diagcoeff(&self) -> Result<String, ForcefieldError> {
        let k = self.0.contact_stiffness();
        Ok(format!("smd/hertz {}", crate::container::format_float(k)))
    }
    fn contact_stiffness(&self) -> f64 {
        self.0.contact_stiffness()
    }
    fn contact_override(&self) -> Option<f64> {
        self.0.contact_override()
    }
}

/// A fully user-registered style: `style` names the
/// LAMMPS pair style, `template` is the `${…}`-parameterized `pair_coeff` payload rendered
/// against `core.parameters ⊕ core.user` exactly like the built-in variants.
#[derive(Debug, Clone)]
pub struct UserForcefield {
    pub core: ForcefieldCore,
    pub style: String,
    pub template: String,
    pub contributes_header: bool,
}

impl ForcefieldVariant for UserForcefield {
    fn style_name(&self) -> &str {
        &self.style
    }
    fn beadtype(&self) -> u32 {
        self.core.beadtype
    }
    fn pair_style(&self) -> Result<Option<String>, ForcefieldError> {
        Ok(self.contributes_header.then(|| self.style.clone()))
    }
    fn pair_diagcoeff(&self) -> Result<String, ForcefieldError> {
        render_template(&self.template, &self.core.parameters, &self.core.user)
            .map_err(|e| ForcefieldError::Render(self.style.clone(), e.to_string()))
    }
    fn contact_stiffness(&self) -> f64 {
        self.core.contact_stiffness()
    }
    fn contact_override(&self) -> Option<f64> {
        self.core.contact_override()
    }
}

/// The forcefield sum type.
///
/// WARNING: `enum_dispatch` generates `From` impls keyed to variant order; keep new
/// built-in styles appended at the end.
#[enum_dispatch(ForcefieldVariant)]
#[derive(Debug, Clone)]
pub enum ForcefieldKind {
    None(NoneForcefield),
    Rigidwall(RigidwallForcefield),
    Ulsph(UlsphForcefield),
    Tlsph(TlsphForcefield),
    Water(WaterForcefield),
    Solidfood(SolidfoodForcefield),
    Smd(SmdForcefield),
    User(UserForcefield),
}

type StyleConstructor = fn(u32) -> ForcefieldKind;

/// Name → constructor table. [`from_style`] is the only thing that looks names up in it.
pub const STYLE_REGISTRY: &[(&str, StyleConstructor)] = &[
    ("none", |bt| ForcefieldKind::None(NoneForcefield::new(bt))),
    ("rigidwall", |bt| ForcefieldKind::Rigidwall(RigidwallForcefield::new(bt))),
    ("ulsph", |bt| ForcefieldKind::Ulsph(UlsphForcefield::new(bt))),
    ("tlsph", |bt| ForcefieldKind::Tlsph(TlsphForcefield::new(bt))),
    ("water", |bt| ForcefieldKind::Water(WaterForcefield::new(bt))),
    ("solidfood", |bt| ForcefieldKind::Solidfood(SolidfoodForcefield::new(bt))),
    ("smd", |bt| ForcefieldKind::Smd(SmdForcefield::new(bt))),
];

/// Builds a built-in forcefield by style name.
pub fn from_style(style: &str, beadtype: u32) -> Result<ForcefieldKind, ForcefieldError> {
    STYLE_REGISTRY
        .iter()
        .find(|(name, _)| *name == style)
        .map(|(_, ctor)| ctor(beadtype))
        .ok_or_else(|| ForcefieldError::UnknownStyle(style.to_string()))
}

/// Off-diagonal (cross bead-type) coefficient between two forcefields.
///
/// Same style name on both sides would be handled by the caller pairing a material with
/// itself (not meaningfully different from the diagonal case in this engine — groups never
/// ask for that), so this always renders the generic fallback: `pair_coeff i j smd/hertz
/// ${contact_stiffness}`, stiffness taken from `first` unless `second` overrides it.
pub fn pair_offdiagcoeff(first: &ForcefieldKind, second: &ForcefieldKind) -> Result<String, ForcefieldError> {
    let k = second.contact_override().unwrap_or_else(|| first.contact_stiffness());
    if !k.is_finite() {
        return Err(ForcefieldError::NoFallback(first.style_name().to_string(), second.style_name().to_string()));
    }
    Ok(format!("smd/hertz {}", crate::container::format_float(k)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_renders_bare_keyword() {
        let ff = NoneForcefield::new(1);
        assert_eq!(ff.pair_diagcoeff().unwrap(), "none");
        assert!(ff.pair_style().unwrap().is_none());
    }

    #[test]
    fn rigidwall_also_renders_none_diag() {
        let ff = RigidwallForcefield::new(1);
        assert_eq!(ff.pair_diagcoeff().unwrap(), "none");
        assert!(ff.pair_style().unwrap().is_none());
    }

    #[test]
    fn water_delegates_to_ulsph_style() {
        let ff = WaterForcefield::new(2);
        let text = ff.pair_diagcoeff().unwrap();
        assert!(text.starts_with("smd/ulsph *COMMON"));
        assert!(text.ends_with("*END"));
        assert_eq!(ff.pair_style().unwrap().as_deref(), Some("smd/ulsph"));
    }

    #[test]
    fn solidfood_delegates_to_tlsph_style() {
        let ff = SolidfoodForcefield::new(3);
        let text = ff.pair_diagcoeff().unwrap();
        assert!(text.starts_with("smd/tlsph *COMMON"));
        assert!(text.contains("*STRENGTH_LINEAR_PLASTIC"));
        assert!(text.ends_with("*END"));
    }

    #[test]
    fn offdiag_uses_first_operands_stiffness_by_default() {
        let a: ForcefieldKind = RigidwallForcefield::new(1).into();
        let b: ForcefieldKind = WaterForcefield::new(2).into();
        assert_eq!(pair_offdiagcoeff(&a, &b).unwrap(), "smd/hertz 10000000");
    }

    #[test]
    fn offdiag_prefers_second_operands_override() {
        let a: ForcefieldKind = RigidwallForcefield::new(1).into();
        let mut water = WaterForcefield::new(2);
        water.0 .0.user.set("contact_stiffness", Value::Float(5.0e5)).unwrap();
        let b: ForcefieldKind = water.into();
        assert_eq!(pair_offdiagcoeff(&a, &b).unwrap(), "smd/hertz 500000");
    }

    #[test]
    fn from_style_rejects_unknown_name() {
        assert!(matches!(from_style("bogus", 1), Err(ForcefieldError::UnknownStyle(_))));
    }

    #[test]
    fn from_style_builds_known_variants() {
        assert!(from_style("tlsph", 3).is_ok());
        assert!(from_style("solidfood", 4).is_ok());
    }
}
