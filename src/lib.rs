//! Pizza3 composes LAMMPS simulation input decks programmatically.
//!
//! A user assembles typed, algebraically composable script fragments — initialization,
//! integration, dumps, translations, forcefields, geometry — whose concatenation emits a
//! textually correct LAMMPS input script with consistent variable substitution, group
//! declarations, and pair-coefficient blocks.
//!
//! The dependency order, leaves first:
//! [`container`] → [`expr`] → [`param`] → [`forcefield`] → [`script`] → [`scriptobject`] →
//! [`pipescript`], with [`region`] as a thin consumer built entirely on [`script`].

pub mod container;
pub mod error;
pub mod expr;
pub mod forcefield;
pub mod param;
pub mod pipescript;
pub mod region;
pub mod script;
pub mod scriptobject;

pub use container::{Container, Value};
pub use error::{Error, Result};
pub use expr::EvalConfig;
pub use forcefield::{ForcefieldKind, ForcefieldVariant};
pub use param::{Param, ParamAuto};
pub use pipescript::Pipescript;
pub use script::Script;
pub use scriptobject::{ScriptObject, ScriptObjectGroup};
