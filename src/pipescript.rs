//! Pipescript: an ordered, indexable pipeline of script fragments.
//!
//! Per-stage `USER` overrides are stored in a list parallel to the fragments themselves
//! rather than folded into each [`Script`]'s own `USER` — that is exactly what
//! lets `P.USER[i].key = value` (a slot override) and `P.scripts[i].USER.key = value` (a
//! fragment mutation) be observably different.

use crate::param::Param;
use crate::script::{Script, ScriptError};
use std::ops::{Add, Mul};

/// Errors raised while indexing or rendering a [`Pipescript`].
#[derive(Debug, thiserror::Error)]
pub enum PipescriptError {
    /// A stage index was out of range.
    #[error("stage index {0} out of range for pipescript of length {1}")]
    IndexOutOfRange(i64, usize),
    /// No stage with this name exists (`rename`).
    #[error("no stage named '{0}'")]
    NoSuchStage(String),
    /// A stage failed to render.
    #[error(transparent)]
    Render(#[from] ScriptError),
}

impl From<PipescriptError> for crate::error::Error {
    fn from(e: PipescriptError) -> Self {
        Self::General(e.to_string())
    }
}

/// The ordered pipeline.
#[derive(Debug, Clone, Default)]
pub struct Pipescript {
    /// The fragments themselves, in pipeline order.
    pub scripts: Vec<Script>,
    /// Per-stage override, parallel to `scripts`. Higher precedence than the stage's own
    /// `Script::user`.
    pub user: Vec<Param>,
    /// Cached render of the most recent `do()`, invalidated by [`Pipescript::clear`] and by
    /// any mutating operation.
    cache: Option<String>,
}

fn normalize(i: i64, len: usize) -> Option<usize> {
    let len_i = len as i64;
    let idx = if i < 0 { i + len_i } else { i };
    (idx >= 0 && idx < len_i).then_some(idx as usize)
}

impl Pipescript {
    /// An empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// True if there are no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Appends a stage with an empty per-stage override.
    #[must_use]
    pub fn pipe_script(mut self, script: Script) -> Self {
        self.scripts.push(script);
        self.user.push(Param::new());
        self.cache = None;
        self
    }

    /// Appends every stage of `other`, keeping each stage's own per-stage override.
    #[must_use]
    pub fn pipe(mut self, other: Self) -> Self {
        self.scripts.extend(other.scripts);
        self.user.extend(other.user);
        self.cache = None;
        self
    }

    /// The effective fragment at stage `i` (possibly negative): its own `USER` merged with
    /// the stage override, override winning.
    pub fn get(&self, i: i64) -> Result<Script, PipescriptError> {
        let idx = normalize(i, self.scripts.len())
            .ok_or(PipescriptError::IndexOutOfRange(i, self.scripts.len()))?;
        let mut stage = self.scripts[idx].clone();
        stage.user.update(&self.user[idx]);
        Ok(stage)
    }

    /// Returns a sub-pipescript over a half-open index range, preserving overrides.
    #[must_use]
    pub fn slice(&self, start: usize, stop: usize) -> Self {
        let stop = stop.min(self.scripts.len());
        let start = start.min(stop);
        Self {
            scripts: self.scripts[start..stop].to_vec(),
            user: self.user[start..stop].to_vec(),
            cache: None,
        }
    }

    /// Returns a reordered copy built from a list of (possibly repeated, possibly negative)
    /// stage indices.
    pub fn reorder(&self, indices: &[i64]) -> Result<Self, PipescriptError> {
        let mut scripts = Vec::with_capacity(indices.len());
        let mut user = Vec::with_capacity(indices.len());
        for &i in indices {
            let idx = normalize(i, self.scripts.len())
                .ok_or(PipescriptError::IndexOutOfRange(i, self.scripts.len()))?;
            scripts.push(self.scripts[idx].clone());
            user.push(self.user[idx].clone());
        }
        Ok(Self { scripts, user, cache: None })
    }

    /// Renames the stage named `old` to `new`.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), PipescriptError> {
        let stage = self
            .scripts
            .iter_mut()
            .find(|s| s.name == old)
            .ok_or_else(|| PipescriptError::NoSuchStage(old.to_string()))?;
        stage.name = new.to_string();
        self.cache = None;
        Ok(())
    }

    /// Drops the cached render, forcing the next `do()` to recompute it.
    pub fn clear(&mut self) {
        self.cache = None;
    }

    /// Renders selected stages, chaining `DEFINITIONS` across stages so
    /// stage `k` sees the union of every earlier stage's `DEFINITIONS` and `USER` as well as
    /// its own — the mechanism behind dynamic LAMMPS
    /// `variable` redefinition across equilibration stages.
    pub fn do_(&self, indices: Option<&[usize]>) -> Result<String, PipescriptError> {
        let selected: Vec<usize> = match indices {
            Some(idx) => idx.to_vec(),
            None => (0..self.scripts.len()).collect(),
        };
        let mut accumulated = Param::new();
        let mut rendered = Vec::with_capacity(selected.len());
        for &i in &selected {
            let raw = self.scripts.get(i).ok_or(PipescriptError::IndexOutOfRange(i as i64, self.scripts.len()))?;
            let stage_user = &self.user[i];

            accumulated.update(&raw.definitions);
            accumulated.update(&raw.user);
            accumulated.update(stage_user);

            let mut stage = raw.clone();
            stage.definitions = accumulated.clone();
            stage.user = Param::new();
            rendered.push(stage.do_(false)?);
        }
        Ok(rendered.join("\n"))
    }

    /// `do()` over every stage, caching the result until the next mutation or [`clear`].
    ///
    /// [`clear`]: Pipescript::clear
    pub fn do_cached(&mut self) -> Result<String, PipescriptError> {
        if let Some(cached) = &self.cache {
            return Ok(cached.clone());
        }
        let text = self.do_(None)?;
        self.cache = Some(text.clone());
        Ok(text)
    }
}

/// `P + Q`: concatenates two pipescripts stage-for-stage.
impl Add for Pipescript {
    type Output = Pipescript;
    fn add(self, rhs: Pipescript) -> Pipescript {
        self.pipe(rhs)
    }
}

/// `P * n`: repeats the whole pipeline `n` times, each repetition getting
/// its own independent per-stage `USER` scope (clones, not shared references).
impl Mul<u32> for Pipescript {
    type Output = Pipescript;
    fn mul(self, n: u32) -> Pipescript {
        let mut out = Pipescript::new();
        for _ in 0..n {
            out = out.pipe(self.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Value;

    fn stage(name: &str, line: &str) -> Script {
        Script::new(name).with_line(line)
    }

    #[test]
    fn accumulates_definitions_across_stages() {
        let mut s1 = stage("s1", "variable x equal ${x}");
        s1.definitions.set("x", Value::Int(10)).unwrap();
        let s2 = stage("s2", "print ${x}");

        let p = Pipescript::new().pipe_script(s1).pipe_script(s2);
        assert_eq!(p.do_(None).unwrap(), "variable x equal 10\nprint 10");
    }

    #[test]
    fn later_stage_overrides_earlier_definition() {
        let mut s1 = stage("s1", "variable x equal ${x}");
        s1.definitions.set("x", Value::Int(10)).unwrap();
        let mut s2 = stage("s2", "variable x equal ${x}");
        s2.definitions.set("x", Value::Int(20)).unwrap();

        let p = Pipescript::new().pipe_script(s1).pipe_script(s2);
        assert_eq!(p.do_(None).unwrap(), "variable x equal 10\nvariable x equal 20");
    }

    #[test]
    fn slot_override_outranks_fragment_user() {
        let s2 = stage("s2", "x=${x}");
        let mut p = Pipescript::new().pipe_script(stage("s1", "noop")).pipe_script(s2);
        p.scripts[1].user.set("x", Value::Int(99)).unwrap();
        assert!(p.do_(None).unwrap().ends_with("x=99"));

        p.user[1].set("x", Value::Int(42)).unwrap();
        assert!(p.do_(None).unwrap().ends_with("x=42"));
    }

    #[test]
    fn negative_index_reorder() {
        let p = Pipescript::new().pipe_script(stage("a", "a")).pipe_script(stage("b", "b"));
        let reordered = p.reorder(&[-1, 0]).unwrap();
        assert_eq!(reordered.do_(None).unwrap(), "b\na");
    }

    #[test]
    fn rename_updates_stage_name() {
        let mut p = Pipescript::new().pipe_script(stage("old", "x"));
        p.rename("old", "fresh").unwrap();
        assert_eq!(p.scripts[0].name, "fresh");
    }
}
