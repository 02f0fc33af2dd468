//! Script fragments and their operator algebra.
//!
//! A [`Script`] is the `DEFINITIONS` + `USER` + `TEMPLATE` triple: `do()` merges the two
//! Evaluators (`USER` wins), evaluates the merge, and substitutes the result into
//! `TEMPLATE`'s `${…}` placeholders. Composition (`+`, `&`, `*`, `|`, `+=`) builds new
//! fragments out of old ones without touching `do()` itself — composition is lazy, `do()`
//! (and the eager `&` operator) is where evaluation actually happens.

use crate::param::{render_template, Param};
use crate::pipescript::Pipescript;
use std::fmt;
use std::ops::{Add, AddAssign, BitAnd, BitOr, Mul};
use std::path::Path;
use thiserror::Error;

/// Errors raised while rendering or persisting a [`Script`].
#[derive(Debug, Error)]
pub enum ScriptError {
    /// `DEFINITIONS ⊕ USER` failed to evaluate in `debug` mode, or a template line itself
    /// failed to render.
    #[error("error rendering script '{0}': {1}")]
    Render(String, String),
    /// Persisting the rendered text to disk failed.
    #[error("I/O error writing '{0}': {1}")]
    Io(String, std::io::Error),
}

impl From<ScriptError> for crate::error::Error {
    fn from(e: ScriptError) -> Self {
        Self::General(e.to_string())
    }
}

/// A typed LAMMPS script fragment.
#[derive(Debug, Clone)]
pub struct Script {
    /// Identifies the fragment in logs and in a pipescript's `rename`.
    pub name: String,
    /// Free-text section tag (e.g. `"init"`, `"integrate"`, `"dump"`), carried through
    /// composition for the caller's own bookkeeping; this engine never branches on it.
    pub section: String,
    /// Sort key used when several fragments are composed out of declaration order.
    pub position: i64,
    /// Default values for the template's placeholders.
    pub definitions: Param,
    /// Overrides; always wins over `definitions` within this fragment.
    pub user: Param,
    /// Template lines, each scanned independently for `${…}` placeholders and joined with
    /// `\n` on render.
    pub template: Vec<String>,
}

impl Script {
    /// Builds an empty fragment named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            section: String::new(),
            position: 0,
            definitions: Param::new(),
            user: Param::new(),
            template: Vec::new(),
        }
    }

    /// Appends a template line.
    #[must_use]
    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.template.push(line.into());
        self
    }

    /// Sets the section tag.
    #[must_use]
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = section.into();
        self
    }

    /// Sets the composition sort key.
    #[must_use]
    pub fn with_position(mut self, position: i64) -> Self {
        self.position = position;
        self
    }

    /// Renders `DEFINITIONS ⊕ USER` against `TEMPLATE`.
    ///
    /// `printflag` is a verbose-echo switch: when set, the rendered text is also emitted
    /// through `log::info!` as it is produced.
    pub fn do_(&self, printflag: bool) -> Result<String, ScriptError> {
        let mut rendered = String::new();
        for (i, line) in self.template.iter().enumerate() {
            if i > 0 {
                rendered.push('\n');
            }
            let text = render_template(line, &self.definitions, &self.user)
                .map_err(|e| ScriptError::Render(self.name.clone(), e.to_string()))?;
            rendered.push_str(&text);
        }
        if printflag {
            log::info!("{}", rendered);
        }
        Ok(rendered)
    }

    /// Renders and persists to `path`, prefixed with a header comment.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), ScriptError> {
        let path = path.as_ref();
        let body = self.do_(false)?;
        let text = format!("{}\n{body}\n", header_comment(&self.name));
        std::fs::write(path, text).map_err(|e| ScriptError::Io(path.display().to_string(), e))
    }

    /// `A ** n`: repeats this fragment `n` times with independently-scoped
    /// `USER` overrides per copy. A flat `Script` has exactly one `USER`, so "independent
    /// scopes" only has observable meaning as a multi-stage pipeline — this returns a
    /// [`Pipescript`] of `n` clones rather than a merged `Script` (a deliberate deviation
    /// from `A * n`'s flat-fragment result, recorded in `DESIGN.md`).
    #[must_use]
    pub fn repeat_scoped(&self, n: u32) -> Pipescript {
        let mut p = Pipescript::new();
        for _ in 0..n {
            p = p.pipe_script(self.clone());
        }
        p
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.do_(false) {
            Ok(text) => f.write_str(&text),
            Err(e) => write!(f, "<Error: {e}>"),
        }
    }
}

fn header_comment(name: &str) -> String {
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let user = whoami::username();
    let host = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());
    format!(
        "# {name} — generated by pizza3 {} on {now} by {user}@{host}",
        env!("CARGO_PKG_VERSION")
    )
}

/// `A + B`: deferred concatenation. `TEMPLATE` is `A`'s lines then `B`'s;
/// `DEFINITIONS`/`USER` merge left-to-right, right-wins.
impl Add for Script {
    type Output = Script;
    fn add(self, rhs: Script) -> Script {
        let mut definitions = self.definitions.clone();
        definitions.update(&rhs.definitions);
        let mut user = self.user.clone();
        user.update(&rhs.user);
        let mut template = self.template;
        template.extend(rhs.template);
        Script {
            name: format!("{}+{}", self.name, rhs.name),
            section: self.section,
            position: self.position,
            definitions,
            user,
            template,
        }
    }
}

/// `A += B`: in-place lazy concat, same semantics as [`Add`].
impl AddAssign for Script {
    fn add_assign(&mut self, rhs: Script) {
        self.definitions.update(&rhs.definitions);
        self.user.update(&rhs.user);
        self.template.extend(rhs.template);
        self.name = format!("{}+{}", self.name, rhs.name);
    }
}

/// `A & B`: immediate concatenation — both sides are rendered right away
/// (via `do_`) and the result is wrapped as a new, template-only fragment carrying literal
/// text instead of the original placeholders.
impl BitAnd for Script {
    type Output = Script;
    fn bitand(self, rhs: Script) -> Script {
        let a = self.do_(false).unwrap_or_else(|e| format!("<Error: {e}>"));
        let b = rhs.do_(false).unwrap_or_else(|e| format!("<Error: {e}>"));
        Script::new(format!("{}&{}", self.name, rhs.name)).with_line(format!("{a}\n{b}"))
    }
}

/// `A * n`: repeats the fragment's template `n` times, sharing one
/// `DEFINITIONS`/`USER` scope (contrast [`Script::repeat_scoped`] for `A ** n`).
impl Mul<u32> for Script {
    type Output = Script;
    fn mul(self, n: u32) -> Script {
        let mut template = Vec::with_capacity(self.template.len() * n as usize);
        for _ in 0..n {
            template.extend(self.template.iter().cloned());
        }
        Script { template, ..self }
    }
}

/// `A | B`: pipes both fragments into a new [`Pipescript`].
impl BitOr for Script {
    type Output = Pipescript;
    fn bitor(self, rhs: Script) -> Pipescript {
        Pipescript::new().pipe_script(self).pipe_script(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Value;

    #[test]
    fn do_substitutes_definitions_and_user() {
        let mut s = Script::new("units").with_line("units ${style}");
        s.definitions.set("style", Value::Str("si".to_string())).unwrap();
        assert_eq!(s.do_(false).unwrap(), "units si");
    }

    #[test]
    fn user_wins_over_definitions() {
        let mut s = Script::new("units").with_line("units ${style}");
        s.definitions.set("style", Value::Str("si".to_string())).unwrap();
        s.user.set("style", Value::Str("lj".to_string())).unwrap();
        assert_eq!(s.do_(false).unwrap(), "units lj");
    }

    #[test]
    fn add_concatenates_templates_and_merges_right_wins() {
        let mut a = Script::new("a").with_line("first ${x}");
        a.definitions.set("x", Value::Int(1)).unwrap();
        let mut b = Script::new("b").with_line("second ${x}");
        b.definitions.set("x", Value::Int(2)).unwrap();
        let c = a + b;
        assert_eq!(c.do_(false).unwrap(), "first 2\nsecond 2");
    }

    #[test]
    fn mul_repeats_template_sharing_scope() {
        let mut a = Script::new("a").with_line("echo ${x}");
        a.definitions.set("x", Value::Int(7)).unwrap();
        let c = a * 3;
        assert_eq!(c.do_(false).unwrap(), "echo 7\necho 7\necho 7");
    }

    #[test]
    fn bitand_renders_eagerly_before_combining() {
        let mut a = Script::new("a").with_line("x=${v}");
        a.definitions.set("v", Value::Int(1)).unwrap();
        let combined = a.clone() & a;
        // Both operands captured the same definitions at call time.
        assert_eq!(combined.do_(false).unwrap(), "x=1\nx=1");
    }

    #[test]
    fn pipe_operator_builds_a_two_stage_pipescript() {
        let a = Script::new("a").with_line("a");
        let b = Script::new("b").with_line("b");
        let p = a | b;
        assert_eq!(p.len(), 2);
    }
}
