//! Two-layer variable store.
//!
//! Exported variables live in the process environment so that every child
//! inherits them; everything else stays in the shell-local map. A name is in
//! at most one layer at a time.
use std::collections::HashMap;
use std::env;

use log::debug;

#[derive(Debug, Clone, Default)]
pub struct Variables {
    locals: HashMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local value first, then the environment.
    pub fn get(&self, name: &str) -> Option<String> {
        self.locals
            .get(name)
            .cloned()
            .or_else(|| env::var(name).ok())
    }

    pub fn is_exported(&self, name: &str) -> bool {
        !self.locals.contains_key(name) && env::var_os(name).is_some()
    }

    /// Updates the environment when `name` is exported, the local layer otherwise.
    pub fn set(&mut self, name: &str, value: &str) {
        if self.is_exported(name) {
            env::set_var(name, value);
        } else {
            self.locals.insert(name.to_string(), value.to_string());
        }
    }

    /// Moves `name` into the environment, optionally with a new value.
    pub fn export(&mut self, name: &str, value: Option<&str>) {
        let local = self.locals.remove(name);
        let value = value
            .map(str::to_string)
            .or(local)
            .or_else(|| env::var(name).ok())
            .unwrap_or_default();
        debug!("vars event=export name={}", name);
        env::set_var(name, value);
    }

    /// Moves `name` back into the local layer, keeping its value.
    pub fn unexport(&mut self, name: &str) {
        if let Some(value) = env::var_os(name) {
            env::remove_var(name);
            self.locals
                .insert(name.to_string(), value.to_string_lossy().into_owned());
        }
    }

    /// Removes `name` from both layers.
    pub fn unset(&mut self, name: &str) {
        self.locals.remove(name);
        env::remove_var(name);
    }

    /// Sets several variables, returning what is needed to undo it.
    pub fn push_overrides(&mut self, overrides: &[(String, String)]) -> Vec<(String, Option<String>)> {
        let mut saved = Vec::with_capacity(overrides.len());
        for (name, value) in overrides {
            saved.push((name.clone(), self.get(name)));
            self.set(name, value);
        }
        saved
    }

    pub fn pop_overrides(&mut self, saved: Vec<(String, Option<String>)>) {
        for (name, value) in saved.into_iter().rev() {
            match value {
                Some(value) => self.set(&name, &value),
                None => self.unset(&name),
            }
        }
    }

    /// Full environment for a child, with `overrides` layered on top.
    pub fn child_environment(&self, overrides: &[(String, String)]) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> = env::vars_os()
            .filter_map(|(name, value)| {
                Some((name.into_string().ok()?, value.into_string().ok()?))
            })
            .filter(|(name, _)| !overrides.iter().any(|(key, _)| key == name))
            .collect();
        vars.extend(overrides.iter().cloned());
        vars
    }
}
