//! Name-keyed registry of bindings
//!
//! Bindings live in slots that keep their index for the lifetime of the
//! registry; redefining a name reuses its slot. The index shows up in
//! diagnostics so a failing definition can be located in long scripts.
//!
//! The registry never touches native objects itself. Whenever a binding
//! leaves it (replacement or teardown) the binding is handed back to the
//! caller, which releases the native callable under the runtime lock.

use crate::binding::Binding;
use tracing::debug;

#[derive(Debug)]
pub struct Registry<H> {
    bindings: Vec<Binding<H>>,
}

impl<H> Registry<H> {
    pub fn new() -> Self {
        Registry {
            bindings: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Slot index of `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.bindings.iter().position(|b| b.name == name)
    }

    /// Slot index `name` would occupy if installed now
    pub fn next_index(&self, name: &str) -> usize {
        self.index_of(name).unwrap_or(self.bindings.len())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Binding<H>> {
        self.bindings.iter().find(|b| b.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Binding<H>> {
        self.bindings.iter_mut().find(|b| b.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding<H>> {
        self.bindings.iter()
    }

    /// Install `binding`, returning the one it replaced
    ///
    /// The replaced binding is returned whole so the caller can release its
    /// native callable; nothing of it survives in the registry.
    pub fn install(&mut self, binding: Binding<H>) -> (usize, Option<Binding<H>>) {
        match self.index_of(&binding.name) {
            Some(index) => {
                debug!(name = %binding.name, index, "replacing binding");
                let old = std::mem::replace(&mut self.bindings[index], binding);
                (index, Some(old))
            }
            None => {
                let index = self.bindings.len();
                debug!(name = %binding.name, index, "installing binding");
                self.bindings.push(binding);
                (index, None)
            }
        }
    }

    /// Remove every binding, handing them back for release
    pub fn drain(&mut self) -> Vec<Binding<H>> {
        std::mem::take(&mut self.bindings)
    }

    /// The binding producing host variable `variable`, if `name` declares it
    ///
    /// With `numeric` set, bindings with string outputs never match.
    pub fn matching_output(&self, name: &str, variable: &str, numeric: bool) -> Option<&Binding<H>> {
        self.get(name).filter(|b| b.produces(variable, numeric))
    }
}

impl<H> Default for Registry<H> {
    fn default() -> Self {
        Self::new()
    }
}
