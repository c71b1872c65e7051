// cvar.rs — dynamic variable tracking
// Converted from: qcommon/cvar.c

use std::collections::HashMap;

use crate::common::com_dprintf;

pub const CVAR_ARCHIVE: i32 = 1; // set to cause it to be saved to vars.rc
pub const CVAR_NOSET: i32 = 8; // don't allow change from console at all
pub const CVAR_LATCH: i32 = 16; // save changes until server restart

/// A console variable.
#[derive(Clone, Debug)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub flags: i32,
    pub modified: bool,
    pub value: f32,
}

fn parse_value(s: &str) -> f32 {
    s.trim().parse::<f32>().unwrap_or(0.0)
}

/// The cvar table. Lookups are by name through an index map.
#[derive(Default)]
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    cvar_index: HashMap<String, usize>,
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    fn find_var_mut(&mut self, name: &str) -> Option<&mut Cvar> {
        match self.cvar_index.get(name) {
            Some(&idx) => Some(&mut self.cvar_vars[idx]),
            None => None,
        }
    }

    /// Get the floating-point value of a cvar. Returns 0 if not found.
    pub fn variable_value(&self, name: &str) -> f32 {
        match self.find_var(name) {
            Some(var) => var.value,
            None => 0.0,
        }
    }

    /// Get the string value of a cvar. Returns "" if not found.
    pub fn variable_string(&self, name: &str) -> &str {
        match self.find_var(name) {
            Some(var) => &var.string,
            None => "",
        }
    }

    /// Get or create a cvar. If it already exists, the value is not changed
    /// but flags are OR'd in.
    pub fn get(&mut self, name: &str, value: &str, flags: i32) -> &Cvar {
        let idx = match self.cvar_index.get(name) {
            Some(&idx) => {
                self.cvar_vars[idx].flags |= flags;
                idx
            }
            None => {
                let idx = self.cvar_vars.len();
                self.cvar_vars.push(Cvar {
                    name: name.to_string(),
                    string: value.to_string(),
                    flags,
                    modified: true,
                    value: parse_value(value),
                });
                self.cvar_index.insert(name.to_string(), idx);
                idx
            }
        };
        &self.cvar_vars[idx]
    }

    /// Set a cvar, creating it if needed. Write-protected cvars are left alone.
    pub fn set(&mut self, name: &str, value: &str) {
        let var = match self.find_var_mut(name) {
            Some(var) => var,
            None => {
                self.get(name, value, 0);
                return;
            }
        };

        if var.flags & CVAR_NOSET != 0 {
            com_dprintf(&format!("{} is write protected.\n", name));
            return;
        }
        if var.string == value {
            return;
        }

        var.modified = true;
        var.string = value.to_string();
        var.value = parse_value(value);
    }

    pub fn set_value(&mut self, name: &str, value: f32) {
        let s = if value == (value as i32) as f32 {
            format!("{}", value as i32)
        } else {
            format!("{}", value)
        };
        self.set(name, &s);
    }
}
