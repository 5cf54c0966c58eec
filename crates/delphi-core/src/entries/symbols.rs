//! Ordered, case-insensitive name tables.
//!
//! A [`SymbolTable`] maps a [`Name`] to a group of declarations. Groups hold
//! more than one entry only for overloaded routines. Iteration follows
//! insertion order so that everything derived from a table is deterministic.

use rustc_hash::FxHashMap;

use crate::{DeclRef, Name};

/// One named group of declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolGroup {
    /// Spelling of the first declaration.
    pub name: Name,
    /// Declarations in declaration order.
    pub decls: Vec<DeclRef>,
    /// Whether the group is an overload group (every member is a routine).
    pub routines: bool,
}

/// Rejected declaration: the name is taken by a non-overloadable entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameTaken {
    /// The declaration already holding the name.
    pub existing: DeclRef,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    index: FxHashMap<Name, usize>,
    groups: Vec<SymbolGroup>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a name.
    ///
    /// A routine joins an existing routine group; anything else colliding with
    /// an existing name is rejected.
    pub fn declare(&mut self, name: &Name, decl: DeclRef, is_routine: bool) -> Result<(), NameTaken> {
        match self.index.get(name) {
            Some(&slot) => {
                let group = &mut self.groups[slot];
                if group.routines && is_routine {
                    group.decls.push(decl);
                    Ok(())
                } else {
                    Err(NameTaken {
                        existing: group.decls[0],
                    })
                }
            }
            None => {
                self.index.insert(name.clone(), self.groups.len());
                self.groups.push(SymbolGroup {
                    name: name.clone(),
                    decls: vec![decl],
                    routines: is_routine,
                });
                Ok(())
            }
        }
    }

    /// Replace a whole group, keeping its position when the name already exists.
    ///
    /// Used when overlaying a descendant's members on an ancestor table.
    pub fn overlay(&mut self, name: &Name, decls: Vec<DeclRef>, routines: bool) {
        match self.index.get(name) {
            Some(&slot) => {
                let group = &mut self.groups[slot];
                group.decls = decls;
                group.routines = routines;
            }
            None => {
                self.index.insert(name.clone(), self.groups.len());
                self.groups.push(SymbolGroup {
                    name: name.clone(),
                    decls,
                    routines,
                });
            }
        }
    }

    /// Look up a group by name.
    pub fn get(&self, name: &Name) -> Option<&SymbolGroup> {
        self.index.get(name).map(|&slot| &self.groups[slot])
    }

    /// Look up the declarations under a raw name.
    pub fn lookup(&self, name: &str) -> Option<&[DeclRef]> {
        self.get(&Name::new(name)).map(|g| g.decls.as_slice())
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.index.contains_key(name)
    }

    /// Iterate groups in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SymbolGroup> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeclId, UnitId};

    fn d(i: u32) -> DeclRef {
        DeclRef::new(UnitId::new(1), DeclId::new(i))
    }

    #[test]
    fn routines_form_overload_groups() {
        let mut table = SymbolTable::new();
        let name = Name::new("IntPower");
        table.declare(&name, d(0), true).unwrap();
        table.declare(&Name::new("INTPOWER"), d(1), true).unwrap();
        assert_eq!(table.lookup("intpower"), Some(&[d(0), d(1)][..]));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn non_routine_duplicate_is_rejected() {
        let mut table = SymbolTable::new();
        table.declare(&Name::new("X"), d(0), false).unwrap();
        let err = table.declare(&Name::new("x"), d(1), false).unwrap_err();
        assert_eq!(err.existing, d(0));

        table.declare(&Name::new("Foo"), d(2), true).unwrap();
        assert!(table.declare(&Name::new("Foo"), d(3), false).is_err());
    }

    #[test]
    fn overlay_keeps_position() {
        let mut table = SymbolTable::new();
        table.declare(&Name::new("A"), d(0), false).unwrap();
        table.declare(&Name::new("B"), d(1), false).unwrap();
        table.overlay(&Name::new("a"), vec![d(5)], false);
        table.overlay(&Name::new("C"), vec![d(6)], true);

        let names: Vec<_> = table.iter().map(|g| g.name.as_str().to_string()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(table.lookup("A"), Some(&[d(5)][..]));
    }
}
