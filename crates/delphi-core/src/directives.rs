//! Compiler directive state.
//!
//! A unit's `{$NAME value}` switches are swept left to right once, producing a
//! [`DirectiveTable`]: an ordered list of immutable [`DirectiveSnapshot`]s, one
//! per change. The state at a node is the snapshot of the last change that
//! starts at or before the node's anchor position.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::{Name, Span};

/// Value of a directive switch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DirectiveValue {
    On,
    Off,
    /// `{$WARN X ERROR}`.
    Error,
    /// `{$WARN X DEFAULT}`.
    Default,
    /// Any other argument, kept verbatim.
    Text(String),
}

impl DirectiveValue {
    /// Parse a switch argument (`ON`, `OFF`, `+`, `-`, `ERROR`, `DEFAULT`).
    pub fn parse(arg: &str) -> Self {
        match arg.trim().to_ascii_uppercase().as_str() {
            "ON" | "+" => DirectiveValue::On,
            "OFF" | "-" => DirectiveValue::Off,
            "ERROR" => DirectiveValue::Error,
            "DEFAULT" => DirectiveValue::Default,
            _ => DirectiveValue::Text(arg.trim().to_string()),
        }
    }

    pub fn is_on(&self) -> bool {
        matches!(self, DirectiveValue::On)
    }
}

impl fmt::Display for DirectiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveValue::On => f.write_str("ON"),
            DirectiveValue::Off => f.write_str("OFF"),
            DirectiveValue::Error => f.write_str("ERROR"),
            DirectiveValue::Default => f.write_str("DEFAULT"),
            DirectiveValue::Text(t) => f.write_str(t),
        }
    }
}

/// Directive values in effect at one point of a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveSnapshot {
    values: BTreeMap<Name, DirectiveValue>,
}

impl DirectiveSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of this snapshot with one switch changed.
    pub fn with(&self, name: Name, value: DirectiveValue) -> Self {
        let mut values = self.values.clone();
        values.insert(name, value);
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&DirectiveValue> {
        self.values.get(&Name::new(name))
    }

    /// Whether the switch is set and `ON`.
    pub fn is_on(&self, name: &str) -> bool {
        self.get(name).is_some_and(DirectiveValue::is_on)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &DirectiveValue)> {
        self.values.iter()
    }
}

/// Ordered directive changes of one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectiveTable {
    initial: Arc<DirectiveSnapshot>,
    changes: Vec<(Span, Arc<DirectiveSnapshot>)>,
}

impl DirectiveTable {
    /// Start a table from the state in effect before the first token.
    pub fn new(initial: DirectiveSnapshot) -> Self {
        Self {
            initial: Arc::new(initial),
            changes: Vec::new(),
        }
    }

    /// Record a change at `at`.
    ///
    /// Changes are expected in source order; an out-of-order change is placed
    /// at its sorted position and later snapshots are not rewritten.
    pub fn record(&mut self, at: Span, name: Name, value: DirectiveValue) {
        let index = self.index_at(at);
        let previous = self.snapshot_for_index(index);
        let next = Arc::new(previous.with(name, value));
        self.changes.insert(index, (at, next));
    }

    fn index_at(&self, pos: Span) -> usize {
        self.changes
            .partition_point(|(at, _)| at.starts_before_or_at(&pos))
    }

    fn snapshot_for_index(&self, index: usize) -> &DirectiveSnapshot {
        match index {
            0 => &self.initial,
            i => &self.changes[i - 1].1,
        }
    }

    /// Snapshot in effect at a source position.
    pub fn snapshot_at(&self, pos: Span) -> &DirectiveSnapshot {
        self.snapshot_for_index(self.index_at(pos))
    }

    /// Value of one switch at a source position.
    pub fn value_at(&self, pos: Span, name: &str) -> Option<&DirectiveValue> {
        self.snapshot_at(pos).get(name)
    }

    /// Number of recorded changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_values() {
        assert_eq!(DirectiveValue::parse("on"), DirectiveValue::On);
        assert_eq!(DirectiveValue::parse("-"), DirectiveValue::Off);
        assert_eq!(DirectiveValue::parse(" Error "), DirectiveValue::Error);
        assert_eq!(
            DirectiveValue::parse("'x.res'"),
            DirectiveValue::Text("'x.res'".into())
        );
    }

    #[test]
    fn state_follows_position() {
        let mut initial = DirectiveSnapshot::new();
        initial = initial.with(Name::new("HINTS"), DirectiveValue::On);
        let mut table = DirectiveTable::new(initial);
        table.record(
            Span::new(5, 1, 24),
            Name::new("ZEROBASEDSTRINGS"),
            DirectiveValue::On,
        );
        table.record(
            Span::new(9, 3, 25),
            Name::new("ZEROBASEDSTRINGS"),
            DirectiveValue::Off,
        );

        assert_eq!(table.value_at(Span::new(2, 1, 1), "ZEROBASEDSTRINGS"), None);
        assert!(table.snapshot_at(Span::new(2, 1, 1)).is_on("hints"));
        assert_eq!(
            table.value_at(Span::new(7, 4, 1), "zerobasedstrings"),
            Some(&DirectiveValue::On)
        );
        assert_eq!(
            table.value_at(Span::new(9, 30, 1), "ZEROBASEDSTRINGS"),
            Some(&DirectiveValue::Off)
        );
        // Earlier switches survive later unrelated changes.
        assert!(table.snapshot_at(Span::new(10, 1, 1)).is_on("HINTS"));
    }

    #[test]
    fn same_line_changes() {
        let mut table = DirectiveTable::default();
        table.record(Span::new(3, 10, 6), Name::new("R"), DirectiveValue::On);
        assert_eq!(table.value_at(Span::new(3, 5, 1), "R"), None);
        assert_eq!(table.value_at(Span::new(3, 17, 1), "R"), Some(&DirectiveValue::On));
        assert_eq!(table.len(), 1);
    }
}
