//! Directive sweep.
//!
//! Folds a unit's raw `{$...}` comments, in source order, into a
//! [`DirectiveTable`]. Each switch change becomes one immutable snapshot that
//! starts at the directive's position.
//!
//! The state at a node is looked up by the node's anchor. Index expressions
//! are anchored at their opening bracket, so a switch toggled between `[` and
//! the index operand does not affect that index.

use tracing::trace;

use delphi_core::{DirectiveSnapshot, DirectiveTable, DirectiveValue, Name};
use delphi_parser::RawDirective;

/// Conditional compilation and file directives that carry no switch state.
const IGNORED: &[&str] = &[
    "IFDEF", "IFNDEF", "IF", "ELSE", "ELSEIF", "ENDIF", "IFEND", "DEFINE", "UNDEF", "I",
    "INCLUDE", "L", "LINK", "MESSAGE", "REGION", "ENDREGION", "LIBPREFIX", "LIBSUFFIX",
];

/// Long name of a switch written in its one-letter form.
pub fn canonical_name(name: &str) -> String {
    let upper = name.trim().to_ascii_uppercase();
    match upper.as_str() {
        "R" => "RANGECHECKS".to_string(),
        "Q" => "OVERFLOWCHECKS".to_string(),
        "B" => "BOOLEVAL".to_string(),
        "T" => "TYPEDADDRESS".to_string(),
        "H" => "LONGSTRINGS".to_string(),
        "X" => "EXTENDEDSYNTAX".to_string(),
        "O" => "OPTIMIZATION".to_string(),
        "W" => "STACKFRAMES".to_string(),
        "J" => "WRITEABLECONST".to_string(),
        "M" => "TYPEINFO".to_string(),
        _ => upper,
    }
}

/// Key of a `{$WARN <id> ...}` switch.
pub fn warn_key(id: &str) -> String {
    format!("WARN {}", id.trim().to_ascii_uppercase())
}

/// Build the directive table of one unit.
pub fn sweep(raw: &[RawDirective], initial: &DirectiveSnapshot) -> DirectiveTable {
    let mut table = DirectiveTable::new(initial.clone());
    for directive in raw {
        for (name, value) in switches(directive) {
            trace!(directive = %name, value = %value, line = directive.span.line, "directive change");
            table.record(directive.span, Name::new(name), value);
        }
    }
    table
}

/// The switch changes one directive comment makes.
fn switches(directive: &RawDirective) -> Vec<(String, DirectiveValue)> {
    let name = directive.name.as_str();
    if IGNORED.contains(&name) {
        return Vec::new();
    }

    if name == "WARN" {
        let mut parts = directive.argument.split_whitespace();
        return match (parts.next(), parts.next()) {
            (Some(id), Some(value)) => vec![(warn_key(id), DirectiveValue::parse(value))],
            _ => Vec::new(),
        };
    }

    // `{$R+}`, `{$R+,Q-}`: one-letter switches joined by commas.
    let argument = directive.argument.as_str();
    if name.len() == 1 && (argument.starts_with('+') || argument.starts_with('-')) {
        let mut out = Vec::new();
        let first = &argument[..1];
        out.push((canonical_name(name), DirectiveValue::parse(first)));
        for item in argument[1..].split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let switch = item
                .strip_suffix('+')
                .map(|letter| (letter, "+"))
                .or_else(|| item.strip_suffix('-').map(|letter| (letter, "-")));
            // Anything else in the list is not a switch.
            if let Some((letter, sign)) = switch
                && !letter.is_empty()
            {
                out.push((canonical_name(letter), DirectiveValue::parse(sign)));
            }
        }
        return out;
    }

    match DirectiveValue::parse(argument) {
        value @ (DirectiveValue::On | DirectiveValue::Off) => vec![(canonical_name(name), value)],
        // `{$R *.res}` and other file or text arguments are not switches.
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delphi_core::Span;

    fn raw(name: &str, argument: &str, line: u32) -> RawDirective {
        RawDirective {
            name: name.to_string(),
            argument: argument.to_string(),
            span: Span::new(line, 1, 10),
        }
    }

    #[test]
    fn zero_based_strings_follow_position() {
        let table = sweep(
            &[raw("ZEROBASEDSTRINGS", "ON", 3), raw("ZEROBASEDSTRINGS", "OFF", 8)],
            &DirectiveSnapshot::new(),
        );
        assert_eq!(table.value_at(Span::new(2, 1, 1), "ZEROBASEDSTRINGS"), None);
        assert_eq!(
            table.value_at(Span::new(5, 1, 1), "ZEROBASEDSTRINGS"),
            Some(&DirectiveValue::On)
        );
        assert_eq!(
            table.value_at(Span::new(9, 1, 1), "ZEROBASEDSTRINGS"),
            Some(&DirectiveValue::Off)
        );
    }

    #[test]
    fn short_switch_lists() {
        let table = sweep(&[raw("R", "+,Q-", 1)], &DirectiveSnapshot::new());
        let state = table.snapshot_at(Span::new(2, 1, 1));
        assert!(state.is_on("RANGECHECKS"));
        assert_eq!(state.get("OVERFLOWCHECKS"), Some(&DirectiveValue::Off));
    }

    #[test]
    fn malformed_switch_items_are_skipped() {
        let table = sweep(&[raw("R", "+,Qé,W-,é", 1)], &DirectiveSnapshot::new());
        let state = table.snapshot_at(Span::new(2, 1, 1));
        assert!(state.is_on("RANGECHECKS"));
        assert_eq!(state.get("STACKFRAMES"), Some(&DirectiveValue::Off));
        assert_eq!(state.get("OVERFLOWCHECKS"), None);

        let facts = crate::test_support::resolve_one(
            "unit Switches; interface implementation
             {$R+,Qé}
             var N: Integer;
             end.",
        );
        assert!(facts.unit("Switches").is_some_and(|u| !u.failed));
    }

    #[test]
    fn warn_switches_are_keyed_by_id() {
        let table = sweep(
            &[raw("WARN", "SYMBOL_PLATFORM OFF", 1), raw("WARN", "IMPLICIT_STRING_CAST ERROR", 2)],
            &DirectiveSnapshot::new(),
        );
        let state = table.snapshot_at(Span::new(3, 1, 1));
        assert_eq!(state.get("WARN SYMBOL_PLATFORM"), Some(&DirectiveValue::Off));
        assert_eq!(state.get(&warn_key("implicit_string_cast")), Some(&DirectiveValue::Error));
    }

    #[test]
    fn non_switch_directives_are_ignored() {
        let table = sweep(
            &[raw("R", "*.res", 1), raw("IFDEF", "DEBUG", 2), raw("DEFINE", "X", 3)],
            &DirectiveSnapshot::new(),
        );
        assert!(table.is_empty());
    }

    #[test]
    fn initial_state_is_kept() {
        let initial = DirectiveSnapshot::new().with(Name::new("HINTS"), DirectiveValue::On);
        let table = sweep(&[raw("WARNINGS", "OFF", 4)], &initial);
        let state = table.snapshot_at(Span::new(5, 1, 1));
        assert!(state.is_on("HINTS"));
        assert_eq!(state.get("WARNINGS"), Some(&DirectiveValue::Off));
    }
}
