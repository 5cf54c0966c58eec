//! Inheritance queries over completed classes and interfaces.
//!
//! - [`dispatch_target`]: the method a virtual call runs for a receiver class
//! - [`inherited_target`]: the ancestor method a bare `inherited` reaches
//! - [`implements_interface_method`]: the class method backing an interface method
//!
//! Overrides are tied during type completion, so these queries only walk
//! the `overrides` links and the effective member tables.

use delphi_core::{DeclRef, Name, TypeRef};

use crate::conversion::signatures_match;
use crate::types::{MAX_CHAIN, class_ancestors, kind_of, lookup_member, member_table, representation};
use crate::view::ProgramView;

/// Whether `decl` overrides `method`, directly or through intermediate overrides.
pub fn overrides(view: &dyn ProgramView, decl: DeclRef, method: DeclRef) -> bool {
    let mut current = decl;
    for _ in 0..MAX_CHAIN {
        let Some(next) = view.decl(current).and_then(|d| d.as_routine()).and_then(|r| r.overrides) else {
            return false;
        };
        if next == method {
            return true;
        }
        current = next;
    }
    false
}

/// The implementation a call of `method` runs on an instance of `receiver`.
///
/// Statically bound methods run themselves. For virtual and dynamic methods
/// the nearest class, starting at `receiver`, that declares an override of
/// `method` wins. A `reintroduce`d method starts a new chain, so overrides
/// of it are not overrides of `method`. Interface methods resolve to the
/// class method implementing them.
pub fn dispatch_target(view: &dyn ProgramView, receiver: TypeRef, method: DeclRef) -> Option<DeclRef> {
    let declaration = view.decl(method)?;
    let routine = declaration.as_routine()?;
    let receiver = representation(view, receiver);

    if let Some(owner) = declaration.owner
        && kind_of(view, owner).as_interface().is_some()
    {
        let target = implements_interface_method(view, receiver, method)?;
        return dispatch_target(view, receiver, target);
    }
    if !routine.flags.is_dispatched() {
        return Some(method);
    }

    let key = Name::new(declaration.name.as_str());
    let chain = std::iter::once(receiver).chain(class_ancestors(view, receiver));
    for class in chain {
        let Some(members) = kind_of(view, class).as_class().map(|c| c.members) else {
            continue;
        };
        let Some(group) = view.scope(class.unit, members).and_then(|s| s.symbols.get(&key)) else {
            continue;
        };
        if let Some(&found) = group
            .decls
            .iter()
            .find(|&&d| d == method || overrides(view, d, method))
        {
            return Some(found);
        }
    }
    None
}

/// The ancestor method a bare `inherited` inside `method` calls.
///
/// The ancestor's method of the same name and signature is preferred; a
/// lone method of that name is taken whatever its signature.
pub fn inherited_target(view: &dyn ProgramView, method: DeclRef) -> Option<DeclRef> {
    let declaration = view.decl(method)?;
    let signature = &declaration.as_routine()?.signature;
    let ancestor = kind_of(view, declaration.owner?).as_class()?.ancestor?;
    let group = lookup_member(view, ancestor, declaration.name.as_str()).filter(|g| g.routines)?;

    let same = group.decls.iter().copied().find(|&d| {
        view.decl(d)
            .and_then(|d| d.as_routine())
            .is_some_and(|r| signatures_match(view, &r.signature, signature))
    });
    match (same, group.decls.as_slice()) {
        (Some(decl), _) => Some(decl),
        (None, [only]) => Some(*only),
        _ => None,
    }
}

/// The method of `class`, own or inherited, implementing interface method `method`.
///
/// Matching is by name and signature.
pub fn implements_interface_method(view: &dyn ProgramView, class: TypeRef, method: DeclRef) -> Option<DeclRef> {
    let wanted = view.decl(method)?;
    let signature = &wanted.as_routine()?.signature;
    let group = member_table(view, class)?.get(&Name::new(wanted.name.as_str()))?;
    group.decls.iter().copied().find(|&d| {
        d != method
            && view
                .decl(d)
                .and_then(|d| d.as_routine())
                .is_some_and(|r| signatures_match(view, &r.signature, signature))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{decl_named, errors_of, resolve_one, type_named};

    const SHAPES: &str = "unit Zoo; interface
         type
           IAnimal = interface
             function Sound: string;
           end;
           TAnimal = class(TInterfacedObject, IAnimal)
             function Sound: string; virtual;
             procedure Feed;
           end;
           TDog = class(TAnimal)
             function Sound: string; override;
           end;
           TPuppy = class(TDog)
           end;
           TRobot = class(TDog)
             function Sound: string; reintroduce; virtual;
           end;
         implementation
         function TAnimal.Sound: string; begin Result := ''; end;
         procedure TAnimal.Feed; begin end;
         function TDog.Sound: string; begin Result := inherited Sound; end;
         function TRobot.Sound: string; begin Result := 'beep'; end;
         end.";

    #[test]
    fn virtual_calls_dispatch_to_the_nearest_override() {
        let facts = resolve_one(SHAPES);
        assert!(errors_of(&facts, "Zoo").is_empty(), "{:?}", errors_of(&facts, "Zoo"));
        let base = decl_named(&facts, "Zoo.TAnimal.Sound");
        let dog = decl_named(&facts, "Zoo.TDog.Sound");

        assert_eq!(dispatch_target(&facts, type_named(&facts, "Zoo.TAnimal"), base), Some(base));
        assert_eq!(dispatch_target(&facts, type_named(&facts, "Zoo.TDog"), base), Some(dog));
        assert_eq!(dispatch_target(&facts, type_named(&facts, "Zoo.TPuppy"), base), Some(dog));
        // The reintroduced method opens a new chain.
        assert_eq!(dispatch_target(&facts, type_named(&facts, "Zoo.TRobot"), base), Some(dog));

        let feed = decl_named(&facts, "Zoo.TAnimal.Feed");
        assert_eq!(dispatch_target(&facts, type_named(&facts, "Zoo.TDog"), feed), Some(feed));
    }

    #[test]
    fn interface_methods_dispatch_through_their_implementation() {
        let facts = resolve_one(SHAPES);
        let sound = decl_named(&facts, "Zoo.IAnimal.Sound");
        let animal = type_named(&facts, "Zoo.TAnimal");
        assert_eq!(
            implements_interface_method(&facts, animal, sound),
            Some(decl_named(&facts, "Zoo.TAnimal.Sound"))
        );
        assert_eq!(
            dispatch_target(&facts, type_named(&facts, "Zoo.TDog"), sound),
            Some(decl_named(&facts, "Zoo.TDog.Sound"))
        );
    }

    #[test]
    fn inherited_reaches_the_ancestor() {
        let facts = resolve_one(SHAPES);
        let dog = decl_named(&facts, "Zoo.TDog.Sound");
        assert_eq!(inherited_target(&facts, dog), Some(decl_named(&facts, "Zoo.TAnimal.Sound")));
        assert!(overrides(&facts, dog, decl_named(&facts, "Zoo.TAnimal.Sound")));
        let robot = decl_named(&facts, "Zoo.TRobot.Sound");
        assert!(!overrides(&facts, robot, decl_named(&facts, "Zoo.TAnimal.Sound")));
    }
}
