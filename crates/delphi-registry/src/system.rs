//! The built-in `System` unit.
//!
//! `System` is registered as unit 0 and implicitly imported last by every
//! unit. Its type arena has a fixed layout so the type system can name the
//! primitives through the [`known`] constants without a lookup.

use tracing::trace;

use delphi_core::{
    Accessor, AliasType, ArrayShape, ArrayType, CharKind, ClassType, ConstValue, Constant, DeclKind, DeclRef,
    Declaration, Field, IntegerKind, InterfaceType, Intrinsic, Param, ParamFlags, Property,
    QualifiedName, RealKind, RecordType, Routine, RoutineFlags, RoutineKind, ScopeId, ScopeKind,
    Signature, StringKind, SubrangeType, SymbolTable, TypeEntry, TypeKind, TypeRef, UnitId,
    Visibility,
};

use crate::unit::{Unit, UnitBuilder, UnitOrigin, UnitStage};

/// Fixed type handles of the `System` unit.
pub mod known {
    use delphi_core::{CharKind, IntegerKind, RealKind, StringKind, TypeRef};

    pub const UNRESOLVED: TypeRef = TypeRef::system(0);
    pub const NIL: TypeRef = TypeRef::system(1);
    pub const UNTYPED: TypeRef = TypeRef::system(2);

    pub const SHORTINT: TypeRef = TypeRef::system(3);
    pub const SMALLINT: TypeRef = TypeRef::system(4);
    pub const INTEGER: TypeRef = TypeRef::system(5);
    pub const INT64: TypeRef = TypeRef::system(6);
    pub const BYTE: TypeRef = TypeRef::system(7);
    pub const WORD: TypeRef = TypeRef::system(8);
    pub const CARDINAL: TypeRef = TypeRef::system(9);
    pub const UINT64: TypeRef = TypeRef::system(10);
    pub const NATIVEINT: TypeRef = TypeRef::system(11);
    pub const NATIVEUINT: TypeRef = TypeRef::system(12);

    pub const SINGLE: TypeRef = TypeRef::system(13);
    pub const DOUBLE: TypeRef = TypeRef::system(14);
    pub const EXTENDED: TypeRef = TypeRef::system(15);
    pub const CURRENCY: TypeRef = TypeRef::system(16);
    pub const COMP: TypeRef = TypeRef::system(17);

    pub const BOOLEAN: TypeRef = TypeRef::system(18);
    pub const ANSICHAR: TypeRef = TypeRef::system(19);
    pub const CHAR: TypeRef = TypeRef::system(20);

    pub const SHORTSTRING: TypeRef = TypeRef::system(21);
    pub const ANSISTRING: TypeRef = TypeRef::system(22);
    pub const WIDESTRING: TypeRef = TypeRef::system(23);
    pub const UNICODESTRING: TypeRef = TypeRef::system(24);

    pub const POINTER: TypeRef = TypeRef::system(25);
    pub const PCHAR: TypeRef = TypeRef::system(26);
    pub const PANSICHAR: TypeRef = TypeRef::system(27);

    pub const TOBJECT: TypeRef = TypeRef::system(28);
    pub const TCLASS: TypeRef = TypeRef::system(29);
    pub const IINTERFACE: TypeRef = TypeRef::system(30);
    pub const TINTERFACEDOBJECT: TypeRef = TypeRef::system(31);
    pub const TGUID: TypeRef = TypeRef::system(32);

    /// The `System` type of an integer kind.
    pub fn integer(kind: IntegerKind) -> TypeRef {
        match kind {
            IntegerKind::ShortInt => SHORTINT,
            IntegerKind::SmallInt => SMALLINT,
            IntegerKind::Integer => INTEGER,
            IntegerKind::Int64 => INT64,
            IntegerKind::Byte => BYTE,
            IntegerKind::Word => WORD,
            IntegerKind::Cardinal => CARDINAL,
            IntegerKind::UInt64 => UINT64,
            IntegerKind::NativeInt => NATIVEINT,
            IntegerKind::NativeUInt => NATIVEUINT,
        }
    }

    pub fn real(kind: RealKind) -> TypeRef {
        match kind {
            RealKind::Single => SINGLE,
            RealKind::Double => DOUBLE,
            RealKind::Extended => EXTENDED,
            RealKind::Currency => CURRENCY,
            RealKind::Comp => COMP,
        }
    }

    pub fn char(kind: CharKind) -> TypeRef {
        match kind {
            CharKind::Ansi => ANSICHAR,
            CharKind::Wide => CHAR,
        }
    }

    /// The `System` type of a string kind without a length bound.
    pub fn string(kind: StringKind) -> TypeRef {
        match kind {
            StringKind::Short => SHORTSTRING,
            StringKind::Ansi => ANSISTRING,
            StringKind::Wide => WIDESTRING,
            StringKind::Unicode => UNICODESTRING,
        }
    }
}

const SYSTEM: UnitId = UnitId::SYSTEM;
const IINTERFACE_GUID: &str = "{00000000-0000-0000-C000-000000000046}";

// ============================================================================
// Builder
// ============================================================================

struct SystemBuilder {
    builder: UnitBuilder,
}

impl SystemBuilder {
    fn qualified(path: &[&str]) -> QualifiedName {
        let mut name = QualifiedName::global("System");
        for segment in path {
            name = name.child(*segment);
        }
        name
    }

    /// Declare in the interface scope. `System` names are unique, so a
    /// collision can only come from an overload group, which joins.
    fn declare(&mut self, scope: ScopeId, decl: Declaration) -> DeclRef {
        match self.builder.add_and_declare(scope, decl) {
            Ok(decl) => decl,
            Err((decl, _)) => decl,
        }
    }

    /// Add an entry that is not nameable from source.
    fn hidden(&mut self, name: &str, kind: TypeKind) -> TypeRef {
        self.builder.add_type(TypeEntry::named(name, kind))
    }

    /// Add a named type and its declaration.
    fn named(&mut self, name: &str, kind: TypeKind) -> TypeRef {
        let ty = self.builder.add_type(TypeEntry::named(name, kind));
        let decl_kind = match self.builder.unit().ty(ty.ty).map(|t| &t.kind) {
            Some(TypeKind::Class(_)) => DeclKind::ClassType(ty),
            Some(TypeKind::Interface(_)) => DeclKind::InterfaceType(ty),
            Some(TypeKind::Record(_)) => DeclKind::RecordType(ty),
            _ => DeclKind::TypeAlias(ty),
        };
        let decl = self.declare(
            Unit::INTERFACE_SCOPE,
            Declaration::new(name, Self::qualified(&[name]), decl_kind, SYSTEM, Unit::INTERFACE_SCOPE),
        );
        if let Some(entry) = self.builder.type_mut(ty.ty) {
            entry.decl = Some(decl);
        }
        ty
    }

    fn alias(&mut self, name: &str, target: TypeRef, strong: bool) -> TypeRef {
        self.named(name, TypeKind::Alias(AliasType { target, strong }))
    }

    fn body_scope(&mut self, owner: TypeRef) -> ScopeId {
        self.builder
            .add_scope(ScopeKind::TypeBody(owner), Some(Unit::INTERFACE_SCOPE))
    }

    fn owner_name(&self, owner: TypeRef) -> String {
        self.builder
            .unit()
            .ty(owner.ty)
            .and_then(|t| t.name.as_ref())
            .map(|n| n.as_str().to_string())
            .unwrap_or_default()
    }

    fn member(
        &mut self,
        owner: TypeRef,
        scope: ScopeId,
        name: &str,
        kind: DeclKind,
        visibility: Visibility,
    ) -> DeclRef {
        let owner_name = self.owner_name(owner);
        let decl = Declaration::new(name, Self::qualified(&[&owner_name, name]), kind, SYSTEM, scope)
            .with_owner(owner)
            .with_visibility(visibility);
        self.declare(scope, decl)
    }

    fn method(
        &mut self,
        owner: TypeRef,
        scope: ScopeId,
        name: &str,
        kind: RoutineKind,
        signature: Signature,
        flags: RoutineFlags,
    ) -> DeclRef {
        let routine = Routine::new(kind, signature).with_flags(flags);
        self.member(owner, scope, name, DeclKind::Routine(routine), Visibility::Public)
    }

    /// Own members overlaid on `base`.
    fn effective(&self, scope: ScopeId, base: Option<&SymbolTable>) -> SymbolTable {
        let mut table = base.cloned().unwrap_or_default();
        if let Some(scope) = self.builder.unit().scope(scope) {
            for group in scope.symbols.iter() {
                table.overlay(&group.name, group.decls.clone(), group.routines);
            }
        }
        table
    }

    fn set_kind(&mut self, ty: TypeRef, kind: TypeKind) {
        if let Some(entry) = self.builder.type_mut(ty.ty) {
            entry.kind = kind;
        }
    }

    fn effective_of(&self, ty: TypeRef) -> Option<SymbolTable> {
        self.builder
            .unit()
            .ty(ty.ty)
            .and_then(|t| t.kind.effective_members())
            .cloned()
    }

    // ========================================================================
    // Sections
    // ========================================================================

    fn primitives(&mut self) {
        self.hidden("Unresolved", TypeKind::Unresolved);
        self.hidden("Nil", TypeKind::Nil);
        self.hidden("Untyped", TypeKind::Untyped);

        for kind in [
            IntegerKind::ShortInt,
            IntegerKind::SmallInt,
            IntegerKind::Integer,
            IntegerKind::Int64,
            IntegerKind::Byte,
            IntegerKind::Word,
            IntegerKind::Cardinal,
            IntegerKind::UInt64,
            IntegerKind::NativeInt,
            IntegerKind::NativeUInt,
        ] {
            self.named(kind.name(), TypeKind::Integer(kind));
        }
        for kind in [
            RealKind::Single,
            RealKind::Double,
            RealKind::Extended,
            RealKind::Currency,
            RealKind::Comp,
        ] {
            self.named(kind.name(), TypeKind::Real(kind));
        }

        self.named("Boolean", TypeKind::Boolean);
        self.named("AnsiChar", TypeKind::Char(CharKind::Ansi));
        self.named("Char", TypeKind::Char(CharKind::Wide));
        for kind in [
            StringKind::Short,
            StringKind::Ansi,
            StringKind::Wide,
            StringKind::Unicode,
        ] {
            self.named(kind.name(), TypeKind::String { kind, max_len: None });
        }

        self.named("Pointer", TypeKind::Pointer(None));
        self.named("PChar", TypeKind::Pointer(Some(known::CHAR)));
        self.named("PAnsiChar", TypeKind::Pointer(Some(known::ANSICHAR)));
    }

    /// `TObject`, `TClass`, `IInterface`, `TInterfacedObject` and `TGUID`,
    /// reserved first so their handles match [`known`]; bodies follow.
    fn root_types(&mut self) {
        let object_scope = ScopeId::from(self.builder.unit().scopes.len());
        self.named("TObject", TypeKind::Class(ClassType::new(object_scope)));
        self.body_scope(known::TOBJECT);
        self.named("TClass", TypeKind::MetaClass(known::TOBJECT));

        let intf_scope = ScopeId::from(self.builder.unit().scopes.len());
        self.named(
            "IInterface",
            TypeKind::Interface(InterfaceType::new(intf_scope).with_guid(IINTERFACE_GUID)),
        );
        self.body_scope(known::IINTERFACE);

        let interfaced_scope = ScopeId::from(self.builder.unit().scopes.len());
        self.named(
            "TInterfacedObject",
            TypeKind::Class(
                ClassType::new(interfaced_scope)
                    .with_ancestor(known::TOBJECT)
                    .with_interface(known::IINTERFACE),
            ),
        );
        self.body_scope(known::TINTERFACEDOBJECT);

        let guid_scope = ScopeId::from(self.builder.unit().scopes.len());
        self.named(
            "TGUID",
            TypeKind::Record(RecordType {
                members: guid_scope,
                is_packed: true,
            }),
        );
        self.body_scope(known::TGUID);

        self.object_members(object_scope);
        self.interface_members(intf_scope);
        self.interfaced_object_members(interfaced_scope);
        self.guid_members(guid_scope);
    }

    fn object_members(&mut self, scope: ScopeId) {
        let owner = known::TOBJECT;
        self.method(owner, scope, "Create", RoutineKind::Constructor, Signature::default(), RoutineFlags::empty());
        self.method(owner, scope, "Destroy", RoutineKind::Destructor, Signature::default(), RoutineFlags::VIRTUAL);
        self.method(owner, scope, "Free", RoutineKind::Procedure, Signature::default(), RoutineFlags::empty());
        self.method(
            owner,
            scope,
            "ClassName",
            RoutineKind::Function,
            Signature::new(Vec::new(), Some(known::UNICODESTRING)),
            RoutineFlags::CLASS,
        );
        self.method(
            owner,
            scope,
            "ClassType",
            RoutineKind::Function,
            Signature::new(Vec::new(), Some(known::TCLASS)),
            RoutineFlags::empty(),
        );
        self.method(
            owner,
            scope,
            "InheritsFrom",
            RoutineKind::Function,
            Signature::new(vec![Param::new("AClass", known::TCLASS)], Some(known::BOOLEAN)),
            RoutineFlags::CLASS,
        );

        let mut class = ClassType::new(scope);
        class.effective = self.effective(scope, None);
        self.set_kind(owner, TypeKind::Class(class));
    }

    fn com_methods(&mut self, owner: TypeRef, scope: ScopeId, visibility: Visibility) {
        let query = Signature::new(
            vec![
                Param::new("IID", known::TGUID).with_flags(ParamFlags::CONST),
                Param::new("Obj", known::UNTYPED).with_flags(ParamFlags::OUT),
            ],
            Some(known::INTEGER),
        );
        for (name, signature) in [
            ("QueryInterface", query),
            ("_AddRef", Signature::new(Vec::new(), Some(known::INTEGER))),
            ("_Release", Signature::new(Vec::new(), Some(known::INTEGER))),
        ] {
            let routine = Routine::new(RoutineKind::Function, signature);
            self.member(owner, scope, name, DeclKind::Routine(routine), visibility);
        }
    }

    fn interface_members(&mut self, scope: ScopeId) {
        self.com_methods(known::IINTERFACE, scope, Visibility::Public);
        let mut intf = InterfaceType::new(scope).with_guid(IINTERFACE_GUID);
        intf.effective = self.effective(scope, None);
        self.set_kind(known::IINTERFACE, TypeKind::Interface(intf));
    }

    fn interfaced_object_members(&mut self, scope: ScopeId) {
        let owner = known::TINTERFACEDOBJECT;
        let ref_count = self.member(
            owner,
            scope,
            "FRefCount",
            DeclKind::Field(Field {
                ty: known::INTEGER,
                is_class_var: false,
            }),
            Visibility::Protected,
        );
        self.com_methods(owner, scope, Visibility::Protected);
        self.member(
            owner,
            scope,
            "RefCount",
            DeclKind::Property(Property {
                ty: known::INTEGER,
                params: Vec::new(),
                read: Some(Accessor {
                    name: "FRefCount".into(),
                    target: Some(ref_count),
                }),
                write: None,
                is_default: false,
            }),
            Visibility::Public,
        );

        let base = self.effective_of(known::TOBJECT);
        let mut class = ClassType::new(scope)
            .with_ancestor(known::TOBJECT)
            .with_interface(known::IINTERFACE);
        class.effective = self.effective(scope, base.as_ref());
        self.set_kind(owner, TypeKind::Class(class));
    }

    fn guid_members(&mut self, scope: ScopeId) {
        let owner = known::TGUID;
        let index = self.builder.add_type(TypeEntry::anonymous(TypeKind::Subrange(SubrangeType {
            base: known::INTEGER,
            low: 0,
            high: 7,
        })));
        let bytes = self.builder.add_type(TypeEntry::anonymous(TypeKind::Array(ArrayType {
            element: known::BYTE,
            shape: ArrayShape::Static(vec![index]),
        })));
        for (name, ty) in [
            ("D1", known::CARDINAL),
            ("D2", known::WORD),
            ("D3", known::WORD),
            ("D4", bytes),
        ] {
            let field = DeclKind::Field(Field {
                ty,
                is_class_var: false,
            });
            self.member(owner, scope, name, field, Visibility::Public);
        }
    }

    /// Weak aliases, `TDateTime`, constants and intrinsics.
    fn derived(&mut self) {
        self.alias("LongInt", known::INTEGER, false);
        self.alias("LongWord", known::CARDINAL, false);
        self.alias("Real", known::DOUBLE, false);
        self.alias("WideChar", known::CHAR, false);
        self.alias("RawByteString", known::ANSISTRING, false);
        self.alias("IUnknown", known::IINTERFACE, false);
        self.alias("TDateTime", known::DOUBLE, true);

        for (name, ty, value) in [
            ("True", known::BOOLEAN, ConstValue::Boolean(true)),
            ("False", known::BOOLEAN, ConstValue::Boolean(false)),
            ("MaxInt", known::INTEGER, ConstValue::Integer(i64::from(i32::MAX))),
        ] {
            let kind = DeclKind::Constant(Constant {
                ty,
                value: Some(value),
                is_typed: false,
            });
            self.declare(
                Unit::INTERFACE_SCOPE,
                Declaration::new(name, Self::qualified(&[name]), kind, SYSTEM, Unit::INTERFACE_SCOPE),
            );
        }

        for intrinsic in Intrinsic::ALL {
            let name = intrinsic.name();
            let kind = DeclKind::Routine(Routine::intrinsic(intrinsic));
            self.declare(
                Unit::INTERFACE_SCOPE,
                Declaration::new(name, Self::qualified(&[name]), kind, SYSTEM, Unit::INTERFACE_SCOPE),
            );
        }
    }
}

/// Build the `System` unit, complete and ready to publish as unit 0.
pub fn build_system_unit() -> Unit {
    let mut system = SystemBuilder {
        builder: UnitBuilder::new(SYSTEM, "System", UnitOrigin::StandardLibrary),
    };
    system.primitives();
    system.root_types();
    system.derived();
    let unit = system.builder.finish(UnitStage::Complete);
    trace!(types = unit.types.len(), decls = unit.decls.len(), "built System unit");
    unit
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_name(unit: &Unit, ty: TypeRef) -> String {
        unit.ty(ty.ty)
            .and_then(|t| t.name.as_ref())
            .map(|n| n.as_str().to_string())
            .unwrap()
    }

    #[test]
    fn known_handles_match_the_arena() {
        let unit = build_system_unit();
        let expected = [
            (known::UNRESOLVED, "Unresolved"),
            (known::NIL, "Nil"),
            (known::INTEGER, "Integer"),
            (known::NATIVEUINT, "NativeUInt"),
            (known::SINGLE, "Single"),
            (known::COMP, "Comp"),
            (known::BOOLEAN, "Boolean"),
            (known::ANSICHAR, "AnsiChar"),
            (known::CHAR, "Char"),
            (known::SHORTSTRING, "ShortString"),
            (known::UNICODESTRING, "UnicodeString"),
            (known::POINTER, "Pointer"),
            (known::PANSICHAR, "PAnsiChar"),
            (known::TOBJECT, "TObject"),
            (known::TCLASS, "TClass"),
            (known::IINTERFACE, "IInterface"),
            (known::TINTERFACEDOBJECT, "TInterfacedObject"),
            (known::TGUID, "TGUID"),
        ];
        for (ty, name) in expected {
            assert_eq!(type_name(&unit, ty), name);
        }
        assert_eq!(known::integer(IntegerKind::Word), known::WORD);
        assert_eq!(known::string(StringKind::Ansi), known::ANSISTRING);
    }

    #[test]
    fn hidden_types_are_not_declared() {
        let unit = build_system_unit();
        assert!(unit.lookup_interface("Unresolved").is_none());
        assert!(unit.lookup_interface("Untyped").is_none());
        assert!(unit.lookup_interface("integer").is_some());
    }

    #[test]
    fn weak_and_strong_aliases() {
        let unit = build_system_unit();
        let alias_of = |name: &str| {
            let decl = unit.lookup_interface(name).unwrap().decls[0];
            let ty = unit.decl(decl.decl).unwrap().kind.declared_type().unwrap();
            unit.ty(ty.ty).unwrap().kind.as_alias().unwrap()
        };
        assert_eq!(alias_of("LongInt"), AliasType { target: known::INTEGER, strong: false });
        assert_eq!(alias_of("Real").target, known::DOUBLE);
        assert!(alias_of("TDateTime").strong);
    }

    #[test]
    fn object_hierarchy() {
        let unit = build_system_unit();
        let object = unit.ty(known::TOBJECT.ty).unwrap().kind.as_class().unwrap();
        assert_eq!(object.ancestor, None);
        assert!(object.effective.lookup("Destroy").is_some());

        let interfaced = unit.ty(known::TINTERFACEDOBJECT.ty).unwrap().kind.as_class().unwrap();
        assert_eq!(interfaced.ancestor, Some(known::TOBJECT));
        assert_eq!(interfaced.interfaces, vec![known::IINTERFACE]);
        assert!(interfaced.effective.lookup("free").is_some());
        assert!(interfaced.effective.lookup("_AddRef").is_some());

        let destroy = object.effective.lookup("Destroy").unwrap()[0];
        let routine = unit.decl(destroy.decl).unwrap().as_routine().unwrap();
        assert!(routine.flags.contains(RoutineFlags::VIRTUAL));
        assert_eq!(routine.kind, RoutineKind::Destructor);
    }

    #[test]
    fn intrinsics_and_constants() {
        let unit = build_system_unit();
        for intrinsic in Intrinsic::ALL {
            let group = unit.lookup_interface(intrinsic.name()).unwrap();
            let decl = unit.decl(group.decls[0].decl).unwrap();
            assert_eq!(decl.as_routine().and_then(|r| r.intrinsic), Some(intrinsic));
        }
        let truth = unit.lookup_interface("TRUE").unwrap().decls[0];
        assert!(matches!(
            unit.decl(truth.decl).unwrap().kind,
            DeclKind::Constant(Constant { value: Some(ConstValue::Boolean(true)), .. })
        ));
    }
}
