//! Routine signatures and directives.

use bitflags::bitflags;

use crate::{DeclRef, Name, Span, TypeRef};

bitflags! {
    /// Directives attached to a routine header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RoutineFlags: u32 {
        const VIRTUAL     = 1 << 0;
        const DYNAMIC     = 1 << 1;
        const OVERRIDE    = 1 << 2;
        const ABSTRACT    = 1 << 3;
        const OVERLOAD    = 1 << 4;
        const REINTRODUCE = 1 << 5;
        const STATIC      = 1 << 6;
        /// `class procedure` / `class function`.
        const CLASS       = 1 << 7;
        const FINAL       = 1 << 8;
        const INLINE      = 1 << 9;
        const FORWARD     = 1 << 10;
        const EXTERNAL    = 1 << 11;
        const DEPRECATED  = 1 << 12;
        const MESSAGE     = 1 << 13;
    }
}

impl RoutineFlags {
    /// Whether calls to this method dispatch through the class's virtual table.
    pub fn is_dispatched(self) -> bool {
        self.intersects(Self::VIRTUAL | Self::DYNAMIC | Self::OVERRIDE)
    }
}

bitflags! {
    /// Passing mode and properties of a parameter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ParamFlags: u8 {
        const CONST       = 1 << 0;
        const VAR         = 1 << 1;
        const OUT         = 1 << 2;
        const HAS_DEFAULT = 1 << 3;
    }
}

impl ParamFlags {
    /// Whether the argument must be an assignable location.
    pub fn is_by_reference(self) -> bool {
        self.intersects(Self::VAR | Self::OUT)
    }
}

/// A formal parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Name,
    pub ty: TypeRef,
    pub flags: ParamFlags,
}

impl Param {
    pub fn new(name: impl Into<Name>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            flags: ParamFlags::empty(),
        }
    }

    pub fn with_flags(mut self, flags: ParamFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn has_default(&self) -> bool {
        self.flags.contains(ParamFlags::HAS_DEFAULT)
    }
}

/// Parameter list and optional result type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    pub params: Vec<Param>,
    pub result: Option<TypeRef>,
}

impl Signature {
    pub fn new(params: Vec<Param>, result: Option<TypeRef>) -> Self {
        Self { params, result }
    }

    /// Number of parameters without a default value.
    pub fn required_params(&self) -> usize {
        self.params.iter().filter(|p| !p.has_default()).count()
    }
}

/// What kind of routine a header declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutineKind {
    Procedure,
    Function,
    Constructor,
    Destructor,
}

impl RoutineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RoutineKind::Procedure => "procedure",
            RoutineKind::Function => "function",
            RoutineKind::Constructor => "constructor",
            RoutineKind::Destructor => "destructor",
        }
    }
}

/// Compiler intrinsics whose typing cannot be expressed as an ordinary signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    Length,
    SetLength,
    High,
    Low,
    Inc,
    Dec,
    Ord,
    Chr,
    Succ,
    Pred,
    Assigned,
    Exit,
    Break,
    Continue,
    Halt,
    SizeOf,
    Copy,
    Trunc,
    Round,
    Abs,
    Odd,
    Include,
    Exclude,
    New,
    Dispose,
    Concat,
    Pos,
}

impl Intrinsic {
    pub const ALL: [Intrinsic; 27] = [
        Intrinsic::Length,
        Intrinsic::SetLength,
        Intrinsic::High,
        Intrinsic::Low,
        Intrinsic::Inc,
        Intrinsic::Dec,
        Intrinsic::Ord,
        Intrinsic::Chr,
        Intrinsic::Succ,
        Intrinsic::Pred,
        Intrinsic::Assigned,
        Intrinsic::Exit,
        Intrinsic::Break,
        Intrinsic::Continue,
        Intrinsic::Halt,
        Intrinsic::SizeOf,
        Intrinsic::Copy,
        Intrinsic::Trunc,
        Intrinsic::Round,
        Intrinsic::Abs,
        Intrinsic::Odd,
        Intrinsic::Include,
        Intrinsic::Exclude,
        Intrinsic::New,
        Intrinsic::Dispose,
        Intrinsic::Concat,
        Intrinsic::Pos,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Intrinsic::Length => "Length",
            Intrinsic::SetLength => "SetLength",
            Intrinsic::High => "High",
            Intrinsic::Low => "Low",
            Intrinsic::Inc => "Inc",
            Intrinsic::Dec => "Dec",
            Intrinsic::Ord => "Ord",
            Intrinsic::Chr => "Chr",
            Intrinsic::Succ => "Succ",
            Intrinsic::Pred => "Pred",
            Intrinsic::Assigned => "Assigned",
            Intrinsic::Exit => "Exit",
            Intrinsic::Break => "Break",
            Intrinsic::Continue => "Continue",
            Intrinsic::Halt => "Halt",
            Intrinsic::SizeOf => "SizeOf",
            Intrinsic::Copy => "Copy",
            Intrinsic::Trunc => "Trunc",
            Intrinsic::Round => "Round",
            Intrinsic::Abs => "Abs",
            Intrinsic::Odd => "Odd",
            Intrinsic::Include => "Include",
            Intrinsic::Exclude => "Exclude",
            Intrinsic::New => "New",
            Intrinsic::Dispose => "Dispose",
            Intrinsic::Concat => "Concat",
            Intrinsic::Pos => "Pos",
        }
    }

    /// Whether the intrinsic produces a value.
    pub fn is_function(self) -> bool {
        !matches!(
            self,
            Intrinsic::SetLength
                | Intrinsic::Inc
                | Intrinsic::Dec
                | Intrinsic::Exit
                | Intrinsic::Break
                | Intrinsic::Continue
                | Intrinsic::Halt
                | Intrinsic::Include
                | Intrinsic::Exclude
                | Intrinsic::New
                | Intrinsic::Dispose
        )
    }
}

/// A routine declaration: free procedure/function, method, constructor or destructor.
#[derive(Debug, Clone, PartialEq)]
pub struct Routine {
    pub kind: RoutineKind,
    pub signature: Signature,
    pub flags: RoutineFlags,
    /// Nearest ancestor method this one overrides; set by the inheritance resolver.
    pub overrides: Option<DeclRef>,
    /// Span of the implementation body, once bound.
    pub body: Option<Span>,
    /// Set for compiler intrinsics of the `System` unit.
    pub intrinsic: Option<Intrinsic>,
}

impl Routine {
    pub fn new(kind: RoutineKind, signature: Signature) -> Self {
        Self {
            kind,
            signature,
            flags: RoutineFlags::empty(),
            overrides: None,
            body: None,
            intrinsic: None,
        }
    }

    pub fn with_flags(mut self, flags: RoutineFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn intrinsic(intrinsic: Intrinsic) -> Self {
        let kind = if intrinsic.is_function() {
            RoutineKind::Function
        } else {
            RoutineKind::Procedure
        };
        Self {
            intrinsic: Some(intrinsic),
            ..Self::new(kind, Signature::default())
        }
    }

    pub fn is_class_method(&self) -> bool {
        self.flags.contains(RoutineFlags::CLASS)
    }

    pub fn is_constructor(&self) -> bool {
        self.kind == RoutineKind::Constructor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_flags() {
        assert!(RoutineFlags::VIRTUAL.is_dispatched());
        assert!((RoutineFlags::OVERRIDE | RoutineFlags::OVERLOAD).is_dispatched());
        assert!(!RoutineFlags::REINTRODUCE.is_dispatched());
        assert!(!RoutineFlags::STATIC.is_dispatched());
    }

    #[test]
    fn required_params_skip_defaults() {
        let int = TypeRef::system(2);
        let sig = Signature::new(
            vec![
                Param::new("A", int),
                Param::new("B", int).with_flags(ParamFlags::CONST | ParamFlags::HAS_DEFAULT),
            ],
            None,
        );
        assert_eq!(sig.required_params(), 1);
        assert!(sig.params[1].has_default());
        assert!(!sig.params[1].flags.is_by_reference());
        assert!(ParamFlags::OUT.is_by_reference());
    }

    #[test]
    fn intrinsic_routines() {
        let exit = Routine::intrinsic(Intrinsic::Exit);
        assert_eq!(exit.kind, RoutineKind::Procedure);
        let len = Routine::intrinsic(Intrinsic::Length);
        assert_eq!(len.kind, RoutineKind::Function);
        assert_eq!(len.intrinsic.map(Intrinsic::name), Some("Length"));
        assert_eq!(Intrinsic::ALL.len(), 27);
    }
}
