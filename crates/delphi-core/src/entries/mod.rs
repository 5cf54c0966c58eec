//! Arena entry types shared by the registry and the resolver.
//!
//! - [`Declaration`] / [`DeclKind`] - every named entity of a unit
//! - [`TypeEntry`] / [`TypeKind`] - every type, named or anonymous
//! - [`ScopeData`] - stored lexical scopes
//! - [`SymbolTable`] - ordered case-insensitive name groups used by scopes and
//!   effective member tables
//!
//! Supporting types:
//! - [`Routine`], [`Signature`], [`Param`] with [`RoutineFlags`] / [`ParamFlags`]
//! - [`ConstValue`], [`Section`]

mod declaration;
mod routine;
mod scope;
mod symbols;
mod types;

pub use declaration::{
    Accessor, ConstValue, Constant, DeclKind, Declaration, Field, Property, Section, Variable,
    VariableKind,
};
pub use routine::{Intrinsic, Param, ParamFlags, Routine, RoutineFlags, RoutineKind, Signature};
pub use scope::{ScopeData, ScopeKind};
pub use symbols::{NameTaken, SymbolGroup, SymbolTable};
pub use types::{
    AliasType, ArrayShape, ArrayType, CharKind, ClassType, EnumType, IntegerKind, InterfaceType,
    ProceduralKind, ProceduralType, RealKind, RecordType, StringKind, SubrangeType, TypeEntry,
    TypeKind,
};
