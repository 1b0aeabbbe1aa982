//! Reference / expression / statement IR for synthesized member bodies.
//!
//! The node set is closed: every body a proxy needs is built from these
//! cases and lowered by a single `match` in [`crate::lower`].
//!
//! - **[`Reference`]**: a storage location (receiver, argument, local, field,
//!   or a slot reached through a by-ref address)
//! - **[`Expression`]**: a value-producing computation
//! - **[`Statement`]**: a unit with no value; a body is a [`CodeBlock`]
//!
//! Nodes are immutable once built. Argument positions are the one piece of
//! late-bound state: an [`ArgumentReference`] is bound once, when its
//! member's signature is set, before it is copied into any node.

use std::sync::Arc;

use veneer_types::{MethodId, Ty};

use crate::error::BindingError;
use crate::instr::{FieldIndex, LocalId};

// References

/// An argument slot of the member being built.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArgumentReference {
    ty: Ty,
    position: Option<u32>,
}

impl ArgumentReference {
    /// An argument whose position is not yet bound.
    pub fn new(ty: Ty) -> Self {
        Self { ty, position: None }
    }

    pub(crate) fn bound(ty: Ty, position: u32) -> Self {
        Self {
            ty,
            position: Some(position),
        }
    }

    /// Bind the argument to its slot. Positions are assigned exactly once.
    pub fn bind(&mut self, position: u32) -> Result<(), BindingError> {
        match self.position {
            Some(position) => Err(BindingError::AlreadyBound { position }),
            None => {
                self.position = Some(position);
                Ok(())
            }
        }
    }

    pub fn position(&self) -> Option<u32> {
        self.position
    }

    pub fn ty(&self) -> &Ty {
        &self.ty
    }
}

/// A local variable declared in a [`CodeBlock`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LocalReference {
    pub id: LocalId,
    pub ty: Ty,
}

/// A field of the type being synthesized.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldReference {
    pub index: FieldIndex,
    pub name: Arc<str>,
    pub ty: Ty,
    pub is_static: bool,
    /// Object the field is read from. Instance fields default to the receiver.
    pub owner: Option<Box<Reference>>,
}

impl FieldReference {
    pub fn instance(index: FieldIndex, name: impl Into<Arc<str>>, ty: Ty) -> Self {
        Self {
            index,
            name: name.into(),
            ty,
            is_static: false,
            owner: Some(Box::new(Reference::This)),
        }
    }

    pub fn static_field(index: FieldIndex, name: impl Into<Arc<str>>, ty: Ty) -> Self {
        Self {
            index,
            name: name.into(),
            ty,
            is_static: true,
            owner: None,
        }
    }

    /// Same field, read from a different object.
    #[must_use]
    pub fn with_owner(mut self, owner: Reference) -> Self {
        self.owner = Some(Box::new(owner));
        self
    }
}

/// A storage location.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reference {
    /// The receiver (argument slot 0 of an instance member).
    This,
    Arg(ArgumentReference),
    Local(LocalReference),
    Field(FieldReference),
    /// The value behind a by-ref slot.
    Indirect(Box<Reference>),
}

impl Reference {
    /// Declared type of the location. The receiver is typed as `object`.
    pub fn ty(&self) -> Ty {
        match self {
            Reference::This => Ty::Object,
            Reference::Arg(arg) => arg.ty.clone(),
            Reference::Local(local) => local.ty.clone(),
            Reference::Field(field) => field.ty.clone(),
            Reference::Indirect(slot) => slot.ty().strip_by_ref().clone(),
        }
    }

    /// Wrap a by-ref slot so loads and stores go through its address.
    /// Other references are returned unchanged.
    #[must_use]
    pub fn deref_if_by_ref(self) -> Reference {
        if self.ty().is_by_ref() {
            Reference::Indirect(Box::new(self))
        } else {
            self
        }
    }

    pub fn load(self) -> Expression {
        Expression::Load(self)
    }
}

impl From<ArgumentReference> for Reference {
    fn from(arg: ArgumentReference) -> Self {
        Reference::Arg(arg)
    }
}

impl From<LocalReference> for Reference {
    fn from(local: LocalReference) -> Self {
        Reference::Local(local)
    }
}

impl From<FieldReference> for Reference {
    fn from(field: FieldReference) -> Self {
        Reference::Field(field)
    }
}

// Expressions

/// A constant operand.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Constant {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    /// `f64` as raw bits.
    Float64(u64),
    String(Arc<str>),
}

/// How a call selects its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dispatch {
    /// Through the receiver's method table.
    Virtual,
    /// Exactly the named method (base calls, static calls).
    Direct,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
}

/// A value-producing computation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expression {
    Const(Constant),
    Load(Reference),
    /// The zero value of a type.
    Default(Ty),
    /// Identifies a source method to the interceptor pipeline.
    MethodToken {
        method: MethodId,
        generic_args: Vec<Ty>,
    },
    Invoke {
        receiver: Option<Box<Expression>>,
        method: MethodId,
        generic_args: Vec<Ty>,
        args: Vec<Expression>,
        dispatch: Dispatch,
        ret: Ty,
    },
    New {
        ctor: MethodId,
        args: Vec<Expression>,
        ty: Ty,
    },
    /// Box, unbox or cast `value` from `from` to `to`.
    Convert {
        value: Box<Expression>,
        from: Ty,
        to: Ty,
    },
    ArrayElement {
        array: Box<Expression>,
        index: Box<Expression>,
        elem: Ty,
    },
    /// Allocate an array of `items.len()` and store each item in order.
    NewArray { elem: Ty, items: Vec<Expression> },
    Compare {
        op: CompareOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
}

impl Expression {
    pub fn int32(v: i32) -> Self {
        Expression::Const(Constant::Int32(v))
    }

    pub fn convert(value: Expression, from: Ty, to: Ty) -> Self {
        Expression::Convert {
            value: Box::new(value),
            from,
            to,
        }
    }

    /// Whether lowering leaves a value on the stack.
    pub fn produces_value(&self) -> bool {
        match self {
            Expression::Invoke { ret, .. } => !ret.is_void(),
            _ => true,
        }
    }
}

// Statements

/// A unit of a member body.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Statement {
    Assign { target: Reference, value: Expression },
    /// Evaluate for effect; any value is discarded.
    Expr(Expression),
    If {
        cond: Expression,
        then_branch: Vec<Statement>,
        else_branch: Vec<Statement>,
    },
    /// Without a value, non-void members return the default of their type.
    Return(Option<Expression>),
    Nop,
    /// Hold `monitor` for the duration of `body`.
    Lock {
        monitor: Reference,
        body: Vec<Statement>,
    },
}

impl Statement {
    pub fn assign(target: impl Into<Reference>, value: Expression) -> Self {
        Statement::Assign {
            target: target.into(),
            value,
        }
    }
}

/// An ordered statement list plus the locals it declares.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CodeBlock {
    statements: Vec<Statement>,
    locals: Vec<Ty>,
}

impl CodeBlock {
    pub fn new() -> Self {
        Self::default()
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "local count never exceeds u32"
    )]
    pub fn declare_local(&mut self, ty: Ty) -> LocalReference {
        let id = LocalId::new(self.locals.len() as u32);
        self.locals.push(ty.clone());
        LocalReference { id, ty }
    }

    pub fn add_statement(&mut self, stmt: Statement) {
        self.statements.push(stmt);
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn locals(&self) -> &[Ty] {
        &self.locals
    }
}
