//! The low-level instruction set IR nodes lower into.
//!
//! A typed stack machine in the style of CIL: every instruction pops its
//! operands and pushes its result. [`InstrSink`] is the emission back-end
//! lowering writes to; [`InstrBuffer`] is the in-memory implementation the
//! emitters use.

use std::fmt;
use std::sync::Arc;

use veneer_types::{MethodId, Ty};

/// A branch target within one body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct Label(u32);

impl Label {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// A local variable slot within one body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct LocalId(u32);

impl LocalId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A field of the type being synthesized, by declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct FieldIndex(u32);

impl FieldIndex {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// A call site's shape, enough to compute its stack effect.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CallSite {
    pub method: MethodId,
    pub generic_args: Vec<Ty>,
    pub argc: u32,
    pub has_this: bool,
    pub returns: bool,
    pub is_virtual: bool,
}

/// One stack-machine instruction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Instr {
    Nop,
    /// Load argument slot (slot 0 is the receiver of instance members).
    LdArg(u32),
    StArg(u32),
    LdLoc(LocalId),
    StLoc(LocalId),
    LdFld(FieldIndex),
    StFld(FieldIndex),
    LdSFld(FieldIndex),
    StSFld(FieldIndex),
    /// Load through an address.
    LdInd(Ty),
    /// Store through an address: pops value, then address.
    StInd(Ty),
    LdNull,
    LdI4(i32),
    LdI8(i64),
    /// `f64` as raw bits.
    LdR8(u64),
    LdStr(Arc<str>),
    /// Push the zero value of a type.
    LdDefault(Ty),
    /// Push the token of a source method.
    LdToken {
        method: MethodId,
        generic_args: Vec<Ty>,
    },
    Call(CallSite),
    NewObj {
        ctor: MethodId,
        argc: u32,
    },
    /// Pops a length, pushes a new array.
    NewArr(Ty),
    /// Pops array and index, pushes the element.
    LdElem(Ty),
    /// Pops array, index and value.
    StElem(Ty),
    Dup,
    Pop,
    Box(Ty),
    UnboxAny(Ty),
    CastClass(Ty),
    Ceq,
    Clt,
    Cgt,
    Br(Label),
    /// Pops a condition; branches when it is false / zero / null.
    BrFalse(Label),
    /// Marks the position of a label. Not an executable instruction.
    Mark(Label),
    MonitorEnter,
    MonitorExit,
    Ret,
}

impl Instr {
    /// Number of stack slots popped and pushed.
    pub fn stack_effect(&self) -> (u32, u32) {
        match self {
            Instr::Nop | Instr::Br(_) | Instr::Mark(_) | Instr::Ret => (0, 0),
            Instr::LdArg(_)
            | Instr::LdLoc(_)
            | Instr::LdSFld(_)
            | Instr::LdNull
            | Instr::LdI4(_)
            | Instr::LdI8(_)
            | Instr::LdR8(_)
            | Instr::LdStr(_)
            | Instr::LdDefault(_)
            | Instr::LdToken { .. } => (0, 1),
            Instr::StArg(_)
            | Instr::StLoc(_)
            | Instr::StSFld(_)
            | Instr::Pop
            | Instr::BrFalse(_)
            | Instr::MonitorEnter
            | Instr::MonitorExit => (1, 0),
            Instr::LdFld(_)
            | Instr::LdInd(_)
            | Instr::NewArr(_)
            | Instr::Box(_)
            | Instr::UnboxAny(_)
            | Instr::CastClass(_) => (1, 1),
            Instr::StFld(_) | Instr::StInd(_) => (2, 0),
            Instr::LdElem(_) | Instr::Ceq | Instr::Clt | Instr::Cgt => (2, 1),
            Instr::StElem(_) => (3, 0),
            Instr::Dup => (1, 2),
            Instr::Call(site) => (
                site.argc + u32::from(site.has_this),
                u32::from(site.returns),
            ),
            Instr::NewObj { argc, .. } => (*argc, 1),
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Nop => f.write_str("nop"),
            Instr::LdArg(n) => write!(f, "ldarg {n}"),
            Instr::StArg(n) => write!(f, "starg {n}"),
            Instr::LdLoc(l) => write!(f, "ldloc {}", l.raw()),
            Instr::StLoc(l) => write!(f, "stloc {}", l.raw()),
            Instr::LdFld(i) => write!(f, "ldfld {}", i.raw()),
            Instr::StFld(i) => write!(f, "stfld {}", i.raw()),
            Instr::LdSFld(i) => write!(f, "ldsfld {}", i.raw()),
            Instr::StSFld(i) => write!(f, "stsfld {}", i.raw()),
            Instr::LdInd(_) => f.write_str("ldind"),
            Instr::StInd(_) => f.write_str("stind"),
            Instr::LdNull => f.write_str("ldnull"),
            Instr::LdI4(v) => write!(f, "ldc.i4 {v}"),
            Instr::LdI8(v) => write!(f, "ldc.i8 {v}"),
            Instr::LdR8(bits) => write!(f, "ldc.r8 {}", f64::from_bits(*bits)),
            Instr::LdStr(s) => write!(f, "ldstr {s:?}"),
            Instr::LdDefault(_) => f.write_str("lddefault"),
            Instr::LdToken { method, .. } => write!(f, "ldtoken method#{}", method.raw()),
            Instr::Call(site) => write!(
                f,
                "{} method#{} argc={}",
                if site.is_virtual { "callvirt" } else { "call" },
                site.method.raw(),
                site.argc
            ),
            Instr::NewObj { ctor, argc } => write!(f, "newobj method#{} argc={argc}", ctor.raw()),
            Instr::NewArr(_) => f.write_str("newarr"),
            Instr::LdElem(_) => f.write_str("ldelem"),
            Instr::StElem(_) => f.write_str("stelem"),
            Instr::Dup => f.write_str("dup"),
            Instr::Pop => f.write_str("pop"),
            Instr::Box(_) => f.write_str("box"),
            Instr::UnboxAny(_) => f.write_str("unbox.any"),
            Instr::CastClass(_) => f.write_str("castclass"),
            Instr::Ceq => f.write_str("ceq"),
            Instr::Clt => f.write_str("clt"),
            Instr::Cgt => f.write_str("cgt"),
            Instr::Br(l) => write!(f, "br L{}", l.raw()),
            Instr::BrFalse(l) => write!(f, "brfalse L{}", l.raw()),
            Instr::Mark(l) => write!(f, "L{}:", l.raw()),
            Instr::MonitorEnter => f.write_str("monitor.enter"),
            Instr::MonitorExit => f.write_str("monitor.exit"),
            Instr::Ret => f.write_str("ret"),
        }
    }
}

/// Back-end that receives lowered instructions.
pub trait InstrSink {
    fn emit(&mut self, instr: Instr);

    /// Allocate a fresh, not yet marked label.
    fn new_label(&mut self) -> Label;

    /// Mark `label` at the current position.
    fn mark(&mut self, label: Label) {
        self.emit(Instr::Mark(label));
    }
}

/// In-memory instruction sink.
#[derive(Clone, Debug, Default)]
pub struct InstrBuffer {
    instrs: Vec<Instr>,
    next_label: u32,
}

impl InstrBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// Package the buffer with the body's locals.
    pub fn finish(self, locals: Vec<Ty>) -> LoweredBody {
        LoweredBody {
            instrs: self.instrs,
            locals,
            max_stack: 0,
        }
    }
}

impl InstrSink for InstrBuffer {
    fn emit(&mut self, instr: Instr) {
        self.instrs.push(instr);
    }

    fn new_label(&mut self) -> Label {
        let label = Label::new(self.next_label);
        self.next_label += 1;
        label
    }
}

/// A member body in target form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoweredBody {
    pub instrs: Vec<Instr>,
    pub locals: Vec<Ty>,
    /// Maximum evaluation stack depth, filled in by the verifier.
    pub max_stack: u32,
}
