//! IR → instruction lowering.
//!
//! Every node lowers through `lower*(cx, sink)`: `cx` describes the member
//! being built, `sink` receives instructions. Composite nodes lower their
//! children first, left to right, then themselves, so operands are always
//! evaluated in source order (receiver, then arguments, then the call).

use std::sync::Arc;

use veneer_types::{Ty, TypePool};

use crate::error::{BindingError, LowerError};
use crate::instr::{CallSite, Instr, InstrSink};
use crate::ir::{CodeBlock, CompareOp, Constant, Dispatch, Expression, Reference, Statement};
use crate::stack::ensure_sufficient_stack;

/// Shape of the member a body is lowered into.
#[derive(Clone, Copy, Debug)]
pub struct MemberShape<'a> {
    pub ret: &'a Ty,
    pub is_static: bool,
    /// Declared parameter count, excluding the receiver.
    pub arity: u32,
    /// Declared local count.
    pub locals: u32,
}

impl MemberShape<'_> {
    /// Total argument slots, including the receiver of instance members.
    pub fn arg_slots(&self) -> u32 {
        self.arity + u32::from(!self.is_static)
    }
}

/// Lowering context for one member body.
pub struct LowerCtx<'a> {
    pool: &'a TypePool,
    shape: MemberShape<'a>,
    /// Monitors held by enclosing `Lock` statements, outermost first.
    locks: Vec<Reference>,
}

impl<'a> LowerCtx<'a> {
    pub fn new(pool: &'a TypePool, shape: MemberShape<'a>) -> Self {
        Self {
            pool,
            shape,
            locks: Vec::new(),
        }
    }

    pub fn shape(&self) -> MemberShape<'a> {
        self.shape
    }

    fn arg_slot(&self, position: Option<u32>) -> Result<u32, BindingError> {
        let position = position.ok_or(BindingError::Unbound)?;
        let first = u32::from(!self.shape.is_static);
        let slots = self.shape.arg_slots();
        if position < first || position >= slots {
            return Err(BindingError::PositionOutOfRange { position, slots });
        }
        Ok(position)
    }
}

/// Lower a whole body.
pub fn lower_block<S: InstrSink + ?Sized>(
    block: &CodeBlock,
    cx: &mut LowerCtx<'_>,
    sink: &mut S,
) -> Result<(), LowerError> {
    tracing::trace!(
        statements = block.statements().len(),
        locals = block.locals().len(),
        "lowering body"
    );
    lower_statements(block.statements(), cx, sink)
}

fn lower_statements<S: InstrSink + ?Sized>(
    stmts: &[Statement],
    cx: &mut LowerCtx<'_>,
    sink: &mut S,
) -> Result<(), LowerError> {
    for stmt in stmts {
        stmt.lower(cx, sink)?;
    }
    Ok(())
}

impl Reference {
    /// Push the value stored at this location.
    pub fn lower_load<S: InstrSink + ?Sized>(
        &self,
        cx: &mut LowerCtx<'_>,
        sink: &mut S,
    ) -> Result<(), LowerError> {
        match self {
            Reference::This => {
                if cx.shape.is_static {
                    return Err(BindingError::ReceiverInStaticMember.into());
                }
                sink.emit(Instr::LdArg(0));
            }
            Reference::Arg(arg) => {
                let slot = cx.arg_slot(arg.position())?;
                sink.emit(Instr::LdArg(slot));
            }
            Reference::Local(local) => {
                if local.id.raw() >= cx.shape.locals {
                    return Err(BindingError::UnknownLocal {
                        local: local.id.raw(),
                    }
                    .into());
                }
                sink.emit(Instr::LdLoc(local.id));
            }
            Reference::Field(field) => {
                if field.is_static {
                    sink.emit(Instr::LdSFld(field.index));
                } else {
                    field
                        .owner
                        .as_deref()
                        .unwrap_or(&Reference::This)
                        .lower_load(cx, sink)?;
                    sink.emit(Instr::LdFld(field.index));
                }
            }
            Reference::Indirect(slot) => {
                slot.lower_load(cx, sink)?;
                sink.emit(Instr::LdInd(self.ty()));
            }
        }
        Ok(())
    }

    /// Evaluate `value` and store it at this location. Owners and addresses
    /// are pushed before the value.
    pub fn lower_store<S: InstrSink + ?Sized>(
        &self,
        value: &Expression,
        cx: &mut LowerCtx<'_>,
        sink: &mut S,
    ) -> Result<(), LowerError> {
        match self {
            Reference::This => return Err(BindingError::AssignToReceiver.into()),
            Reference::Arg(arg) => {
                let slot = cx.arg_slot(arg.position())?;
                value.lower(cx, sink)?;
                sink.emit(Instr::StArg(slot));
            }
            Reference::Local(local) => {
                if local.id.raw() >= cx.shape.locals {
                    return Err(BindingError::UnknownLocal {
                        local: local.id.raw(),
                    }
                    .into());
                }
                value.lower(cx, sink)?;
                sink.emit(Instr::StLoc(local.id));
            }
            Reference::Field(field) => {
                if field.is_static {
                    value.lower(cx, sink)?;
                    sink.emit(Instr::StSFld(field.index));
                } else {
                    field
                        .owner
                        .as_deref()
                        .unwrap_or(&Reference::This)
                        .lower_load(cx, sink)?;
                    value.lower(cx, sink)?;
                    sink.emit(Instr::StFld(field.index));
                }
            }
            Reference::Indirect(slot) => {
                slot.lower_load(cx, sink)?;
                value.lower(cx, sink)?;
                sink.emit(Instr::StInd(self.ty()));
            }
        }
        Ok(())
    }
}

impl Expression {
    /// Push the value of this expression.
    pub fn lower<S: InstrSink + ?Sized>(
        &self,
        cx: &mut LowerCtx<'_>,
        sink: &mut S,
    ) -> Result<(), LowerError> {
        ensure_sufficient_stack(|| self.lower_inner(cx, sink))
    }

    fn lower_inner<S: InstrSink + ?Sized>(
        &self,
        cx: &mut LowerCtx<'_>,
        sink: &mut S,
    ) -> Result<(), LowerError> {
        match self {
            Expression::Const(c) => sink.emit(match c {
                Constant::Null => Instr::LdNull,
                Constant::Bool(b) => Instr::LdI4(i32::from(*b)),
                Constant::Int32(v) => Instr::LdI4(*v),
                Constant::Int64(v) => Instr::LdI8(*v),
                Constant::Float64(bits) => Instr::LdR8(*bits),
                Constant::String(s) => Instr::LdStr(Arc::clone(s)),
            }),
            Expression::Load(reference) => reference.lower_load(cx, sink)?,
            Expression::Default(ty) => lower_default(ty, cx.pool, sink)?,
            Expression::MethodToken {
                method,
                generic_args,
            } => sink.emit(Instr::LdToken {
                method: *method,
                generic_args: generic_args.clone(),
            }),
            Expression::Invoke {
                receiver,
                method,
                generic_args,
                args,
                dispatch,
                ret,
            } => {
                if *dispatch == Dispatch::Virtual && receiver.is_none() {
                    return Err(LowerError::VirtualCallWithoutReceiver);
                }
                if let Some(receiver) = receiver {
                    receiver.lower(cx, sink)?;
                }
                for arg in args {
                    arg.lower(cx, sink)?;
                }
                sink.emit(Instr::Call(CallSite {
                    method: *method,
                    generic_args: generic_args.clone(),
                    argc: count(args.len()),
                    has_this: receiver.is_some(),
                    returns: !ret.is_void(),
                    is_virtual: *dispatch == Dispatch::Virtual,
                }));
            }
            Expression::New { ctor, args, .. } => {
                for arg in args {
                    arg.lower(cx, sink)?;
                }
                sink.emit(Instr::NewObj {
                    ctor: *ctor,
                    argc: count(args.len()),
                });
            }
            Expression::Convert { value, from, to } => {
                value.lower(cx, sink)?;
                lower_convert(from, to, cx.pool, sink)?;
            }
            Expression::ArrayElement { array, index, elem } => {
                array.lower(cx, sink)?;
                index.lower(cx, sink)?;
                sink.emit(Instr::LdElem(elem.clone()));
            }
            Expression::NewArray { elem, items } => {
                sink.emit(Instr::LdI4(index_operand(items.len())));
                sink.emit(Instr::NewArr(elem.clone()));
                for (i, item) in items.iter().enumerate() {
                    sink.emit(Instr::Dup);
                    sink.emit(Instr::LdI4(index_operand(i)));
                    item.lower(cx, sink)?;
                    sink.emit(Instr::StElem(elem.clone()));
                }
            }
            Expression::Compare { op, lhs, rhs } => {
                lhs.lower(cx, sink)?;
                rhs.lower(cx, sink)?;
                match op {
                    CompareOp::Eq => sink.emit(Instr::Ceq),
                    CompareOp::Lt => sink.emit(Instr::Clt),
                    CompareOp::Gt => sink.emit(Instr::Cgt),
                    CompareOp::Ne => {
                        sink.emit(Instr::Ceq);
                        sink.emit(Instr::LdI4(0));
                        sink.emit(Instr::Ceq);
                    }
                }
            }
        }
        Ok(())
    }
}

impl Statement {
    pub fn lower<S: InstrSink + ?Sized>(
        &self,
        cx: &mut LowerCtx<'_>,
        sink: &mut S,
    ) -> Result<(), LowerError> {
        match self {
            Statement::Assign { target, value } => target.lower_store(value, cx, sink)?,
            Statement::Expr(expr) => {
                expr.lower(cx, sink)?;
                if expr.produces_value() {
                    sink.emit(Instr::Pop);
                }
            }
            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let else_label = sink.new_label();
                let end_label = sink.new_label();
                cond.lower(cx, sink)?;
                sink.emit(Instr::BrFalse(else_label));
                lower_statements(then_branch, cx, sink)?;
                sink.emit(Instr::Br(end_label));
                sink.mark(else_label);
                lower_statements(else_branch, cx, sink)?;
                sink.mark(end_label);
            }
            Statement::Return(value) => {
                let ret = cx.shape.ret;
                match value {
                    Some(_) if ret.is_void() => return Err(LowerError::ReturnValueFromVoid),
                    Some(value) => value.lower(cx, sink)?,
                    None if ret.is_void() => {}
                    None => lower_default(ret, cx.pool, sink)?,
                }
                let held: Vec<Reference> = cx.locks.iter().rev().cloned().collect();
                for monitor in &held {
                    monitor.lower_load(cx, sink)?;
                    sink.emit(Instr::MonitorExit);
                }
                sink.emit(Instr::Ret);
            }
            Statement::Nop => sink.emit(Instr::Nop),
            Statement::Lock { monitor, body } => {
                monitor.lower_load(cx, sink)?;
                sink.emit(Instr::MonitorEnter);
                cx.locks.push(monitor.clone());
                let result = lower_statements(body, cx, sink);
                cx.locks.pop();
                result?;
                monitor.lower_load(cx, sink)?;
                sink.emit(Instr::MonitorExit);
            }
        }
        Ok(())
    }
}

/// Push the zero value of `ty`.
fn lower_default<S: InstrSink + ?Sized>(
    ty: &Ty,
    pool: &TypePool,
    sink: &mut S,
) -> Result<(), LowerError> {
    let instr = match ty {
        Ty::Void => return Err(LowerError::VoidValue),
        Ty::Bool | Ty::Int32 => Instr::LdI4(0),
        Ty::Int64 => Instr::LdI8(0),
        Ty::Float64 => Instr::LdR8(0f64.to_bits()),
        Ty::Param(_) => Instr::LdDefault(ty.clone()),
        _ if pool.is_value_type(ty) => Instr::LdDefault(ty.clone()),
        _ => Instr::LdNull,
    };
    sink.emit(instr);
    Ok(())
}

/// Convert the value on the stack from `from` to `to`.
fn lower_convert<S: InstrSink + ?Sized>(
    from: &Ty,
    to: &Ty,
    pool: &TypePool,
    sink: &mut S,
) -> Result<(), LowerError> {
    if from.is_void() || to.is_void() {
        return Err(LowerError::VoidValue);
    }
    if from == to {
        return Ok(());
    }
    match (pool.needs_boxing(from), pool.needs_boxing(to)) {
        (true, true) => {
            sink.emit(Instr::Box(from.clone()));
            sink.emit(Instr::UnboxAny(to.clone()));
        }
        (true, false) => {
            sink.emit(Instr::Box(from.clone()));
            if *to != Ty::Object {
                sink.emit(Instr::CastClass(to.clone()));
            }
        }
        (false, true) => sink.emit(Instr::UnboxAny(to.clone())),
        (false, false) => {
            if *to != Ty::Object {
                sink.emit(Instr::CastClass(to.clone()));
            }
        }
    }
    Ok(())
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "argument lists never exceed u32"
)]
fn count(len: usize) -> u32 {
    len as u32
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    reason = "array literals never exceed i32::MAX elements"
)]
fn index_operand(i: usize) -> i32 {
    i as i32
}
