//! Method emitter: one synthesized method or constructor.
//!
//! Lifecycle: `Created → SignatureBound → BodyAttached → Emitted`.
//! The signature may change until a body is attached; statements may be
//! added until the method is emitted. Generating an emitted method is a
//! no-op.
//!
//! Attaching a body straight from `Created` is allowed and fixes the
//! signature at its initial `() -> void`. Parameterless void members
//! (event plumbing, type initializers) rely on this.

use veneer_ir::{
    bind_arguments, lower_block, verify_body, ArgumentReference, CodeBlock, InstrBuffer,
    LocalReference, LowerCtx, MemberShape, Statement,
};
use veneer_types::{GenericOwner, MethodFlags, MethodRef, Name, Ty, TypePool};

use crate::error::SynthesisError;
use crate::generics::{EmittedGenericParam, GenericBinder, SignatureTranslator};
use crate::synthesized::{EmittedMethod, MemberTable};

/// Where a [`MethodEmitter`] is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EmitterState {
    Created,
    SignatureBound,
    BodyAttached,
    Emitted,
}

/// Builds one method of a synthesized type.
#[derive(Clone, Debug)]
pub struct MethodEmitter {
    name: String,
    flags: MethodFlags,
    state: EmitterState,
    generics: Option<Vec<EmittedGenericParam>>,
    params: Vec<Ty>,
    ret: Ty,
    arguments: Vec<ArgumentReference>,
    body: CodeBlock,
    overrides: Option<MethodRef>,
    generic_arguments: Vec<Ty>,
}

impl MethodEmitter {
    pub(crate) fn new(name: impl Into<String>, flags: MethodFlags) -> Self {
        Self {
            name: name.into(),
            flags,
            state: EmitterState::Created,
            generics: None,
            params: Vec::new(),
            ret: Ty::Void,
            arguments: Vec::new(),
            body: CodeBlock::new(),
            overrides: None,
            generic_arguments: Vec::new(),
        }
    }

    /// A method whose signature is copied from `source` through `translator`.
    pub(crate) fn from_source(
        pool: &TypePool,
        name: &str,
        flags: MethodFlags,
        source: &MethodRef,
        translator: SignatureTranslator,
    ) -> Result<Self, SynthesisError> {
        let mut emitter = Self::new(name, flags);
        let signature = translator(pool, source, &mut emitter)?;
        emitter.set_parameters(&signature.params)?;
        emitter.set_return_type(signature.ret)?;
        emitter.generic_arguments = signature.map.targets().to_vec();
        Ok(emitter)
    }

    // Accessors

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> MethodFlags {
        self.flags
    }

    pub fn state(&self) -> EmitterState {
        self.state
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }

    /// An instance constructor. The static type initializer is not one.
    pub fn is_constructor(&self) -> bool {
        self.flags.contains(MethodFlags::CONSTRUCTOR) && !self.is_static()
    }

    pub fn parameters(&self) -> &[Ty] {
        &self.params
    }

    pub fn return_type(&self) -> &Ty {
        &self.ret
    }

    /// Argument references, bound by position once the signature is set.
    pub fn arguments(&self) -> &[ArgumentReference] {
        &self.arguments
    }

    /// Generic parameters declared on this method.
    pub fn generic_parameters(&self) -> &[EmittedGenericParam] {
        self.generics.as_deref().unwrap_or_default()
    }

    /// Generic arguments that stand for the source method's parameters when
    /// this method calls back into it.
    pub fn generic_arguments(&self) -> &[Ty] {
        &self.generic_arguments
    }

    pub fn overrides(&self) -> Option<&MethodRef> {
        self.overrides.as_ref()
    }

    pub fn body(&self) -> &CodeBlock {
        &self.body
    }

    // Signature

    pub fn set_parameters(&mut self, params: &[Ty]) -> Result<(), SynthesisError> {
        self.require_unbodied("set parameters of")?;
        self.arguments = bind_arguments(params, self.is_static());
        self.params = params.to_vec();
        self.state = EmitterState::SignatureBound;
        Ok(())
    }

    pub fn set_return_type(&mut self, ret: Ty) -> Result<(), SynthesisError> {
        self.require_unbodied("set return type of")?;
        self.ret = ret;
        self.state = EmitterState::SignatureBound;
        Ok(())
    }

    /// Record the source method this one overrides or implements.
    pub fn set_overrides(&mut self, source: MethodRef) -> Result<(), SynthesisError> {
        self.require_not_emitted("set override of")?;
        self.overrides = Some(source);
        Ok(())
    }

    fn require_unbodied(&self, operation: &'static str) -> Result<(), SynthesisError> {
        match self.state {
            EmitterState::Created | EmitterState::SignatureBound => Ok(()),
            state => Err(self.invalid_state(state, operation)),
        }
    }

    fn require_not_emitted(&self, operation: &'static str) -> Result<(), SynthesisError> {
        match self.state {
            EmitterState::Emitted => Err(self.invalid_state(self.state, operation)),
            _ => Ok(()),
        }
    }

    fn invalid_state(&self, state: EmitterState, operation: &'static str) -> SynthesisError {
        SynthesisError::InvalidState {
            member: self.name.clone(),
            state,
            operation,
        }
    }

    // Body

    pub fn declare_local(&mut self, ty: Ty) -> Result<LocalReference, SynthesisError> {
        self.require_not_emitted("declare a local in")?;
        Ok(self.body.declare_local(ty))
    }

    /// Append to the body. The signature is frozen from here on, including
    /// an implicit `() -> void` when none was set.
    pub fn add_statement(&mut self, stmt: Statement) -> Result<(), SynthesisError> {
        self.require_not_emitted("add a statement to")?;
        self.body.add_statement(stmt);
        self.state = EmitterState::BodyAttached;
        Ok(())
    }

    /// Give a method that never received a body a `nop; return default`
    /// one, so every declared member can be emitted.
    pub fn ensure_valid_code_block(&mut self) {
        if self.state == EmitterState::Emitted || !self.body.is_empty() {
            return;
        }
        tracing::debug!(method = %self.name, "supplying default body");
        self.body.add_statement(Statement::Nop);
        self.body.add_statement(Statement::Return(None));
        self.state = EmitterState::BodyAttached;
    }

    // Emission

    /// Lower the body and add the method to `table`.
    pub(crate) fn generate(
        &mut self,
        pool: &TypePool,
        table: &mut MemberTable,
        verify: bool,
    ) -> Result<(), SynthesisError> {
        match self.state {
            EmitterState::Emitted => {
                tracing::trace!(method = %self.name, "already generated");
                return Ok(());
            }
            EmitterState::BodyAttached => {}
            EmitterState::Created | EmitterState::SignatureBound => {
                return Err(SynthesisError::MissingBody {
                    member: self.name.clone(),
                });
            }
        }

        let shape = MemberShape {
            ret: &self.ret,
            is_static: self.is_static(),
            arity: count(self.params.len()),
            locals: count(self.body.locals().len()),
        };
        let mut cx = LowerCtx::new(pool, shape);
        let mut buf = InstrBuffer::new();
        lower_block(&self.body, &mut cx, &mut buf)
            .map_err(|err| SynthesisError::lowering(self.name.as_str(), err))?;
        let mut body = buf.finish(self.body.locals().to_vec());
        if verify {
            body.max_stack = verify_body(&body, &self.ret, shape.arg_slots()).map_err(|source| {
                SynthesisError::Verification {
                    member: self.name.clone(),
                    source,
                }
            })?;
        }
        tracing::trace!(
            method = %self.name,
            instrs = body.instrs.len(),
            max_stack = body.max_stack,
            "method generated"
        );

        let emitted = EmittedMethod {
            name: self.name.clone(),
            flags: self.flags,
            generics: self.generic_parameters().to_vec(),
            params: self.params.clone(),
            ret: self.ret.clone(),
            overrides: self.overrides.clone(),
            body,
        };
        table.insert(emitted)?;
        self.state = EmitterState::Emitted;
        Ok(())
    }
}

impl GenericBinder for MethodEmitter {
    fn generic_owner(&self) -> GenericOwner {
        GenericOwner::EmittedMethod
    }

    fn define_generic_parameters(
        &mut self,
        names: &[Name],
    ) -> Result<&mut [EmittedGenericParam], SynthesisError> {
        if self.generics.is_some() {
            return Err(SynthesisError::GenericParametersAlreadyDefined {
                owner: self.name.clone(),
            });
        }
        if self.state != EmitterState::Created {
            return Err(self.invalid_state(self.state, "declare generic parameters on"));
        }
        let params = names.iter().copied().map(EmittedGenericParam::new).collect();
        Ok(self.generics.insert(params).as_mut_slice())
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "parameter and local counts never exceed u32"
)]
fn count(len: usize) -> u32 {
    len as u32
}

#[cfg(test)]
mod tests;
