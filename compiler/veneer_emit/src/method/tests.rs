#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;
use veneer_ir::{Expression, Instr, Reference, Statement};
use veneer_types::{MethodFlags, Ty, TypePool};

use super::{EmitterState, MethodEmitter};
use crate::error::SynthesisError;
use crate::synthesized::MemberTable;

fn method(name: &str) -> MethodEmitter {
    MethodEmitter::new(name, MethodFlags::OVERRIDE)
}

#[test]
fn lifecycle_advances_through_every_state() {
    let pool = TypePool::new();
    let mut table = MemberTable::new("Proxy");
    let mut m = method("Get");
    assert_eq!(m.state(), EmitterState::Created);

    m.set_parameters(&[Ty::Int32]).unwrap();
    m.set_return_type(Ty::Int32).unwrap();
    assert_eq!(m.state(), EmitterState::SignatureBound);
    assert_eq!(m.arguments()[0].position(), Some(1));

    let arg = m.arguments()[0].clone();
    m.add_statement(Statement::Return(Some(Reference::Arg(arg).load())))
        .unwrap();
    assert_eq!(m.state(), EmitterState::BodyAttached);

    m.generate(&pool, &mut table, true).unwrap();
    assert_eq!(m.state(), EmitterState::Emitted);
    assert_eq!(
        table.methods()[0].body.instrs,
        vec![Instr::LdArg(1), Instr::Ret]
    );
    assert_eq!(table.methods()[0].body.max_stack, 1);
}

#[test]
fn signature_is_frozen_once_a_body_is_attached() {
    let mut m = method("Run");
    m.add_statement(Statement::Return(None)).unwrap();

    let err = m.set_parameters(&[Ty::Bool]).unwrap_err();
    assert_eq!(
        err,
        SynthesisError::InvalidState {
            member: "Run".to_owned(),
            state: EmitterState::BodyAttached,
            operation: "set parameters of",
        }
    );
    assert!(m.set_return_type(Ty::Bool).is_err());
}

#[test]
fn emitted_method_rejects_further_statements() {
    let pool = TypePool::new();
    let mut table = MemberTable::new("Proxy");
    let mut m = method("Run");
    m.add_statement(Statement::Return(None)).unwrap();
    m.generate(&pool, &mut table, true).unwrap();

    assert!(matches!(
        m.add_statement(Statement::Nop),
        Err(SynthesisError::InvalidState {
            state: EmitterState::Emitted,
            ..
        })
    ));
    assert!(m.declare_local(Ty::Int32).is_err());
}

#[test]
fn generate_is_idempotent() {
    let pool = TypePool::new();
    let mut table = MemberTable::new("Proxy");
    let mut m = method("Run");
    m.add_statement(Statement::Return(None)).unwrap();

    m.generate(&pool, &mut table, true).unwrap();
    m.generate(&pool, &mut table, true).unwrap();
    assert_eq!(table.len(), 1);
}

#[test]
fn generate_without_body_fails() {
    let pool = TypePool::new();
    let mut table = MemberTable::new("Proxy");
    let mut m = method("Run");
    m.set_return_type(Ty::Int32).unwrap();

    assert_eq!(
        m.generate(&pool, &mut table, true),
        Err(SynthesisError::MissingBody {
            member: "Run".to_owned(),
        })
    );
    assert!(table.is_empty());
}

#[test]
fn default_body_returns_zero_value() {
    let pool = TypePool::new();
    let mut table = MemberTable::new("Proxy");
    let mut m = method("Count");
    m.set_return_type(Ty::Int32).unwrap();
    m.ensure_valid_code_block();
    m.generate(&pool, &mut table, true).unwrap();

    assert_eq!(
        table.methods()[0].body.instrs,
        vec![Instr::Nop, Instr::LdI4(0), Instr::Ret]
    );
}

#[test]
fn default_body_leaves_existing_body_alone() {
    let pool = TypePool::new();
    let mut table = MemberTable::new("Proxy");
    let mut m = method("Count");
    m.set_return_type(Ty::Int32).unwrap();
    m.add_statement(Statement::Return(Some(Expression::int32(7))))
        .unwrap();
    m.ensure_valid_code_block();
    m.generate(&pool, &mut table, true).unwrap();

    assert_eq!(
        table.methods()[0].body.instrs,
        vec![Instr::LdI4(7), Instr::Ret]
    );
}

#[test]
fn lowering_errors_name_the_member() {
    let pool = TypePool::new();
    let mut table = MemberTable::new("Proxy");
    let mut m = MethodEmitter::new("Create", MethodFlags::STATIC);
    m.set_return_type(Ty::Object).unwrap();
    m.add_statement(Statement::Return(Some(Reference::This.load())))
        .unwrap();

    let err = m.generate(&pool, &mut table, true).unwrap_err();
    assert!(matches!(err, SynthesisError::Binding { ref member, .. } if member == "Create"));
}

#[test]
fn duplicate_signature_is_rejected() {
    let pool = TypePool::new();
    let mut table = MemberTable::new("Proxy");
    for _ in 0..2 {
        let mut m = method("Run");
        m.set_parameters(&[Ty::String]).unwrap();
        m.add_statement(Statement::Return(None)).unwrap();
        if table.is_empty() {
            m.generate(&pool, &mut table, true).unwrap();
        } else {
            assert_eq!(
                m.generate(&pool, &mut table, true),
                Err(SynthesisError::DuplicateMemberDefinition {
                    owner: "Proxy".to_owned(),
                    name: "Run".to_owned(),
                })
            );
        }
    }
    assert_eq!(table.len(), 1);
}

#[test]
fn overloads_with_different_parameters_coexist() {
    let pool = TypePool::new();
    let mut table = MemberTable::new("Proxy");
    for params in [vec![Ty::String], vec![Ty::Int32]] {
        let mut m = method("Run");
        m.set_parameters(&params).unwrap();
        m.add_statement(Statement::Return(None)).unwrap();
        m.generate(&pool, &mut table, true).unwrap();
    }
    assert_eq!(table.len(), 2);
}

#[test]
fn body_without_signature_freezes_an_empty_one() {
    let pool = TypePool::new();
    let mut table = MemberTable::new("Proxy");
    let mut m = method("Reset");
    assert_eq!(m.state(), EmitterState::Created);
    m.add_statement(Statement::Return(None)).unwrap();

    assert_eq!(m.state(), EmitterState::BodyAttached);
    assert!(m.set_parameters(&[Ty::Int32]).is_err());
    m.generate(&pool, &mut table, true).unwrap();
    let emitted = &table.methods()[0];
    assert!(emitted.params.is_empty());
    assert_eq!(emitted.ret, Ty::Void);
}
