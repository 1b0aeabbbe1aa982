//! Human-readable names and dumps for diagnostics and tests.

use std::fmt::Write as _;

use veneer_types::{MethodFlags, MethodRef, TypePool};

use crate::generics::EmittedGenericParam;
use crate::synthesized::{EmittedMethod, SynthesizedType};

/// `Declaring.method` for error messages and logs.
pub fn describe_method(pool: &TypePool, method: &MethodRef) -> String {
    format!(
        "{}.{}",
        pool.display(&method.declaring),
        pool.name(pool.method(method.method).name)
    )
}

/// Render a synthesized type: header, fields, then each method with its
/// lowered body.
pub fn dump_type(pool: &TypePool, ty: &SynthesizedType) -> String {
    let mut out = String::new();
    out.push_str("class ");
    out.push_str(&ty.name);
    write_generics(pool, &ty.generics, &mut out);
    out.push_str(" : ");
    pool.display_into(&ty.base, &mut out);
    for iface in &ty.interfaces {
        out.push_str(", ");
        pool.display_into(iface, &mut out);
    }
    out.push('\n');

    for field in &ty.fields {
        out.push_str(if field.is_static { "  static field " } else { "  field " });
        out.push_str(&field.name);
        out.push_str(": ");
        pool.display_into(&field.ty, &mut out);
        out.push('\n');
    }
    for event in &ty.events {
        let _ = writeln!(
            out,
            "  event {}: {} ({}, {})",
            event.name,
            pool.display(&event.handler),
            event.add,
            event.remove
        );
    }
    for property in &ty.properties {
        let accessors: Vec<&str> = property
            .get
            .iter()
            .chain(&property.set)
            .map(String::as_str)
            .collect();
        let _ = writeln!(
            out,
            "  property {}: {} ({})",
            property.name,
            pool.display(&property.ty),
            accessors.join(", ")
        );
    }
    for method in &ty.methods {
        dump_method(pool, method, &mut out);
    }
    out
}

fn dump_method(pool: &TypePool, method: &EmittedMethod, out: &mut String) {
    out.push_str("  ");
    if method.flags.contains(MethodFlags::STATIC) {
        out.push_str("static ");
    }
    if method.flags.contains(MethodFlags::VIRTUAL) {
        out.push_str("virtual ");
    }
    out.push_str(&method.name);
    write_generics(pool, &method.generics, out);
    out.push('(');
    for (i, param) in method.params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        pool.display_into(param, out);
    }
    out.push_str(") -> ");
    pool.display_into(&method.ret, out);
    if let Some(source) = &method.overrides {
        out.push_str(" overrides ");
        out.push_str(&describe_method(pool, source));
    }
    let _ = writeln!(out, " [max_stack {}]", method.body.max_stack);
    for instr in &method.body.instrs {
        let _ = writeln!(out, "    {instr}");
    }
}

fn write_generics(pool: &TypePool, generics: &[EmittedGenericParam], out: &mut String) {
    if generics.is_empty() {
        return;
    }
    out.push('<');
    for (i, param) in generics.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(pool.name(param.name()));
        for (j, constraint) in param.constraint_types().enumerate() {
            out.push_str(if j == 0 { " : " } else { ", " });
            pool.display_into(constraint, out);
        }
    }
    out.push('>');
}
