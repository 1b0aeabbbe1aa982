//! Argument binding and marshalling helpers.

use veneer_types::Ty;

use crate::ir::{ArgumentReference, Expression, Reference};

/// Create argument references for `param_types`, bound by position.
///
/// Instance members reserve slot 0 for the receiver, so their arguments
/// occupy `1..=n`; static members use `0..n`.
#[expect(
    clippy::cast_possible_truncation,
    reason = "parameter lists never exceed u32"
)]
pub fn bind_arguments(param_types: &[Ty], is_static: bool) -> Vec<ArgumentReference> {
    let offset = u32::from(!is_static);
    param_types
        .iter()
        .enumerate()
        .map(|(i, ty)| ArgumentReference::bound(ty.clone(), i as u32 + offset))
        .collect()
}

/// Whether any parameter is passed by reference.
///
/// By-ref parameters need their values copied back after the call, so
/// callers use this to pick the forwarding pattern.
pub fn has_by_ref<'a>(param_types: impl IntoIterator<Item = &'a Ty>) -> bool {
    param_types.into_iter().any(Ty::is_by_ref)
}

/// Load each argument; by-ref arguments are loaded through their address.
pub fn load_arguments(args: &[ArgumentReference]) -> Vec<Expression> {
    args.iter()
        .map(|arg| Reference::Arg(arg.clone()).deref_if_by_ref().load())
        .collect()
}

/// A single expression that allocates `object[references.len()]` and stores
/// each reference's value, boxed where needed, at its index.
///
/// By-ref references contribute the value behind the address.
pub fn pack_to_object_array(references: &[Reference]) -> Expression {
    let items = references
        .iter()
        .map(|reference| {
            let reference = reference.clone().deref_if_by_ref();
            let ty = reference.ty();
            Expression::convert(reference.load(), ty, Ty::Object)
        })
        .collect();
    Expression::NewArray {
        elem: Ty::Object,
        items,
    }
}
