//! Stack-discipline verification of lowered bodies.
//!
//! An abstract interpretation over stack *depth* only: every reachable
//! instruction is visited once with the depth it must see, branches
//! propagate their depth to their targets, and every control-flow join
//! (a marked label) must be reached at a single consistent depth. This is
//! the structural half of what a loader checks before running a body; type
//! compatibility of operands is the emitters' responsibility.

use smallvec::SmallVec;
use veneer_types::Ty;

use crate::error::VerifyError;
use crate::instr::{Instr, Label, LoweredBody};

/// Verify `body` and return its maximum stack depth.
///
/// `arg_slots` counts the receiver of instance members. A `ret` must leave
/// exactly one value for non-void `ret` types and none for `void`.
pub fn verify_body(body: &LoweredBody, ret: &Ty, arg_slots: u32) -> Result<u32, VerifyError> {
    let labels = label_positions(&body.instrs);
    let ret_depth = u32::from(!ret.is_void());

    let mut depth_at: Vec<Option<u32>> = vec![None; body.instrs.len()];
    let mut worklist: SmallVec<[(usize, u32); 8]> = SmallVec::new();
    worklist.push((0, 0));
    let mut max_stack = 0;

    while let Some((start, entry_depth)) = worklist.pop() {
        let mut pc = start;
        let mut depth = entry_depth;
        loop {
            let Some(instr) = body.instrs.get(pc) else {
                return Err(VerifyError::FallsOffEnd);
            };
            if let Some(seen) = depth_at[pc] {
                if seen != depth {
                    let Instr::Mark(label) = instr else {
                        return Err(VerifyError::StackUnderflow { at: pc });
                    };
                    return Err(VerifyError::DepthMismatch {
                        label: *label,
                        expected: seen,
                        found: depth,
                    });
                }
                break;
            }
            depth_at[pc] = Some(depth);

            check_operands(instr, pc, body, arg_slots)?;

            if let Instr::Ret = instr {
                if depth != ret_depth {
                    return Err(VerifyError::BadReturnDepth {
                        at: pc,
                        expected: ret_depth,
                        found: depth,
                    });
                }
                break;
            }

            let (pops, pushes) = instr.stack_effect();
            depth = depth
                .checked_sub(pops)
                .ok_or(VerifyError::StackUnderflow { at: pc })?
                + pushes;
            max_stack = max_stack.max(depth);

            match instr {
                Instr::Br(label) => {
                    worklist.push((resolve(&labels, *label, pc)?, depth));
                    break;
                }
                Instr::BrFalse(label) => {
                    worklist.push((resolve(&labels, *label, pc)?, depth));
                }
                _ => {}
            }
            pc += 1;
        }
    }

    tracing::trace!(instrs = body.instrs.len(), max_stack, "body verified");
    Ok(max_stack)
}

/// Position of each marked label, indexed by label number.
fn label_positions(instrs: &[Instr]) -> Vec<Option<usize>> {
    let mut positions: Vec<Option<usize>> = Vec::new();
    for (pc, instr) in instrs.iter().enumerate() {
        if let Instr::Mark(label) = instr {
            let slot = label.raw() as usize;
            if positions.len() <= slot {
                positions.resize(slot + 1, None);
            }
            positions[slot] = Some(pc);
        }
    }
    positions
}

fn resolve(labels: &[Option<usize>], label: Label, at: usize) -> Result<usize, VerifyError> {
    labels
        .get(label.raw() as usize)
        .copied()
        .flatten()
        .ok_or(VerifyError::UnknownLabel { at, label })
}

fn check_operands(
    instr: &Instr,
    at: usize,
    body: &LoweredBody,
    arg_slots: u32,
) -> Result<(), VerifyError> {
    match instr {
        Instr::LdArg(slot) | Instr::StArg(slot) if *slot >= arg_slots => {
            Err(VerifyError::ArgumentOutOfRange {
                at,
                slot: *slot,
                slots: arg_slots,
            })
        }
        Instr::LdLoc(local) | Instr::StLoc(local) if local.index() >= body.locals.len() => {
            Err(VerifyError::UnknownLocal {
                at,
                local: local.raw(),
            })
        }
        _ => Ok(()),
    }
}
