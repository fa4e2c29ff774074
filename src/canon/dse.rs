//! Pass 3: dead-store elimination
//!
//! Two analyses alternate until neither removes anything:
//!
//! - **relevance**: a variable is relevant when its value can reach a
//!   `return`, a branch or loop condition, or a call argument, directly or
//!   through assignments to other relevant variables. Address-taken variables
//!   are always relevant. Assignments to irrelevant variables go away (calls
//!   in their right-hand side stay as statements). This is what removes
//!   auxiliary variables that only feed each other around a loop.
//! - **liveness**: backward liveness over the structured body, with loops
//!   iterated to a fixed point. An assignment whose target is dead afterwards
//!   goes away.
//!
//! Afterwards pure expression statements and declarations of variables that
//! are no longer mentioned are dropped.

use super::{map_functions, rewrite_blocks, CanonicalizationError, Function};
use crate::engine::CompareOptions;
use crate::parser::ast::*;
use rustc_hash::FxHashSet;
use tracing::debug;

type VarSet = FxHashSet<String>;

pub fn run(program: Program, options: &CompareOptions) -> Result<Program, CanonicalizationError> {
    let cap = options.max_fixed_point_iterations;
    map_functions(program, |function| eliminate(function, cap))
}

fn eliminate(function: Function, cap: usize) -> Result<Function, CanonicalizationError> {
    let cap_exceeded = |function: &Function| CanonicalizationError::FixedPointCapExceeded {
        pass: "dead-store elimination",
        function: function.name.clone(),
        limit: cap,
    };

    let mut pinned = VarSet::default();
    for stmt in &function.body {
        collect_address_taken(stmt, &mut pinned);
    }

    let mut body = function.body.clone();
    let mut removed = 0;
    let mut iterations = 0;
    loop {
        let relevant =
            relevant_variables(&body, &pinned, cap).ok_or_else(|| cap_exceeded(&function))?;
        let mut round = 0;
        body = remove_irrelevant(body, &relevant, &mut round);
        body = remove_dead(body, &VarSet::default(), &pinned, &mut round);

        removed += round;
        iterations += 1;
        if round == 0 {
            break;
        }
        if iterations >= cap {
            return Err(cap_exceeded(&function));
        }
    }

    let body = drop_unused_declarations(drop_pure_statements(body));

    debug!(function = %function.name, removed, iterations, "eliminated dead stores");
    Ok(Function { body, ..function })
}

// ===== Relevance =====

/// Variables whose value can reach an observable effect, or `None` when the
/// propagation does not settle within `cap` rounds.
fn relevant_variables(body: &[AstNode], pinned: &VarSet, cap: usize) -> Option<VarSet> {
    let mut relevant = pinned.clone();
    let mut assignments = Vec::new();
    for stmt in body {
        collect_roots(stmt, &mut relevant, &mut assignments);
    }

    for _ in 0..cap.max(1) {
        let mut changed = false;
        for (target, reads) in &assignments {
            if relevant.contains(*target) {
                for name in reads {
                    changed |= relevant.insert(name.clone());
                }
            }
        }
        if !changed {
            return Some(relevant);
        }
    }
    None
}

/// Seed `relevant` with directly observed variables and list every
/// assignment as `(target, reads of the value)`.
fn collect_roots<'a>(
    node: &'a AstNode,
    relevant: &mut VarSet,
    assignments: &mut Vec<(&'a str, VarSet)>,
) {
    match node {
        AstNode::Assign { target, value, .. } => {
            assignments.push((target.as_str(), value.reads()));
            collect_roots(value, relevant, assignments);
        }
        AstNode::Return { value, .. } => {
            if let Some(value) = value {
                value.collect_reads(relevant);
                collect_roots(value, relevant, assignments);
            }
        }
        AstNode::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            condition.collect_reads(relevant);
            collect_roots(condition, relevant, assignments);
            collect_roots(then_branch, relevant, assignments);
            if let Some(else_branch) = else_branch {
                collect_roots(else_branch, relevant, assignments);
            }
        }
        AstNode::ForLoop {
            init,
            condition,
            step,
            body,
            ..
        } => {
            if let Some(condition) = condition {
                condition.collect_reads(relevant);
                collect_roots(condition, relevant, assignments);
            }
            for part in [init, step].into_iter().flatten() {
                collect_roots(part, relevant, assignments);
            }
            collect_roots(body, relevant, assignments);
        }
        AstNode::Call { args, .. } => {
            for arg in args {
                arg.collect_reads(relevant);
                collect_roots(arg, relevant, assignments);
            }
        }
        AstNode::Block { statements, .. } => {
            for stmt in statements {
                collect_roots(stmt, relevant, assignments);
            }
        }
        AstNode::BinaryOp { left, right, .. } => {
            collect_roots(left, relevant, assignments);
            collect_roots(right, relevant, assignments);
        }
        AstNode::UnaryOp { operand, .. } => collect_roots(operand, relevant, assignments),
        AstNode::VarDecl { init, .. } => {
            if let Some(init) = init {
                collect_roots(init, relevant, assignments);
            }
        }
        AstNode::FunctionDecl { body, .. } => collect_roots(body, relevant, assignments),
        AstNode::Literal(..) | AstNode::Identifier(..) => {}
    }
}

fn collect_address_taken(node: &AstNode, out: &mut VarSet) {
    match node {
        AstNode::UnaryOp {
            op: UnOp::AddrOf,
            operand,
            ..
        } => operand.collect_reads(out),
        AstNode::UnaryOp { operand, .. } => collect_address_taken(operand, out),
        AstNode::BinaryOp { left, right, .. } => {
            collect_address_taken(left, out);
            collect_address_taken(right, out);
        }
        AstNode::Assign { value, .. } => collect_address_taken(value, out),
        AstNode::Call { args, .. } => args.iter().for_each(|a| collect_address_taken(a, out)),
        AstNode::Return { value, .. } => {
            value.iter().for_each(|v| collect_address_taken(v, out));
        }
        AstNode::VarDecl { init, .. } => init.iter().for_each(|i| collect_address_taken(i, out)),
        AstNode::Block { statements, .. } => {
            statements.iter().for_each(|s| collect_address_taken(s, out));
        }
        AstNode::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            collect_address_taken(condition, out);
            collect_address_taken(then_branch, out);
            else_branch.iter().for_each(|e| collect_address_taken(e, out));
        }
        AstNode::ForLoop {
            init,
            condition,
            step,
            body,
            ..
        } => {
            for part in [init, condition, step].into_iter().flatten() {
                collect_address_taken(part, out);
            }
            collect_address_taken(body, out);
        }
        AstNode::FunctionDecl { body, .. } => collect_address_taken(body, out),
        AstNode::Literal(..) | AstNode::Identifier(..) => {}
    }
}

/// Calls inside `expr`, outermost first, in evaluation order. These are what
/// survives when the assignment holding `expr` is removed.
fn calls_of(expr: AstNode, out: &mut Vec<AstNode>) {
    match expr {
        call @ AstNode::Call { .. } => out.push(call),
        AstNode::BinaryOp { left, right, .. } => {
            calls_of(*left, out);
            calls_of(*right, out);
        }
        AstNode::UnaryOp { operand, .. } => calls_of(*operand, out),
        AstNode::Assign { value, .. } => calls_of(*value, out),
        _ => {}
    }
}

/// What remains of the assignment `stmt` once its store is dropped.
fn strip_store(stmt: AstNode) -> Vec<AstNode> {
    let mut calls = Vec::new();
    if let AstNode::Assign { value, .. } = stmt {
        calls_of(*value, &mut calls);
    }
    calls
}

fn block_statements(node: AstNode) -> (Vec<AstNode>, SourceLocation) {
    let location = node.location();
    match node {
        AstNode::Block { statements, .. } => (statements, location),
        other => (vec![other], location),
    }
}

/// Rebuild a loop whose init and step may have lost their stores.
///
/// A stripped init runs once before the loop; a stripped step that still has
/// several calls moves to the end of the body.
#[allow(clippy::too_many_arguments)]
fn rebuild_loop(
    init: Option<AstNode>,
    drop_init: bool,
    condition: Option<Box<AstNode>>,
    step: Option<AstNode>,
    drop_step: bool,
    mut body: Vec<AstNode>,
    body_location: SourceLocation,
    location: SourceLocation,
    out: &mut Vec<AstNode>,
) {
    let init = match init {
        Some(init) if drop_init => {
            out.extend(strip_store(init));
            None
        }
        other => other,
    };
    let step = match step {
        Some(step) if drop_step => {
            let mut calls = strip_store(step);
            if calls.len() == 1 {
                calls.pop()
            } else {
                body.extend(calls);
                None
            }
        }
        other => other,
    };
    out.push(AstNode::ForLoop {
        init: init.map(Box::new),
        condition,
        step: step.map(Box::new),
        body: Box::new(AstNode::block(body, body_location)),
        location,
    });
}

fn is_irrelevant_store(stmt: &AstNode, relevant: &VarSet) -> bool {
    matches!(stmt, AstNode::Assign { target, .. } if !relevant.contains(target))
}

fn remove_irrelevant(body: Vec<AstNode>, relevant: &VarSet, removed: &mut usize) -> Vec<AstNode> {
    let mut out = Vec::with_capacity(body.len());
    for stmt in body {
        match stmt {
            AstNode::Assign { .. } if is_irrelevant_store(&stmt, relevant) => {
                *removed += 1;
                out.extend(strip_store(stmt));
            }
            AstNode::If {
                condition,
                then_branch,
                else_branch,
                location,
            } => {
                let (then_stmts, then_loc) = block_statements(*then_branch);
                let then_stmts = remove_irrelevant(then_stmts, relevant, removed);
                let then_branch = AstNode::block(then_stmts, then_loc);
                let else_branch = else_branch.map(|e| {
                    let (stmts, loc) = block_statements(*e);
                    Box::new(AstNode::block(remove_irrelevant(stmts, relevant, removed), loc))
                });
                out.push(AstNode::If {
                    condition,
                    then_branch: Box::new(then_branch),
                    else_branch,
                    location,
                });
            }
            AstNode::ForLoop {
                init,
                condition,
                step,
                body,
                location,
            } => {
                let init = init.map(|i| *i);
                let step = step.map(|s| *s);
                let drop_init = init.as_ref().is_some_and(|i| is_irrelevant_store(i, relevant));
                let drop_step = step.as_ref().is_some_and(|s| is_irrelevant_store(s, relevant));
                *removed += usize::from(drop_init) + usize::from(drop_step);
                let (body, body_loc) = block_statements(*body);
                let body = remove_irrelevant(body, relevant, removed);
                rebuild_loop(
                    init,
                    drop_init,
                    condition,
                    step,
                    drop_step,
                    body,
                    body_loc,
                    location,
                    &mut out,
                );
            }
            AstNode::Block {
                statements,
                location,
            } => out.push(AstNode::block(
                remove_irrelevant(statements, relevant, removed),
                location,
            )),
            other => out.push(other),
        }
    }
    out
}

// ===== Liveness =====

fn live_before_seq(stmts: &[AstNode], after: &VarSet) -> VarSet {
    stmts
        .iter()
        .rev()
        .fold(after.clone(), |live, stmt| live_before(stmt, &live))
}

/// Variables live immediately before `stmt`, given those live after it.
fn live_before(stmt: &AstNode, after: &VarSet) -> VarSet {
    match stmt {
        AstNode::Assign { target, value, .. } => {
            let mut live = after.clone();
            live.remove(target);
            value.collect_reads(&mut live);
            live
        }
        // Nothing after a return is reached
        AstNode::Return { value, .. } => value.as_ref().map(|v| v.reads()).unwrap_or_default(),
        AstNode::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            let mut live = live_before_seq(then_branch.statements(), after);
            match else_branch {
                Some(e) => live.extend(live_before_seq(e.statements(), after)),
                None => live.extend(after.iter().cloned()),
            }
            condition.collect_reads(&mut live);
            live
        }
        AstNode::ForLoop {
            init,
            condition,
            step,
            body,
            ..
        } => {
            let head = loop_head(condition.as_deref(), step.as_deref(), body, after);
            match init {
                Some(init) => live_before(init, &head),
                None => head,
            }
        }
        AstNode::Block { statements, .. } => live_before_seq(statements, after),
        AstNode::VarDecl { .. } | AstNode::FunctionDecl { .. } => after.clone(),
        expr => {
            let mut live = after.clone();
            expr.collect_reads(&mut live);
            live
        }
    }
}

/// Variables live at the top of a loop (before its condition), computed as
/// the least fixed point of `H = reads(cond) ∪ after ∪ live(body; step; H)`.
fn loop_head(
    condition: Option<&AstNode>,
    step: Option<&AstNode>,
    body: &AstNode,
    after: &VarSet,
) -> VarSet {
    let mut base = after.clone();
    if let Some(condition) = condition {
        condition.collect_reads(&mut base);
    }

    let mut head = base.clone();
    loop {
        let after_body = match step {
            Some(step) => live_before(step, &head),
            None => head.clone(),
        };
        let mut next = base.clone();
        next.extend(live_before_seq(body.statements(), &after_body));
        // Sets only grow, so equal size means equal
        if next.len() == head.len() {
            return head;
        }
        head = next;
    }
}

fn is_dead_store(stmt: &AstNode, live_after: &VarSet, pinned: &VarSet) -> bool {
    matches!(
        stmt,
        AstNode::Assign { target, .. } if !live_after.contains(target) && !pinned.contains(target)
    )
}

/// Drop stores whose target is dead afterwards, walking `body` backwards.
fn remove_dead(
    body: Vec<AstNode>,
    after: &VarSet,
    pinned: &VarSet,
    removed: &mut usize,
) -> Vec<AstNode> {
    let mut live = after.clone();
    let mut reversed: Vec<AstNode> = Vec::with_capacity(body.len());

    for stmt in body.into_iter().rev() {
        let mut kept = Vec::new();
        match stmt {
            AstNode::Assign { .. } if is_dead_store(&stmt, &live, pinned) => {
                *removed += 1;
                kept.extend(strip_store(stmt));
            }
            AstNode::If {
                condition,
                then_branch,
                else_branch,
                location,
            } => {
                let (then_stmts, then_loc) = block_statements(*then_branch);
                let then_stmts = remove_dead(then_stmts, &live, pinned, removed);
                let then_branch = AstNode::block(then_stmts, then_loc);
                let else_branch = else_branch.map(|e| {
                    let (stmts, loc) = block_statements(*e);
                    Box::new(AstNode::block(remove_dead(stmts, &live, pinned, removed), loc))
                });
                kept.push(AstNode::If {
                    condition,
                    then_branch: Box::new(then_branch),
                    else_branch,
                    location,
                });
            }
            AstNode::ForLoop {
                init,
                condition,
                step,
                body,
                location,
            } => {
                let head = loop_head(condition.as_deref(), step.as_deref(), &body, &live);
                let init = init.map(|i| *i);
                let step = step.map(|s| *s);
                let after_body = match &step {
                    Some(step) => live_before(step, &head),
                    None => head.clone(),
                };
                let drop_init = init.as_ref().is_some_and(|i| is_dead_store(i, &head, pinned));
                let drop_step = step.as_ref().is_some_and(|s| is_dead_store(s, &head, pinned));
                *removed += usize::from(drop_init) + usize::from(drop_step);
                let (body, body_loc) = block_statements(*body);
                let body = remove_dead(body, &after_body, pinned, removed);
                rebuild_loop(
                    init,
                    drop_init,
                    condition,
                    step,
                    drop_step,
                    body,
                    body_loc,
                    location,
                    &mut kept,
                );
            }
            AstNode::Block {
                statements,
                location,
            } => kept.push(AstNode::block(
                remove_dead(statements, &live, pinned, removed),
                location,
            )),
            other => kept.push(other),
        }

        live = live_before_seq(&kept, &live);
        reversed.extend(kept.into_iter().rev());
    }

    reversed.reverse();
    reversed
}

// ===== Cleanup =====

fn is_pure_expression_statement(stmt: &AstNode) -> bool {
    matches!(
        stmt,
        AstNode::Literal(..)
            | AstNode::Identifier(..)
            | AstNode::BinaryOp { .. }
            | AstNode::UnaryOp { .. }
    ) && stmt.is_pure()
}

fn drop_pure_statements(body: Vec<AstNode>) -> Vec<AstNode> {
    rewrite_blocks(body, &mut |stmts: Vec<AstNode>| {
        stmts
            .into_iter()
            .filter(|s| !is_pure_expression_statement(s))
            .collect()
    })
}

/// Remove top-level declarations of variables no statement mentions.
fn drop_unused_declarations(body: Vec<AstNode>) -> Vec<AstNode> {
    let mut mentioned = VarSet::default();
    for stmt in body.iter().filter(|s| !matches!(s, AstNode::VarDecl { .. })) {
        stmt.collect_reads(&mut mentioned);
        stmt.collect_writes(&mut mentioned);
    }
    body.into_iter()
        .filter(|stmt| match stmt {
            AstNode::VarDecl { name, .. } => mentioned.contains(name),
            _ => true,
        })
        .collect()
}
