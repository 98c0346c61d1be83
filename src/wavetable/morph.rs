//! Linear morphing between tables
//!
//! Morph paths are blended per sample. No phase alignment happens here: two
//! anchors that are out of phase partially cancel in the middle of the path,
//! so callers wanting smooth timbre changes should morph aligned cycles
//! (extracted tables already start on an ascending zero crossing).

use ndarray::ArrayView1;
use super::table::{Stack, Table};
use crate::error::{WavetableError, Result};

/// Number of tables a chained morph over `stack_len` anchors produces
pub fn morph_count(stack_len: usize, num_steps: usize) -> usize {
    match stack_len {
        0 => 0,
        m => (m - 1) * (num_steps.saturating_sub(1)) + 1,
    }
}

fn check_steps(num_steps: usize) -> Result<()> {
    if num_steps < 2 {
        return Err(WavetableError::InvalidStepCount { steps: num_steps });
    }
    Ok(())
}

/// Morph path from `a` to `b`, both anchors included, `num_steps` tables long
pub fn morph(a: &Table, b: &Table, num_steps: usize) -> Result<Stack> {
    check_steps(num_steps)?;
    if a.len() != b.len() {
        return Err(WavetableError::TableSizeMismatch { expected: a.len(), found: b.len() });
    }

    let mut tables = Vec::with_capacity(num_steps);
    tables.push(a.clone());
    push_path(&mut tables, a, b, num_steps);
    Stack::new(tables)
}

/// Chained morph through every table of `stack`, sharing the anchors between
/// consecutive segments
pub fn morph_stack(stack: &Stack, num_steps: usize) -> Result<Stack> {
    check_steps(num_steps)?;
    if stack.len() == 1 {
        return Ok(stack.clone());
    }

    let mut tables = Vec::with_capacity(morph_count(stack.len(), num_steps));
    tables.push(stack[0].clone());
    for pair in stack.windows(2) {
        push_path(&mut tables, &pair[0], &pair[1], num_steps);
    }

    log::debug!(
        "Chained morph: {} anchors, {} steps per segment, {} tables",
        stack.len(), num_steps, tables.len()
    );
    Stack::new(tables)
}

// Steps 1..num_steps of the a→b path; the last one is an exact copy of `b`.
fn push_path(out: &mut Vec<Table>, a: &Table, b: &Table, num_steps: usize) {
    let from = ArrayView1::from(a.samples());
    let to = ArrayView1::from(b.samples());
    let last = num_steps - 1;

    for k in 1..last {
        let t = k as f32 / last as f32;
        let blended = &from * (1.0 - t) + &to * t;
        out.push(Table::from_raw(blended.to_vec()));
    }
    out.push(b.clone());
}
