//! A small stack machine for evaluating integer-variable guards and
//! statements over a flat intvar array. Clock guards/resets are expressed
//! directly against DBM clock indices by the TS layers (`src/ts.rs`) and do
//! not go through this VM; this module only covers the discrete (integer)
//! part of a model's guards and statements.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::IntVarId;

/// A single bytecode instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instr {
    /// Push a literal constant.
    PushConst(i64),
    /// Push the current value of integer variable `id`.
    PushVar(IntVarId),
    /// Store the top of stack into integer variable `id`, popping it.
    StoreVar(IntVarId),
    Add,
    Sub,
    Mul,
    Neg,
    /// Pop two, push `1` if `a < b` else `0`.
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
    /// Pop two, push `1` if both are non-zero.
    And,
    /// Pop two, push `1` if either is non-zero.
    Or,
    /// Pop one, push `1` if zero else `0`.
    Not,
}

/// A sequence of instructions, evaluated left to right against a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub instrs: Vec<Instr>,
}

/// Errors raised while evaluating a [`Program`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BytecodeError {
    #[error("stack underflow evaluating instruction {0:?}")]
    StackUnderflow(Instr),
    #[error("program left {0} values on the stack, expected exactly 1")]
    BadFinalStackDepth(usize),
    #[error("integer variable {0} out of range")]
    IntVarOutOfRange(IntVarId),
}

type Result<T> = std::result::Result<T, BytecodeError>;

impl Program {
    /// Evaluates this program as a guard: runs it and interprets the single
    /// value left on the stack as a boolean (nonzero = true). `vars` is read
    /// and, for statements that assign, mutated in place.
    pub fn eval_guard(&self, vars: &[i64]) -> Result<bool> {
        let mut scratch = vars.to_vec();
        let v = self.eval(&mut scratch)?;
        Ok(v != 0)
    }

    /// Runs this program as a statement: mutates `vars` in place via any
    /// `StoreVar` instructions, discarding the final stack value (statements
    /// are not required to leave exactly one value, unlike guards).
    pub fn eval_statement(&self, vars: &mut [i64]) -> Result<()> {
        let mut stack: Vec<i64> = Vec::new();
        for instr in &self.instrs {
            self.step(*instr, &mut stack, vars)?;
        }
        Ok(())
    }

    fn eval(&self, vars: &mut [i64]) -> Result<i64> {
        let mut stack: Vec<i64> = Vec::new();
        for instr in &self.instrs {
            self.step(*instr, &mut stack, vars)?;
        }
        if stack.len() != 1 {
            return Err(BytecodeError::BadFinalStackDepth(stack.len()));
        }
        Ok(stack[0])
    }

    fn step(&self, instr: Instr, stack: &mut Vec<i64>, vars: &mut [i64]) -> Result<()> {
        let pop1 = |stack: &mut Vec<i64>| stack.pop().ok_or(BytecodeError::StackUnderflow(instr));
        match instr {
            Instr::PushConst(k) => stack.push(k),
            Instr::PushVar(id) => {
                let v = *vars.get(id).ok_or(BytecodeError::IntVarOutOfRange(id))?;
                stack.push(v);
            }
            Instr::StoreVar(id) => {
                let v = pop1(stack)?;
                let slot = vars.get_mut(id).ok_or(BytecodeError::IntVarOutOfRange(id))?;
                *slot = v;
            }
            Instr::Add => {
                let b = pop1(stack)?;
                let a = pop1(stack)?;
                stack.push(a + b);
            }
            Instr::Sub => {
                let b = pop1(stack)?;
                let a = pop1(stack)?;
                stack.push(a - b);
            }
            Instr::Mul => {
                let b = pop1(stack)?;
                let a = pop1(stack)?;
                stack.push(a * b);
            }
            Instr::Neg => {
                let a = pop1(stack)?;
                stack.push(-a);
            }
            Instr::Lt => {
                let b = pop1(stack)?;
                let a = pop1(stack)?;
                stack.push((a < b) as i64);
            }
            Instr::Le => {
                let b = pop1(stack)?;
                let a = pop1(stack)?;
                stack.push((a <= b) as i64);
            }
            Instr::Eq => {
                let b = pop1(stack)?;
                let a = pop1(stack)?;
                stack.push((a == b) as i64);
            }
            Instr::Ne => {
                let b = pop1(stack)?;
                let a = pop1(stack)?;
                stack.push((a != b) as i64);
            }
            Instr::Gt => {
                let b = pop1(stack)?;
                let a = pop1(stack)?;
                stack.push((a > b) as i64);
            }
            Instr::Ge => {
                let b = pop1(stack)?;
                let a = pop1(stack)?;
                stack.push((a >= b) as i64);
            }
            Instr::And => {
                let b = pop1(stack)?;
                let a = pop1(stack)?;
                stack.push(((a != 0) && (b != 0)) as i64);
            }
            Instr::Or => {
                let b = pop1(stack)?;
                let a = pop1(stack)?;
                stack.push(((a != 0) || (b != 0)) as i64);
            }
            Instr::Not => {
                let a = pop1(stack)?;
                stack.push((a == 0) as i64);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_true_constant() {
        let p = Program { instrs: vec![Instr::PushConst(1)] };
        assert!(p.eval_guard(&[]).unwrap());
    }

    #[test]
    fn guard_compares_variable_to_constant() {
        let p = Program {
            instrs: vec![Instr::PushVar(0), Instr::PushConst(3), Instr::Ge],
        };
        assert!(p.eval_guard(&[3]).unwrap());
        assert!(!p.eval_guard(&[2]).unwrap());
    }

    #[test]
    fn statement_increments_variable() {
        let p = Program {
            instrs: vec![Instr::PushVar(0), Instr::PushConst(1), Instr::Add, Instr::StoreVar(0)],
        };
        let mut vars = vec![5];
        p.eval_statement(&mut vars).unwrap();
        assert_eq!(vars[0], 6);
    }

    #[test]
    fn stack_underflow_is_reported() {
        let p = Program { instrs: vec![Instr::Add] };
        assert!(matches!(p.eval_statement(&mut []), Err(BytecodeError::StackUnderflow(_))));
    }

    #[test]
    fn bad_final_stack_depth_rejected_for_guards() {
        let p = Program { instrs: vec![Instr::PushConst(1), Instr::PushConst(2)] };
        assert_eq!(p.eval_guard(&[]), Err(BytecodeError::BadFinalStackDepth(2)));
    }
}
