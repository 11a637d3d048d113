//! IR→MIPS32 emission: frame layout and per-instruction code selection.
//!
//! Each function's frame follows the classic SPIM calling convention: the
//! caller leaves arguments in `$a0..$a3` and reserves four outgoing slots at
//! the bottom of its own frame; the callee stores `$ra`/`$fp`, points `$fp`
//! at the caller's stack top, and drops `$sp` by its frame size. Formals
//! then sit at non-negative offsets from `$fp`, locals and temporaries at
//! negative ones.
//!
//! Instruction selection uses `$t0` as the destination scratch register and
//! `$t1`/`$t2` as source scratch, loading operands from and storing results
//! to their frame slots around every pseudo-instruction.

use crate::ir::{Instruction, IrFunction, IrProgram};
use crate::semantics::{SymbolTable, Type};
use crate::util::re_escape;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use thiserror::Error;

const RETURN_ADDRESS: &str = "saved_return_address";
const FRAME_POINTER: &str = "saved_frame_pointer";

// Fixed reservation for outgoing call arguments.
const NUM_CALL_ARG_SLOTS: i32 = 4;

#[derive(Debug, PartialEq, Error)]
#[error("{message}")]
pub struct EmitterError {
    pub message: String,
}

pub fn emit(ir: IrProgram, output_filename: PathBuf) -> Result<(), EmitterError> {
    log::info!("Emitting output file: {}", output_filename.display());

    let file = File::create(&output_filename).map_err(|e| EmitterError {
        message: format!("{e} while writing to {}", output_filename.display()),
    })?;
    let mut writer = BufWriter::new(file);

    write_out(ir, &mut writer).map_err(|e| EmitterError {
        message: format!("{e} while writing to {}", output_filename.display()),
    })?;

    Ok(())
}

pub fn write_out<W: Write>(mut ir: IrProgram, writer: &mut BufWriter<W>) -> io::Result<()> {
    writeln!(writer, "\t.data")?;
    for (label, text) in ir.globals.strings() {
        writeln!(writer, "{label}:")?;
        writeln!(writer, "\t.asciiz \"{}\"", re_escape(text))?;
    }

    writeln!(writer, "\t.text")?;
    writeln!(writer, "\t.globl main")?;
    write_function(&mut ir.main, writer)?;
    for function in &mut ir.definitions {
        write_function(function, writer)?;
    }

    writer.flush()?;

    Ok(())
}

fn write_function<W: Write>(function: &mut IrFunction, writer: &mut W) -> io::Result<()> {
    layout_frame(&mut function.symbols);
    for instruction in &function.code {
        write_instruction(instruction, &function.symbols, writer)?;
    }
    Ok(())
}

/// Assigns every name in the table its frame slot and fixes the frame size.
///
/// Formals are addressed upward from `$fp` (they live in the caller's
/// outgoing-argument area); locals and temporaries go downward. The two
/// saved-register slots are reserved as ordinary locals before offsets are
/// assigned, so they land right after the real locals.
fn layout_frame(symbols: &mut SymbolTable) {
    symbols.add_local(RETURN_ADDRESS.to_string(), Type::Int);
    symbols.add_local(FRAME_POINTER.to_string(), Type::Int);

    let num_locals = symbols.locals().len() as i32;
    let mut frame_size = 4 * (num_locals + NUM_CALL_ARG_SLOTS + 2);
    if frame_size % 8 != 0 {
        frame_size += 4;
    }

    let formals = symbols.formals().to_vec();
    for (i, name) in formals.iter().enumerate() {
        symbols.set_frame_offset(name, i as i32 * 4);
    }

    let locals = symbols.locals().to_vec();
    let mut offset = -4;
    for name in &locals {
        symbols.set_frame_offset(name, offset);
        offset -= 4;
    }

    symbols.set_frame_size(frame_size);
}

fn write_instruction<W: Write>(
    instruction: &Instruction,
    symbols: &SymbolTable,
    w: &mut W,
) -> io::Result<()> {
    match instruction {
        Instruction::Enter => {
            let ra_slot = symbols.frame_offset(RETURN_ADDRESS);
            let fp_slot = symbols.frame_offset(FRAME_POINTER);
            writeln!(w, "\tsw $ra,{ra_slot}($sp)")?;
            writeln!(w, "\tsw $fp,{fp_slot}($sp)")?;
            writeln!(w, "\tmove $fp, $sp")?;
            writeln!(w, "\taddi $sp,$sp,-{}", symbols.frame_size())?;
            for (i, formal) in symbols.formals().iter().enumerate() {
                let slot = symbols.frame_offset(formal);
                writeln!(w, "\tsw $a{i},{slot}($fp)")?;
            }
            Ok(())
        }

        Instruction::Leave => {
            let ra_slot = symbols.frame_offset(RETURN_ADDRESS);
            let fp_slot = symbols.frame_offset(FRAME_POINTER);
            writeln!(w, "\tlw $ra,{ra_slot}($fp)")?;
            writeln!(w, "\tlw $fp,{fp_slot}($fp)")?;
            writeln!(w, "\taddi $sp,$sp,{}", symbols.frame_size())?;
            writeln!(w, "\tjr $ra")
        }

        Instruction::Set { dst, value } => {
            writeln!(w, "\tli $t0,{value}")?;
            writeln!(w, "\tsw $t0,{}($fp)", symbols.frame_offset(dst))
        }

        Instruction::SetLabel { dst, label } => {
            writeln!(w, "\tla $t0,{label}")?;
            writeln!(w, "\tsw $t0,{}($fp)", symbols.frame_offset(dst))
        }

        Instruction::Move { dst, src } => {
            writeln!(w, "\tlw $t1,{}($fp)", symbols.frame_offset(src))?;
            writeln!(w, "\tmove $t0,$t1")?;
            writeln!(w, "\tsw $t0,{}($fp)", symbols.frame_offset(dst))
        }

        Instruction::Add { dst, src1, src2 } => {
            writeln!(w, "\tlw $t1,{}($fp)", symbols.frame_offset(src1))?;
            writeln!(w, "\tlw $t2,{}($fp)", symbols.frame_offset(src2))?;
            writeln!(w, "\tadd $t0,$t1,$t2")?;
            writeln!(w, "\tsw $t0,{}($fp)", symbols.frame_offset(dst))
        }

        Instruction::Sub { dst, src1, src2 } => {
            writeln!(w, "\tlw $t1,{}($fp)", symbols.frame_offset(src1))?;
            writeln!(w, "\tlw $t2,{}($fp)", symbols.frame_offset(src2))?;
            writeln!(w, "\tsub $t0,$t1,$t2")?;
            writeln!(w, "\tsw $t0,{}($fp)", symbols.frame_offset(dst))
        }

        Instruction::Mult { dst, src1, src2 } => {
            writeln!(w, "\tlw $t1,{}($fp)", symbols.frame_offset(src1))?;
            writeln!(w, "\tlw $t2,{}($fp)", symbols.frame_offset(src2))?;
            writeln!(w, "\tmult $t1,$t2")?;
            writeln!(w, "\tmflo $t0")?;
            writeln!(w, "\tsw $t0,{}($fp)", symbols.frame_offset(dst))
        }

        Instruction::Div { dst, src1, src2 } => {
            writeln!(w, "\tlw $t1,{}($fp)", symbols.frame_offset(src1))?;
            writeln!(w, "\tlw $t2,{}($fp)", symbols.frame_offset(src2))?;
            writeln!(w, "\tdiv $t1,$t2")?;
            writeln!(w, "\tmflo $t0")?;
            writeln!(w, "\tsw $t0,{}($fp)", symbols.frame_offset(dst))
        }

        Instruction::Mod { dst, src1, src2 } => {
            writeln!(w, "\tlw $t1,{}($fp)", symbols.frame_offset(src1))?;
            writeln!(w, "\tlw $t2,{}($fp)", symbols.frame_offset(src2))?;
            writeln!(w, "\tdiv $t1,$t2")?;
            writeln!(w, "\tmfhi $t0")?;
            writeln!(w, "\tsw $t0,{}($fp)", symbols.frame_offset(dst))
        }

        Instruction::Nop => writeln!(w, "\tnop"),

        Instruction::Label(label) => writeln!(w, "{label}:"),

        Instruction::Jump(label) => writeln!(w, "\tj {label}"),

        Instruction::BranchCompare {
            condition,
            src1,
            src2,
            if_true,
            if_false,
        } => {
            writeln!(w, "\tlw $t1,{}($fp)", symbols.frame_offset(src1))?;
            writeln!(w, "\tlw $t2,{}($fp)", symbols.frame_offset(src2))?;
            writeln!(w, "\tb{} $t1,$t2,{if_true}", condition.mnemonic())?;
            writeln!(w, "\tj {if_false}")
        }

        Instruction::BranchZero {
            condition,
            src,
            if_true,
            if_false,
        } => {
            writeln!(w, "\tlw $t1,{}($fp)", symbols.frame_offset(src))?;
            writeln!(w, "\tb{} $t1,{if_true}", condition.mnemonic())?;
            writeln!(w, "\tj {if_false}")
        }

        Instruction::Arg { index, src } => {
            writeln!(w, "\tlw $a{index},{}($fp)", symbols.frame_offset(src))
        }

        Instruction::Call(label) => writeln!(w, "\tjal {label}"),

        Instruction::ReturnValue { dst } => {
            writeln!(w, "\tmove $t0,$v0")?;
            writeln!(w, "\tsw $t0,{}($fp)", symbols.frame_offset(dst))
        }

        Instruction::Return { src } => {
            writeln!(w, "\tlw $v0,{}($fp)", symbols.frame_offset(src))
        }

        Instruction::GetInt { dst } => {
            writeln!(w, "\tli $v0,5")?;
            writeln!(w, "\tsyscall")?;
            writeln!(w, "\tsw $v0,{}($fp)", symbols.frame_offset(dst))
        }

        Instruction::PutInt { src } => {
            writeln!(w, "\tlw $a0,{}($fp)", symbols.frame_offset(src))?;
            writeln!(w, "\tli $v0,1")?;
            writeln!(w, "\tsyscall")
        }

        Instruction::PutString { src } => {
            writeln!(w, "\tli $v0,4")?;
            writeln!(w, "\tlw $a0,{}($fp)", symbols.frame_offset(src))?;
            writeln!(w, "\tsyscall")
        }

        Instruction::Comment(message) => writeln!(w, "\t\t\t\t#{message}"),
    }
}
