//! JVM opcodes and instruction length decoding (JVMS §6.5).
//!
//! Only the opcodes the event stream cares about get names; everything else
//! is handled by [`instruction_length`].

use crate::error::{Error, Result};

pub const ILOAD: u8 = 0x15;
pub const ALOAD: u8 = 0x19;
pub const ALOAD_0: u8 = 0x2a;
pub const ISTORE: u8 = 0x36;
pub const ASTORE: u8 = 0x3a;
pub const IINC: u8 = 0x84;
pub const IFEQ: u8 = 0x99;
pub const GOTO: u8 = 0xa7;
pub const JSR: u8 = 0xa8;
pub const RET: u8 = 0xa9;
pub const TABLESWITCH: u8 = 0xaa;
pub const LOOKUPSWITCH: u8 = 0xab;
pub const IRETURN: u8 = 0xac;
pub const ARETURN: u8 = 0xb0;
pub const RETURN: u8 = 0xb1;
pub const GETSTATIC: u8 = 0xb2;
pub const PUTFIELD: u8 = 0xb5;
pub const INVOKEVIRTUAL: u8 = 0xb6;
pub const INVOKESPECIAL: u8 = 0xb7;
pub const INVOKESTATIC: u8 = 0xb8;
pub const INVOKEINTERFACE: u8 = 0xb9;
pub const INVOKEDYNAMIC: u8 = 0xba;
pub const NEW: u8 = 0xbb;
pub const NEWARRAY: u8 = 0xbc;
pub const ANEWARRAY: u8 = 0xbd;
pub const CHECKCAST: u8 = 0xc0;
pub const INSTANCEOF: u8 = 0xc1;
pub const WIDE: u8 = 0xc4;
pub const MULTIANEWARRAY: u8 = 0xc5;
pub const IFNULL: u8 = 0xc6;
pub const IFNONNULL: u8 = 0xc7;
pub const GOTO_W: u8 = 0xc8;
pub const JSR_W: u8 = 0xc9;

/// Length in bytes of the instruction starting at `code[pc]`.
///
/// `pc` is relative to the start of the method's code array, which matters
/// for the 4-byte alignment padding of `tableswitch` and `lookupswitch`.
pub fn instruction_length(code: &[u8], pc: usize) -> Result<usize> {
    let opcode = *code.get(pc).ok_or(Error::TruncatedInstruction(pc))?;
    let len = match opcode {
        // bipush, ldc, newarray and the local-variable loads/stores
        0x10 | 0x12 | NEWARRAY | RET => 2,
        ILOAD..=ALOAD | ISTORE..=ASTORE => 2,
        // sipush, ldc_w, ldc2_w
        0x11 | 0x13 | 0x14 => 3,
        IINC => 3,
        IFEQ..=JSR | IFNULL | IFNONNULL => 3,
        GETSTATIC..=INVOKESTATIC => 3,
        NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => 3,
        MULTIANEWARRAY => 4,
        INVOKEINTERFACE | INVOKEDYNAMIC | GOTO_W | JSR_W => 5,
        WIDE => {
            let modified = *code.get(pc + 1).ok_or(Error::TruncatedInstruction(pc))?;
            match modified {
                IINC => 6,
                ILOAD..=ALOAD | ISTORE..=ASTORE | RET => 4,
                _ => {
                    return Err(Error::InvalidOpcode {
                        opcode: modified,
                        offset: pc + 1,
                    });
                }
            }
        }
        TABLESWITCH => {
            let base = switch_operands(pc);
            let low = read_i32(code, base + 4, pc)?;
            let high = read_i32(code, base + 8, pc)?;
            if high < low {
                return Err(Error::InvalidOpcode { opcode, offset: pc });
            }
            let entries = (high as i64 - low as i64 + 1) as usize;
            base - pc + 12 + entries * 4
        }
        LOOKUPSWITCH => {
            let base = switch_operands(pc);
            let npairs = read_i32(code, base + 4, pc)?;
            if npairs < 0 {
                return Err(Error::InvalidOpcode { opcode, offset: pc });
            }
            base - pc + 8 + npairs as usize * 8
        }
        0x00..=0x0f | 0x1a..=0x35 | 0x3b..=0x83 | 0x85..=0x98 | IRETURN..=RETURN => 1,
        // arraylength, athrow, monitorenter, monitorexit
        0xbe | 0xbf | 0xc2 | 0xc3 => 1,
        _ => return Err(Error::InvalidOpcode { opcode, offset: pc }),
    };
    if pc + len > code.len() {
        return Err(Error::TruncatedInstruction(pc));
    }
    Ok(len)
}

/// Offset of the first switch operand after alignment padding.
fn switch_operands(pc: usize) -> usize {
    (pc + 4) & !3
}

fn read_i32(code: &[u8], at: usize, pc: usize) -> Result<i32> {
    code.get(at..at + 4)
        .map(|b| i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(Error::TruncatedInstruction(pc))
}
