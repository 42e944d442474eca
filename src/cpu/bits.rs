// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
//! The 0xCB-prefixed bit-manipulation instruction set.
//!
//! The prefixed opcode space is perfectly regular: bits 0-2 select the
//! operand (a register or the byte at (HL)), bits 3-5 the rotation kind
//! or bit index, bits 6-7 the operation group. Decoding it structurally
//! covers all 256 opcodes without a table.

use super::Cpu;
use super::alu::alu8;
use super::instructions::InsnResult;
use super::state::registers::*;

use crate::GameboyError;

/// The operand encoded in the opcode's low three bits.
enum Operand {
	/// One of the 8-bit registers.
	Reg(Register),
	/// The byte at the address held by HL.
	Mem,
}

impl Operand {
	fn from_bits(bits: u8) -> Operand {
		match bits & 0x07 {
			0 => Operand::Reg(Register::B),
			1 => Operand::Reg(Register::C),
			2 => Operand::Reg(Register::D),
			3 => Operand::Reg(Register::E),
			4 => Operand::Reg(Register::H),
			5 => Operand::Reg(Register::L),
			6 => Operand::Mem,
			_ => Operand::Reg(Register::A),
		}
	}

	fn read(&self, cpu: &mut Cpu) -> Result<u8, GameboyError> {
		match self {
			Operand::Reg(reg) => Ok(cpu.registers.get(*reg) as u8),
			Operand::Mem => cpu.mmap.read(cpu.registers.get(Register::HL)),
		}
	}

	fn write(&self, cpu: &mut Cpu, value: u8) -> Result<(), GameboyError> {
		match self {
			Operand::Reg(reg) => {
				cpu.registers.set(*reg, value as u16);
				Ok(())
			}
			Operand::Mem => cpu.mmap.write(cpu.registers.get(Register::HL), value),
		}
	}
}

/// Executes the given prefixed opcode and returns the cycles taken.
pub fn execute(cpu: &mut Cpu, opcode: u8) -> InsnResult {
	let operand = Operand::from_bits(opcode);
	let selector = (opcode >> 3) & 0x07;

	let value = operand.read(cpu)?;

	match opcode >> 6 {
		// Rotations, shifts and nibble swap.
		0 => {
			let result = match selector {
				0 => alu8::rlc(cpu, value),
				1 => alu8::rrc(cpu, value),
				2 => alu8::rl(cpu, value),
				3 => alu8::rr(cpu, value),
				4 => alu8::sla(cpu, value),
				5 => alu8::sra(cpu, value),
				6 => alu8::swap(cpu, value),
				_ => alu8::srl(cpu, value),
			};
			operand.write(cpu, result)?;
		}

		// bit b: only the flags are affected; a memory operand isn't
		// written back, which makes it the one cheaper (HL) form.
		1 => {
			alu8::bit(cpu, value, selector);

			return match operand {
				Operand::Mem => Ok(12),
				_ => Ok(8),
			};
		}

		// res b
		2 => {
			operand.write(cpu, value & !(1 << selector))?;
		}

		// set b
		_ => {
			operand.write(cpu, value | (1 << selector))?;
		}
	}

	match operand {
		Operand::Mem => Ok(16),
		_ => Ok(8),
	}
}

#[cfg(test)]
#[cfg(feature = "alloc")]
mod tests {
	use super::*;
	use super::super::tests::with_cpu;

	/// Executes a single prefixed opcode.
	fn execute_cb(cpu: &mut Cpu, opcode: u8) -> InsnResult {
		execute(cpu, opcode)
	}

	#[test]
	fn test_swap_register() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			cpu.registers.set(Register::A, 0xF1);

			// swap a
			assert_eq!(8, execute_cb(cpu, 0x37)?);
			assert_eq!(0x1F, cpu.registers.get(Register::A));
			assert!(!cpu.registers.flag(Flag::Z));

			Ok(())
		})
	}

	#[test]
	fn test_bit_test() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			cpu.registers.set(Register::H, 0x80);

			// bit 7, h
			execute_cb(cpu, 0x7C)?;
			assert!(!cpu.registers.flag(Flag::Z));
			assert!(cpu.registers.flag(Flag::H));
			assert!(!cpu.registers.flag(Flag::N));

			// bit 6, h
			execute_cb(cpu, 0x74)?;
			assert!(cpu.registers.flag(Flag::Z));

			Ok(())
		})
	}

	#[test]
	fn test_bit_preserves_carry() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			cpu.registers.set_flag(Flag::C, true);
			cpu.registers.set(Register::B, 0x01);

			// bit 0, b
			execute_cb(cpu, 0x40)?;
			assert!(cpu.registers.flag(Flag::C));

			Ok(())
		})
	}

	#[test]
	fn test_res_set_memory() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			cpu.registers.set(Register::HL, 0xC000);
			cpu.mmap.write(0xC000, 0xFF)?;

			// res 3, (hl)
			assert_eq!(16, execute_cb(cpu, 0x9E)?);
			assert_eq!(0xF7, cpu.mmap.read(0xC000)?);

			// set 3, (hl)
			assert_eq!(16, execute_cb(cpu, 0xDE)?);
			assert_eq!(0xFF, cpu.mmap.read(0xC000)?);

			Ok(())
		})
	}

	#[test]
	fn test_rl_through_carry() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			cpu.registers.set_flag(Flag::C, true);
			cpu.registers.set(Register::C, 0x00);

			// rl c
			execute_cb(cpu, 0x11)?;
			assert_eq!(0x01, cpu.registers.get(Register::C));
			assert!(!cpu.registers.flag(Flag::C));

			Ok(())
		})
	}

	#[test]
	fn test_srl_zero_flag() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			cpu.registers.set(Register::D, 0x01);

			// srl d
			execute_cb(cpu, 0x3A)?;
			assert_eq!(0x00, cpu.registers.get(Register::D));
			assert!(cpu.registers.flag(Flag::Z));
			assert!(cpu.registers.flag(Flag::C));

			Ok(())
		})
	}
}
