// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
//! Implementation of the LR35902's primary instruction set.
//!
//! Every defined primary opcode has a function here; the 0xCB-prefixed
//! opcodes live in the `bits` module. Cycle counts follow the DMG opcode
//! timing table, with conditional branches charging their penalty only
//! when taken.

use super::Cpu;
use super::alu::*;
use super::bits;
use super::state::registers::*;

use crate::GameboyError;

/// Instruction implementations return the amount of cycles taken,
/// or the relevant error if occurred.
pub type InsnResult = Result<usize, GameboyError>;
/// An instruction's method.
pub type Instruction = fn(&mut Cpu) -> InsnResult;

/// Internal utilities for implementing repeating logic once.
mod util {
	use super::*;

	/// Loads an 8-bit immediate into the given register.
	pub fn load_imm8_to_register(cpu: &mut Cpu,
								 reg: Register) -> InsnResult {
		assert!(get_type(&reg) != RegisterType::Wide);

		let value: u8 = cpu.fetch()?;
		cpu.registers.set(reg, value as u16);

		Ok(8)
	}

	/// Loads a 16-bit immediate into the given register.
	pub fn load_imm16_to_register(cpu: &mut Cpu,
								  reg: Register) -> InsnResult {
		assert!(get_type(&reg) == RegisterType::Wide);

		let value: u16 = cpu.fetch()?;
		cpu.registers.set(reg, value);

		Ok(12)
	}

	/// Moves the source register to the destination.
	pub fn move_registers(cpu: &mut Cpu,
						  dst: Register,
						  src: Register) -> InsnResult {
		assert!((get_type(&src) == RegisterType::Wide) ==
				(get_type(&dst) == RegisterType::Wide));

		let value = cpu.registers.get(src);
		cpu.registers.set(dst, value);

		// Wide registers moves are twice as long as short ones.
		if get_type(&dst) == RegisterType::Wide {
			Ok(8)
		} else {
			Ok(4)
		}
	}

	/// Reads the memory at the address held by `mem` and stores the value
	/// to the given register.
	pub fn load_mem_to_register(cpu: &mut Cpu,
								reg: Register,
								mem: Register) -> InsnResult {
		assert!(get_type(&mem) == RegisterType::Wide);
		assert!(get_type(&reg) != RegisterType::Wide);

		let address = cpu.registers.get(mem);
		let value: u8 = cpu.mmap.read(address)?;
		cpu.registers.set(reg, value as u16);

		Ok(8)
	}

	/// Writes the given register's value to the memory at the address
	/// held by the given 16-bit `mem` register (eg. HL).
	pub fn store_register_into_mem(cpu: &mut Cpu,
								   mem: Register,
								   reg: Register) -> InsnResult {
		assert!(get_type(&mem) == RegisterType::Wide);
		assert!(get_type(&reg) != RegisterType::Wide);

		let value: u8 = cpu.registers.get(reg) as u8;
		let address = cpu.registers.get(mem);

		cpu.mmap.write(address, value)?;

		Ok(8)
	}

	/// Places a 16-bit register on the stack.
	///
	/// The stack pointer is decremented before each byte is written, so
	/// the word lands just below the caller's stack top.
	pub fn push_nn(cpu: &mut Cpu,
				   reg: Register) -> InsnResult {
		assert!(get_type(&reg) == RegisterType::Wide);

		let mut address: u16 = cpu.registers.get(Register::SP);
		let value: u16 = cpu.registers.get(reg);

		cpu.registers.set(Register::SP, address.wrapping_sub(2));

		address = address.wrapping_sub(1);
		cpu.mmap.write(address, ((value >> 8) & 0xFF) as u8)?;

		address = address.wrapping_sub(1);
		cpu.mmap.write(address, (value & 0xFF) as u8)?;

		Ok(16)
	}

	/// Pops a 16-bit register from the stack.
	pub fn pop_nn(cpu: &mut Cpu,
				  reg: Register) -> InsnResult {
		assert!(get_type(&reg) == RegisterType::Wide);

		let address: u16 = cpu.registers.get(Register::SP);

		let low = cpu.mmap.read(address)? as u16;
		let high = cpu.mmap.read(address.wrapping_add(1))? as u16;

		cpu.registers.set(reg, (high << 8) | low);

		cpu.registers.set(Register::SP, address.wrapping_add(2));

		Ok(12)
	}

	/// Performs an unconditional relative jump.
	pub fn jump_relative(cpu: &mut Cpu) -> InsnResult {
		let offset: i8 = cpu.fetch::<u8>()? as i8;
		let address: u16 = cpu.registers.get(Register::PC);

		// Add the offset to the program counter (preserving the offset's sign)
		cpu.registers.set(Register::PC, address.wrapping_add((offset as i16) as u16));

		Ok(12)
	}

	/// Performs a conditional relative jump.
	pub fn jump_relative_conditional(cpu: &mut Cpu,
									 flag: Flag,
									 expected_state: bool) -> InsnResult {
		let offset: i8 = cpu.fetch::<u8>()? as i8;
		let address: u16 = cpu.registers.get(Register::PC);

		if cpu.registers.flag(flag) == expected_state {
			cpu.registers.set(Register::PC, address.wrapping_add((offset as i16) as u16));
			return Ok(12);
		}

		Ok(8)
	}

	/// Performs a conditional absolute jump.
	pub fn jump_conditional(cpu: &mut Cpu,
							flag: Flag,
							expected_state: bool) -> InsnResult {
		let dest: u16 = cpu.fetch()?;

		if cpu.registers.flag(flag) == expected_state {
			cpu.registers.set(Register::PC, dest);
			return Ok(16);
		}

		Ok(12)
	}

	/// Performs a conditional call.
	pub fn call_conditional(cpu: &mut Cpu,
							flag: Flag,
							expected_state: bool) -> InsnResult {
		let dest: u16 = cpu.fetch()?;

		if cpu.registers.flag(flag) == expected_state {
			push_nn(cpu, Register::PC)?;
			cpu.registers.set(Register::PC, dest);
			return Ok(24);
		}

		Ok(12)
	}

	/// Performs a conditional return.
	pub fn ret_conditional(cpu: &mut Cpu,
						   flag: Flag,
						   expected_state: bool) -> InsnResult {
		if cpu.registers.flag(flag) == expected_state {
			pop_nn(cpu, Register::PC)?;
			return Ok(20);
		}

		Ok(8)
	}

	/// Calls one of the eight fixed restart vectors.
	pub fn restart(cpu: &mut Cpu, vector: u16) -> InsnResult {
		assert!(vector & !0x38 == 0);

		push_nn(cpu, Register::PC)?;
		cpu.registers.set(Register::PC, vector);

		Ok(16)
	}
}

use util::*;

/// Enter the given interrupt vector: the master enable latch is cleared,
/// the program counter is pushed and execution resumes at the vector.
pub fn enter_interrupt(cpu: &mut Cpu, int_vector: u16) -> InsnResult {
	assert!(int_vector & 0xFF00 == 0);

	push_nn(cpu, Register::PC)?;

	cpu.registers.set_ime(false);
	cpu.registers.set(Register::PC, int_vector);

	Ok(20)
}

/// nop
pub fn opcode_00(_cpu: &mut Cpu) -> InsnResult {
	Ok(4)
}

/// ld BC, nn
pub fn opcode_01(cpu: &mut Cpu) -> InsnResult {
	load_imm16_to_register(cpu, Register::BC)
}

/// ld (BC), A
pub fn opcode_02(cpu: &mut Cpu) -> InsnResult {
	store_register_into_mem(cpu, Register::BC, Register::A)
}

/// inc BC
pub fn opcode_03(cpu: &mut Cpu) -> InsnResult {
	alu16::inc_register(cpu, Register::BC)
}

/// inc B
pub fn opcode_04(cpu: &mut Cpu) -> InsnResult {
	alu8::inc_register(cpu, Register::B)
}

/// dec B
pub fn opcode_05(cpu: &mut Cpu) -> InsnResult {
	alu8::dec_register(cpu, Register::B)
}

/// ld B, n
pub fn opcode_06(cpu: &mut Cpu) -> InsnResult {
	load_imm8_to_register(cpu, Register::B)
}

/// rlca
pub fn opcode_07(cpu: &mut Cpu) -> InsnResult {
	let value: u8 = cpu.registers.get(Register::A) as u8;
	let result = alu8::rlc(cpu, value);

	cpu.registers.set(Register::A, result as u16);
	// The accumulator rotations always reset the zero flag.
	cpu.registers.set_flag(Flag::Z, false);

	Ok(4)
}

/// ld (nn), SP
pub fn opcode_08(cpu: &mut Cpu) -> InsnResult {
	let address: u16 = cpu.fetch()?;
	let value = cpu.registers.get(Register::SP);

	cpu.mmap.write(address, (value & 0xFF) as u8)?;
	cpu.mmap.write(address.wrapping_add(1), ((value >> 8) & 0xFF) as u8)?;

	Ok(20)
}

/// add HL, BC
pub fn opcode_09(cpu: &mut Cpu) -> InsnResult {
	alu16::add_hl(cpu, Register::BC)
}

/// ld A, (BC)
pub fn opcode_0a(cpu: &mut Cpu) -> InsnResult {
	load_mem_to_register(cpu, Register::A, Register::BC)
}

/// dec BC
pub fn opcode_0b(cpu: &mut Cpu) -> InsnResult {
	alu16::dec_register(cpu, Register::BC)
}

/// inc C
pub fn opcode_0c(cpu: &mut Cpu) -> InsnResult {
	alu8::inc_register(cpu, Register::C)
}

/// dec C
pub fn opcode_0d(cpu: &mut Cpu) -> InsnResult {
	alu8::dec_register(cpu, Register::C)
}

/// ld C, n
pub fn opcode_0e(cpu: &mut Cpu) -> InsnResult {
	load_imm8_to_register(cpu, Register::C)
}

/// rrca
pub fn opcode_0f(cpu: &mut Cpu) -> InsnResult {
	let value: u8 = cpu.registers.get(Register::A) as u8;
	let result = alu8::rrc(cpu, value);

	cpu.registers.set(Register::A, result as u16);
	cpu.registers.set_flag(Flag::Z, false);

	Ok(4)
}

/// stop
pub fn opcode_10(cpu: &mut Cpu) -> InsnResult {
	// The opcode is followed by a padding byte.
	let _: u8 = cpu.fetch()?;

	// Power-down semantics aren't modeled; behaves like halt.
	cpu.halt();

	Ok(4)
}

/// ld DE, nn
pub fn opcode_11(cpu: &mut Cpu) -> InsnResult {
	load_imm16_to_register(cpu, Register::DE)
}

/// ld (DE), A
pub fn opcode_12(cpu: &mut Cpu) -> InsnResult {
	store_register_into_mem(cpu, Register::DE, Register::A)
}

/// inc DE
pub fn opcode_13(cpu: &mut Cpu) -> InsnResult {
	alu16::inc_register(cpu, Register::DE)
}

/// inc D
pub fn opcode_14(cpu: &mut Cpu) -> InsnResult {
	alu8::inc_register(cpu, Register::D)
}

/// dec D
pub fn opcode_15(cpu: &mut Cpu) -> InsnResult {
	alu8::dec_register(cpu, Register::D)
}

/// ld D, n
pub fn opcode_16(cpu: &mut Cpu) -> InsnResult {
	load_imm8_to_register(cpu, Register::D)
}

/// rla
pub fn opcode_17(cpu: &mut Cpu) -> InsnResult {
	let value: u8 = cpu.registers.get(Register::A) as u8;
	let result = alu8::rl(cpu, value);

	cpu.registers.set(Register::A, result as u16);
	cpu.registers.set_flag(Flag::Z, false);

	Ok(4)
}

/// jr n
pub fn opcode_18(cpu: &mut Cpu) -> InsnResult {
	jump_relative(cpu)
}

/// add HL, DE
pub fn opcode_19(cpu: &mut Cpu) -> InsnResult {
	alu16::add_hl(cpu, Register::DE)
}

/// ld A, (DE)
pub fn opcode_1a(cpu: &mut Cpu) -> InsnResult {
	load_mem_to_register(cpu, Register::A, Register::DE)
}

/// dec DE
pub fn opcode_1b(cpu: &mut Cpu) -> InsnResult {
	alu16::dec_register(cpu, Register::DE)
}

/// inc E
pub fn opcode_1c(cpu: &mut Cpu) -> InsnResult {
	alu8::inc_register(cpu, Register::E)
}

/// dec E
pub fn opcode_1d(cpu: &mut Cpu) -> InsnResult {
	alu8::dec_register(cpu, Register::E)
}

/// ld E, n
pub fn opcode_1e(cpu: &mut Cpu) -> InsnResult {
	load_imm8_to_register(cpu, Register::E)
}

/// rra
pub fn opcode_1f(cpu: &mut Cpu) -> InsnResult {
	let value: u8 = cpu.registers.get(Register::A) as u8;
	let result = alu8::rr(cpu, value);

	cpu.registers.set(Register::A, result as u16);
	cpu.registers.set_flag(Flag::Z, false);

	Ok(4)
}

/// jr NZ, n
pub fn opcode_20(cpu: &mut Cpu) -> InsnResult {
	jump_relative_conditional(cpu, Flag::Z, false)
}

/// ld HL, nn
pub fn opcode_21(cpu: &mut Cpu) -> InsnResult {
	load_imm16_to_register(cpu, Register::HL)
}

/// ld (HL+), A
pub fn opcode_22(cpu: &mut Cpu) -> InsnResult {
	let address = cpu.registers.get(Register::HL);
	let value: u8 = cpu.registers.get(Register::A) as u8;

	cpu.mmap.write(address, value)?;
	cpu.registers.set(Register::HL, address.wrapping_add(1));

	Ok(8)
}

/// inc HL
pub fn opcode_23(cpu: &mut Cpu) -> InsnResult {
	alu16::inc_register(cpu, Register::HL)
}

/// inc H
pub fn opcode_24(cpu: &mut Cpu) -> InsnResult {
	alu8::inc_register(cpu, Register::H)
}

/// dec H
pub fn opcode_25(cpu: &mut Cpu) -> InsnResult {
	alu8::dec_register(cpu, Register::H)
}

/// ld H, n
pub fn opcode_26(cpu: &mut Cpu) -> InsnResult {
	load_imm8_to_register(cpu, Register::H)
}

/// daa
pub fn opcode_27(cpu: &mut Cpu) -> InsnResult {
	alu8::daa(cpu);

	Ok(4)
}

/// jr Z, n
pub fn opcode_28(cpu: &mut Cpu) -> InsnResult {
	jump_relative_conditional(cpu, Flag::Z, true)
}

/// add HL, HL
pub fn opcode_29(cpu: &mut Cpu) -> InsnResult {
	alu16::add_hl(cpu, Register::HL)
}

/// ld A, (HL+)
pub fn opcode_2a(cpu: &mut Cpu) -> InsnResult {
	let address = cpu.registers.get(Register::HL);
	let value: u8 = cpu.mmap.read(address)?;

	cpu.registers.set(Register::A, value as u16);
	cpu.registers.set(Register::HL, address.wrapping_add(1));

	Ok(8)
}

/// dec HL
pub fn opcode_2b(cpu: &mut Cpu) -> InsnResult {
	alu16::dec_register(cpu, Register::HL)
}

/// inc L
pub fn opcode_2c(cpu: &mut Cpu) -> InsnResult {
	alu8::inc_register(cpu, Register::L)
}

/// dec L
pub fn opcode_2d(cpu: &mut Cpu) -> InsnResult {
	alu8::dec_register(cpu, Register::L)
}

/// ld L, n
pub fn opcode_2e(cpu: &mut Cpu) -> InsnResult {
	load_imm8_to_register(cpu, Register::L)
}

/// cpl
pub fn opcode_2f(cpu: &mut Cpu) -> InsnResult {
	let value: u8 = cpu.registers.get(Register::A) as u8;

	cpu.registers.set(Register::A, !value as u16);
	cpu.registers.set_flag(Flag::N, true);
	cpu.registers.set_flag(Flag::H, true);

	Ok(4)
}

/// jr NC, n
pub fn opcode_30(cpu: &mut Cpu) -> InsnResult {
	jump_relative_conditional(cpu, Flag::C, false)
}

/// ld SP, nn
pub fn opcode_31(cpu: &mut Cpu) -> InsnResult {
	load_imm16_to_register(cpu, Register::SP)
}

/// ld (HL-), A
pub fn opcode_32(cpu: &mut Cpu) -> InsnResult {
	let address = cpu.registers.get(Register::HL);
	let value: u8 = cpu.registers.get(Register::A) as u8;

	cpu.mmap.write(address, value)?;
	cpu.registers.set(Register::HL, address.wrapping_sub(1));

	Ok(8)
}

/// inc SP
pub fn opcode_33(cpu: &mut Cpu) -> InsnResult {
	alu16::inc_register(cpu, Register::SP)
}

/// inc (HL)
pub fn opcode_34(cpu: &mut Cpu) -> InsnResult {
	alu8::inc_mem(cpu)
}

/// dec (HL)
pub fn opcode_35(cpu: &mut Cpu) -> InsnResult {
	alu8::dec_mem(cpu)
}

/// ld (HL), n
pub fn opcode_36(cpu: &mut Cpu) -> InsnResult {
	let value: u8 = cpu.fetch()?;
	let address = cpu.registers.get(Register::HL);

	cpu.mmap.write(address, value)?;

	Ok(12)
}

/// scf
pub fn opcode_37(cpu: &mut Cpu) -> InsnResult {
	cpu.registers.set_flag(Flag::N, false);
	cpu.registers.set_flag(Flag::H, false);
	cpu.registers.set_flag(Flag::C, true);

	Ok(4)
}

/// jr C, n
pub fn opcode_38(cpu: &mut Cpu) -> InsnResult {
	jump_relative_conditional(cpu, Flag::C, true)
}

/// add HL, SP
pub fn opcode_39(cpu: &mut Cpu) -> InsnResult {
	alu16::add_hl(cpu, Register::SP)
}

/// ld A, (HL-)
pub fn opcode_3a(cpu: &mut Cpu) -> InsnResult {
	let address = cpu.registers.get(Register::HL);
	let value: u8 = cpu.mmap.read(address)?;

	cpu.registers.set(Register::A, value as u16);
	cpu.registers.set(Register::HL, address.wrapping_sub(1));

	Ok(8)
}

/// dec SP
pub fn opcode_3b(cpu: &mut Cpu) -> InsnResult {
	alu16::dec_register(cpu, Register::SP)
}

/// inc A
pub fn opcode_3c(cpu: &mut Cpu) -> InsnResult {
	alu8::inc_register(cpu, Register::A)
}

/// dec A
pub fn opcode_3d(cpu: &mut Cpu) -> InsnResult {
	alu8::dec_register(cpu, Register::A)
}

/// ld A, #
pub fn opcode_3e(cpu: &mut Cpu) -> InsnResult {
	load_imm8_to_register(cpu, Register::A)
}

/// ccf
pub fn opcode_3f(cpu: &mut Cpu) -> InsnResult {
	let carry = cpu.registers.flag(Flag::C);

	cpu.registers.set_flag(Flag::N, false);
	cpu.registers.set_flag(Flag::H, false);
	cpu.registers.set_flag(Flag::C, !carry);

	Ok(4)
}

/// ld B, B
pub fn opcode_40(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::B, Register::B)
}

/// ld B, C
pub fn opcode_41(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::B, Register::C)
}

/// ld B, D
pub fn opcode_42(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::B, Register::D)
}

/// ld B, E
pub fn opcode_43(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::B, Register::E)
}

/// ld B, H
pub fn opcode_44(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::B, Register::H)
}

/// ld B, L
pub fn opcode_45(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::B, Register::L)
}

/// ld B, (HL)
pub fn opcode_46(cpu: &mut Cpu) -> InsnResult {
	load_mem_to_register(cpu, Register::B, Register::HL)
}

/// ld B, A
pub fn opcode_47(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::B, Register::A)
}

/// ld C, B
pub fn opcode_48(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::C, Register::B)
}

/// ld C, C
pub fn opcode_49(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::C, Register::C)
}

/// ld C, D
pub fn opcode_4a(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::C, Register::D)
}

/// ld C, E
pub fn opcode_4b(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::C, Register::E)
}

/// ld C, H
pub fn opcode_4c(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::C, Register::H)
}

/// ld C, L
pub fn opcode_4d(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::C, Register::L)
}

/// ld C, (HL)
pub fn opcode_4e(cpu: &mut Cpu) -> InsnResult {
	load_mem_to_register(cpu, Register::C, Register::HL)
}

/// ld C, A
pub fn opcode_4f(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::C, Register::A)
}

/// ld D, B
pub fn opcode_50(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::D, Register::B)
}

/// ld D, C
pub fn opcode_51(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::D, Register::C)
}

/// ld D, D
pub fn opcode_52(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::D, Register::D)
}

/// ld D, E
pub fn opcode_53(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::D, Register::E)
}

/// ld D, H
pub fn opcode_54(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::D, Register::H)
}

/// ld D, L
pub fn opcode_55(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::D, Register::L)
}

/// ld D, (HL)
pub fn opcode_56(cpu: &mut Cpu) -> InsnResult {
	load_mem_to_register(cpu, Register::D, Register::HL)
}

/// ld D, A
pub fn opcode_57(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::D, Register::A)
}

/// ld E, B
pub fn opcode_58(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::E, Register::B)
}

/// ld E, C
pub fn opcode_59(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::E, Register::C)
}

/// ld E, D
pub fn opcode_5a(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::E, Register::D)
}

/// ld E, E
pub fn opcode_5b(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::E, Register::E)
}

/// ld E, H
pub fn opcode_5c(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::E, Register::H)
}

/// ld E, L
pub fn opcode_5d(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::E, Register::L)
}

/// ld E, (HL)
pub fn opcode_5e(cpu: &mut Cpu) -> InsnResult {
	load_mem_to_register(cpu, Register::E, Register::HL)
}

/// ld E, A
pub fn opcode_5f(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::E, Register::A)
}

/// ld H, B
pub fn opcode_60(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::H, Register::B)
}

/// ld H, C
pub fn opcode_61(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::H, Register::C)
}

/// ld H, D
pub fn opcode_62(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::H, Register::D)
}

/// ld H, E
pub fn opcode_63(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::H, Register::E)
}

/// ld H, H
pub fn opcode_64(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::H, Register::H)
}

/// ld H, L
pub fn opcode_65(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::H, Register::L)
}

/// ld H, (HL)
pub fn opcode_66(cpu: &mut Cpu) -> InsnResult {
	load_mem_to_register(cpu, Register::H, Register::HL)
}

/// ld H, A
pub fn opcode_67(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::H, Register::A)
}

/// ld L, B
pub fn opcode_68(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::L, Register::B)
}

/// ld L, C
pub fn opcode_69(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::L, Register::C)
}

/// ld L, D
pub fn opcode_6a(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::L, Register::D)
}

/// ld L, E
pub fn opcode_6b(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::L, Register::E)
}

/// ld L, H
pub fn opcode_6c(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::L, Register::H)
}

/// ld L, L
pub fn opcode_6d(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::L, Register::L)
}

/// ld L, (HL)
pub fn opcode_6e(cpu: &mut Cpu) -> InsnResult {
	load_mem_to_register(cpu, Register::L, Register::HL)
}

/// ld L, A
pub fn opcode_6f(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::L, Register::A)
}

/// ld (HL), B
pub fn opcode_70(cpu: &mut Cpu) -> InsnResult {
	store_register_into_mem(cpu, Register::HL, Register::B)
}

/// ld (HL), C
pub fn opcode_71(cpu: &mut Cpu) -> InsnResult {
	store_register_into_mem(cpu, Register::HL, Register::C)
}

/// ld (HL), D
pub fn opcode_72(cpu: &mut Cpu) -> InsnResult {
	store_register_into_mem(cpu, Register::HL, Register::D)
}

/// ld (HL), E
pub fn opcode_73(cpu: &mut Cpu) -> InsnResult {
	store_register_into_mem(cpu, Register::HL, Register::E)
}

/// ld (HL), H
pub fn opcode_74(cpu: &mut Cpu) -> InsnResult {
	store_register_into_mem(cpu, Register::HL, Register::H)
}

/// ld (HL), L
pub fn opcode_75(cpu: &mut Cpu) -> InsnResult {
	store_register_into_mem(cpu, Register::HL, Register::L)
}

/// halt
pub fn opcode_76(cpu: &mut Cpu) -> InsnResult {
	cpu.halt();

	Ok(4)
}

/// ld (HL), A
pub fn opcode_77(cpu: &mut Cpu) -> InsnResult {
	store_register_into_mem(cpu, Register::HL, Register::A)
}

/// ld A, B
pub fn opcode_78(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::A, Register::B)
}

/// ld A, C
pub fn opcode_79(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::A, Register::C)
}

/// ld A, D
pub fn opcode_7a(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::A, Register::D)
}

/// ld A, E
pub fn opcode_7b(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::A, Register::E)
}

/// ld A, H
pub fn opcode_7c(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::A, Register::H)
}

/// ld A, L
pub fn opcode_7d(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::A, Register::L)
}

/// ld A, (HL)
pub fn opcode_7e(cpu: &mut Cpu) -> InsnResult {
	load_mem_to_register(cpu, Register::A, Register::HL)
}

/// ld A, A
pub fn opcode_7f(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::A, Register::A)
}

/// add A, B
pub fn opcode_80(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::add, cpu, Register::A, Register::B)
}

/// add A, C
pub fn opcode_81(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::add, cpu, Register::A, Register::C)
}

/// add A, D
pub fn opcode_82(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::add, cpu, Register::A, Register::D)
}

/// add A, E
pub fn opcode_83(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::add, cpu, Register::A, Register::E)
}

/// add A, H
pub fn opcode_84(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::add, cpu, Register::A, Register::H)
}

/// add A, L
pub fn opcode_85(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::add, cpu, Register::A, Register::L)
}

/// add A, (HL)
pub fn opcode_86(cpu: &mut Cpu) -> InsnResult {
	alu8::op_mem(alu8::add, cpu)
}

/// add A, A
pub fn opcode_87(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::add, cpu, Register::A, Register::A)
}

/// adc A, B
pub fn opcode_88(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::adc, cpu, Register::A, Register::B)
}

/// adc A, C
pub fn opcode_89(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::adc, cpu, Register::A, Register::C)
}

/// adc A, D
pub fn opcode_8a(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::adc, cpu, Register::A, Register::D)
}

/// adc A, E
pub fn opcode_8b(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::adc, cpu, Register::A, Register::E)
}

/// adc A, H
pub fn opcode_8c(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::adc, cpu, Register::A, Register::H)
}

/// adc A, L
pub fn opcode_8d(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::adc, cpu, Register::A, Register::L)
}

/// adc A, (HL)
pub fn opcode_8e(cpu: &mut Cpu) -> InsnResult {
	alu8::op_mem(alu8::adc, cpu)
}

/// adc A, A
pub fn opcode_8f(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::adc, cpu, Register::A, Register::A)
}

/// sub A, B
pub fn opcode_90(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::sub, cpu, Register::A, Register::B)
}

/// sub A, C
pub fn opcode_91(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::sub, cpu, Register::A, Register::C)
}

/// sub A, D
pub fn opcode_92(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::sub, cpu, Register::A, Register::D)
}

/// sub A, E
pub fn opcode_93(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::sub, cpu, Register::A, Register::E)
}

/// sub A, H
pub fn opcode_94(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::sub, cpu, Register::A, Register::H)
}

/// sub A, L
pub fn opcode_95(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::sub, cpu, Register::A, Register::L)
}

/// sub A, (HL)
pub fn opcode_96(cpu: &mut Cpu) -> InsnResult {
	alu8::op_mem(alu8::sub, cpu)
}

/// sub A, A
pub fn opcode_97(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::sub, cpu, Register::A, Register::A)
}

/// sbc A, B
pub fn opcode_98(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::sbc, cpu, Register::A, Register::B)
}

/// sbc A, C
pub fn opcode_99(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::sbc, cpu, Register::A, Register::C)
}

/// sbc A, D
pub fn opcode_9a(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::sbc, cpu, Register::A, Register::D)
}

/// sbc A, E
pub fn opcode_9b(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::sbc, cpu, Register::A, Register::E)
}

/// sbc A, H
pub fn opcode_9c(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::sbc, cpu, Register::A, Register::H)
}

/// sbc A, L
pub fn opcode_9d(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::sbc, cpu, Register::A, Register::L)
}

/// sbc A, (HL)
pub fn opcode_9e(cpu: &mut Cpu) -> InsnResult {
	alu8::op_mem(alu8::sbc, cpu)
}

/// sbc A, A
pub fn opcode_9f(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::sbc, cpu, Register::A, Register::A)
}

/// and A, B
pub fn opcode_a0(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::and, cpu, Register::A, Register::B)
}

/// and A, C
pub fn opcode_a1(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::and, cpu, Register::A, Register::C)
}

/// and A, D
pub fn opcode_a2(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::and, cpu, Register::A, Register::D)
}

/// and A, E
pub fn opcode_a3(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::and, cpu, Register::A, Register::E)
}

/// and A, H
pub fn opcode_a4(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::and, cpu, Register::A, Register::H)
}

/// and A, L
pub fn opcode_a5(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::and, cpu, Register::A, Register::L)
}

/// and A, (HL)
pub fn opcode_a6(cpu: &mut Cpu) -> InsnResult {
	alu8::op_mem(alu8::and, cpu)
}

/// and A, A
pub fn opcode_a7(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::and, cpu, Register::A, Register::A)
}

/// xor A, B
pub fn opcode_a8(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::xor, cpu, Register::A, Register::B)
}

/// xor A, C
pub fn opcode_a9(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::xor, cpu, Register::A, Register::C)
}

/// xor A, D
pub fn opcode_aa(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::xor, cpu, Register::A, Register::D)
}

/// xor A, E
pub fn opcode_ab(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::xor, cpu, Register::A, Register::E)
}

/// xor A, H
pub fn opcode_ac(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::xor, cpu, Register::A, Register::H)
}

/// xor A, L
pub fn opcode_ad(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::xor, cpu, Register::A, Register::L)
}

/// xor A, (HL)
pub fn opcode_ae(cpu: &mut Cpu) -> InsnResult {
	alu8::op_mem(alu8::xor, cpu)
}

/// xor A, A
pub fn opcode_af(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::xor, cpu, Register::A, Register::A)
}

/// or A, B
pub fn opcode_b0(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::or, cpu, Register::A, Register::B)
}

/// or A, C
pub fn opcode_b1(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::or, cpu, Register::A, Register::C)
}

/// or A, D
pub fn opcode_b2(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::or, cpu, Register::A, Register::D)
}

/// or A, E
pub fn opcode_b3(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::or, cpu, Register::A, Register::E)
}

/// or A, H
pub fn opcode_b4(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::or, cpu, Register::A, Register::H)
}

/// or A, L
pub fn opcode_b5(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::or, cpu, Register::A, Register::L)
}

/// or A, (HL)
pub fn opcode_b6(cpu: &mut Cpu) -> InsnResult {
	alu8::op_mem(alu8::or, cpu)
}

/// or A, A
pub fn opcode_b7(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::or, cpu, Register::A, Register::A)
}

/// cp A, B
pub fn opcode_b8(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::cp, cpu, Register::A, Register::B)
}

/// cp A, C
pub fn opcode_b9(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::cp, cpu, Register::A, Register::C)
}

/// cp A, D
pub fn opcode_ba(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::cp, cpu, Register::A, Register::D)
}

/// cp A, E
pub fn opcode_bb(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::cp, cpu, Register::A, Register::E)
}

/// cp A, H
pub fn opcode_bc(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::cp, cpu, Register::A, Register::H)
}

/// cp A, L
pub fn opcode_bd(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::cp, cpu, Register::A, Register::L)
}

/// cp A, (HL)
pub fn opcode_be(cpu: &mut Cpu) -> InsnResult {
	alu8::op_mem(alu8::cp, cpu)
}

/// cp A, A
pub fn opcode_bf(cpu: &mut Cpu) -> InsnResult {
	alu8::op_registers(alu8::cp, cpu, Register::A, Register::A)
}

/// ret NZ
pub fn opcode_c0(cpu: &mut Cpu) -> InsnResult {
	ret_conditional(cpu, Flag::Z, false)
}

/// pop BC
pub fn opcode_c1(cpu: &mut Cpu) -> InsnResult {
	pop_nn(cpu, Register::BC)
}

/// jp NZ, nn
pub fn opcode_c2(cpu: &mut Cpu) -> InsnResult {
	jump_conditional(cpu, Flag::Z, false)
}

/// jp nn
pub fn opcode_c3(cpu: &mut Cpu) -> InsnResult {
	let dest: u16 = cpu.fetch()?;
	cpu.registers.set(Register::PC, dest);

	Ok(16)
}

/// call NZ, nn
pub fn opcode_c4(cpu: &mut Cpu) -> InsnResult {
	call_conditional(cpu, Flag::Z, false)
}

/// push BC
pub fn opcode_c5(cpu: &mut Cpu) -> InsnResult {
	push_nn(cpu, Register::BC)
}

/// add A, #
pub fn opcode_c6(cpu: &mut Cpu) -> InsnResult {
	alu8::op_imm(alu8::add, cpu)
}

/// rst 00
pub fn opcode_c7(cpu: &mut Cpu) -> InsnResult {
	restart(cpu, 0x00)
}

/// ret Z
pub fn opcode_c8(cpu: &mut Cpu) -> InsnResult {
	ret_conditional(cpu, Flag::Z, true)
}

/// ret
pub fn opcode_c9(cpu: &mut Cpu) -> InsnResult {
	pop_nn(cpu, Register::PC)?;

	Ok(16)
}

/// jp Z, nn
pub fn opcode_ca(cpu: &mut Cpu) -> InsnResult {
	jump_conditional(cpu, Flag::Z, true)
}

/// 0xCB prefix: route to the bit-manipulation instruction set.
pub fn opcode_cb(cpu: &mut Cpu) -> InsnResult {
	let opcode: u8 = cpu.fetch()?;

	bits::execute(cpu, opcode)
}

/// call Z, nn
pub fn opcode_cc(cpu: &mut Cpu) -> InsnResult {
	call_conditional(cpu, Flag::Z, true)
}

/// call nn
pub fn opcode_cd(cpu: &mut Cpu) -> InsnResult {
	let dest: u16 = cpu.fetch()?;

	push_nn(cpu, Register::PC)?;
	cpu.registers.set(Register::PC, dest);

	Ok(24)
}

/// adc A, #
pub fn opcode_ce(cpu: &mut Cpu) -> InsnResult {
	alu8::op_imm(alu8::adc, cpu)
}

/// rst 08
pub fn opcode_cf(cpu: &mut Cpu) -> InsnResult {
	restart(cpu, 0x08)
}

/// ret NC
pub fn opcode_d0(cpu: &mut Cpu) -> InsnResult {
	ret_conditional(cpu, Flag::C, false)
}

/// pop DE
pub fn opcode_d1(cpu: &mut Cpu) -> InsnResult {
	pop_nn(cpu, Register::DE)
}

/// jp NC, nn
pub fn opcode_d2(cpu: &mut Cpu) -> InsnResult {
	jump_conditional(cpu, Flag::C, false)
}

/// call NC, nn
pub fn opcode_d4(cpu: &mut Cpu) -> InsnResult {
	call_conditional(cpu, Flag::C, false)
}

/// push DE
pub fn opcode_d5(cpu: &mut Cpu) -> InsnResult {
	push_nn(cpu, Register::DE)
}

/// sub A, #
pub fn opcode_d6(cpu: &mut Cpu) -> InsnResult {
	alu8::op_imm(alu8::sub, cpu)
}

/// rst 10
pub fn opcode_d7(cpu: &mut Cpu) -> InsnResult {
	restart(cpu, 0x10)
}

/// ret C
pub fn opcode_d8(cpu: &mut Cpu) -> InsnResult {
	ret_conditional(cpu, Flag::C, true)
}

/// reti
pub fn opcode_d9(cpu: &mut Cpu) -> InsnResult {
	pop_nn(cpu, Register::PC)?;

	// Unlike EI, the interrupt enable isn't delayed here.
	cpu.registers.set_ime(true);

	Ok(16)
}

/// jp C, nn
pub fn opcode_da(cpu: &mut Cpu) -> InsnResult {
	jump_conditional(cpu, Flag::C, true)
}

/// call C, nn
pub fn opcode_dc(cpu: &mut Cpu) -> InsnResult {
	call_conditional(cpu, Flag::C, true)
}

/// sbc A, #
pub fn opcode_de(cpu: &mut Cpu) -> InsnResult {
	alu8::op_imm(alu8::sbc, cpu)
}

/// rst 18
pub fn opcode_df(cpu: &mut Cpu) -> InsnResult {
	restart(cpu, 0x18)
}

/// ldh (n), A
pub fn opcode_e0(cpu: &mut Cpu) -> InsnResult {
	let low_byte = cpu.fetch::<u8>()? as u16;
	let address: u16 = 0xFF00 | low_byte;

	let value: u8 = cpu.registers.get(Register::A) as u8;
	cpu.mmap.write(address, value)?;

	Ok(12)
}

/// pop HL
pub fn opcode_e1(cpu: &mut Cpu) -> InsnResult {
	pop_nn(cpu, Register::HL)
}

/// ld (C), A
pub fn opcode_e2(cpu: &mut Cpu) -> InsnResult {
	let address: u16 = 0xFF00 | cpu.registers.get(Register::C);
	let value: u8 = cpu.registers.get(Register::A) as u8;

	cpu.mmap.write(address, value)?;

	Ok(8)
}

/// push HL
pub fn opcode_e5(cpu: &mut Cpu) -> InsnResult {
	push_nn(cpu, Register::HL)
}

/// and A, #
pub fn opcode_e6(cpu: &mut Cpu) -> InsnResult {
	alu8::op_imm(alu8::and, cpu)
}

/// rst 20
pub fn opcode_e7(cpu: &mut Cpu) -> InsnResult {
	restart(cpu, 0x20)
}

/// add SP, #
pub fn opcode_e8(cpu: &mut Cpu) -> InsnResult {
	let offset: i8 = cpu.fetch::<u8>()? as i8;

	let result = alu16::add_sp(cpu, offset);
	cpu.registers.set(Register::SP, result);

	Ok(16)
}

/// jp (HL)
pub fn opcode_e9(cpu: &mut Cpu) -> InsnResult {
	let dest = cpu.registers.get(Register::HL);
	cpu.registers.set(Register::PC, dest);

	Ok(4)
}

/// ld (nn), A
pub fn opcode_ea(cpu: &mut Cpu) -> InsnResult {
	let address: u16 = cpu.fetch()?;
	let value: u8 = cpu.registers.get(Register::A) as u8;

	cpu.mmap.write(address, value)?;

	Ok(16)
}

/// xor A, #
pub fn opcode_ee(cpu: &mut Cpu) -> InsnResult {
	alu8::op_imm(alu8::xor, cpu)
}

/// rst 28
pub fn opcode_ef(cpu: &mut Cpu) -> InsnResult {
	restart(cpu, 0x28)
}

/// ldh A, (n)
pub fn opcode_f0(cpu: &mut Cpu) -> InsnResult {
	let low_byte = cpu.fetch::<u8>()? as u16;
	let address: u16 = 0xFF00 | low_byte;

	let value: u8 = cpu.mmap.read(address)?;
	cpu.registers.set(Register::A, value as u16);

	Ok(12)
}

/// pop AF
pub fn opcode_f1(cpu: &mut Cpu) -> InsnResult {
	// The register file itself drops F's low nibble.
	pop_nn(cpu, Register::AF)
}

/// ld A, (C)
pub fn opcode_f2(cpu: &mut Cpu) -> InsnResult {
	let address: u16 = 0xFF00 | cpu.registers.get(Register::C);
	let value: u8 = cpu.mmap.read(address)?;

	cpu.registers.set(Register::A, value as u16);

	Ok(8)
}

/// di
pub fn opcode_f3(cpu: &mut Cpu) -> InsnResult {
	// Takes effect immediately and cancels a pending EI.
	cpu.disable_interrupts();

	Ok(4)
}

/// push AF
pub fn opcode_f5(cpu: &mut Cpu) -> InsnResult {
	push_nn(cpu, Register::AF)
}

/// or A, #
pub fn opcode_f6(cpu: &mut Cpu) -> InsnResult {
	alu8::op_imm(alu8::or, cpu)
}

/// rst 30
pub fn opcode_f7(cpu: &mut Cpu) -> InsnResult {
	restart(cpu, 0x30)
}

/// ld HL, SP+n
pub fn opcode_f8(cpu: &mut Cpu) -> InsnResult {
	let offset: i8 = cpu.fetch::<u8>()? as i8;

	let result = alu16::add_sp(cpu, offset);
	cpu.registers.set(Register::HL, result);

	Ok(12)
}

/// ld SP, HL
pub fn opcode_f9(cpu: &mut Cpu) -> InsnResult {
	move_registers(cpu, Register::SP, Register::HL)
}

/// ld A, (nn)
pub fn opcode_fa(cpu: &mut Cpu) -> InsnResult {
	let address: u16 = cpu.fetch()?;
	let value: u8 = cpu.mmap.read(address)?;

	cpu.registers.set(Register::A, value as u16);

	Ok(16)
}

/// ei
pub fn opcode_fb(cpu: &mut Cpu) -> InsnResult {
	// Interrupts are enabled only after the following instruction.
	cpu.toggle_ime_delayed();

	Ok(4)
}

/// cp A, #
pub fn opcode_fe(cpu: &mut Cpu) -> InsnResult {
	alu8::op_imm(alu8::cp, cpu)
}

/// rst 38
pub fn opcode_ff(cpu: &mut Cpu) -> InsnResult {
	restart(cpu, 0x38)
}

#[cfg(test)]
#[cfg(feature = "alloc")]
/// Unit tests.
pub mod tests {
	use super::*;
	use super::super::tests::{with_cpu, with_cpu_and_rom};

	/// Runs the given program from the external ram bank and returns
	/// nothing; the callback inspects the resulting state.
	fn run_program(cpu: &mut Cpu, program: &[u8]) -> Result<(), GameboyError> {
		cpu.registers.set(Register::PC, 0xA000);
		cpu.mmap.write_all(0xA000, program)?;

		Ok(())
	}

	#[test]
	fn test_basic_arithmetic() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			run_program(cpu, &[/* ld a, 0xff  */ 0x3E, 0xFF,
							   /* add a, 0x03 */ 0xC6, 0x03,
							   /* sub a, 0x01 */ 0xD6, 0x01,
							   /* dec a       */ 0x3D,
							   /* dec a       */ 0x3D,
							   /* halt        */ 0x76])?;

			cpu.execute_single()?;
			assert_eq!(0xFF, cpu.registers.get(Register::A));

			// 0xFF + 0x03 overflows both nibble and byte.
			cpu.execute_single()?;
			assert_eq!(0x02, cpu.registers.get(Register::A));
			assert_eq!(0x30, cpu.registers.get(Register::F));

			cpu.execute_single()?;
			assert_eq!(0x01, cpu.registers.get(Register::A));
			assert_eq!(0x40, cpu.registers.get(Register::F));

			cpu.execute_single()?;
			assert_eq!(0x00, cpu.registers.get(Register::A));
			assert_eq!(0xC0, cpu.registers.get(Register::F));

			// 0x00 - 1 borrows out of the low nibble.
			cpu.execute_single()?;
			assert_eq!(0xFF, cpu.registers.get(Register::A));
			assert_eq!(0x60, cpu.registers.get(Register::F));

			Ok(())
		})
	}

	#[test]
	fn test_rlca_rotation() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			run_program(cpu, &[/* ld a, 0x81 */ 0x3E, 0x81,
							   /* rlca       */ 0x07,
							   /* rlca       */ 0x07,
							   /* halt       */ 0x76])?;

			cpu.execute_single()?;
			assert_eq!(0x81, cpu.registers.get(Register::A));

			cpu.execute_single()?;
			assert_eq!(0x03, cpu.registers.get(Register::A));
			assert!(cpu.registers.flag(Flag::C));
			assert!(!cpu.registers.flag(Flag::Z));

			cpu.execute_single()?;
			assert_eq!(0x06, cpu.registers.get(Register::A));
			assert!(!cpu.registers.flag(Flag::C));
			assert!(!cpu.registers.flag(Flag::Z));

			Ok(())
		})
	}

	#[test]
	fn test_sub_borrows_across_nibble() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			run_program(cpu, &[/* sub a, l */ 0x95])?;

			cpu.registers.set(Register::AF, 0x0020);
			cpu.registers.set(Register::HL, 0x0002);

			cpu.execute_single()?;
			assert_eq!(0xFE70, cpu.registers.get(Register::AF));

			Ok(())
		})
	}

	#[test]
	fn test_cp_leaves_accumulator() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			run_program(cpu, &[/* cp a, l */ 0xBD])?;

			cpu.registers.set(Register::AF, 0x0020);
			cpu.registers.set(Register::HL, 0x0002);

			cpu.execute_single()?;
			assert_eq!(0x0070, cpu.registers.get(Register::AF));

			Ok(())
		})
	}

	#[test]
	fn test_daa_after_add() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			run_program(cpu, &[/* daa */ 0x27])?;

			cpu.registers.set(Register::AF, 0x3C00);

			cpu.execute_single()?;
			assert_eq!(0x42, cpu.registers.get(Register::A));
			assert_eq!(0x00, cpu.registers.get(Register::F));

			Ok(())
		})
	}

	#[test]
	fn test_call_ret_round_trip() -> Result<(), GameboyError> {
		// call 0x0050 from the entry point, return immediately.
		with_cpu_and_rom(&[(0x0100, &[0xCD, 0x50, 0x00]),
						   (0x0050, &[0xC9])], |cpu| {
			assert_eq!(0x0100, cpu.registers.get(Register::PC));
			assert_eq!(0xFFFE, cpu.registers.get(Register::SP));

			cpu.execute_single()?;
			assert_eq!(0x0050, cpu.registers.get(Register::PC));
			assert_eq!(0xFFFC, cpu.registers.get(Register::SP));

			// The return address sits on the stack, low byte first.
			assert_eq!(0x03, cpu.mmap.read(0xFFFC)?);
			assert_eq!(0x01, cpu.mmap.read(0xFFFD)?);

			cpu.execute_single()?;
			assert_eq!(0x0103, cpu.registers.get(Register::PC));
			assert_eq!(0xFFFE, cpu.registers.get(Register::SP));

			Ok(())
		})
	}

	#[test]
	fn test_push_pop_round_trip() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			run_program(cpu, &[/* push bc */ 0xC5,
							   /* pop de  */ 0xD1])?;

			cpu.registers.set(Register::BC, 0x1234);
			let sp = cpu.registers.get(Register::SP);

			assert_eq!(16, cpu.execute_single()?);
			assert_eq!(12, cpu.execute_single()?);

			assert_eq!(0x1234, cpu.registers.get(Register::DE));
			assert_eq!(sp, cpu.registers.get(Register::SP));

			Ok(())
		})
	}

	#[test]
	fn test_restart_vector() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			run_program(cpu, &[/* rst 10 */ 0xD7])?;

			assert_eq!(16, cpu.execute_single()?);
			assert_eq!(0x0010, cpu.registers.get(Register::PC));

			// The byte after the rst is the return address.
			let sp = cpu.registers.get(Register::SP);
			assert_eq!(0x01, cpu.mmap.read(sp)?);
			assert_eq!(0xA0, cpu.mmap.read(sp.wrapping_add(1))?);

			Ok(())
		})
	}

	#[test]
	fn test_conditional_branch_timing() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			run_program(cpu, &[/* jr nz, +2 */ 0x20, 0x02,
							   /* (skipped) */ 0x00, 0x00,
							   /* jr nz, -2 */ 0x20, 0xFE])?;

			// Taken branch costs the extra machine cycle.
			cpu.registers.set_flag(Flag::Z, false);
			assert_eq!(12, cpu.execute_single()?);
			assert_eq!(0xA004, cpu.registers.get(Register::PC));

			// Not taken: falls through at the base cost.
			cpu.registers.set_flag(Flag::Z, true);
			assert_eq!(8, cpu.execute_single()?);
			assert_eq!(0xA006, cpu.registers.get(Register::PC));

			Ok(())
		})
	}

	#[test]
	fn test_ld_hl_sp_offset() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			run_program(cpu, &[/* ld hl, sp-2 */ 0xF8, 0xFE])?;

			cpu.registers.set(Register::SP, 0xFFFE);

			cpu.execute_single()?;
			assert_eq!(0xFFFC, cpu.registers.get(Register::HL));
			assert!(!cpu.registers.flag(Flag::Z));

			Ok(())
		})
	}
}
