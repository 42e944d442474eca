// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
//! Gameboy's processor emulation.

pub mod alu;
pub mod bits;
pub mod state;
pub mod decode;
pub mod interrupts;
pub mod instructions;
#[cfg(feature = "debug")]
pub mod disassemble;

use num::PrimInt;
use core::mem::size_of;
use core::ops::{AddAssign, Shl};

use state::*;
use state::registers::*;
use instructions::{Instruction, enter_interrupt};

use crate::GameboyError;
use crate::config::Config;
use crate::bus::joypad::Controller;

use crate::bus::*;
use crate::bus::cartridge::*;

/// The gameboy's processor.
///
/// This struct contains the complete emulator's state: the register file,
/// the memory mapping and the peripherals hanging off of it. Constructing
/// one per test gives full isolation.
pub struct Cpu<'a> {
	/// The cpu's registers.
	pub(crate) registers: CpuState,
	/// The devices' memory mapping
	pub mmap: SystemBus<'a>,
	/// The emulator's configuration
	pub config: &'a Config,

	/// Whether the cpu is blocked on a halt instruction.
	pub halting: bool,
	/// If we halt the cpu when interrupts are disabled, the original cpu had
	/// a bug in which it fetches the byte after the halt twice.
	halt_bug: bool,
	/// The processor has a delay of a single instruction after EI before
	/// actually enabling interrupts.
	ime_delay: bool,
	/// Set when the ppu finished a frame; taken by `frame_ready`.
	frame: bool,
}

impl<'a> Cpu<'a> {
	/// Initializes a new virtual cpu
	#[inline(always)]
	pub fn new(config: &'a Config, cartridge: &'a mut Cartridge<'a>) -> Self {
		Cpu {
			registers: CpuState::new(config),
			mmap: SystemBus::new(config, cartridge),
			config,
			halting: false,
			halt_bug: false,
			ime_delay: false,
			frame: false,
		}
	}

	/// Reset the machine to its post-BIOS state.
	pub fn reset(&mut self) {
		self.registers.reset(self.config);
		self.mmap.reset(self.config);

		self.halting = false;
		self.halt_bug = false;
		self.ime_delay = false;
		self.frame = false;
	}

	/// Halt the cpu until an interrupt becomes pending.
	pub fn halt(&mut self) {
		self.halting = true;

		if !self.registers.ime() {
			self.halt_bug = true;
		}
	}

	/// Enable interrupts with a delay of a single instruction.
	pub fn toggle_ime_delayed(&mut self) {
		self.ime_delay = true;
	}

	/// Disable interrupts immediately.
	pub fn disable_interrupts(&mut self) {
		self.registers.set_ime(false);
		self.ime_delay = false;
	}

	/// Apply the given closure to the game controller.
	pub fn with_controller<F>(&mut self, closure: F)
		where F: FnOnce(&mut dyn Controller) -> () {
			closure(&mut self.mmap.joypad);
	}

	/// Returns whether the ppu finished a frame since the last call,
	/// clearing the flag.
	pub fn frame_ready(&mut self) -> bool {
		let frame = self.frame;
		self.frame = false;

		frame
	}

	/// Writes the visible 160x144 viewport to the given frame buffer.
	pub fn flush(&mut self, frame_buffer: &mut [u16]) {
		self.mmap.ppu.flush(frame_buffer);
	}

	/// Reads the next instruction bytes and increments the program counter
	/// appropriately.
	///
	/// The function works in little-endian, that is, when reading 2 bytes,
	/// the first byte will be the least-significant one.
	pub fn fetch<T: PrimInt + AddAssign + Shl<Output=T>>(&mut self) -> Result<T, GameboyError> {
		let mut result: T = num::cast(0).unwrap();

		for i in 0..size_of::<T>() {
			// Read the next byte.
			let pc: u16 = self.registers.get(Register::PC);
			let data: T = num::cast::<u8, T>(self.mmap.read(pc)?).unwrap();

			// We're using little-endianity.
			result += data << num::cast::<usize, T>(8 * i).unwrap();

			if self.halt_bug {
				// The halt bug prevents the program counter from being
				// incremented once.
				self.halt_bug = false;
			} else {
				// Move the PC forward.
				self.registers.set(Register::PC, pc.wrapping_add(1));
			}
		}

		Ok(result)
	}

	/// Emulates the execution of a single instruction, processes the
	/// peripherals and enters interrupts if any.
	///
	/// Returns the number of clock cycles taken. The ordering here is
	/// load-bearing: the peripherals advance on the instruction's cycle
	/// budget before the dispatch check, so interrupt flags they raise are
	/// observed by that same check.
	pub fn execute(&mut self) -> Result<usize, GameboyError> {
		let mut num_cycles = if !self.halting {
			self.execute_single()?
		} else {
			// A blocked cpu still burns time while waiting.
			4
		};

		if self.mmap.process(num_cycles) {
			self.frame = true;
		}

		let pending_enable = self.ime_delay;

		num_cycles += self.handle_interrupts()?;

		// EI becomes visible only after the dispatch check that follows
		// the next instruction.
		if pending_enable {
			self.registers.set_ime(true);
			self.ime_delay = false;
		}

		Ok(num_cycles)
	}

	/// Emulates the execution of a single instruction.
	///
	/// Returns the number of clock cycles the instruction has taken.
	pub fn execute_single(&mut self) -> Result<usize, GameboyError> {
		let _address: u16 = self.registers.get(Register::PC);

		// Fetch the opcode from the memory.
		let opcode: u8 = self.fetch()?;

		#[cfg(feature = "debug")]
		{
			println!("0x{:04x}: ({:02x}) {}",
					 _address, opcode, disassemble::disassemble(self, _address)?);
		}

		// Decode the given opcode.
		let insn: Instruction = self.decode(opcode)?;

		// Execute and return the number of cycles taken.
		Ok(insn(self)?)
	}

	/// Enters a pending interrupt's service routine if the master enable
	/// latch permits; wakes a halting cpu either way.
	fn handle_interrupts(&mut self) -> Result<usize, GameboyError> {
		// We wake the cpu in a case of a pending interrupt, but we won't
		// enter the ISR if interrupts are disabled.
		if self.halting &&
		   self.mmap.interrupt_flag & self.mmap.interrupt_enable != 0 {
			self.halting = false;
		}

		if !self.registers.ime() {
			return Ok(0);
		}

		if let Some(interrupt) = self.mmap.fetch_interrupt() {
			self.halting = false;

			return enter_interrupt(self, interrupt.vector());
		}

		Ok(0)
	}
}

#[cfg(test)]
#[cfg(feature = "alloc")]
/// Unit tests.
pub mod tests {
	use super::*;
	use alloc::boxed::Box;

	/// With-closure for running logic with a cpu initialized from the
	/// given rom patches (offset, bytes).
	pub fn with_cpu_and_rom<F>(patches: &[(u16, &[u8])], callback: F) -> Result<(), GameboyError>
		where F: FnOnce(&mut Cpu) -> Result<(), GameboyError> {
		let config = Config::default();

		let mut rom = cartridge::tests::empty_rom();
		for (offset, bytes) in patches {
			let offset = *offset as usize;
			rom[offset..offset + bytes.len()].copy_from_slice(bytes);
		}

		let mut ram: Box<[u8]> = Cartridge::make_ram(&rom)?;
		let mut cartridge = Cartridge::new(&rom, &mut ram)?;

		let mut cpu = Cpu::new(&config, &mut cartridge);

		callback(&mut cpu)
	}

	/// With-closure for running logic with an initialized cpu instance.
	pub fn with_cpu<F>(callback: F) -> Result<(), GameboyError>
		where F: FnOnce(&mut Cpu) -> Result<(), GameboyError> {
		with_cpu_and_rom(&[], callback)
	}

	#[test]
	fn test_fetch() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			// Move the program counter to the RAM bank.
			cpu.registers.set(Register::PC, 0xA000);

			// Write arbitrary data to the memory starting from the
			// program counter.
			let data: &[u8] = &[1, 2, 3];
			cpu.mmap.write_all(cpu.registers.get(Register::PC), data)?;

			// Make sure that fetch works as expected.
			assert!(cpu.fetch::<u16>()? == 0x0201);
			assert!(cpu.fetch::<u8>()? == 0x03);

			Ok(())
		})
	}

	#[test]
	fn test_interrupt_dispatch() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			cpu.registers.set(Register::PC, 0xA000);
			cpu.mmap.write(0xA000, /* nop */ 0x00)?;

			cpu.registers.set_ime(true);
			cpu.mmap.interrupt_enable = 0x01;
			cpu.mmap.interrupt_flag = 0x01;

			// The instruction completes before the ISR is entered.
			let cycles = cpu.execute()?;
			assert_eq!(24, cycles);
			assert_eq!(0x0040, cpu.registers.get(Register::PC));

			// Entering the ISR consumed the pending bit and the latch.
			assert_eq!(0x00, cpu.mmap.interrupt_flag & 0x01);
			assert!(!cpu.registers.ime());

			// The return address points past the nop.
			let sp = cpu.registers.get(Register::SP);
			assert_eq!(0x01, cpu.mmap.read(sp)?);
			assert_eq!(0xA0, cpu.mmap.read(sp.wrapping_add(1))?);

			Ok(())
		})
	}

	#[test]
	fn test_interrupt_priority() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			cpu.registers.set(Register::PC, 0xA000);
			cpu.mmap.write(0xA000, /* nop */ 0x00)?;

			cpu.registers.set_ime(true);
			cpu.mmap.interrupt_enable = 0x1F;
			// Timer and joypad both pending; timer wins.
			cpu.mmap.interrupt_flag = 0x14;

			cpu.execute()?;
			assert_eq!(0x0050, cpu.registers.get(Register::PC));

			// The joypad request is still pending.
			assert_eq!(0x10, cpu.mmap.interrupt_flag);

			Ok(())
		})
	}

	#[test]
	fn test_disabled_interrupt_is_not_taken() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			cpu.registers.set(Register::PC, 0xA000);
			cpu.mmap.write(0xA000, /* nop */ 0x00)?;

			cpu.registers.set_ime(true);
			cpu.mmap.interrupt_enable = 0x00;
			cpu.mmap.interrupt_flag = 0x04;

			assert_eq!(4, cpu.execute()?);
			assert_eq!(0xA001, cpu.registers.get(Register::PC));
			// The request stays latched for whenever it gets enabled.
			assert_eq!(0x04, cpu.mmap.interrupt_flag);

			Ok(())
		})
	}

	#[test]
	fn test_halt_wakes_without_dispatch() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			cpu.registers.set(Register::PC, 0xA000);
			cpu.mmap.write_all(0xA000, &[/* halt */ 0x76,
										 /* nop  */ 0x00])?;

			cpu.registers.set_ime(false);
			cpu.mmap.interrupt_enable = 0x04;

			cpu.execute()?;
			assert!(cpu.halting);

			// A blocked step just burns four cycles.
			assert_eq!(4, cpu.execute()?);
			assert!(cpu.halting);

			// A pending enabled interrupt wakes the cpu, but with the
			// latch cleared no ISR is entered.
			cpu.mmap.interrupt_flag = 0x04;
			cpu.execute()?;
			assert!(!cpu.halting);

			// The halt bug: the byte after the halt gets fetched twice,
			// so the first fetch doesn't move the program counter.
			cpu.execute()?;
			assert_eq!(0xA001, cpu.registers.get(Register::PC));
			cpu.execute()?;
			assert_eq!(0xA002, cpu.registers.get(Register::PC));

			Ok(())
		})
	}

	#[test]
	fn test_ei_takes_effect_after_next_instruction() -> Result<(), GameboyError> {
		with_cpu(|cpu| {
			cpu.registers.set(Register::PC, 0xA000);
			cpu.mmap.write_all(0xA000, &[/* ei  */ 0xFB,
										 /* nop */ 0x00])?;

			cpu.mmap.interrupt_enable = 0x01;
			cpu.mmap.interrupt_flag = 0x01;

			// The EI step itself doesn't dispatch.
			cpu.execute()?;
			assert_eq!(0xA001, cpu.registers.get(Register::PC));

			// The following instruction completes, then the ISR is entered.
			cpu.execute()?;
			assert_eq!(0x0040, cpu.registers.get(Register::PC));

			Ok(())
		})
	}
}
