// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
//! Emulate the gameboy's memory mapping and bus access.

#[macro_use]
pub mod memory_range;
pub mod cartridge;
pub mod joypad;
pub mod timer;
pub mod ram;
pub mod ppu;
pub mod io;

use io::*;
use ram::*;
use ppu::*;
use timer::*;
use joypad::*;
use cartridge::*;
use memory_range::*;
use timer::consts::MMAP_IO_TIMER;
use ppu::consts::MMAP_IO_DISPLAY;

use crate::GameboyError;
use crate::config::Config;
use crate::cpu::interrupts::*;

/// Bus locations-related constants.
#[allow(missing_docs)]
pub mod consts {
	use super::*;

	pub const MMAP_ROM_BANK0: MemoryRange = make_range!(0x0000, 0x3FFF);
	/// Switchable ROM bank.
	pub const MMAP_ROM_BANK_SW: MemoryRange = make_range!(0x4000, 0x7FFF);
	pub const MMAP_VIDEO_RAM: MemoryRange = make_range!(0x8000, 0x9FFF);
	/// External (cartridge) RAM bank.
	pub const MMAP_RAM_BANK_SW: MemoryRange = make_range!(0xA000, 0xBFFF);
	pub const MMAP_RAM_INTERNAL: MemoryRange = make_range!(0xC000, 0xDFFF);
	/// Maps to the same physical memory as the internal ram.
	pub const MMAP_RAM_ECHO: MemoryRange = make_range!(0xE000, 0xFDFF);
	/// Sprite/Object attribute memory.
	pub const MMAP_SPRITE_OAM: MemoryRange = make_range!(0xFE00, 0xFE9F);
	/// Unusable on real hardware; reads float high.
	pub const MMAP_UNUSABLE: MemoryRange = make_range!(0xFEA0, 0xFEFF);
	pub const MMAP_IO_PORTS: MemoryRange = make_range!(0xFF00, 0xFF7F);
	/// High RAM.
	pub const MMAP_RAM_HIGH: MemoryRange = make_range!(0xFF80, 0xFFFE);

	/// Registers implemented by the bus itself.
	pub const IO_IF: u16 = 0xFF0F;
	pub const IO_DMA: u16 = 0xFF46;
	pub const IO_IE: u16 = 0xFFFF;

	/// The number of bytes a DMA transfer moves into the OAM.
	pub const DMA_SIZE: usize = 0xA0;
}

use consts::*;

/// A peripheral that can be written and read by the cpu.
pub trait Memory {
	/// Write a 8-bit value to the peripheral.
	///
	/// * `address` - The absolute memory address to write into.
	/// * `value` - The value to write.
	fn write(&mut self, address: u16, value: u8) -> Result<(), GameboyError>;

	/// Read a 8-bit value from this peripheral.
	///
	/// * `address` - The absolute memory address to read from.
	fn read(&self, address: u16) -> Result<u8, GameboyError>;
}

/// A virtual representation of the Gameboy's memory bus.
///
/// This implementation provides memory/peripheral abstraction: every
/// region of the 64KiB address space belongs to exactly one peripheral,
/// and accesses are routed to its `Memory` implementation.
pub struct SystemBus<'a> {
	pub(crate) cartridge: &'a mut Cartridge<'a>,
	pub(crate) ppu: Ppu,
	pub(crate) io: IoPorts,
	pub(crate) timer: Timer,
	pub(crate) joypad: Joypad,
	pub(crate) ram: InternalRam,

	/// The IF register.
	pub interrupt_flag: InterruptMask,
	/// The IE register.
	pub interrupt_enable: InterruptMask,

	/// The last page written to the DMA register.
	dma_page: u8,
}

/// An abstraction for fetching mutable and immutable regions.
macro_rules! get_region {
	($name:tt $(,$mut_:tt)*) => {
		/// Returns the region that contains the given address.
		fn $name(&$($mut_)* self, address: u16) -> Result<&$($mut_)* dyn Memory, GameboyError> {
			match address {
				// Cartridge-mapped offsets
				memory_range!(MMAP_ROM_BANK0) |
				memory_range!(MMAP_ROM_BANK_SW) |
				memory_range!(MMAP_RAM_BANK_SW) => {
					Ok(&$($mut_)* (*self.cartridge))
				}

				// Internal RAM
				memory_range!(MMAP_RAM_INTERNAL) |
				memory_range!(MMAP_RAM_ECHO) |
				memory_range!(MMAP_RAM_HIGH) => {
					Ok(&$($mut_)* self.ram)
				}

				// Timer
				memory_range!(MMAP_IO_TIMER) => {
					Ok(&$($mut_)* self.timer)
				}

				// DMA, interrupt registers and the unusable gap are
				// handled by the bus itself.
				consts::IO_DMA |
				consts::IO_IF |
				consts::IO_IE |
				memory_range!(MMAP_UNUSABLE) => {
					Ok(&$($mut_)* *self)
				}

				// Display
				memory_range!(MMAP_IO_DISPLAY) |
				memory_range!(MMAP_VIDEO_RAM) |
				memory_range!(MMAP_SPRITE_OAM) => {
					Ok(&$($mut_)* self.ppu)
				}

				// Joypad
				joypad::consts::IO_P1 => {
					Ok(&$($mut_)* self.joypad)
				}

				// Leftover I/O registers
				memory_range!(MMAP_IO_PORTS) => {
					Ok(&$($mut_)* self.io)
				}
				#[allow(unreachable_patterns)]
				_ => {
					Err(GameboyError::Io("Accessed an unmapped region."))
				}
			}
		}
	}
}

impl<'a> SystemBus<'a> {
	/// Initialize a new address space.
	pub fn new(config: &Config, cartridge: &'a mut Cartridge<'a>) -> Self {
		SystemBus {
			cartridge,
			ppu: Ppu::new(),
			io: IoPorts::new(config),
			timer: Timer::new(config),
			joypad: Joypad::new(),
			ram: InternalRam::new(),
			interrupt_flag: 0,
			interrupt_enable: 0,
			dma_page: 0,
		}
	}

	/// Reset the peripherals to their post-BIOS state. The ram contents
	/// are left alone, like a warm boot does.
	pub fn reset(&mut self, config: &Config) {
		self.ppu.reset();
		self.io.reset(config);
		self.timer.reset(config);
		self.joypad.reset();
		self.interrupt_flag = 0;
		self.interrupt_enable = 0;
		self.dma_page = 0;
	}

	/// Update the system bus peripherals' state according to the elapsed
	/// time, collecting the interrupts they raised into IF.
	///
	/// Returns true when the ppu finished a frame.
	pub fn process(&mut self, cycles: usize) -> bool {
		let frame = self.ppu.process(cycles);
		self.timer.process(cycles);

		// IF accumulates every request; IE only gates dispatch.
		self.interrupt_flag |= self.ppu.interrupts();
		self.interrupt_flag |= self.timer.interrupts();
		self.interrupt_flag |= self.joypad.interrupts();

		self.ppu.clear();
		self.timer.clear();
		self.joypad.clear();

		frame
	}

	/// Handle writing to a memory region.
	/// The function calls the relevant peripheral's implementation.
	pub fn write(&mut self, address: u16, value: u8) -> Result<(), GameboyError> {
		let peripheral = self.region_mut(address)?;

		peripheral.write(address, value)
	}

	/// Handle reading from a memory region.
	/// The function calls the relevant peripheral's implementation.
	pub fn read(&self, address: u16) -> Result<u8, GameboyError> {
		let peripheral = self.region(address)?;

		peripheral.read(address)
	}

	/// Writes a 16-bit value, little-endian.
	pub fn write16(&mut self, address: u16, value: u16) -> Result<(), GameboyError> {
		self.write(address, (value & 0xFF) as u8)?;
		self.write(address.wrapping_add(1), (value >> 8) as u8)
	}

	/// Reads a 16-bit value, little-endian.
	pub fn read16(&self, address: u16) -> Result<u16, GameboyError> {
		let low = self.read(address)? as u16;
		let high = self.read(address.wrapping_add(1))? as u16;

		Ok((high << 8) | low)
	}

	/// Returns the highest-priority enabled pending interrupt and clears
	/// its request bit.
	pub fn fetch_interrupt(&mut self) -> Option<Interrupt> {
		let interrupt = InterruptIter::new(self.interrupt_flag & self.interrupt_enable).next();

		if let Some(ref taken) = interrupt {
			self.interrupt_flag &= !taken.value();
		}

		interrupt
	}

	// Get an immutable region
	get_region!(region);

	// Get a mutable region
	get_region!(region_mut, mut);
}

/// Certain registers need access to multiple peripherals.
/// These registers are implemented here.
mod private {
	use super::*;

	// Implement read/write operations for internal registers.
	impl<'a> Memory for SystemBus<'a> {

		fn write(&mut self, address: u16, value: u8) -> Result<(), GameboyError> {
			match address {
				consts::IO_DMA => {
					// An immediate transfer of 160 bytes from the written
					// page into the sprite attribute table. Realistic bus
					// blocking isn't modeled.
					self.dma_page = value;
					let source: u16 = (value as u16) << 8;

					for i in 0..DMA_SIZE {
						let data = self.read(source + (i as u16))?;
						self.ppu.oam_mut()[i] = data;
					}

					Ok(())
				}
				consts::IO_IF => {
					self.interrupt_flag = value & 0x1F;

					Ok(())
				}
				consts::IO_IE => {
					self.interrupt_enable = value;

					Ok(())
				}
				memory_range!(MMAP_UNUSABLE) => {
					// Dropped on the floor.
					Ok(())
				}
				_ => {
					Err(GameboyError::BadAddress(address))
				}
			}
		}

		fn read(&self, address: u16) -> Result<u8, GameboyError> {
			match address {
				consts::IO_DMA => {
					Ok(self.dma_page)
				}
				consts::IO_IF => {
					Ok(self.interrupt_flag)
				}
				consts::IO_IE => {
					Ok(self.interrupt_enable)
				}
				memory_range!(MMAP_UNUSABLE) => {
					Ok(0xFF)
				}
				_ => {
					Err(GameboyError::BadAddress(address))
				}
			}
		}
	}
}

#[cfg(test)]
impl<'a> SystemBus<'a> {
	/// Writes the complete array's bytes to the relevant memory region.
	pub fn write_all(&mut self, address: u16, array: &[u8]) -> Result<(), GameboyError> {
		for (index, value) in array.iter().enumerate() {
			self.write(address + (index as u16), *value)?;
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	/// With-closure running logic against a bus over an empty cartridge.
	fn with_bus<F>(callback: F)
		where F: FnOnce(&mut SystemBus) {
		let config = Config::default();
		let rom = cartridge::tests::empty_rom();
		let mut ram = [0_u8; cartridge::consts::RAM_BANK_SIZE];
		let mut cartridge = Cartridge::new(&rom, &mut ram).unwrap();

		let mut bus = SystemBus::new(&config, &mut cartridge);

		callback(&mut bus);
	}

	#[test]
	fn test_memory_range() {
		let rom_ptr: u16 = 0x2000;
		let ram_ptr: u16 = 0xA100;

		match rom_ptr {
			memory_range!(MMAP_ROM_BANK0) => { }
			_ => { assert!(false); }
		}

		match ram_ptr {
			memory_range!(MMAP_RAM_BANK_SW) => { }
			_ => { assert!(false); }
		}
	}

	#[test]
	fn test_dma_transfer() {
		with_bus(|bus| {
			// Fill a work-ram page with a recognizable pattern.
			for i in 0..DMA_SIZE {
				bus.write(0xC000 + i as u16, i as u8).unwrap();
			}

			bus.write(IO_DMA, 0xC0).unwrap();

			// Exactly 160 bytes land in the OAM; the source is untouched.
			for i in 0..DMA_SIZE {
				assert_eq!(i as u8, bus.read(0xFE00 + i as u16).unwrap());
				assert_eq!(i as u8, bus.read(0xC000 + i as u16).unwrap());
			}

			// The register reads back the last page written.
			assert_eq!(0xC0, bus.read(IO_DMA).unwrap());
		});
	}

	#[test]
	fn test_interrupt_registers() {
		with_bus(|bus| {
			bus.write(IO_IE, 0x15).unwrap();
			bus.write(IO_IF, 0x06).unwrap();

			assert_eq!(0x15, bus.read(IO_IE).unwrap());
			assert_eq!(0x06, bus.read(IO_IF).unwrap());
		});
	}

	#[test]
	fn test_fetch_interrupt_respects_enable_mask() {
		with_bus(|bus| {
			bus.interrupt_flag = 0x03;
			bus.interrupt_enable = 0x02;

			// Only the lcd-stat request is enabled.
			let taken = bus.fetch_interrupt().unwrap();
			assert_eq!(Interrupt::LcdStat.value(), taken.value());

			// The v-blank request is still latched.
			assert_eq!(0x01, bus.interrupt_flag);
			assert!(bus.fetch_interrupt().is_none());
		});
	}

	#[test]
	fn test_word_access_is_little_endian() {
		with_bus(|bus| {
			bus.write16(0xC100, 0x1234).unwrap();

			assert_eq!(0x34, bus.read(0xC100).unwrap());
			assert_eq!(0x12, bus.read(0xC101).unwrap());
			assert_eq!(0x1234, bus.read16(0xC100).unwrap());
		});
	}

	#[test]
	fn test_unusable_region() {
		with_bus(|bus| {
			bus.write(0xFEA0, 0x12).unwrap();

			assert_eq!(0xFF, bus.read(0xFEA0).unwrap());
			assert_eq!(0xFF, bus.read(0xFEFF).unwrap());
		});
	}

	#[test]
	fn test_rom_writes_are_bank_commands() {
		with_bus(|bus| {
			// The write routes to the mapper and leaves rom intact.
			let before = bus.read(0x2100).unwrap();
			bus.write(0x2100, 0x02).unwrap();

			assert_eq!(before, bus.read(0x2100).unwrap());
		});
	}

	#[test]
	fn test_timer_interrupt_collection() {
		with_bus(|bus| {
			// Fastest timer rate, one tick per 16 cycles.
			bus.write(0xFF07, 0x05).unwrap();
			bus.write(0xFF05, 0xFF).unwrap();

			bus.process(16);

			assert!(bus.interrupt_flag & Interrupt::Timer.value() != 0);
		});
	}
}
