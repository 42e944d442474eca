// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
//! The cartridge controller - zero-copy implementation of the minimal
//! bank-selection protocol.
//!
//! The rom is borrowed read-only; writes into the rom's address range are
//! bank-control commands, never stores. External ram is plain storage.

use crate::GameboyError;
use super::Memory;
use super::memory_range::*;

/// cartridge addresses-related constants.
#[allow(missing_docs)]
pub mod consts {
	use super::*;

	/// Game title.
	pub const ROM_GAME_TITLE: MemoryRange = make_range!(0x0134, 0x0142);

	/// Cartridge type byte within the header.
	pub const ROM_CARTRIDGE_TYPE: usize = 0x0147;

	/// A write to this range toggles the external ram.
	pub const RAM_ENABLE: MemoryRange = make_range!(0x0000, 0x1FFF);

	/// A write to this range selects the active ROM bank.
	pub const ROM_BANK_SELECT: MemoryRange = make_range!(0x2000, 0x3FFF);

	/// A write to this range selects the active RAM bank.
	pub const RAM_BANK_SELECT: MemoryRange = make_range!(0x4000, 0x5FFF);

	/// A write to this range selects the banking mode.
	pub const MODE_SELECT: MemoryRange = make_range!(0x6000, 0x7FFF);

	/// The fixed rom bank.
	pub const ROM_BANK0: MemoryRange = make_range!(0x0000, 0x3FFF);

	/// The switchable rom bank.
	pub const ROM_BANK_SW: MemoryRange = make_range!(0x4000, 0x7FFF);

	/// The external ram bank.
	pub const RAM_BANK: MemoryRange = make_range!(0xA000, 0xBFFF);

	/// The size of a single rom bank.
	pub const ROM_BANK_SIZE: usize = 0x4000;

	/// The size of the external ram bank.
	pub const RAM_BANK_SIZE: usize = 0x2000;
}

use consts::*;

/// The game's cartridge.
///
/// Only the minimal bank-selection protocol is implemented: the rom bank
/// select commands move the switchable window, and the remaining control
/// writes are accepted without effect.
pub struct Cartridge<'a> {
	rom: &'a [u8],
	ram: &'a mut [u8],
	/// The bank currently mapped at the switchable window. Never zero.
	rom_bank: usize,
}

impl<'a> Cartridge<'a> {
	/// Initialize a new cartridge given its raw data and external ram.
	pub fn new(rom: &'a [u8], ram: &'a mut [u8]) -> Result<Self, GameboyError> {
		// The rom must span at least the fixed bank.
		if rom.len() < ROM_BANK_SIZE {
			return Err(GameboyError::Cartridge("rom is smaller than a single bank"));
		}

		Ok(Cartridge {
			rom,
			ram,
			rom_bank: 1,
		})
	}

	/// Allocates external ram fitting the given rom.
	#[cfg(feature = "alloc")]
	pub fn make_ram(_rom: &[u8]) -> Result<alloc::boxed::Box<[u8]>, GameboyError> {
		// A full bank regardless of the header's ram-size byte; smaller
		// carts simply leave the tail unused.
		Ok(alloc::vec![0_u8; RAM_BANK_SIZE].into_boxed_slice())
	}

	/// Get the title of the game.
	pub fn title(&'a self) -> &'a [u8] {
		&self.rom[memory_offset_range!(ROM_GAME_TITLE)]
	}

	/// The rom offset currently mapped at the switchable window's start.
	fn bank_offset(&self) -> usize {
		let banks = self.rom.len() / ROM_BANK_SIZE;

		// Out-of-range selections wrap, like the address lines do.
		(self.rom_bank % banks.max(1)) * ROM_BANK_SIZE
	}
}

impl<'a> Memory for Cartridge<'a> {
	/// Writes below 0x8000 are bank-control commands; the ram bank is
	/// ordinary storage.
	fn write(&mut self, address: u16, value: u8) -> Result<(), GameboyError> {
		match address {
			memory_range!(ROM_BANK_SELECT) => {
				// Bank zero maps the fixed bank and is remapped to one.
				self.rom_bank = match value {
					0 => 1,
					_ => value as usize,
				};
			}
			memory_range!(RAM_ENABLE) |
			memory_range!(RAM_BANK_SELECT) |
			memory_range!(MODE_SELECT) => {
				// Accepted, but the minimal mapper has a single ram bank
				// that is always enabled.
			}
			memory_range!(RAM_BANK) => {
				let offset = address as usize - range_start!(RAM_BANK);
				if offset < self.ram.len() {
					self.ram[offset] = value;
				}
			}
			_ => {
				return Err(GameboyError::BadAddress(address));
			}
		}

		Ok(())
	}

	fn read(&self, address: u16) -> Result<u8, GameboyError> {
		let value = match address {
			memory_range!(ROM_BANK0) => {
				self.rom[address as usize]
			}
			memory_range!(ROM_BANK_SW) => {
				let offset = address as usize - range_start!(ROM_BANK_SW);
				self.rom[self.bank_offset() + offset]
			}
			memory_range!(RAM_BANK) => {
				let offset = address as usize - range_start!(RAM_BANK);
				if offset < self.ram.len() {
					self.ram[offset]
				} else {
					0xFF
				}
			}
			_ => {
				return Err(GameboyError::BadAddress(address));
			}
		};

		Ok(value)
	}
}

#[cfg(test)]
/// Unit tests.
pub mod tests {
	use super::*;

	const TEST_GAME_TITLE: &[u8] = b"TEST TITLE\0\0\0\0\0";

	/// Creates an empty rom-only cartridge image for testing.
	pub fn empty_rom() -> [u8; 0x8000] {
		let mut rom = [0_u8; 0x8000];

		// ROM-only cartridge.
		rom[ROM_CARTRIDGE_TYPE] = 0;
		// Write the game's title
		rom[memory_offset_range!(ROM_GAME_TITLE)].clone_from_slice(TEST_GAME_TITLE);

		rom
	}

	#[test]
	fn test_cartridge_loading() {
		let rom = empty_rom();
		let mut ram = [0_u8; RAM_BANK_SIZE];
		let cart = Cartridge::new(&rom, &mut ram).unwrap();

		assert!(TEST_GAME_TITLE == cart.title());
	}

	#[test]
	fn test_rom_is_read_only() {
		let mut rom = empty_rom();
		rom[0x1234] = 0xAA;

		let mut ram = [0_u8; RAM_BANK_SIZE];
		let mut cart = Cartridge::new(&rom, &mut ram).unwrap();

		// A write into the rom range is a bank command, not a store.
		cart.write(0x1234, 0x55).unwrap();
		assert_eq!(0xAA, cart.read(0x1234).unwrap());
	}

	#[test]
	fn test_bank_zero_remaps_to_one() {
		// Two banks with distinct markers at the window's start.
		let mut rom = [0_u8; 0x8000];
		rom[0x4000] = 0x11;

		let mut ram = [0_u8; RAM_BANK_SIZE];
		let mut cart = Cartridge::new(&rom, &mut ram).unwrap();

		cart.write(0x2000, 0).unwrap();
		assert_eq!(0x11, cart.read(0x4000).unwrap());

		cart.write(0x2000, 1).unwrap();
		assert_eq!(0x11, cart.read(0x4000).unwrap());
	}

	#[test]
	fn test_external_ram_roundtrip() {
		let rom = empty_rom();
		let mut ram = [0_u8; RAM_BANK_SIZE];
		let mut cart = Cartridge::new(&rom, &mut ram).unwrap();

		cart.write(0xA000, 0x42).unwrap();
		cart.write(0xBFFF, 0x24).unwrap();

		assert_eq!(0x42, cart.read(0xA000).unwrap());
		assert_eq!(0x24, cart.read(0xBFFF).unwrap());
	}
}
