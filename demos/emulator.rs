// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
//! An example implementation of an emulator using the dmg core library.

extern crate minifb;

use std::fs;
use std::env;
use std::fmt;
use std::process::exit;
use std::vec::Vec;
use std::thread::sleep;
use std::time::Duration;

use minifb::{Key, Window, WindowOptions};

use dmg_core::cpu::*;
use dmg_core::bus::joypad;
use dmg_core::GameboyError;
use dmg_core::config::Config;
use dmg_core::bus::cartridge::*;

const WIDTH: usize = 160;
const HEIGHT: usize = 144;

enum EmulatorError {
    Std(std::io::Error),
    Gameboy(GameboyError),
}

impl From<std::io::Error> for EmulatorError {
    fn from(e: std::io::Error) -> Self {
        EmulatorError::Std(e)
    }
}

impl From<GameboyError> for EmulatorError {
    fn from(e: GameboyError) -> Self {
        EmulatorError::Gameboy(e)
    }
}

impl fmt::Debug for EmulatorError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			EmulatorError::Std(ref err) => err.fmt(f),
            EmulatorError::Gameboy(ref err) => err.fmt(f),
        }
	}
}

// Maps minifb keys to emulator keys.
fn map_input_key(key: &Key) -> joypad::Key {
	match key {
		Key::Right => joypad::Key::Right,
		Key::Left => joypad::Key::Left,
		Key::Down => joypad::Key::Down,
		Key::Up => joypad::Key::Up,
		Key::Z => joypad::Key::A,
		Key::X => joypad::Key::B,
		Key::Space => joypad::Key::Select,
		Key::Enter => joypad::Key::Start,
		_ => panic!("Received an unexpected key.")
	}
}

fn update_key_state(cpu: &mut Cpu, window: &Window) {
	for key in [Key::Right, Key::Left, Key::Down, Key::Up, Key::Z, Key::X, Key::Space, Key::Enter].iter() {
		let emulator_key = map_input_key(key);
		let key_down: bool = window.is_key_down(*key);

		if key_down {
			cpu.with_controller(|joypad| joypad.down(emulator_key))
		} else {
			cpu.with_controller(|joypad| joypad.up(emulator_key))
		}
	}
}

/// Expands an ARGB4444 pixel to the 8-bit channels minifb expects.
fn expand_color(color: u16) -> u32 {
	let red = ((color >> 8) & 0xF) as u32;
	let green = ((color >> 4) & 0xF) as u32;
	let blue = (color & 0xF) as u32;

	(red * 0x11) << 16 | (green * 0x11) << 8 | (blue * 0x11)
}

fn main() -> Result<(), EmulatorError> {
	// Initialize the frame buffers: the core's native 16-bit one and
	// the expanded one handed to the window.
	let mut frame: Vec<u16> = vec![0; WIDTH * HEIGHT];
	let mut pixels: Vec<u32> = vec![0; WIDTH * HEIGHT];

	let mut window = Window::new(
        "Gameboy",
        WIDTH,
        HEIGHT,
        WindowOptions::default(),
    ).unwrap_or_else(|e| { panic!("{}", e); });

	// Initialize the cpu.
	let config = Config::default();

	// Load the cartridge.
	let args: Vec<String> = env::args().collect();
	if args.len() < 2 {
		println!("usage: emulator <romfile>");
		exit(1);
	}

	let rom: Box<[u8]> = fs::read(&args[1])?.into();
	let mut ram: Box<[u8]> = Cartridge::make_ram(&rom)?;
	let mut cartridge = Cartridge::new(&rom, &mut ram)?;

	let mut cpu = Cpu::new(&config, &mut cartridge);

	// Start executing.
	while window.is_open() && !window.is_key_down(Key::Escape) {
		if let Err(err) = cpu.execute() {
			// A core error marks an emulator defect; report and bail out
			// before the machine state degrades further.
			println!("{}", err);
			return Err(err.into());
		}

		if cpu.frame_ready() {
			cpu.flush(&mut frame);

			for (index, color) in frame.iter().enumerate() {
				pixels[index] = expand_color(*color);
			}

			window.update_with_buffer(&pixels, WIDTH, HEIGHT).unwrap();
			update_key_state(&mut cpu, &window);

			sleep(Duration::from_millis(8));
		}
	}

	Ok(())
}
