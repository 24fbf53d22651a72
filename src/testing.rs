//! Stand-ins for the programmer board.

use std::collections::{
	HashMap,
	VecDeque,
};
use std::time::Duration;

use crate::transport::Transport;

/// Canned replies keyed by the exact bytes of a single `write` call.
///
/// A reply is a list of chunks; every poll (`sleep`) delivers the next
/// chunk, so an empty chunk is a poll interval in which the board stays
/// silent.
pub struct ScriptedTransport {
	once: HashMap<Vec<u8>, VecDeque<Vec<String>>>,
	always: HashMap<Vec<u8>, Vec<String>>,
	pending: VecDeque<String>,
	rx: VecDeque<u8>,
	written: Vec<Vec<u8>>,
	polls: usize,
}

impl ScriptedTransport {
	pub fn new() -> Self {
		ScriptedTransport {
			once: HashMap::new(),
			always: HashMap::new(),
			pending: VecDeque::new(),
			rx: VecDeque::new(),
			written: Vec::new(),
			polls: 0,
		}
	}

	// reply every time `command` is written (after one-shot replies ran out)
	pub fn reply(&mut self, command: &[u8], chunks: &[&str]) {
		self.always.insert(command.to_vec(), chunks.iter().map(|c| c.to_string()).collect());
	}

	pub fn reply_once(&mut self, command: &[u8], chunks: &[&str]) {
		self.once.entry(command.to_vec())
			.or_insert_with(VecDeque::new)
			.push_back(chunks.iter().map(|c| c.to_string()).collect());
	}

	// output the board produced before we started listening
	pub fn preload(&mut self, text: &str) {
		self.rx.extend(text.bytes());
	}

	pub fn written(&self) -> &[Vec<u8>] {
		&self.written
	}

	pub fn count(&self, command: &[u8]) -> usize {
		self.written.iter().filter(|w| w.as_slice() == command).count()
	}

	pub fn polls(&self) -> usize {
		self.polls
	}
}

impl Transport for ScriptedTransport {
	fn write(&mut self, data: &[u8]) -> crate::AResult<()> {
		self.written.push(data.to_vec());
		let reply = match self.once.get_mut(data).and_then(|q| q.pop_front()) {
			Some(reply) => Some(reply),
			None => self.always.get(data).cloned(),
		};
		if let Some(chunks) = reply {
			self.pending.extend(chunks);
		}
		Ok(())
	}

	fn bytes_available(&mut self) -> crate::AResult<usize> {
		Ok(self.rx.len())
	}

	fn read(&mut self, count: usize) -> crate::AResult<Vec<u8>> {
		assert!(count <= self.rx.len(), "read beyond available bytes");
		Ok(self.rx.drain(..count).collect())
	}

	fn sleep(&mut self, _duration: Duration) {
		self.polls += 1;
		if let Some(chunk) = self.pending.pop_front() {
			self.rx.extend(chunk.bytes());
		}
	}
}

pub const SIMULATED_FLASH_WORDS: usize = 1024;
pub const SIMULATED_SIGNATURE: &str = "Signature: 1E 91 0A\r\n";

const MAIN_MENU: &str = "Main Menu\r\nr: read\r\nw: write\r\nc: chip erase\r\nx: power\r\n";
const READ_MENU: &str = "Read Menu\r\n1: signature\r\n2: fuse and lock bits\r\n5: flash\r\nq: back\r\n";
const WRITE_MENU: &str = "Write Menu\r\n3: flash\r\nq: back\r\n";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Menu {
	Off,
	Main,
	Read,
	Write,
	WriteFlash(Expect),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Expect {
	Address,
	Data(u8),
	High,
}

/// Behavioural model of the parallel programmer board with an attached
/// 1024-word target.
///
/// Flash write mode takes newline-terminated hex tokens: address low byte,
/// data word, repeated; `w` followed by the next address high byte
/// programs the buffered page.
pub struct SimulatedProgrammer {
	pub flash: Vec<u16>,
	menu: Menu,
	line: String,
	high: u8,
	page: Vec<(u8, u16)>,
	rx: VecDeque<u8>,
	pending: String,
	pub max_address_sent: Option<usize>,
	pub data_words_sent: usize,
	pub pages_committed: usize,
	pub power_toggles: usize,
	pub protocol_errors: Vec<String>,
}

impl SimulatedProgrammer {
	pub fn new() -> Self {
		SimulatedProgrammer {
			flash: vec![0xffff; SIMULATED_FLASH_WORDS],
			menu: Menu::Main,
			line: String::new(),
			high: 0,
			page: Vec::new(),
			rx: VecDeque::new(),
			pending: String::new(),
			max_address_sent: None,
			data_words_sent: 0,
			pages_committed: 0,
			power_toggles: 0,
			protocol_errors: Vec::new(),
		}
	}

	pub fn with_flash(bytes: &[u8]) -> Self {
		let mut sim = Self::new();
		for (i, pair) in bytes.chunks(2).enumerate() {
			let hi = pair[0] as u16;
			let lo = pair.get(1).copied().unwrap_or(0xff) as u16;
			sim.flash[i] = (hi << 8) | lo;
		}
		sim
	}

	pub fn flash_bytes(&self) -> Vec<u8> {
		self.flash.iter().flat_map(|w| vec![(w >> 8) as u8, *w as u8]).collect()
	}

	fn say(&mut self, text: &str) {
		self.pending.push_str(text);
	}

	fn menu_char(&mut self, c: char) {
		if c == 'x' {
			self.power_toggles += 1;
			if self.menu == Menu::Off {
				self.menu = Menu::Main;
				self.say("Powering on\r\n");
			} else {
				self.menu = Menu::Off;
				self.say("Powering off\r\n");
			}
			return;
		}
		match (self.menu, c) {
			(_, '\r') | (_, '\n') => (),
			(Menu::Off, _) => (),
			(Menu::Main, 'q') => self.say(MAIN_MENU),
			(Menu::Main, 'r') => {
				self.menu = Menu::Read;
				self.say(READ_MENU);
			},
			(Menu::Main, 'w') => {
				self.menu = Menu::Write;
				self.say(WRITE_MENU);
			},
			(Menu::Main, 'c') => {
				for w in self.flash.iter_mut() {
					*w = 0xffff;
				}
				self.say("Erasing chip\r\nChip erased\r\n");
			},
			(Menu::Read, '1') => self.say(SIMULATED_SIGNATURE),
			(Menu::Read, '2') => self.say("Low fuse: 64\r\nHigh fuse: DF\r\nExtended fuse: FF\r\nLock bits: FF\r\n"),
			(Menu::Read, '5') => {
				let dump: Vec<String> = self.flash.iter().map(|w| format!("{:04X}", w)).collect();
				let text = format!("{}\r\nDone!\r\n", dump.join(" "));
				self.say(&text);
			},
			(Menu::Write, '3') => {
				self.menu = Menu::WriteFlash(Expect::Address);
				self.say("Flash write: address, data\r\n");
			},
			(Menu::Read, 'q') | (Menu::Write, 'q') => {
				self.menu = Menu::Main;
				self.say(MAIN_MENU);
			},
			(_, other) => self.say(&format!("Unknown command {:?}\r\n", other)),
		}
	}

	fn flash_token(&mut self, expect: Expect, token: &str) {
		let next = match (expect, token) {
			(Expect::Address, "q") => {
				self.menu = Menu::Write;
				self.say(WRITE_MENU);
				return;
			},
			(Expect::Address, "w") => Expect::High,
			(Expect::Address, _) => match u8::from_str_radix(token, 16) {
				Ok(low) => {
					let address = ((self.high as usize) << 8) | low as usize;
					self.max_address_sent = Some(self.max_address_sent.map_or(address, |m| m.max(address)));
					self.say(&format!("A:{:02X}\r\n", low));
					Expect::Data(low)
				},
				Err(_) => {
					self.protocol_errors.push(format!("bad address {:?}", token));
					Expect::Address
				},
			},
			(Expect::Data(low), _) => match u16::from_str_radix(token, 16) {
				Ok(word) if token.len() == 4 => {
					self.page.push((low, word));
					self.data_words_sent += 1;
					self.say(&format!("D:{:04X}\r\n", word));
					Expect::Address
				},
				_ => {
					self.protocol_errors.push(format!("bad data {:?}", token));
					Expect::Address
				},
			},
			(Expect::High, _) => match u8::from_str_radix(token, 16) {
				Ok(high) => {
					for (low, word) in self.page.drain(..) {
						let address = ((self.high as usize) << 8) | low as usize;
						if address < self.flash.len() {
							// programming only clears bits
							self.flash[address] &= word;
						}
					}
					self.high = high;
					self.pages_committed += 1;
					self.say("Page written\r\n");
					Expect::Address
				},
				Err(_) => {
					self.protocol_errors.push(format!("bad high byte {:?}", token));
					Expect::Address
				},
			},
		};
		self.menu = Menu::WriteFlash(next);
	}
}

impl Transport for SimulatedProgrammer {
	fn write(&mut self, data: &[u8]) -> crate::AResult<()> {
		for &b in data {
			let c = b as char;
			let menu = self.menu;
			match menu {
				Menu::WriteFlash(expect) => {
					if c == '\n' {
						let token = std::mem::replace(&mut self.line, String::new());
						let token = token.trim().to_string();
						if !token.is_empty() {
							self.flash_token(expect, &token);
						}
					} else {
						self.line.push(c);
					}
				},
				_ => self.menu_char(c),
			}
		}
		Ok(())
	}

	fn bytes_available(&mut self) -> crate::AResult<usize> {
		Ok(self.rx.len())
	}

	fn read(&mut self, count: usize) -> crate::AResult<Vec<u8>> {
		Ok(self.rx.drain(..count).collect())
	}

	fn sleep(&mut self, _duration: Duration) {
		if !self.pending.is_empty() {
			let text = std::mem::replace(&mut self.pending, String::new());
			self.rx.extend(text.bytes());
		}
	}
}
