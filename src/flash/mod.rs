//! Flash access through the programmer board's menu.

mod write;

pub use self::write::WriteSummary;

use crate::menu::{
	MenuAutomaton,
	Marker,
	Selector,
	Submenu,
};
use crate::transport::{
	Timing,
	Transport,
};
use crate::ProgrammerError;

/// Flash pages on the target; the ATtiny2313 has 64 pages of 16 words.
pub const PAGE_SIZE: usize = 64;
/// Addressable flash of the target, in words (1024 words, 2 KiB).
pub const FLASH_WORDS: usize = PAGE_SIZE * 16;

/// A session with the programmer board.
pub struct Programmer<T: Transport> {
	menu: MenuAutomaton<T>,
}

impl<T: Transport> Programmer<T> {
	pub fn new(transport: T, timing: Timing) -> Self {
		Programmer {
			menu: MenuAutomaton::new(transport, timing),
		}
	}

	/// Bring the board into a known state: fresh power-up, then a look at
	/// the target's signature to make sure it responds.
	pub fn connect(transport: T, timing: Timing) -> crate::AResult<Self> {
		let mut programmer = Self::new(transport, timing);
		programmer.menu.power_cycle()?;
		programmer.read_signature()?;
		Ok(programmer)
	}

	pub fn menu(&self) -> &MenuAutomaton<T> {
		&self.menu
	}

	pub fn into_transport(self) -> T {
		self.menu.into_transport()
	}

	pub fn read_signature(&mut self) -> crate::AResult<String> {
		let signature = self.query(Selector::Signature, "signature")?;
		info!("{}", signature.trim());
		Ok(signature)
	}

	pub fn read_fuse_lock_bits(&mut self) -> crate::AResult<String> {
		let fuses = self.query(Selector::FuseLockBits, "fuse and lock bits")?;
		for line in fuses.lines().filter(|l| !l.trim().is_empty()) {
			info!("{}", line.trim());
		}
		Ok(fuses)
	}

	/// Erase the whole chip, then check the target still answers.
	pub fn chip_erase(&mut self) -> crate::AResult<()> {
		info!("Erasing chip");
		let mut status = self.menu.enter_submenu(Submenu::ChipErase)?;
		if status.trim().is_empty() {
			status = self.menu.read_response()?;
		}
		if status.trim().is_empty() {
			return Err(ProgrammerError::unexpected_response("chip erase status", &status).into());
		}
		debug!("chip erase: {:?}", status);
		self.menu.return_to_main_menu()?;
		self.read_signature()?;
		info!("Chip erased");
		Ok(())
	}

	/// Dump the whole flash.
	///
	/// The board prints words as 4-digit hex tokens (first byte first) and
	/// ends the dump with "Done!".
	pub fn read_flash(&mut self) -> crate::AResult<Vec<u8>> {
		info!("Reading flash");
		self.menu.return_to_main_menu()?;
		self.menu.enter_submenu(Submenu::Read)?;
		self.menu.select(Selector::FlashDump)?;
		let dump = self.menu.read_until(Marker::Done)?;
		let image = parse_dump(&dump)?;
		info!("Read {} bytes of flash", image.len());
		Ok(image)
	}

	fn query(&mut self, selector: Selector, what: &str) -> crate::AResult<String> {
		self.menu.return_to_main_menu()?;
		self.menu.select(selector)?;
		let response = self.menu.read_response()?;
		if response.trim().is_empty() {
			return Err(ProgrammerError::unexpected_response(what, &response).into());
		}
		Ok(response)
	}
}

fn parse_dump(dump: &str) -> crate::AResult<Vec<u8>> {
	let payload = dump.split(Marker::Done.text()).next().unwrap_or("");
	let mut image = Vec::with_capacity(payload.len() / 5 * 2);
	for token in payload.split_whitespace() {
		if token.len() != 4 || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
			return Err(ProgrammerError::unexpected_response("4-digit hex word", token).into());
		}
		image.push(u8::from_str_radix(&token[..2], 16)?);
		image.push(u8::from_str_radix(&token[2..], 16)?);
	}
	Ok(image)
}
