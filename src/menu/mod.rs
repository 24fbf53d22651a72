//! Driving the programmer board's text menu.
//!
//! The board has no machine interface: every command is a single character
//! typed into a menu, and the only feedback is the menu text it prints
//! back. Where we are is inferred from marker strings in that text.

mod state;

pub use self::state::{
	Command,
	DeviceState,
	LinePosition,
	Marker,
	Selector,
	Submenu,
	Transition,
};

use crate::transport::{
	QuiescentRead,
	Timing,
	Transport,
};
use crate::ProgrammerError;

pub struct MenuAutomaton<T: Transport> {
	transport: T,
	timing: Timing,
	state: DeviceState,
}

impl<T: Transport> MenuAutomaton<T> {
	pub fn new(transport: T, timing: Timing) -> Self {
		MenuAutomaton {
			transport,
			timing,
			state: DeviceState::Unknown,
		}
	}

	pub fn state(&self) -> DeviceState {
		self.state
	}

	pub fn transport(&self) -> &T {
		&self.transport
	}

	pub fn into_transport(self) -> T {
		self.transport
	}

	/// Toggle the target's power until the board reports "Powering on".
	///
	/// The power command toggles, so depending on the initial state it may
	/// take two rounds.
	pub fn power_cycle(&mut self) -> crate::AResult<()> {
		info!("Power cycling target");
		self.repeat_until_marker(Command::Reset, String::new())?;
		Ok(())
	}

	/// Back out of whatever menu the board is in.
	///
	/// Pending output is checked first, so nothing is sent if the board
	/// already shows the main menu; and nothing at all happens if the last
	/// transition already ended there.
	pub fn return_to_main_menu(&mut self) -> crate::AResult<()> {
		if self.state == DeviceState::MainMenu {
			return Ok(());
		}
		let pending = self.transport.read_quiescent(&self.timing)?;
		self.repeat_until_marker(Command::Back, pending)?;
		Ok(())
	}

	/// Enter a submenu from the main menu; returns the menu text the board
	/// printed in response.
	pub fn enter_submenu(&mut self, submenu: Submenu) -> crate::AResult<String> {
		self.return_to_main_menu()?;
		let command = submenu.command();
		self.send_command(command)?;
		let ack = self.transport.read_quiescent(&self.timing)?;
		debug!("{:?} submenu: {:?}", submenu, ack);
		self.state = Transition::of(command).target;
		Ok(ack)
	}

	/// Pick an option in a submenu, entering that submenu first if needed.
	///
	/// The response is left for the caller to read.
	pub fn select(&mut self, selector: Selector) -> crate::AResult<()> {
		let submenu = selector.submenu();
		if self.state != submenu.state() {
			self.enter_submenu(submenu)?;
		}
		self.send(&[selector.byte()])
	}

	/// Raw write into the current menu; leaves the tracked state alone.
	pub fn send(&mut self, data: &[u8]) -> crate::AResult<()> {
		self.transport.send(data)
	}

	pub fn send_line(&mut self, token: &str) -> crate::AResult<()> {
		self.transport.send(token.as_bytes())?;
		self.transport.send(b"\n")
	}

	pub fn read_response(&mut self) -> crate::AResult<String> {
		self.transport.read_quiescent(&self.timing)
	}

	pub fn read_until(&mut self, marker: Marker) -> crate::AResult<String> {
		self.transport.read_until(marker.text(), &self.timing)
	}

	fn send_command(&mut self, command: Command) -> crate::AResult<()> {
		self.transport.send(&[command.byte()])
	}

	fn repeat_until_marker(&mut self, command: Command, mut response: String) -> crate::AResult<String> {
		let transition = Transition::of(command);
		let mut attempts = 0u32;
		while !transition.satisfied_by(&response) {
			if attempts >= self.timing.retries.max(1) {
				self.state = DeviceState::Unknown;
				let expected = transition.marker.map_or("", |(m, _)| m.text());
				return Err(ProgrammerError::unexpected_response(expected, &response).into());
			}
			attempts += 1;
			self.send_command(command)?;
			response = self.transport.read_quiescent(&self.timing)?;
			debug!("{:?} #{}: {:?}", command, attempts, response);
		}
		self.state = transition.target;
		Ok(response)
	}
}
