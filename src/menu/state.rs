/// Where the board's menu is, as far as its output told us.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum DeviceState {
	Unknown,
	PoweringOn,
	MainMenu,
	ReadSubmenu,
	WriteSubmenu,
}

/// Single-character menu commands.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Command {
	Reset,
	Back,
	Read,
	Write,
	ChipErase,
}

impl Command {
	pub fn byte(self) -> u8 {
		match self {
			Command::Reset => b'x',
			Command::Back => b'q',
			Command::Read => b'r',
			Command::Write => b'w',
			Command::ChipErase => b'c',
		}
	}
}

/// Text the board prints at well-known points.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Marker {
	MainMenu,
	PoweringOn,
	Done,
}

impl Marker {
	pub fn text(self) -> &'static str {
		match self {
			Marker::MainMenu => "Main Menu",
			Marker::PoweringOn => "Powering on",
			Marker::Done => "Done!",
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum LinePosition {
	First,
	LastNonEmpty,
}

/// Expected outcome of one command.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Transition {
	pub command: Command,
	/// marker and where it has to appear; without one the command is
	/// trusted to have worked
	pub marker: Option<(Marker, LinePosition)>,
	pub target: DeviceState,
}

const TRANSITIONS: [Transition; 5] = [
	Transition {
		command: Command::Reset,
		marker: Some((Marker::PoweringOn, LinePosition::LastNonEmpty)),
		target: DeviceState::PoweringOn,
	},
	Transition {
		command: Command::Back,
		marker: Some((Marker::MainMenu, LinePosition::First)),
		target: DeviceState::MainMenu,
	},
	Transition {
		command: Command::Read,
		marker: None,
		target: DeviceState::ReadSubmenu,
	},
	Transition {
		command: Command::Write,
		marker: None,
		target: DeviceState::WriteSubmenu,
	},
	// erase prints a status and stays put, but we don't know its wording
	Transition {
		command: Command::ChipErase,
		marker: None,
		target: DeviceState::Unknown,
	},
];

impl Transition {
	pub fn of(command: Command) -> Transition {
		TRANSITIONS[command as usize]
	}

	pub fn satisfied_by(&self, response: &str) -> bool {
		let (marker, position) = match self.marker {
			None => return true,
			Some(m) => m,
		};
		let line = match position {
			LinePosition::First => response.trim().lines().next(),
			LinePosition::LastNonEmpty => response.lines().rev().find(|l| !l.trim().is_empty()),
		};
		line.map_or(false, |l| l.contains(marker.text()))
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Submenu {
	Read,
	Write,
	ChipErase,
}

impl Submenu {
	pub fn command(self) -> Command {
		match self {
			Submenu::Read => Command::Read,
			Submenu::Write => Command::Write,
			Submenu::ChipErase => Command::ChipErase,
		}
	}

	pub fn state(self) -> DeviceState {
		Transition::of(self.command()).target
	}
}

/// Numbered options inside the read and write submenus.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Selector {
	Signature,
	FuseLockBits,
	FlashDump,
	FlashWrite,
}

impl Selector {
	pub fn submenu(self) -> Submenu {
		match self {
			Selector::Signature | Selector::FuseLockBits | Selector::FlashDump => Submenu::Read,
			Selector::FlashWrite => Submenu::Write,
		}
	}

	pub fn byte(self) -> u8 {
		match self {
			Selector::Signature => b'1',
			Selector::FuseLockBits => b'2',
			Selector::FlashDump => b'5',
			Selector::FlashWrite => b'3',
		}
	}
}
