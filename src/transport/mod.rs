//! Byte channel to the programmer board.
//!
//! The board answers every command with a burst of menu text at serial
//! speed, with no framing; the only way to know a response is complete is
//! to wait until the line goes quiet.

mod serial;

pub use self::serial::SerialTransport;

use std::thread;
use std::time::{
	Duration,
	Instant,
};

use crate::ProgrammerError;

pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

/// Polling parameters for every wait on the device.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Timing {
	/// delay between two looks at the receive queue
	pub poll_interval: Duration,
	/// consecutive empty polls before a response counts as complete
	pub settle_polls: u32,
	/// upper bound for a single quiescent read, even if the device keeps talking
	pub max_wait: Duration,
	/// how often a command is repeated while waiting for its marker
	pub retries: u32,
}

impl Default for Timing {
	fn default() -> Self {
		Timing {
			poll_interval: Duration::from_millis(10),
			settle_polls: 3,
			max_wait: Duration::from_secs(30),
			retries: 16,
		}
	}
}

impl Timing {
	/// number of polls that fit into `max_wait` (at least one)
	pub fn max_polls(&self) -> u64 {
		let interval = self.poll_interval.as_micros().max(1);
		let polls = self.max_wait.as_micros() / interval;
		polls.max(1) as u64
	}
}

pub trait Transport {
	fn write(&mut self, data: &[u8]) -> crate::AResult<()>;

	/// bytes received and not yet read
	fn bytes_available(&mut self) -> crate::AResult<usize>;

	/// read exactly `count` bytes; only called with `count <= bytes_available()`
	fn read(&mut self, count: usize) -> crate::AResult<Vec<u8>>;

	// wait for one poll interval
	fn sleep(&mut self, duration: Duration) {
		reliable_sleep(duration);
	}
}

pub trait QuiescentRead: Transport {
	/// Collect device output until `timing.settle_polls` consecutive polls
	/// found nothing new.
	///
	/// A single empty poll is not enough: the board pauses between menu
	/// lines while it talks to the target chip, and returning early there
	/// would cut the response in half.
	fn read_quiescent(&mut self, timing: &Timing) -> crate::AResult<String> {
		let settle_polls = timing.settle_polls.max(1);
		let max_polls = timing.max_polls();
		let mut received = Vec::new();
		let mut idle_polls = 0u32;
		let mut polls = 0u64;

		loop {
			self.sleep(timing.poll_interval);
			polls += 1;

			let available = self.bytes_available()?;
			if available > 0 {
				received.extend(self.read(available)?);
				idle_polls = 0;
			} else {
				idle_polls += 1;
				if idle_polls >= settle_polls {
					break;
				}
			}

			if polls >= max_polls {
				debug!("device still talking after {} polls, returning {} bytes", polls, received.len());
				break;
			}
		}

		let text = String::from_utf8_lossy(&received).into_owned();
		trace!("<- {:?}", text);
		Ok(text)
	}

	/// Keep reading until `marker` shows up in the accumulated output.
	///
	/// Gives up after `timing.retries` quiescent reads without the marker.
	fn read_until(&mut self, marker: &str, timing: &Timing) -> crate::AResult<String> {
		let mut text = String::new();
		for _ in 0..timing.retries.max(1) {
			text.push_str(&self.read_quiescent(timing)?);
			if text.contains(marker) {
				return Ok(text);
			}
		}
		Err(ProgrammerError::unexpected_response(marker, &text).into())
	}

	fn send(&mut self, data: &[u8]) -> crate::AResult<()> {
		trace!("-> {:?}", String::from_utf8_lossy(data));
		self.write(data)
	}
}

impl<T: Transport + ?Sized> QuiescentRead for T {
}
