use failure::Fail;

/// Failures the programmer reports to its caller.
///
/// Codec errors carry the offending record line; device errors carry the
/// marker that never showed up and the tail of what the device sent instead.
#[derive(Clone, PartialEq, Eq, Debug, Fail)]
pub enum ProgrammerError {
	#[fail(display = "checksum mismatch in {:?}: computed 0x{:02X}, record says 0x{:02X}", line, computed, found)]
	ChecksumMismatch {
		line: String,
		computed: u8,
		found: u8,
	},

	#[fail(display = "record {:?} declares {} data bytes but carries {}", line, declared, actual)]
	RecordLengthMismatch {
		line: String,
		declared: usize,
		actual: usize,
	},

	#[fail(display = "malformed record {:?}: {}", line, reason)]
	MalformedRecord {
		line: String,
		reason: String,
	},

	#[fail(display = "device never answered with {:?} (last output: {:?})", expected, received)]
	UnexpectedDeviceResponse {
		expected: String,
		received: String,
	},

	#[fail(display = "flash capacity of {} words exceeded after {} records", limit, records_applied)]
	CapacityExceeded {
		limit: usize,
		records_applied: usize,
	},
}

// keep error messages readable when the device floods us with text
const RESPONSE_TAIL: usize = 80;

impl ProgrammerError {
	pub(crate) fn unexpected_response(expected: &str, received: &str) -> Self {
		let tail_start = received.char_indices()
			.rev()
			.nth(RESPONSE_TAIL - 1)
			.map(|(pos, _)| pos)
			.unwrap_or(0);
		ProgrammerError::UnexpectedDeviceResponse {
			expected: expected.to_string(),
			received: received[tail_start..].to_string(),
		}
	}

	pub(crate) fn malformed(line: &str, reason: impl Into<String>) -> Self {
		ProgrammerError::MalformedRecord {
			line: line.to_string(),
			reason: reason.into(),
		}
	}
}
