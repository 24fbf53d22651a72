use std::fmt;
use std::str::FromStr;

use crate::ProgrammerError;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum RecordType {
	Data,
	EndOfFile,
	ExtendedSegmentAddress,
	StartSegmentAddress,
	ExtendedLinearAddress,
	StartLinearAddress,
}

impl RecordType {
	pub fn code(self) -> u8 {
		match self {
			RecordType::Data => 0,
			RecordType::EndOfFile => 1,
			RecordType::ExtendedSegmentAddress => 2,
			RecordType::StartSegmentAddress => 3,
			RecordType::ExtendedLinearAddress => 4,
			RecordType::StartLinearAddress => 5,
		}
	}

	pub fn from_code(code: u8) -> Option<Self> {
		match code {
			0 => Some(RecordType::Data),
			1 => Some(RecordType::EndOfFile),
			2 => Some(RecordType::ExtendedSegmentAddress),
			3 => Some(RecordType::StartSegmentAddress),
			4 => Some(RecordType::ExtendedLinearAddress),
			5 => Some(RecordType::StartLinearAddress),
			_ => None,
		}
	}
}

/// Two's complement of the byte sum over all other fields of a record.
pub fn checksum(byte_count: u8, address: u16, record_type: RecordType, data: &[u8]) -> u8 {
	let mut fields = Vec::with_capacity(data.len() + 4);
	fields.push(byte_count);
	fields.extend_from_slice(&address.to_be_bytes());
	fields.push(record_type.code());
	fields.extend_from_slice(data);
	ihex::checksum(&fields)
}

/// One line of an Intel HEX file.
///
/// `data` holds raw bytes in file order; the programmer consumes them as
/// 16-bit words, see [`Record::words`].
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Record {
	pub byte_count: u8,
	pub address: u16,
	pub record_type: RecordType,
	pub data: Vec<u8>,
	pub checksum: u8,
}

impl Record {
	/// DATA record; callers keep `data` within the one-byte length field.
	pub(crate) fn data(address: u16, data: &[u8]) -> Self {
		debug_assert!(data.len() <= 0xff, "record payload too long: {} bytes", data.len());
		let byte_count = data.len() as u8;
		Record {
			byte_count,
			address,
			record_type: RecordType::Data,
			data: data.to_vec(),
			checksum: checksum(byte_count, address, RecordType::Data, data),
		}
	}

	/// `:00000001FF`
	pub fn end_of_file() -> Self {
		Record {
			byte_count: 0,
			address: 0,
			record_type: RecordType::EndOfFile,
			data: Vec::new(),
			checksum: 0xff,
		}
	}

	pub fn computed_checksum(&self) -> u8 {
		checksum(self.byte_count, self.address, self.record_type, &self.data)
	}

	/// Data as programmer words: first byte high, second low (the order
	/// they appear in the text). An odd trailing byte gets an erased low
	/// byte.
	pub fn words<'a>(&'a self) -> impl Iterator<Item = u16> + 'a {
		self.data.chunks(2).map(|pair| {
			let high = pair[0] as u16;
			let low = pair.get(1).copied().unwrap_or(0xff) as u16;
			(high << 8) | low
		})
	}

	pub fn word_count(&self) -> usize {
		(self.data.len() + 1) / 2
	}

	/// The record as the `ihex` crate models it. Address records need the
	/// payload size their type prescribes.
	pub fn to_ihex(&self) -> Result<ihex::Record, ProgrammerError> {
		let be16 = |bytes: &[u8]| ((bytes[0] as u16) << 8) | bytes[1] as u16;

		Ok(match self.record_type {
			RecordType::Data => ihex::Record::Data {
				offset: self.address,
				value: self.data.clone(),
			},
			RecordType::EndOfFile => ihex::Record::EndOfFile,
			RecordType::ExtendedSegmentAddress => ihex::Record::ExtendedSegmentAddress(be16(self.payload(2)?)),
			RecordType::StartSegmentAddress => {
				let p = self.payload(4)?;
				ihex::Record::StartSegmentAddress {
					cs: be16(&p[..2]),
					ip: be16(&p[2..]),
				}
			},
			RecordType::ExtendedLinearAddress => ihex::Record::ExtendedLinearAddress(be16(self.payload(2)?)),
			RecordType::StartLinearAddress => {
				let p = self.payload(4)?;
				ihex::Record::StartLinearAddress(((be16(&p[..2]) as u32) << 16) | be16(&p[2..]) as u32)
			},
		})
	}

	fn payload(&self, len: usize) -> Result<&[u8], ProgrammerError> {
		if self.data.len() == len {
			Ok(&self.data)
		} else {
			Err(ProgrammerError::malformed(
				&format!("{:?} record at 0x{:04X}", self.record_type, self.address),
				format!("{} payload bytes, expected {}", self.data.len(), len),
			))
		}
	}

	fn from_ihex(record: ihex::Record, address: u16) -> Self {
		let (address, record_type, data) = match record {
			ihex::Record::Data { offset, value } => (offset, RecordType::Data, value),
			ihex::Record::EndOfFile => (address, RecordType::EndOfFile, Vec::new()),
			ihex::Record::ExtendedSegmentAddress(base) => {
				(address, RecordType::ExtendedSegmentAddress, base.to_be_bytes().to_vec())
			},
			ihex::Record::StartSegmentAddress { cs, ip } => {
				let mut data = cs.to_be_bytes().to_vec();
				data.extend_from_slice(&ip.to_be_bytes());
				(address, RecordType::StartSegmentAddress, data)
			},
			ihex::Record::ExtendedLinearAddress(upper) => {
				(address, RecordType::ExtendedLinearAddress, upper.to_be_bytes().to_vec())
			},
			ihex::Record::StartLinearAddress(eip) => {
				(address, RecordType::StartLinearAddress, eip.to_be_bytes().to_vec())
			},
		};
		let byte_count = data.len() as u8;
		Record {
			byte_count,
			address,
			record_type,
			checksum: checksum(byte_count, address, record_type, &data),
			data,
		}
	}
}

impl fmt::Display for Record {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let line = self.to_ihex()
			.map_err(|e| e.to_string())
			.and_then(|r| r.to_record_string().map_err(|e| e.to_string()));
		match line {
			Ok(line) => f.write_str(&line),
			Err(reason) => write!(f, "<unencodable record: {}>", reason),
		}
	}
}

// raw bytes of a line that passed the start code and hex digit checks
fn line_bytes(text: &str) -> Option<Vec<u8>> {
	let body = text.get(1..)?;
	(0..body.len()).step_by(2)
		.map(|i| body.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
		.collect()
}

fn reader_error(text: &str, error: ihex::ReaderError) -> ProgrammerError {
	match (error, line_bytes(text)) {
		(ihex::ReaderError::ChecksumMismatch(..), Some(bytes)) if !bytes.is_empty() => {
			let last = bytes.len() - 1;
			ProgrammerError::ChecksumMismatch {
				line: text.to_string(),
				computed: ihex::checksum(&bytes[..last]),
				found: bytes[last],
			}
		},
		(ihex::ReaderError::PayloadLengthMismatch, Some(bytes)) if !bytes.is_empty() => ProgrammerError::RecordLengthMismatch {
			line: text.to_string(),
			declared: bytes[0] as usize,
			actual: bytes.len().saturating_sub(5),
		},
		(ihex::ReaderError::UnsupportedRecordType(code), _) => {
			ProgrammerError::malformed(text, format!("unknown record type 0x{:02X}", code))
		},
		(error, _) => ProgrammerError::malformed(text, error.to_string()),
	}
}

/// Parse a single record line (surrounding whitespace is ignored).
///
/// The embedded checksum has to match the fields and the declared length
/// has to match the payload; anything else is rejected.
pub fn decode(line: &str) -> Result<Record, ProgrammerError> {
	let text = line.trim();
	let record = ihex::Record::from_record_string(&text.to_ascii_uppercase())
		.map_err(|e| reader_error(text, e))?;
	// ihex drops the address field of non-data records
	let address = line_bytes(text)
		.filter(|bytes| bytes.len() >= 3)
		.map_or(0, |bytes| ((bytes[1] as u16) << 8) | bytes[2] as u16);
	Ok(Record::from_ihex(record, address))
}

impl FromStr for Record {
	type Err = ProgrammerError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		decode(s)
	}
}
