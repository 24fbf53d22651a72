use super::record::{
	decode,
	Record,
	RecordType,
};

/// Data bytes per record written by [`encode`].
pub const RECORD_SIZE: usize = 32;

// highest byte address a record without extended addressing can carry
const ADDRESS_SPACE: usize = 0x1_0000;

/// Image length without trailing erased (`0xFF`) bytes.
///
/// A fully erased image keeps one byte so the file still says something
/// about the chip; only an empty image has length zero.
pub fn programmed_length(image: &[u8]) -> usize {
	match image.iter().rposition(|&b| b != 0xff) {
		Some(last) => last + 1,
		None => image.len().min(1),
	}
}

/// Split a flash image into DATA records of up to [`RECORD_SIZE`] bytes
/// and terminate with an EOF record.
pub fn encode(image: &[u8]) -> crate::AResult<Vec<Record>> {
	let length = programmed_length(image);
	ensure!(length <= ADDRESS_SPACE,
		"image of {} bytes needs extended address records", length
	);

	let mut records: Vec<Record> = image[..length]
		.chunks(RECORD_SIZE)
		.enumerate()
		.map(|(page, data)| Record::data((page * RECORD_SIZE) as u16, data))
		.collect();
	records.push(Record::end_of_file());

	debug!("encoded {} of {} bytes into {} records", length, image.len(), records.len());
	Ok(records)
}

/// Assemble DATA records into an image, placing each at its address and
/// filling gaps with `0xFF`. Stops at the EOF record.
pub fn decode_image(records: &[Record]) -> crate::AResult<Vec<u8>> {
	let mut image = Vec::new();
	for record in records {
		match record.record_type {
			RecordType::EndOfFile => break,
			RecordType::Data => {
				let start = record.address as usize;
				let end = start + record.data.len();
				if image.len() < end {
					image.resize(end, 0xff);
				}
				image[start..end].copy_from_slice(&record.data);
			},
			other => bail!("unsupported record type {:?} in {}", other, record),
		}
	}
	Ok(image)
}

/// Render records as hex file text, one record per line.
pub fn object_file(records: &[Record]) -> crate::AResult<String> {
	let records = records.iter()
		.map(Record::to_ihex)
		.collect::<Result<Vec<_>, _>>()?;
	Ok(ihex::create_object_file_representation(&records)?)
}

/// Decode every non-blank line of a hex file.
///
/// Fails on the first bad line, naming its (1-based) line number.
pub fn decode_lines(text: &str) -> crate::AResult<Vec<Record>> {
	let mut records = Vec::new();
	for (index, line) in text.lines().enumerate() {
		if line.trim().is_empty() {
			continue;
		}
		let record = with_context!(("line {}", index + 1), {
			Ok(decode(line)?)
		})?;
		records.push(record);
	}
	Ok(records)
}
