use super::{
	Programmer,
	FLASH_WORDS,
};
use crate::hex::{
	self,
	Record,
	RecordType,
};
use crate::menu::{
	Selector,
	Submenu,
};
use crate::transport::Transport;
use crate::ProgrammerError;

// erased flash; programming can only clear bits, so there's nothing to write
const ERASED_WORD: u16 = 0xffff;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub struct WriteSummary {
	/// DATA records completely sent and committed
	pub records_applied: usize,
	pub words_written: usize,
	/// erased words left alone
	pub words_skipped: usize,
}

impl<T: Transport> Programmer<T> {
	/// Erase the chip and program `records` in order, up to the EOF record.
	///
	/// The records are checked before the board is touched: each has to be
	/// a consistent DATA record starting at an even byte address past the
	/// previous one, and only the last may carry an odd number of bytes.
	/// Gaps stay erased. The board is always taken out of write mode and
	/// power cycled afterwards, also when programming failed.
	pub fn write_flash(&mut self, records: &[Record]) -> crate::AResult<WriteSummary> {
		let records = check_layout(records)?;
		self.chip_erase()?;

		info!("Writing flash");
		self.menu.return_to_main_menu()?;
		self.menu.enter_submenu(Submenu::Write)?;
		self.menu.select(Selector::FlashWrite)?;
		let ack = self.menu.read_response()?;
		debug!("flash write mode: {:?}", ack);

		let programmed = self.program_records(records);
		let finished = self.leave_write_mode();

		match (programmed, finished) {
			(Ok(summary), Ok(())) => {
				info!("Flash written: {} records, {} words written, {} erased words skipped",
					summary.records_applied, summary.words_written, summary.words_skipped);
				Ok(summary)
			},
			(Ok(_), Err(e)) => Err(e),
			(Err(e), Ok(())) => Err(e),
			(Err(e), Err(finish)) => {
				error!("Couldn't leave flash write mode: {}", finish);
				Err(e)
			},
		}
	}

	/// Read the flash back and compare it with what `records` describe.
	pub fn verify_flash(&mut self, records: &[Record]) -> crate::AResult<()> {
		let expected = hex::decode_image(records)?;
		let flash = self.read_flash()?;
		ensure!(flash.len() >= expected.len(),
			"Verify failed: image has {} bytes, flash only {}", expected.len(), flash.len()
		);
		for (offset, (&want, &have)) in expected.iter().zip(flash.iter()).enumerate() {
			ensure!(want == have,
				"Verify failed at 0x{:04x}: expected {:02x}, flash is {:02x}", offset, want, have
			);
		}
		info!("Verified {} bytes", expected.len());
		Ok(())
	}

	// `records` went through check_layout: DATA only, ascending, word aligned
	fn program_records(&mut self, records: &[Record]) -> crate::AResult<WriteSummary> {
		let mut summary = WriteSummary::default();
		// word address the board's high byte register was last set for
		let mut address = 0usize;

		for record in records {
			let words = record.word_count();
			if words == 0 {
				summary.records_applied += 1;
				continue;
			}
			let start = record.address as usize / 2;
			if start + words > FLASH_WORDS {
				warn!("{} doesn't fit at word 0x{:03x}", record, start);
				return Err(ProgrammerError::CapacityExceeded {
					limit: FLASH_WORDS,
					records_applied: summary.records_applied,
				}.into());
			}
			if start >> 8 != address >> 8 {
				debug!("skipping to word 0x{:03x}", start);
				self.commit_page(start)?;
			}
			address = start;

			for (i, word) in record.words().enumerate() {
				let at = address + i;
				if i > 0 && at & 0xff == 0 {
					self.commit_page(at)?;
				}
				if word == ERASED_WORD {
					summary.words_skipped += 1;
					continue;
				}
				self.menu.send_line(&format!("{:02X}", at & 0xff))?;
				trace!("address: {:?}", self.menu.read_response()?);
				self.menu.send_line(&format!("{:04X}", word))?;
				trace!("data: {:?}", self.menu.read_response()?);
				summary.words_written += 1;
			}
			address += words;
			self.commit_page(address)?;
			summary.records_applied += 1;
		}
		Ok(summary)
	}

	// program the buffered words, then load the high byte for `next`
	fn commit_page(&mut self, next: usize) -> crate::AResult<()> {
		self.menu.send_line("w")?;
		self.menu.send_line(&format!("{:02X}", (next >> 8) & 0xff))?;
		debug!("page commit: {:?}", self.menu.read_response()?);
		Ok(())
	}

	fn leave_write_mode(&mut self) -> crate::AResult<()> {
		self.menu.send_line("q")?;
		debug!("leaving flash write: {:?}", self.menu.read_response()?);
		self.menu.return_to_main_menu()?;
		self.menu.power_cycle()
	}
}

/// The records up to (not including) EOF, once all of them are safe to
/// program.
fn check_layout(records: &[Record]) -> Result<&[Record], ProgrammerError> {
	let end = records.iter()
		.position(|r| r.record_type == RecordType::EndOfFile)
		.unwrap_or_else(|| {
			warn!("No EOF record, programming all {} records", records.len());
			records.len()
		});
	let records = &records[..end];

	// next free byte address
	let mut next = 0usize;
	for (index, record) in records.iter().enumerate() {
		if record.record_type != RecordType::Data {
			let reason = format!("unsupported record type {:?}", record.record_type);
			return Err(ProgrammerError::malformed(&record.to_string(), reason));
		}
		check_record(record)?;
		if record.data.is_empty() {
			continue;
		}

		let start = record.address as usize;
		if start % 2 != 0 {
			let reason = format!("starts at odd byte address 0x{:04X}", start);
			return Err(ProgrammerError::malformed(&record.to_string(), reason));
		}
		if start < next {
			let reason = format!("overlaps data up to byte address 0x{:04X}", next);
			return Err(ProgrammerError::malformed(&record.to_string(), reason));
		}
		let last = records[index + 1..].iter().all(|r| r.data.is_empty());
		if record.data.len() % 2 != 0 && !last {
			let reason = format!("odd byte count {} before the last data record", record.data.len());
			return Err(ProgrammerError::malformed(&record.to_string(), reason));
		}
		next = start + record.data.len();
	}
	Ok(records)
}

// records can be built by hand, so check them again before they hit the chip
fn check_record(record: &Record) -> Result<(), ProgrammerError> {
	if record.byte_count as usize != record.data.len() {
		return Err(ProgrammerError::RecordLengthMismatch {
			line: record.to_string(),
			declared: record.byte_count as usize,
			actual: record.data.len(),
		});
	}
	let computed = record.computed_checksum();
	if computed != record.checksum {
		return Err(ProgrammerError::ChecksumMismatch {
			line: record.to_string(),
			computed,
			found: record.checksum,
		});
	}
	Ok(())
}
