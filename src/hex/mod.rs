//! Intel HEX as spoken by the programmer: 16-bit address space, data and
//! end-of-file records only.

mod image;
mod record;

pub use self::image::{
	decode_image,
	decode_lines,
	encode,
	object_file,
	programmed_length,
	RECORD_SIZE,
};

pub use self::record::{
	checksum,
	decode,
	Record,
	RecordType,
};
