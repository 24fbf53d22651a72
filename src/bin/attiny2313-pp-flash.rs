#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate attiny2313_pp_flash;
use attiny2313_pp_flash::*;

use std::fs;
use std::process::exit;
use std::time::Duration;

use failure::ResultExt;

use attiny2313_pp_flash::flash::Programmer;
use attiny2313_pp_flash::transport::{
	SerialTransport,
	Timing,
	Transport,
};

fn get_param<T>(matches: &clap::ArgMatches, name: &str) -> AResult<T>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	param.parse::<T>().map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

fn get_timing(matches: &clap::ArgMatches) -> AResult<Timing> {
	Ok(Timing {
		poll_interval: Duration::from_millis(get_param(matches, "poll_ms")?),
		settle_polls: get_param(matches, "settle_polls")?,
		max_wait: Duration::from_millis(get_param(matches, "timeout_ms")?),
		retries: get_param(matches, "retries")?,
	})
}

fn save_flash<T: Transport>(programmer: &mut Programmer<T>, path: &str) -> AResult<()> {
	let image = programmer.read_flash()?;
	let records = hex::encode(&image)?;
	let text = hex::object_file(&records)?;
	fs::write(path, text).with_context(|e| format!("writing {}: {}", path, e))?;
	info!("Saved {} records to {}", records.len(), path);
	Ok(())
}

fn load_hex(path: &str) -> AResult<Vec<hex::Record>> {
	let text = fs::read_to_string(path).with_context(|e| format!("reading {}: {}", path, e))?;
	hex::decode_lines(&text).map_err(|e| {
		let msg = format!("{}: {}", path, e);
		e.context(msg).into()
	})
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@arg port: -P --port +takes_value +required "Serial port of the programmer board")
		(@arg baud: -b --baud +takes_value +required "Baud rate of the programmer board")
		(@arg read_flash: --("read-flash") +takes_value value_name[FILE] "Save flash to an Intel HEX file")
		(@arg write_flash: --("write-flash") +takes_value value_name[FILE] "Program flash from an Intel HEX file")
		(@arg verify: --verify requires[write_flash] "Read flash back after writing and compare")
		(@arg chip_erase: --("chip-erase") "Erase the chip")
		(@arg read_fuse_lockbits: --("read-fuse-lockbits") "Show fuse and lock bits")
		(@arg poll_ms: --("poll-ms") +takes_value default_value("10") "Delay between polls of the serial port (ms)")
		(@arg settle_polls: --("settle-polls") +takes_value default_value("3") "Empty polls before a response counts as complete")
		(@arg timeout_ms: --("timeout-ms") +takes_value default_value("30000") "Longest single wait for the board (ms)")
		(@arg retries: --retries +takes_value default_value("16") "Attempts before giving up on an expected answer")
	).get_matches();

	let port: String = get_param(&matches, "port")?;
	let baud: u32 = get_param(&matches, "baud")?;
	let timing = get_timing(&matches)?;

	// parse the input before touching the chip
	let records = match matches.value_of("write_flash") {
		Some(path) => Some(load_hex(path)?),
		None => None,
	};

	let transport = SerialTransport::open(&port, baud)?;
	let mut programmer = Programmer::connect(transport, timing)?;

	if matches.is_present("read_fuse_lockbits") {
		programmer.read_fuse_lock_bits()?;
	}

	if matches.is_present("chip_erase") {
		programmer.chip_erase()?;
	}

	if let Some(path) = matches.value_of("read_flash") {
		save_flash(&mut programmer, path)?;
	}

	if let Some(records) = records {
		programmer.write_flash(&records)?;
		if matches.is_present("verify") {
			programmer.verify_flash(&records)?;
		}
	}

	Ok(())
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		exit(1);
	}
}
