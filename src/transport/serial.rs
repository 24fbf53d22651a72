use std::io::{
	Read,
	Write,
};
use std::time::Duration;

use serialport::{
	DataBits,
	FlowControl,
	Parity,
	SerialPort,
	StopBits,
};

use super::Transport;

/// The programmer board behind a serial port (usually an USB-UART bridge).
pub struct SerialTransport {
	port: Box<dyn SerialPort>,
}

impl SerialTransport {
	pub fn open(device: &str, baud_rate: u32) -> crate::AResult<Self> {
		let port = with_context!(("opening serial port {}", device), {
			Ok(serialport::new(device, baud_rate)
				.data_bits(DataBits::Eight)
				.parity(Parity::None)
				.stop_bits(StopBits::One)
				.flow_control(FlowControl::None)
				.timeout(Duration::from_secs(1))
				.open()?)
		})?;

		info!("Opened serial port {} at {} baud", device, baud_rate);

		Ok(SerialTransport { port })
	}
}

impl Transport for SerialTransport {
	fn write(&mut self, data: &[u8]) -> crate::AResult<()> {
		self.port.write_all(data)?;
		self.port.flush()?;
		Ok(())
	}

	fn bytes_available(&mut self) -> crate::AResult<usize> {
		Ok(self.port.bytes_to_read()? as usize)
	}

	fn read(&mut self, count: usize) -> crate::AResult<Vec<u8>> {
		let mut buf = vec![0u8; count];
		self.port.read_exact(&mut buf)?;
		Ok(buf)
	}
}
