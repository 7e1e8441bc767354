//! Vendor-firmware UART modem, the other face of [`RadioTransport`].
//!
//! The alternative link hardware is an SX126x HAT whose on-board firmware
//! owns the LoRa modem entirely: the host talks 9600-baud UART and two
//! mode-select pins (M0/M1), and the firmware does framing, CRC and FEC
//! internally. Parameters go down as a 12-byte frame while M1 is high; with
//! both pins low the port is a transparent pipe.
//!
//! Used in transparent mode only; the firmware's fixed-address routing is an
//! application concern this layer does not expose.

use crate::config::{Hz, RadioConfig};
use crate::{Error, Packet, RadioTransport, Result};
use gpiocdev::line::Value;
use gpiocdev::Request;
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::Duration;

const BAUD: u32 = 9_600;

/// Set parameters without persisting them across power cycles.
const CMD_SET_VOLATILE: u8 = 0xC2;
/// First byte of the firmware's parameter echo.
const CMD_ACK: u8 = 0xC1;

/// Firmware needs this long after an M0/M1 change before it listens.
const MODE_SETTLE: Duration = Duration::from_millis(100);
/// The parameter echo arrives within this.
const ACK_TIMEOUT: Duration = Duration::from_millis(1000);
/// One frame drains from the firmware buffer at air rate; wait this long
/// after the first byte before collecting the rest.
const FRAME_GAP: Duration = Duration::from_millis(50);

/// The firmware exposes coarse air-rate presets instead of SF/BW/CR; the
/// flight setup uses 2.4 kbps, which matches SF7/125 kHz closely enough for
/// range testing against the register driver.
const AIR_RATE_2400: u8 = 0x02;
const UART_RATE_9600: u8 = 0b011 << 5;

/// BCM line offsets for the modem's mode-select pins.
#[derive(Clone, Copy, Debug)]
pub struct ModemPins {
    pub m0: u32,
    pub m1: u32,
}

/// Wiring of the HAT on the ground-station Pi.
pub const RPI_MODEM_PINS: ModemPins = ModemPins { m0: 22, m1: 27 };

pub struct UartModem {
    port: Box<dyn SerialPort>,
    m0: Request,
    m1: Request,
    pins: ModemPins,
    config: RadioConfig,
    /// Firmware appends one RSSI byte to every received frame when set.
    rssi_byte: bool,
}

impl UartModem {
    pub fn open(path: &str, gpiochip: &str, pins: ModemPins, config: RadioConfig) -> Result<Self> {
        let port = serialport::new(path, BAUD)
            .timeout(ACK_TIMEOUT)
            .open()?;
        let m0 = Request::builder()
            .on_chip(gpiochip)
            .with_line(pins.m0)
            .as_output(Value::Inactive)
            .request()?;
        let m1 = Request::builder()
            .on_chip(gpiochip)
            .with_line(pins.m1)
            .as_output(Value::Inactive)
            .request()?;
        Ok(UartModem {
            port,
            m0,
            m1,
            pins,
            config,
            rssi_byte: true,
        })
    }

    fn enter_config_mode(&mut self) -> Result<()> {
        self.m0.set_value(self.pins.m0, Value::Inactive)?;
        self.m1.set_value(self.pins.m1, Value::Active)?;
        thread::sleep(MODE_SETTLE);
        Ok(())
    }

    fn enter_transmission_mode(&mut self) -> Result<()> {
        self.m0.set_value(self.pins.m0, Value::Inactive)?;
        self.m1.set_value(self.pins.m1, Value::Inactive)?;
        thread::sleep(MODE_SETTLE);
        Ok(())
    }
}

impl RadioTransport for UartModem {
    fn configure(&mut self) -> Result<()> {
        let frame = parameter_frame(&self.config, self.rssi_byte)?;

        self.enter_config_mode()?;
        self.port.write_all(&frame)?;
        self.port.flush()?;

        self.port.set_timeout(ACK_TIMEOUT)?;
        let mut echo = [0u8; 1];
        self.port.read_exact(&mut echo)?;
        if echo[0] != CMD_ACK {
            return Err(Error::ModemRejected(echo.to_vec()));
        }
        // Swallow the rest of the echo; only the leading byte matters.
        let pending = self.port.bytes_to_read()?;
        let mut rest = vec![0u8; pending as usize];
        self.port.read_exact(&mut rest)?;

        self.enter_transmission_mode()
    }

    fn send(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > crate::registers::MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLong(payload.len()));
        }
        self.port.write_all(payload)?;
        self.port.flush()?;
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<Packet>> {
        self.port.set_timeout(timeout)?;
        let mut first = [0u8; 1];
        match self.port.read(&mut first) {
            Ok(0) => return Ok(None),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::TimedOut => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        // The rest of the frame trickles in at air rate.
        thread::sleep(FRAME_GAP);
        let pending = self.port.bytes_to_read()? as usize;
        let mut payload = vec![0u8; 1 + pending];
        payload[0] = first[0];
        self.port.read_exact(&mut payload[1..])?;

        let rssi_dbm = if self.rssi_byte {
            match payload.pop() {
                Some(byte) => rssi_from_trailer(byte),
                None => 0,
            }
        } else {
            0
        };

        // The firmware reports RSSI only; SNR never crosses the UART.
        Ok(Some(Packet {
            payload,
            rssi_dbm,
            snr_db: 0.0,
        }))
    }
}

/// The 12-byte volatile parameter frame: address, net id, rate byte, power
/// byte, channel, option flags, encryption key (unused).
fn parameter_frame(config: &RadioConfig, rssi_byte: bool) -> Result<[u8; 12]> {
    Ok([
        CMD_SET_VOLATILE,
        0x00, // start register
        0x09, // parameter count
        0x00, // ADDH
        0x00, // ADDL
        0x00, // net id
        UART_RATE_9600 | AIR_RATE_2400,
        power_bits(config.tx_power_dbm)?,
        channel(config.freq_hz)?,
        option_flags(rssi_byte),
        0x00,
        0x00,
    ])
}

/// Channel number: 1 MHz steps above the band base (410 or 850 MHz).
fn channel(freq: Hz) -> Result<u8> {
    let mhz = freq / 1_000_000;
    match mhz {
        410..=493 => Ok((mhz - 410) as u8),
        850..=930 => Ok((mhz - 850) as u8),
        _ => Err(Error::InvalidFrequency(freq)),
    }
}

/// Bits 1..0 of the power byte; the firmware only does four levels.
fn power_bits(dbm: i8) -> Result<u8> {
    match dbm {
        22 => Ok(0b00),
        17 => Ok(0b01),
        13 => Ok(0b10),
        10 => Ok(0b11),
        _ => Err(Error::InvalidTxPower(dbm)),
    }
}

/// Transparent transmission, default WOR period, optional RSSI trailer.
fn option_flags(rssi_byte: bool) -> u8 {
    0x03 | if rssi_byte { 0x80 } else { 0 }
}

/// The firmware appends the frame's RSSI as `256 - (-dBm)`.
fn rssi_from_trailer(byte: u8) -> i16 {
    i16::from(byte) - 256
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CANSAT_433;

    #[test]
    fn flight_parameter_frame() {
        let frame = parameter_frame(&CANSAT_433, true).unwrap();
        // 433 MHz = channel 23, +17 dBm, 9600/8N1 + 2.4k air, RSSI trailer.
        assert_eq!(
            [0xC2, 0x00, 0x09, 0x00, 0x00, 0x00, 0x62, 0x01, 0x17, 0x83, 0x00, 0x00],
            frame
        );
    }

    #[test]
    fn channel_covers_both_bands() {
        assert_eq!(23, channel(433_000_000).unwrap());
        assert_eq!(18, channel(868_000_000).unwrap());
        assert!(matches!(
            channel(2_400_000_000),
            Err(Error::InvalidFrequency(_))
        ));
    }

    #[test]
    fn power_maps_to_firmware_levels() {
        assert_eq!(0b01, power_bits(17).unwrap());
        assert!(matches!(power_bits(15), Err(Error::InvalidTxPower(15))));
    }

    #[test]
    fn rssi_trailer_is_negative_dbm() {
        assert_eq!(-50, rssi_from_trailer(206));
        assert_eq!(-156, rssi_from_trailer(100));
    }
}
