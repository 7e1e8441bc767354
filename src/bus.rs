//! Register transport: SPI plus the three discrete lines.
//!
//! [`Bus`] is the capability the driver is generic over: register access,
//! the reset line, and the DIO0 completion interrupt. [`SpiBus`] is the
//! production implementation for a Raspberry Pi; the driver tests substitute
//! a scripted mock.

use crate::registers::Register;
use crate::Result;
use gpiocdev::line::{EdgeDetection, Value};
use gpiocdev::Request;
use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};
use std::path::Path;
use std::time::Duration;

/// Bit 7 of the address byte marks the transaction as a write.
const WRITE_BIT: u8 = 0x80;

/// Everything the driver needs from the hardware. All register access is a
/// single CS-framed transaction; implementations must not interleave two
/// transactions, and callers serialize access by owning the bus exclusively.
pub trait Bus {
    fn read_register(&mut self, reg: Register) -> Result<u8>;
    fn write_register(&mut self, reg: Register, value: u8) -> Result<()>;
    /// Drive the hardware reset line (false = held in reset).
    fn set_reset(&mut self, level: bool) -> Result<()>;
    /// Current level of the DIO0 interrupt pin.
    fn irq_level(&mut self) -> Result<bool>;
    /// Block until a rising edge on DIO0 or the timeout; true if an edge
    /// arrived. The only suspension point in the driver.
    fn wait_for_edge(&mut self, timeout: Duration) -> Result<bool>;
}

/// BCM line offsets for the radio's discrete lines.
#[derive(Clone, Copy, Debug)]
pub struct Pins {
    pub cs: u32,
    pub reset: u32,
    pub dio0: u32,
}

/// Wiring used on the flight and ground Raspberry Pis (CE0, plus two GPIOs).
pub const RPI_PINS: Pins = Pins {
    cs: 8,
    reset: 25,
    dio0: 24,
};

pub struct SpiBus {
    spi: Spidev,
    cs: Request,
    reset: Request,
    dio0: Request,
    pins: Pins,
}

impl SpiBus {
    /// Open the SPI device (1 MHz, mode 0) and claim the three lines. CS is
    /// requested active-low so `Value::Active` asserts the chip.
    pub fn open<P: AsRef<Path>>(spi_path: P, gpiochip: &str, pins: Pins) -> Result<Self> {
        let mut spi = Spidev::open(spi_path)?;
        let options = SpidevOptions::new()
            .max_speed_hz(1_000_000)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        spi.configure(&options)?;

        let cs = Request::builder()
            .on_chip(gpiochip)
            .with_line(pins.cs)
            .as_active_low()
            .as_output(Value::Inactive)
            .request()?;
        let reset = Request::builder()
            .on_chip(gpiochip)
            .with_line(pins.reset)
            .as_output(Value::Active)
            .request()?;
        let dio0 = Request::builder()
            .on_chip(gpiochip)
            .with_line(pins.dio0)
            .with_edge_detection(EdgeDetection::RisingEdge)
            .request()?;

        Ok(SpiBus {
            spi,
            cs,
            reset,
            dio0,
            pins,
        })
    }

    fn transfer(&mut self, tx: &[u8; 2]) -> Result<[u8; 2]> {
        let mut rx = [0u8; 2];
        self.cs.set_value(self.pins.cs, Value::Active)?;
        let result = self
            .spi
            .transfer(&mut SpidevTransfer::read_write(tx, &mut rx));
        self.cs.set_value(self.pins.cs, Value::Inactive)?;
        result?;
        Ok(rx)
    }
}

impl Bus for SpiBus {
    fn read_register(&mut self, reg: Register) -> Result<u8> {
        let rx = self.transfer(&[u8::from(reg) & !WRITE_BIT, 0])?;
        Ok(rx[1])
    }

    fn write_register(&mut self, reg: Register, value: u8) -> Result<()> {
        self.transfer(&[u8::from(reg) | WRITE_BIT, value])?;
        Ok(())
    }

    fn set_reset(&mut self, level: bool) -> Result<()> {
        let value = if level { Value::Active } else { Value::Inactive };
        self.reset.set_value(self.pins.reset, value)?;
        Ok(())
    }

    fn irq_level(&mut self) -> Result<bool> {
        Ok(self.dio0.value(self.pins.dio0)? == Value::Active)
    }

    fn wait_for_edge(&mut self, timeout: Duration) -> Result<bool> {
        if !self.dio0.wait_edge_event(timeout)? {
            return Ok(false);
        }
        // Collapse any queued edges into one completion signal.
        while self.dio0.has_edge_event()? {
            self.dio0.read_edge_event()?;
        }
        Ok(true)
    }
}
