//! CanSat telemetry link on the SX127x LoRa transceiver.
//!
//! The chip hangs off SPI plus three discrete lines (chip select, reset,
//! DIO0 completion interrupt); this crate does the register-level work
//! itself: carrier synthesis, modem setup, FIFO framing, and the
//! interrupt/timeout-driven mode machine. [`Lora`] is the register driver;
//! [`modem::UartModem`] is the alternative vendor-firmware module behind the
//! same [`RadioTransport`] seam, picked at composition time.
//!
//! No internal locking: a [`Lora`] owns its [`bus::Bus`] and serializes all
//! register traffic through `&mut self`. To transmit and receive from
//! separate threads, share one driver behind a mutex; the chip-select
//! framing and FIFO pointer are not reentrant.

use std::thread;
use std::time::Duration;
use thiserror::Error;

pub mod bus;
pub mod config;
pub mod modem;
pub mod registers;

use bus::Bus;
use config::{Hz, RadioConfig, FRF_RESOLUTION_BITS, FXOSC};
use registers::{
    Dio0, DioMapping1, IrqFlags, Lna, LnaGain, Mode, ModemConfig1, ModemConfig2, OpMode, PaConfig,
    Register, MAX_PAYLOAD_LEN,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error("SPI transfer failed")]
    Io(#[from] std::io::Error),
    #[error("GPIO line request failed")]
    Gpio(#[from] gpiocdev::Error),
    #[error("serial port unavailable")]
    Serial(#[from] serialport::Error),
    #[error("chip version reads {found:#04x}, expected {:#04x}; module absent or miswired", registers::VERSION)]
    Disconnected { found: u8 },
    #[error("carrier {0} Hz outside the 137-1020 MHz tuning range")]
    InvalidFrequency(Hz),
    #[error("no bandwidth setting for {0} Hz")]
    InvalidBandwidth(Hz),
    #[error("spreading factor {0} outside 7-12")]
    InvalidSpreadingFactor(u8),
    #[error("coding rate 4/{0} outside 4/5-4/8")]
    InvalidCodingRate(u8),
    #[error("{0} dBm outside the 2-17 dBm PA_BOOST range")]
    InvalidTxPower(i8),
    #[error("{0} preamble symbols is below the {} symbol minimum", config::PREAMBLE_MIN)]
    PreambleTooShort(u16),
    #[error("modem settings may only be written in Sleep, mode is {0:?}")]
    ModemNotInSleep(Mode),
    #[error("TX completion not signalled within {0:?}")]
    TxTimeout(Duration),
    #[error("received payload failed CRC check")]
    Crc,
    #[error("payload of {0} bytes exceeds the 255 byte FIFO frame")]
    PayloadTooLong(usize),
    #[error("modem did not acknowledge parameter frame: {0:02X?}")]
    ModemRejected(Vec<u8>),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One received frame plus its signal quality. Transient: handed to the
/// caller and never retained by the driver.
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    pub payload: Vec<u8>,
    pub rssi_dbm: i16,
    pub snr_db: f32,
}

/// The link operations both radio variants provide. The raw register driver
/// ([`Lora`]) and the vendor-firmware UART module ([`modem::UartModem`]) are
/// interchangeable behind this.
pub trait RadioTransport {
    fn configure(&mut self) -> Result<()>;
    fn send(&mut self, payload: &[u8]) -> Result<()>;
    fn poll(&mut self, timeout: Duration) -> Result<Option<Packet>>;
}

/// Settle time after a mode write before the chip is trustworthy again.
const SETTLE: Duration = Duration::from_millis(10);

/// How long a transmission may take before it is abandoned. Worst-case
/// airtime at SF12/125 kHz for a full frame is well under this.
const TX_TIMEOUT: Duration = Duration::from_secs(5);

/// Packet RSSI register offset for the high-frequency port (DS 5.5.5).
const RSSI_OFFSET: i16 = 157;

/// Both FIFO halves start at zero: the full 256 bytes serve whichever
/// direction is active, since TX and RX never overlap here.
const FIFO_TX_BASE: u8 = 0x00;
const FIFO_RX_BASE: u8 = 0x00;

/// RX symbol timeout, only relevant to single-shot receive; 100 symbols.
const SYMB_TIMEOUT: u8 = 0x64;

pub struct Lora<B: Bus> {
    bus: B,
    config: RadioConfig,
    mode: Mode,
    /// Abandon a transmission after this long without a completion edge.
    pub tx_timeout: Duration,
    /// Post-transition settle delay; the chip needs ~10 ms.
    pub settle: Duration,
}

impl<B: Bus> Lora<B> {
    pub fn new(bus: B, config: RadioConfig) -> Self {
        Lora {
            bus,
            config,
            mode: Mode::Sleep,
            tx_timeout: TX_TIMEOUT,
            settle: SETTLE,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn config(&self) -> &RadioConfig {
        &self.config
    }

    /// Bring the chip from hardware reset to Standby with the modem
    /// programmed. Validates the configuration, pulses the reset line,
    /// verifies the identification register, then writes every modem
    /// parameter while the chip sits in Sleep (the only state where those
    /// writes are defined).
    pub fn configure(&mut self) -> Result<()> {
        self.config.validate()?;
        self.reset()?;

        let version = self.bus.read_register(Register::Version)?;
        if version != registers::VERSION {
            return Err(Error::Disconnected { found: version });
        }

        // Entering Sleep and raising the long-range bit happen in one write.
        self.set_mode(Mode::Sleep)?;
        self.write_modem_settings()?;
        self.set_mode(Mode::Standby)
    }

    fn reset(&mut self) -> Result<()> {
        self.bus.set_reset(false)?;
        thread::sleep(self.settle);
        self.bus.set_reset(true)?;
        thread::sleep(self.settle);
        // Hardware reset leaves the chip in Sleep.
        self.mode = Mode::Sleep;
        Ok(())
    }

    fn write_modem_settings(&mut self) -> Result<()> {
        if self.mode != Mode::Sleep {
            return Err(Error::ModemNotInSleep(self.mode));
        }

        let [msb, mid, lsb] = config::frf(self.config.freq_hz, FXOSC, FRF_RESOLUTION_BITS);
        self.bus.write_register(Register::FrfMsb, msb)?;
        self.bus.write_register(Register::FrfMid, mid)?;
        self.bus.write_register(Register::FrfLsb, lsb)?;

        let pa = PaConfig {
            pa_boost: true,
            max_power: 7,
            // Pout = 2 + output_power on PA_BOOST; validate() bounded this.
            output_power: (self.config.tx_power_dbm - 2) as u8,
        };
        self.bus.write_register(Register::PaConfig, pa.into())?;

        let lna = Lna {
            gain: LnaGain::G1,
            boost_hf: true,
        };
        self.bus.write_register(Register::Lna, lna.into())?;

        let mc1 = ModemConfig1 {
            bandwidth: self.config.bandwidth()?,
            coding_rate: self.config.coding_rate()?,
            implicit_header: false,
        };
        self.bus.write_register(Register::ModemConfig1, mc1.into())?;

        let mc2 = ModemConfig2 {
            spreading_factor: self.config.spreading_factor()?,
            tx_continuous: false,
            rx_crc: self.config.crc,
        };
        self.bus.write_register(Register::ModemConfig2, mc2.into())?;

        self.bus
            .write_register(Register::SymbTimeoutLsb, SYMB_TIMEOUT)?;

        let [pre_msb, pre_lsb] = self.config.preamble_symbols.to_be_bytes();
        self.bus.write_register(Register::PreambleMsb, pre_msb)?;
        self.bus.write_register(Register::PreambleLsb, pre_lsb)?;

        self.bus
            .write_register(Register::FifoTxBaseAddr, FIFO_TX_BASE)?;
        self.bus
            .write_register(Register::FifoRxBaseAddr, FIFO_RX_BASE)?;
        Ok(())
    }

    /// Move the chip to `target` and wait out the settle time. Transitions
    /// are unconditional and idempotent; only modem parameter writes care
    /// what state they run in.
    pub fn set_mode(&mut self, target: Mode) -> Result<()> {
        let op = OpMode {
            mode: target,
            long_range: true,
        };
        self.bus.write_register(Register::OpMode, op.into())?;
        thread::sleep(self.settle);
        self.mode = target;
        Ok(())
    }

    /// Transmit one frame and block until the chip signals completion or
    /// `tx_timeout` passes. Whatever happens, the chip is back in Standby
    /// when this returns; a failed send must not leave it keyed up in Tx.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLong(payload.len()));
        }

        self.set_mode(Mode::Standby)?;
        self.bus
            .write_register(Register::FifoAddrPtr, FIFO_TX_BASE)?;
        // The chip advances its FIFO pointer on every data write.
        for &byte in payload {
            self.bus.write_register(Register::Fifo, byte)?;
        }
        self.bus
            .write_register(Register::PayloadLength, payload.len() as u8)?;

        let mapping = DioMapping1 { dio0: Dio0::TxDone };
        self.bus
            .write_register(Register::DioMapping1, mapping.into())?;
        self.set_mode(Mode::Tx)?;

        let sent = self.wait_tx_done();
        let parked = self.set_mode(Mode::Standby);
        sent.and(parked)
    }

    fn wait_tx_done(&mut self) -> Result<()> {
        if !self.bus.wait_for_edge(self.tx_timeout)? {
            return Err(Error::TxTimeout(self.tx_timeout));
        }
        let flags = IrqFlags::from_bits_retain(self.bus.read_register(Register::IrqFlags)?);
        self.bus.write_register(Register::IrqFlags, flags.bits())?;
        if flags.contains(IrqFlags::TX_DONE) {
            Ok(())
        } else {
            Err(Error::TxTimeout(self.tx_timeout))
        }
    }

    /// Wait up to `timeout` for one frame. `Ok(None)` means nothing arrived;
    /// `Err(Error::Crc)` means a frame arrived corrupted, so callers tracking
    /// link quality can tell the two apart. In every outcome the receiver
    /// stays armed in RxContinuous.
    pub fn poll(&mut self, timeout: Duration) -> Result<Option<Packet>> {
        if self.mode != Mode::RxContinuous {
            let mapping = DioMapping1 { dio0: Dio0::RxDone };
            self.bus
                .write_register(Register::DioMapping1, mapping.into())?;
            // Entering RxContinuous resets the FIFO, so this must not be
            // re-issued while a reception may be in flight.
            self.set_mode(Mode::RxContinuous)?;
        }

        if !self.bus.wait_for_edge(timeout)? {
            // Re-arm in case the edge was missed while the flags were stale.
            self.set_mode(Mode::RxContinuous)?;
            return Ok(None);
        }

        let flags = IrqFlags::from_bits_retain(self.bus.read_register(Register::IrqFlags)?);
        self.bus.write_register(Register::IrqFlags, flags.bits())?;

        if flags.contains(IrqFlags::PAYLOAD_CRC_ERROR) {
            return Err(Error::Crc);
        }
        if !flags.contains(IrqFlags::RX_DONE) {
            // Edge without RxDone: some other event fired; keep listening.
            return Ok(None);
        }

        let current = self.bus.read_register(Register::FifoRxCurrentAddr)?;
        self.bus.write_register(Register::FifoAddrPtr, current)?;
        let len = self.bus.read_register(Register::RxNbBytes)?;
        let mut payload = Vec::with_capacity(len.into());
        for _ in 0..len {
            payload.push(self.bus.read_register(Register::Fifo)?);
        }

        let rssi_dbm = i16::from(self.bus.read_register(Register::PktRssiValue)?) - RSSI_OFFSET;
        let snr_db = f32::from(self.bus.read_register(Register::PktSnrValue)? as i8) / 4.0;

        Ok(Some(Packet {
            payload,
            rssi_dbm,
            snr_db,
        }))
    }
}

impl<B: Bus> RadioTransport for Lora<B> {
    fn configure(&mut self) -> Result<()> {
        Lora::configure(self)
    }

    fn send(&mut self, payload: &[u8]) -> Result<()> {
        Lora::send(self, payload)
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<Packet>> {
        Lora::poll(self, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted stand-in for the SPI bus: a flat register file, a FIFO read
    /// queue, and a queue of wait_for_edge outcomes.
    struct MockBus {
        regs: [u8; 0x80],
        writes: Vec<(Register, u8)>,
        fifo_rx: VecDeque<u8>,
        edges: VecDeque<bool>,
        resets: Vec<bool>,
    }

    impl MockBus {
        fn new() -> Self {
            let mut regs = [0u8; 0x80];
            regs[u8::from(Register::Version) as usize] = registers::VERSION;
            MockBus {
                regs,
                writes: Vec::new(),
                fifo_rx: VecDeque::new(),
                edges: VecDeque::new(),
                resets: Vec::new(),
            }
        }

        fn reg(&self, reg: Register) -> u8 {
            self.regs[u8::from(reg) as usize]
        }

        fn set_reg(&mut self, reg: Register, value: u8) {
            self.regs[u8::from(reg) as usize] = value;
        }

        fn writes_to(&self, reg: Register) -> Vec<u8> {
            self.writes
                .iter()
                .filter(|(r, _)| *r == reg)
                .map(|(_, v)| *v)
                .collect()
        }
    }

    impl Bus for MockBus {
        fn read_register(&mut self, reg: Register) -> Result<u8> {
            match reg {
                Register::Fifo => Ok(self.fifo_rx.pop_front().unwrap_or(0)),
                _ => Ok(self.reg(reg)),
            }
        }

        fn write_register(&mut self, reg: Register, value: u8) -> Result<()> {
            self.writes.push((reg, value));
            match reg {
                // Write-1-to-clear, like the chip.
                Register::IrqFlags => {
                    let cleared = self.reg(Register::IrqFlags) & !value;
                    self.set_reg(Register::IrqFlags, cleared);
                }
                Register::Fifo => {}
                _ => self.set_reg(reg, value),
            }
            Ok(())
        }

        fn set_reset(&mut self, level: bool) -> Result<()> {
            self.resets.push(level);
            Ok(())
        }

        fn irq_level(&mut self) -> Result<bool> {
            Ok(false)
        }

        fn wait_for_edge(&mut self, _timeout: Duration) -> Result<bool> {
            Ok(self.edges.pop_front().unwrap_or(false))
        }
    }

    fn radio(bus: MockBus) -> Lora<MockBus> {
        let mut radio = Lora::new(bus, config::CANSAT_433);
        radio.settle = Duration::ZERO;
        radio
    }

    const OPMODE_SLEEP: u8 = 0x80;
    const OPMODE_STANDBY: u8 = 0x81;
    const OPMODE_TX: u8 = 0x83;
    const OPMODE_RX: u8 = 0x85;

    #[test]
    fn configure_programs_modem_and_parks_in_standby() {
        let mut radio = radio(MockBus::new());
        radio.configure().unwrap();

        assert_eq!(Mode::Standby, radio.mode());
        assert_eq!(vec![false, true], radio.bus.resets);

        assert_eq!(vec![0x6C], radio.bus.writes_to(Register::FrfMsb));
        assert_eq!(vec![0x40], radio.bus.writes_to(Register::FrfMid));
        assert_eq!(vec![0x00], radio.bus.writes_to(Register::FrfLsb));
        assert_eq!(vec![0xFF], radio.bus.writes_to(Register::PaConfig));
        assert_eq!(vec![0x23], radio.bus.writes_to(Register::Lna));
        assert_eq!(vec![0x72], radio.bus.writes_to(Register::ModemConfig1));
        assert_eq!(vec![0x74], radio.bus.writes_to(Register::ModemConfig2));
        assert_eq!(vec![0x00], radio.bus.writes_to(Register::PreambleMsb));
        assert_eq!(vec![0x08], radio.bus.writes_to(Register::PreambleLsb));
        assert_eq!(vec![0x00], radio.bus.writes_to(Register::FifoTxBaseAddr));
        assert_eq!(vec![0x00], radio.bus.writes_to(Register::FifoRxBaseAddr));

        // Sleep first, Standby last: every modem write lands in between.
        assert_eq!(
            vec![OPMODE_SLEEP, OPMODE_STANDBY],
            radio.bus.writes_to(Register::OpMode)
        );
        let sleep_at = radio
            .bus
            .writes
            .iter()
            .position(|w| *w == (Register::OpMode, OPMODE_SLEEP))
            .unwrap();
        let standby_at = radio
            .bus
            .writes
            .iter()
            .position(|w| *w == (Register::OpMode, OPMODE_STANDBY))
            .unwrap();
        let mc1_at = radio
            .bus
            .writes
            .iter()
            .position(|w| w.0 == Register::ModemConfig1)
            .unwrap();
        assert!(sleep_at < mc1_at && mc1_at < standby_at);
    }

    #[test]
    fn configure_detects_missing_hardware() {
        let mut bus = MockBus::new();
        bus.set_reg(Register::Version, 0x00);
        let mut radio = radio(bus);

        assert!(matches!(
            radio.configure(),
            Err(Error::Disconnected { found: 0x00 })
        ));
        // No modem parameter may have been written blind.
        assert!(radio.bus.writes_to(Register::ModemConfig1).is_empty());
    }

    #[test]
    fn configure_rejects_invalid_config_before_touching_hardware() {
        let mut bad = config::CANSAT_433;
        bad.tx_power_dbm = 20;
        let mut radio = Lora::new(MockBus::new(), bad);
        radio.settle = Duration::ZERO;

        assert!(matches!(radio.configure(), Err(Error::InvalidTxPower(20))));
        assert!(radio.bus.writes.is_empty());
        assert!(radio.bus.resets.is_empty());
    }

    #[test]
    fn modem_writes_are_refused_outside_sleep() {
        let mut radio = radio(MockBus::new());
        radio.set_mode(Mode::Standby).unwrap();

        assert!(matches!(
            radio.write_modem_settings(),
            Err(Error::ModemNotInSleep(Mode::Standby))
        ));
        assert!(radio.bus.writes_to(Register::ModemConfig1).is_empty());
    }

    #[test]
    fn send_loads_fifo_and_returns_to_standby() {
        let mut bus = MockBus::new();
        bus.edges.push_back(true);
        bus.set_reg(Register::IrqFlags, IrqFlags::TX_DONE.bits());
        let mut radio = radio(bus);

        radio.send(b"HELLO").unwrap();

        assert_eq!(Mode::Standby, radio.mode());
        assert_eq!(b"HELLO".to_vec(), radio.bus.writes_to(Register::Fifo));
        assert_eq!(vec![5], radio.bus.writes_to(Register::PayloadLength));
        assert_eq!(vec![0x00], radio.bus.writes_to(Register::FifoAddrPtr));
        assert_eq!(vec![0x40], radio.bus.writes_to(Register::DioMapping1));
        // Standby in, Tx, Standby back out.
        assert_eq!(
            vec![OPMODE_STANDBY, OPMODE_TX, OPMODE_STANDBY],
            radio.bus.writes_to(Register::OpMode)
        );
        // TxDone was cleared by writing back exactly what was read.
        assert_eq!(
            vec![IrqFlags::TX_DONE.bits()],
            radio.bus.writes_to(Register::IrqFlags)
        );
        assert_eq!(0, radio.bus.reg(Register::IrqFlags));
    }

    #[test]
    fn send_timeout_still_parks_in_standby() {
        // No edge queued: the wait times out.
        let mut radio = radio(MockBus::new());

        assert!(matches!(radio.send(b"HELLO"), Err(Error::TxTimeout(_))));
        assert_eq!(Mode::Standby, radio.mode());
        assert_eq!(
            Some(&OPMODE_STANDBY),
            radio.bus.writes_to(Register::OpMode).last()
        );
    }

    #[test]
    fn send_without_txdone_flag_is_a_timeout() {
        let mut bus = MockBus::new();
        bus.edges.push_back(true);
        // Edge fired but the flag register never latched TxDone.
        let mut radio = radio(bus);

        assert!(matches!(radio.send(b"HELLO"), Err(Error::TxTimeout(_))));
        assert_eq!(Mode::Standby, radio.mode());
    }

    #[test]
    fn send_rejects_oversized_payload() {
        let mut radio = radio(MockBus::new());
        let payload = [0u8; 256];

        assert!(matches!(
            radio.send(&payload),
            Err(Error::PayloadTooLong(256))
        ));
        assert!(radio.bus.writes.is_empty());
    }

    #[test]
    fn poll_timeout_rearms_and_reports_nothing() {
        let mut radio = radio(MockBus::new());

        assert_eq!(None, radio.poll(Duration::from_secs(1)).unwrap());
        assert_eq!(Mode::RxContinuous, radio.mode());
        // Armed once on entry, re-armed defensively on timeout.
        assert_eq!(
            vec![OPMODE_RX, OPMODE_RX],
            radio.bus.writes_to(Register::OpMode)
        );
        assert_eq!(vec![0x00], radio.bus.writes_to(Register::DioMapping1));
    }

    #[test]
    fn poll_does_not_rearm_while_already_listening() {
        let mut radio = radio(MockBus::new());

        radio.poll(Duration::from_secs(1)).unwrap();
        radio.poll(Duration::from_secs(1)).unwrap();

        // DIO mapping written once; the FIFO must not be reset mid-reception.
        assert_eq!(vec![0x00], radio.bus.writes_to(Register::DioMapping1));
        assert_eq!(3, radio.bus.writes_to(Register::OpMode).len());
    }

    #[test]
    fn poll_returns_packet_with_signal_quality() {
        let mut bus = MockBus::new();
        bus.edges.push_back(true);
        bus.set_reg(Register::IrqFlags, IrqFlags::RX_DONE.bits());
        bus.set_reg(Register::FifoRxCurrentAddr, 0x40);
        bus.set_reg(Register::RxNbBytes, 5);
        bus.fifo_rx.extend(b"HELLO");
        bus.set_reg(Register::PktRssiValue, 200);
        bus.set_reg(Register::PktSnrValue, 20);
        let mut radio = radio(bus);

        let packet = radio.poll(Duration::from_secs(1)).unwrap().unwrap();

        assert_eq!(b"HELLO".to_vec(), packet.payload);
        assert_eq!(43, packet.rssi_dbm); // 200 - 157
        assert_eq!(5.0, packet.snr_db); // 20 / 4
        assert_eq!(Mode::RxContinuous, radio.mode());
        // FIFO pointer rewound to where the frame landed.
        assert_eq!(vec![0x40], radio.bus.writes_to(Register::FifoAddrPtr));
    }

    #[test]
    fn poll_reads_negative_snr_and_zero_rssi() {
        let mut bus = MockBus::new();
        bus.edges.push_back(true);
        bus.set_reg(Register::IrqFlags, IrqFlags::RX_DONE.bits());
        bus.set_reg(Register::RxNbBytes, 1);
        bus.fifo_rx.push_back(0xAA);
        bus.set_reg(Register::PktRssiValue, 157);
        bus.set_reg(Register::PktSnrValue, 0xE8); // -24 as i8
        let mut radio = radio(bus);

        let packet = radio.poll(Duration::from_secs(1)).unwrap().unwrap();

        assert_eq!(0, packet.rssi_dbm);
        assert_eq!(-6.0, packet.snr_db);
    }

    #[test]
    fn poll_discards_corrupt_frames_but_keeps_listening() {
        let mut bus = MockBus::new();
        bus.edges.push_back(true);
        bus.set_reg(
            Register::IrqFlags,
            (IrqFlags::RX_DONE | IrqFlags::PAYLOAD_CRC_ERROR).bits(),
        );
        bus.set_reg(Register::RxNbBytes, 5);
        bus.fifo_rx.extend(b"HELLO");
        let mut radio = radio(bus);

        assert!(matches!(
            radio.poll(Duration::from_secs(1)),
            Err(Error::Crc)
        ));
        assert_eq!(Mode::RxContinuous, radio.mode());
        // Flags cleared by echoing the read value; FIFO left untouched.
        assert_eq!(vec![0x60], radio.bus.writes_to(Register::IrqFlags));
        assert_eq!(0, radio.bus.reg(Register::IrqFlags));
        assert!(radio.bus.writes_to(Register::FifoAddrPtr).is_empty());

        // The next poll picks up cleanly.
        assert_eq!(None, radio.poll(Duration::from_secs(1)).unwrap());
    }

    #[test]
    fn poll_ignores_spurious_edges() {
        let mut bus = MockBus::new();
        bus.edges.push_back(true);
        // Edge with no flag latched at all.
        let mut radio = radio(bus);

        assert_eq!(None, radio.poll(Duration::from_secs(1)).unwrap());
        assert_eq!(Mode::RxContinuous, radio.mode());
    }

    #[test]
    fn set_mode_is_idempotent() {
        let mut radio = radio(MockBus::new());

        radio.set_mode(Mode::Standby).unwrap();
        radio.set_mode(Mode::Standby).unwrap();

        assert_eq!(Mode::Standby, radio.mode());
        assert_eq!(
            vec![OPMODE_STANDBY, OPMODE_STANDBY],
            radio.bus.writes_to(Register::OpMode)
        );
    }

    #[test]
    fn transport_object_round_trip() {
        let mut bus = MockBus::new();
        bus.edges.push_back(true);
        bus.set_reg(Register::IrqFlags, IrqFlags::TX_DONE.bits());
        let mut radio = radio(bus);

        let transport: &mut dyn RadioTransport = &mut radio;
        transport.configure().unwrap();
        transport.send(b"ping").unwrap();
        assert_eq!(None, transport.poll(Duration::from_millis(10)).unwrap());
    }
}
