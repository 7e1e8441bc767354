/* Register type definitions
 *
 * Addresses and bit layouts follow the SX1276/77/78/79 datasheet (DS Rev. 7,
 * Table 41, LoRa mode). One packed type per multi-field register; plain u8
 * registers go through the bus untyped.
 * */
use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};
#[cfg(test)] use proptest::prelude::*;
#[cfg(test)] use proptest_derive::Arbitrary;

/// Expected contents of `Register::Version` for the SX1276 die.
pub const VERSION: u8 = 0x12;

/// Largest payload one FIFO frame can carry.
pub const MAX_PAYLOAD_LEN: usize = 255;

#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive)]
#[repr(u8)]
#[rustfmt::skip]
pub enum Register {
    Fifo              = 0x00,
    OpMode            = 0x01,
    FrfMsb            = 0x06,
    FrfMid            = 0x07,
    FrfLsb            = 0x08,
    PaConfig          = 0x09,
    Lna               = 0x0C,
    FifoAddrPtr       = 0x0D,
    FifoTxBaseAddr    = 0x0E,
    FifoRxBaseAddr    = 0x0F,
    FifoRxCurrentAddr = 0x10,
    IrqFlags          = 0x12,
    RxNbBytes         = 0x13,
    PktSnrValue       = 0x19,
    PktRssiValue      = 0x1A,
    ModemConfig1      = 0x1D,
    ModemConfig2      = 0x1E,
    SymbTimeoutLsb    = 0x1F,
    PreambleMsb       = 0x20,
    PreambleLsb       = 0x21,
    PayloadLength     = 0x22,
    MaxPayloadLength  = 0x23,
    DioMapping1       = 0x40,
    Version           = 0x42,
}

/// Chip operating mode, bits 2..0 of `Register::OpMode`.
///
/// The chip is a strict single-state machine; a transition needs ~10 ms of
/// settle time before the next register access is meaningful.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(test, derive(Arbitrary))]
#[repr(u8)]
#[rustfmt::skip]
pub enum Mode {
    Sleep        = 0b000,
    Standby      = 0b001,
    Tx           = 0b011,
    RxContinuous = 0b101,
}

const LONG_RANGE_MODE: u8 = 0x80;
const MODE_MASK: u8 = 0x07;

/// `Register::OpMode`: mode select plus the LoRa enable bit.
///
/// The long-range bit may only be flipped in Sleep; everything here keeps it
/// set after initialisation. AccessSharedReg/LowFrequencyModeOn (bits 6, 3)
/// are not modelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpMode {
    pub mode: Mode,
    pub long_range: bool,
}

impl From<OpMode> for u8 {
    fn from(item: OpMode) -> Self {
        u8::from(item.mode) | if item.long_range { LONG_RANGE_MODE } else { 0 }
    }
}

impl TryFrom<u8> for OpMode {
    type Error = u8;
    fn try_from(item: u8) -> Result<Self, Self::Error> {
        Ok(Self {
            mode: Mode::try_from(item & MODE_MASK).or(Err(item))?,
            long_range: item & LONG_RANGE_MODE != 0,
        })
    }
}

bitflags! {
    /// `Register::IrqFlags`. Write-1-to-clear: writing back the value read
    /// clears exactly those bits, so never write bits you did not observe.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct IrqFlags: u8 {
        const CAD_DETECTED        = 0x01;
        const FHSS_CHANGE_CHANNEL = 0x02;
        const CAD_DONE            = 0x04;
        const TX_DONE             = 0x08;
        const VALID_HEADER        = 0x10;
        const PAYLOAD_CRC_ERROR   = 0x20;
        const RX_DONE             = 0x40;
        const RX_TIMEOUT          = 0x80;
    }
}

/// Signal bandwidth, bits 7..4 of `Register::ModemConfig1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(test, derive(Arbitrary))]
#[repr(u8)]
#[rustfmt::skip]
pub enum Bandwidth {
    Khz7_8   = 0,
    Khz10_4  = 1,
    Khz15_6  = 2,
    Khz20_8  = 3,
    Khz31_25 = 4,
    Khz41_7  = 5,
    Khz62_5  = 6,
    Khz125   = 7,
    Khz250   = 8,
    Khz500   = 9,
}

impl Bandwidth {
    #[rustfmt::skip]
    pub fn hz(self) -> u64 {
        match self {
            Bandwidth::Khz7_8   =>   7_800,
            Bandwidth::Khz10_4  =>  10_400,
            Bandwidth::Khz15_6  =>  15_600,
            Bandwidth::Khz20_8  =>  20_800,
            Bandwidth::Khz31_25 =>  31_250,
            Bandwidth::Khz41_7  =>  41_700,
            Bandwidth::Khz62_5  =>  62_500,
            Bandwidth::Khz125   => 125_000,
            Bandwidth::Khz250   => 250_000,
            Bandwidth::Khz500   => 500_000,
        }
    }

    pub fn from_hz(hz: u64) -> Option<Self> {
        [
            Bandwidth::Khz7_8,
            Bandwidth::Khz10_4,
            Bandwidth::Khz15_6,
            Bandwidth::Khz20_8,
            Bandwidth::Khz31_25,
            Bandwidth::Khz41_7,
            Bandwidth::Khz62_5,
            Bandwidth::Khz125,
            Bandwidth::Khz250,
            Bandwidth::Khz500,
        ]
        .into_iter()
        .find(|bw| bw.hz() == hz)
    }
}

/// Error coding rate, bits 3..1 of `Register::ModemConfig1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(test, derive(Arbitrary))]
#[repr(u8)]
#[rustfmt::skip]
pub enum CodingRate {
    Cr4_5 = 1,
    Cr4_6 = 2,
    Cr4_7 = 3,
    Cr4_8 = 4,
}

impl CodingRate {
    pub fn denominator(self) -> u8 {
        u8::from(self) + 4
    }

    pub fn from_denominator(denominator: u8) -> Option<Self> {
        CodingRate::try_from(denominator.checked_sub(4)?).ok()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(test, derive(Arbitrary))]
#[repr(u8)]
#[rustfmt::skip]
pub enum SpreadingFactor {
    Sf7  = 7,
    Sf8  = 8,
    Sf9  = 9,
    Sf10 = 10,
    Sf11 = 11,
    Sf12 = 12,
}

/// `Register::ModemConfig1`: bandwidth, coding rate, header mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModemConfig1 {
    pub bandwidth: Bandwidth,
    pub coding_rate: CodingRate,
    pub implicit_header: bool,
}

impl From<ModemConfig1> for u8 {
    fn from(item: ModemConfig1) -> Self {
        u8::from(item.bandwidth) << 4
            | u8::from(item.coding_rate) << 1
            | u8::from(item.implicit_header)
    }
}

impl TryFrom<u8> for ModemConfig1 {
    type Error = u8;
    fn try_from(item: u8) -> Result<Self, Self::Error> {
        Ok(Self {
            bandwidth: Bandwidth::try_from(item >> 4).or(Err(item))?,
            coding_rate: CodingRate::try_from(item >> 1 & 0x07).or(Err(item))?,
            implicit_header: item & 0x01 != 0,
        })
    }
}

/// `Register::ModemConfig2`: spreading factor, TX continuous, payload CRC.
/// The symbol-timeout MSBs (bits 1..0) are kept at zero; the full timeout
/// lives in `Register::SymbTimeoutLsb`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModemConfig2 {
    pub spreading_factor: SpreadingFactor,
    pub tx_continuous: bool,
    pub rx_crc: bool,
}

impl From<ModemConfig2> for u8 {
    fn from(item: ModemConfig2) -> Self {
        u8::from(item.spreading_factor) << 4
            | u8::from(item.tx_continuous) << 3
            | u8::from(item.rx_crc) << 2
    }
}

impl TryFrom<u8> for ModemConfig2 {
    type Error = u8;
    fn try_from(item: u8) -> Result<Self, Self::Error> {
        if item & 0x03 != 0 {
            return Err(item);
        }
        Ok(Self {
            spreading_factor: SpreadingFactor::try_from(item >> 4).or(Err(item))?,
            tx_continuous: item & 0x08 != 0,
            rx_crc: item & 0x04 != 0,
        })
    }
}

/// `Register::PaConfig`. With `pa_boost` the output runs off the PA_BOOST
/// pin and Pout = 2 + output_power dBm; without it, the RFO pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaConfig {
    pub pa_boost: bool,
    pub max_power: u8,     // 3 bits
    pub output_power: u8,  // 4 bits
}

impl From<PaConfig> for u8 {
    fn from(item: PaConfig) -> Self {
        u8::from(item.pa_boost) << 7 | (item.max_power & 0x07) << 4 | item.output_power & 0x0F
    }
}

impl TryFrom<u8> for PaConfig {
    type Error = u8;
    fn try_from(item: u8) -> Result<Self, Self::Error> {
        Ok(Self {
            pa_boost: item & 0x80 != 0,
            max_power: item >> 4 & 0x07,
            output_power: item & 0x0F,
        })
    }
}

/// LNA gain setting, bits 7..5 of `Register::Lna`. G1 is maximum gain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(test, derive(Arbitrary))]
#[repr(u8)]
#[rustfmt::skip]
pub enum LnaGain {
    G1 = 1,
    G2 = 2,
    G3 = 3,
    G4 = 4,
    G5 = 5,
    G6 = 6,
}

/// `Register::Lna`: gain plus the high-frequency boost (150% LNA current).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lna {
    pub gain: LnaGain,
    pub boost_hf: bool,
}

impl From<Lna> for u8 {
    fn from(item: Lna) -> Self {
        u8::from(item.gain) << 5 | if item.boost_hf { 0x03 } else { 0 }
    }
}

impl TryFrom<u8> for Lna {
    type Error = u8;
    fn try_from(item: u8) -> Result<Self, Self::Error> {
        let boost_hf = match item & 0x03 {
            0b00 => false,
            0b11 => true,
            _ => return Err(item),
        };
        if item & 0x1C != 0 {
            return Err(item);
        }
        Ok(Self {
            gain: LnaGain::try_from(item >> 5).or(Err(item))?,
            boost_hf,
        })
    }
}

/// Event routed to the DIO0 pin, bits 7..6 of `Register::DioMapping1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(test, derive(Arbitrary))]
#[repr(u8)]
#[rustfmt::skip]
pub enum Dio0 {
    RxDone  = 0b00,
    TxDone  = 0b01,
    CadDone = 0b10,
}

/// `Register::DioMapping1`. DIO1..DIO3 are left on their reset mappings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DioMapping1 {
    pub dio0: Dio0,
}

impl From<DioMapping1> for u8 {
    fn from(item: DioMapping1) -> Self {
        u8::from(item.dio0) << 6
    }
}

impl TryFrom<u8> for DioMapping1 {
    type Error = u8;
    fn try_from(item: u8) -> Result<Self, Self::Error> {
        if item & 0x3F != 0 {
            return Err(item);
        }
        Ok(Self {
            dio0: Dio0::try_from(item >> 6).or(Err(item))?,
        })
    }
}

#[cfg(test)]
proptest! {
    #[test]
    fn opmode_inverse(t in (any::<Mode>(), any::<bool>())
        .prop_map(|(mode, long_range)| OpMode { mode, long_range })) {
        assert_eq!(t, u8::from(t).try_into().unwrap());
    }

    #[test]
    fn modem_config1_inverse(t in (any::<Bandwidth>(), any::<CodingRate>(), any::<bool>())
        .prop_map(|(bandwidth, coding_rate, implicit_header)| ModemConfig1 {
            bandwidth,
            coding_rate,
            implicit_header,
        })) {
        assert_eq!(t, u8::from(t).try_into().unwrap());
    }

    #[test]
    fn modem_config2_inverse(t in (any::<SpreadingFactor>(), any::<bool>(), any::<bool>())
        .prop_map(|(spreading_factor, tx_continuous, rx_crc)| ModemConfig2 {
            spreading_factor,
            tx_continuous,
            rx_crc,
        })) {
        assert_eq!(t, u8::from(t).try_into().unwrap());
    }

    #[test]
    fn pa_config_inverse(t in (any::<bool>(), 0u8..8, 0u8..16)
        .prop_map(|(pa_boost, max_power, output_power)| PaConfig {
            pa_boost,
            max_power,
            output_power,
        })) {
        assert_eq!(t, u8::from(t).try_into().unwrap());
    }

    #[test]
    fn lna_inverse(t in (any::<LnaGain>(), any::<bool>())
        .prop_map(|(gain, boost_hf)| Lna { gain, boost_hf })) {
        assert_eq!(t, u8::from(t).try_into().unwrap());
    }

    #[test]
    fn dio_mapping_inverse(t in any::<Dio0>().prop_map(|dio0| DioMapping1 { dio0 })) {
        assert_eq!(t, u8::from(t).try_into().unwrap());
    }

    #[test]
    fn irq_flags_read(b in prop::bits::u8::ANY) {
        assert_eq!(b, IrqFlags::from_bits_retain(b).bits());
    }

    #[test]
    fn bandwidth_hz_inverse(bw: Bandwidth) {
        assert_eq!(Some(bw), Bandwidth::from_hz(bw.hz()));
    }

    #[test]
    fn coding_rate_denominator_inverse(cr: CodingRate) {
        assert_eq!(Some(cr), CodingRate::from_denominator(cr.denominator()));
    }
}
