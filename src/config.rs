//! Link configuration and carrier synthesis.
//!
//! Both ends of a link must share everything here except `tx_power_dbm`; a
//! mismatch is silent (packets simply never arrive), so the flight and
//! ground daemons default to the same [`CANSAT_433`] preset.

use crate::registers::{Bandwidth, CodingRate, SpreadingFactor};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
#[cfg(test)] use proptest::prelude::*;

pub type Hz = u64;

/// Crystal reference feeding the PLL.
pub const FXOSC: Hz = 32_000_000;

/// Width of the PLL's fractional divider; one step is FXOSC / 2^19 ≈ 61 Hz.
pub const FRF_RESOLUTION_BITS: u32 = 19;

/// Carrier range the SX1276 synthesizer covers (DS Table 7).
pub const FREQ_MIN: Hz = 137_000_000;
pub const FREQ_MAX: Hz = 1_020_000_000;

/// Output power limits on the PA_BOOST pin.
pub const TX_POWER_MIN: i8 = 2;
pub const TX_POWER_MAX: i8 = 17;

/// Below 4 preamble symbols the receiver cannot lock (DS 4.1.1.6).
pub const PREAMBLE_MIN: u16 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RadioConfig {
    pub freq_hz: Hz,
    pub spreading_factor: u8,
    pub bandwidth_hz: Hz,
    pub coding_rate_denominator: u8,
    pub crc: bool,
    pub preamble_symbols: u16,
    pub tx_power_dbm: i8,
}

/// Flight configuration: 433 MHz ISM, SF7/125 kHz/CR 4/5, CRC on, full PA.
pub const CANSAT_433: RadioConfig = RadioConfig {
    freq_hz: 433_000_000,
    spreading_factor: 7,
    bandwidth_hz: 125_000,
    coding_rate_denominator: 5,
    crc: true,
    preamble_symbols: 8,
    tx_power_dbm: 17,
};

impl Default for RadioConfig {
    fn default() -> Self {
        CANSAT_433
    }
}

impl RadioConfig {
    pub fn validate(&self) -> Result<()> {
        if !(FREQ_MIN..=FREQ_MAX).contains(&self.freq_hz) {
            return Err(Error::InvalidFrequency(self.freq_hz));
        }
        self.bandwidth()?;
        self.spreading_factor()?;
        self.coding_rate()?;
        if !(TX_POWER_MIN..=TX_POWER_MAX).contains(&self.tx_power_dbm) {
            return Err(Error::InvalidTxPower(self.tx_power_dbm));
        }
        if self.preamble_symbols < PREAMBLE_MIN {
            return Err(Error::PreambleTooShort(self.preamble_symbols));
        }
        Ok(())
    }

    pub fn bandwidth(&self) -> Result<Bandwidth> {
        Bandwidth::from_hz(self.bandwidth_hz).ok_or(Error::InvalidBandwidth(self.bandwidth_hz))
    }

    pub fn spreading_factor(&self) -> Result<SpreadingFactor> {
        SpreadingFactor::try_from(self.spreading_factor)
            .or(Err(Error::InvalidSpreadingFactor(self.spreading_factor)))
    }

    pub fn coding_rate(&self) -> Result<CodingRate> {
        CodingRate::from_denominator(self.coding_rate_denominator)
            .ok_or(Error::InvalidCodingRate(self.coding_rate_denominator))
    }
}

fn div_nearest(dividend: u64, divisor: u64) -> u64 {
    (dividend + (divisor >> 1)) / divisor
}

/// The three FRF register bytes for a carrier, MSB first.
///
/// frf = round(freq * 2^resolution / xtal), exact in integers; the byte
/// triple is the big-endian 24-bit value written to FrfMsb/Mid/Lsb.
pub fn frf(freq: Hz, xtal: Hz, resolution_bits: u32) -> [u8; 3] {
    let steps = div_nearest(freq << resolution_bits, xtal);
    [(steps >> 16) as u8, (steps >> 8) as u8, steps as u8]
}

/// Carrier a given FRF byte triple synthesizes. Inverse of [`frf`] to within
/// one synthesizer step.
pub fn carrier(bytes: [u8; 3], xtal: Hz, resolution_bits: u32) -> Hz {
    let steps = u64::from(bytes[0]) << 16 | u64::from(bytes[1]) << 8 | u64::from(bytes[2]);
    div_nearest(steps * xtal, 1 << resolution_bits)
}

#[cfg(test)]
proptest! {
    #[test]
    fn div_even(n: u8) {
        let v = u64::from(n);
        assert_eq!(v, div_nearest(v * 2, 2));
    }

    #[test]
    fn div_odd(n: u8) {
        let v = u64::from(n);
        assert_eq!(v + 1, div_nearest((v + 1) * 2, 2));
    }

    // Synthesis round-trips to within one step over the whole tuning range.
    #[test]
    fn frf_carrier_inverse(freq in FREQ_MIN..=FREQ_MAX) {
        let step = div_nearest(FXOSC, 1 << FRF_RESOLUTION_BITS);
        let back = carrier(frf(freq, FXOSC, FRF_RESOLUTION_BITS), FXOSC, FRF_RESOLUTION_BITS);
        assert!(back.abs_diff(freq) <= step, "{} -> {}", freq, back);
    }
}
