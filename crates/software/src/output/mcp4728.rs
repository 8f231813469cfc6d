//! Driver for the Microchip MCP4728, a quad 12-bit DAC on I²C, used for the pitch, gate and auxiliary outputs.

use super::{CvChannel, VoltageSink, dac_code};
use embedded_hal::i2c::I2c;

/// Resolution of every MCP4728 channel.
const BITS: u8 = 12;

/// Multi-write command; the channel index goes in bits 2:1 and bit 0 (UDAC) low latches the output immediately.
const MULTI_WRITE: u8 = 0b0100_0000;

/// An MCP4728 using VDD as its reference, with unity gain on every channel.
pub struct Mcp4728<I> {
    i2c: I,
    address: u8,
    reference: f32,
}

impl<I: I2c> Mcp4728<I> {
    /// Factory-programmed address.
    pub const DEFAULT_ADDRESS: u8 = 0x60;

    /// Looks for a DAC at `address`, returning `None` when nothing acknowledges.
    ///
    /// `reference` is the supply voltage, which is also the full-scale output.
    pub fn probe(mut i2c: I, address: u8, reference: f32) -> Option<Self> {
        // a read returns the channel registers; only the acknowledgement matters here
        let mut registers = [0_u8; 3];
        match i2c.read(address, &mut registers) {
            Ok(()) => {
                info!("Found MCP4728 at address {=u8:#x}", address);
                Some(Self {
                    i2c,
                    address,
                    reference,
                })
            }
            Err(_) => None,
        }
    }

    /// DAC channel (A through D, as 0 through 3) wired to each output.
    fn index(channel: CvChannel) -> u8 {
        match channel {
            CvChannel::Pitch => 0,
            CvChannel::Gate => 1,
            CvChannel::Aux => 3,
        }
    }

    fn write_code(&mut self, channel: CvChannel, code: u16) -> Result<(), I::Error> {
        let [high, low] = code.min(0x0FFF).to_be_bytes();
        // second byte: VREF (bit 7) = VDD, power-down (bits 6:5) = normal, gain (bit 4) = x1, then the top nibble
        let command = [MULTI_WRITE | (Self::index(channel) << 1), high & 0x0F, low];
        self.i2c.write(self.address, &command)
    }
}

impl<I: I2c> VoltageSink for Mcp4728<I> {
    type Error = I::Error;

    fn reference(&self) -> f32 {
        self.reference
    }

    fn set_voltage(&mut self, channel: CvChannel, volts: f32) -> Result<(), Self::Error> {
        let code = dac_code(volts, self.reference, BITS);
        self.write_code(channel, code)
    }

    fn set_gate(&mut self, channel: CvChannel, high: bool) -> Result<(), Self::Error> {
        let code = if high { 0x0FFF } else { 0 };
        self.write_code(channel, code)
    }
}
