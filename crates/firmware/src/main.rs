//! Prisme is [Embassy](https://embassy.dev)-based firmware for a MIDI arpeggiator with CV/gate outputs. It runs on
//! the [Nucleo-F767ZI development board](https://www.st.com/en/evaluation-tools/nucleo-f767zi.html), which is
//! powered by an F7-series STM32 microcontroller.
//!
//! MIDI arrives over USB. Notes are quantized to a scale and arpeggiated against an internal or external clock; the
//! result goes back out over USB and, through an MCP4728 quad DAC on I²C, to pitch, gate and auxiliary CV outputs
//! for modular synthesizers. The device works without the DAC, as a MIDI-only arpeggiator.
//!
//! The signal path itself lives in `prisme_lib`; this crate wires it to the hardware. For details about the
//! hardware or how to use the device, see the `README`.

#![no_std]
#![no_main]

#[macro_use]
mod fmt;

mod controls;
mod midi;
mod scheduler;
mod status;

use embassy_executor::Spawner;
use embassy_stm32::{
    Config, bind_interrupts,
    exti::ExtiInput,
    gpio::{Level, Output, Pull, Speed},
    i2c::{self, I2c, Master},
    mode::Blocking,
    peripherals,
    time::Hertz,
    usb,
};
use embassy_time::Instant;
use embassy_usb::{Builder, class::midi::MidiClass};
use prisme_lib::{configuration, hub::Hub, output::Mcp4728};
use static_cell::StaticCell;

#[cfg(feature = "debug")]
use {defmt_rtt as _, panic_probe as _};

#[cfg(not(feature = "debug"))]
use panic_halt as _;

bind_interrupts!(
    #[doc(hidden)]
    struct Irqs {
        OTG_FS => usb::InterruptHandler<peripherals::USB_OTG_FS>;
    }
);

type UsbDriver = usb::Driver<'static, peripherals::USB_OTG_FS>;
type CvDac = Mcp4728<I2c<'static, Blocking, Master>>;

/// Full-scale output of the DAC, in volts; the MCP4728 is referenced to its 5 V supply.
const DAC_REFERENCE: f32 = 5.0;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Initializing Prisme");

    let mut config = Config::default();
    {
        use embassy_stm32::rcc::*;
        // hse: high-speed external clock
        config.rcc.hse = Some(Hse {
            freq: Hertz(8_000_000),
            mode: HseMode::Bypass,
        });

        // pll: phase-locked loop, crucial for dividing clock
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL216,
            divp: Some(PllPDiv::DIV2), // 8mhz / 4 * 216 / 2 = 216Mhz
            // per section 5.2 of RM0410, the 48MHz clock used for USB OTG FS is derived from the main PLL VCO
            divq: Some(PllQDiv::DIV9), // 8mhz / 4 * 216 / 9 = 48Mhz
            divr: None,
        });
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.mux.clk48sel = mux::Clk48sel::PLL1_Q;
    }
    let p = embassy_stm32::init(config);

    let settings = configuration::Config::default();
    let config_sender = controls::CONFIG.sender();
    config_sender.send(settings);

    let button = ExtiInput::new(p.PC13, p.EXTI13, Pull::None);
    unwrap!(spawner.spawn(controls::cycle_pattern(button, controls::CONFIG.sender())));

    let toggle = ExtiInput::new(p.PD1, p.EXTI1, Pull::Up);
    let blue_led = Output::new(p.PB7, Level::Low, Speed::Low);
    unwrap!(spawner.spawn(controls::toggle_latch(toggle, blue_led, config_sender)));

    let learn = ExtiInput::new(p.PD0, p.EXTI0, Pull::Up);
    unwrap!(spawner.spawn(controls::learn_aux(learn)));

    // Create the driver, from the HAL.
    static ENDPOINT_OUT_BUFFER: StaticCell<[u8; 256]> = StaticCell::new();
    let mut config = embassy_stm32::usb::Config::default();

    // USB devices which are self-powered (i.e., that can stay powered on if unplugged from the host)
    // need to enable vbus_detection to comply with the USB spec. Per section 6.10 of the Nucleo board
    // manual (UM1974), CN13 (the USB port) cannot power the board; external power is necessary.
    config.vbus_detection = true;

    let driver = usb::Driver::new_fs(
        p.USB_OTG_FS,
        Irqs,
        p.PA12,
        p.PA11,
        ENDPOINT_OUT_BUFFER.init([0; 256]),
        config,
    );

    // per https://pid.codes, FOSS projects can apply to be listed under the vendor ID owned by InterBiometrics
    let vendor_id = 0x1209;
    // pid.codes test PID until one is allocated
    let product_id = 0x0001;

    let mut config = embassy_usb::Config::new(vendor_id, product_id);
    config.manufacturer = Some("Pawpaw Works");
    config.product = Some("Prisme");
    config.self_powered = true;
    config.max_power = 0;

    // It needs some buffers for building the descriptors.
    static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static CONTROL_BUFFER: StaticCell<[u8; 64]> = StaticCell::new();

    let mut builder = Builder::new(
        driver,
        config,
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        &mut [], // no msos descriptors
        CONTROL_BUFFER.init([0; 64]),
    );

    let class = MidiClass::new(&mut builder, 1, 1, 64);
    let usb = builder.build();
    let (tx, rx) = class.split();

    unwrap!(spawner.spawn(midi::usb_task(usb)));
    unwrap!(spawner.spawn(midi::midi_in(rx)));
    unwrap!(spawner.spawn(midi::midi_out(tx)));

    // the DAC sits on I2C1, which the Nucleo routes to the Arduino header's SCL/SDA pins
    let i2c = I2c::new_blocking(p.I2C1, p.PB8, p.PB9, i2c::Config::default());
    let dac = Mcp4728::probe(i2c, CvDac::DEFAULT_ADDRESS, DAC_REFERENCE);
    if dac.is_some() {
        info!("MCP4728 found");
    }

    let hub = Hub::new(settings, midi::UsbMidiOut, dac, Instant::now());
    let config_receiver = unwrap!(controls::CONFIG.receiver());
    unwrap!(spawner.spawn(scheduler::scheduler(
        hub,
        config_receiver,
        status::STATUS.sender()
    )));

    let red_led = Output::new(p.PB14, Level::Low, Speed::Low);
    unwrap!(spawner.spawn(status::report_status(
        status::STATUS.anon_receiver(),
        red_led
    )));
}
