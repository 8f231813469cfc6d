//! Push-button controls and the live [`Config`] they edit.

use crate::scheduler::{COMMANDS, Command};
use embassy_stm32::{exti::ExtiInput, gpio::Output};
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    watch::{Receiver, Sender, Watch},
};
use prisme_lib::configuration::{Config, CycleConfig};

const CONFIG_RECEIVER_CNT: usize = 1;
/// Syncs the live [`Config`] from the controls to the scheduler.
pub static CONFIG: Watch<CriticalSectionRawMutex, Config, CONFIG_RECEIVER_CNT> = Watch::new();
pub type ConfigSender<'a> = Sender<'a, CriticalSectionRawMutex, Config, CONFIG_RECEIVER_CNT>;
pub type ConfigReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, Config, CONFIG_RECEIVER_CNT>;

/// Handles button presses, cycling through the arpeggiator patterns.
#[embassy_executor::task]
pub async fn cycle_pattern(mut button: ExtiInput<'static>, config: ConfigSender<'static>) -> ! {
    loop {
        button.wait_for_rising_edge().await;

        let Some(mut new_state) = config.try_get() else {
            continue;
        };
        new_state.pattern = new_state.pattern.cycle();
        info!("Pattern: {}", new_state.pattern.name());
        config.send(new_state);
    }
}

/// Toggles latch; the blue LED is lit while it is on.
#[embassy_executor::task]
pub async fn toggle_latch(
    mut button: ExtiInput<'static>,
    mut led: Output<'static>,
    config: ConfigSender<'static>,
) -> ! {
    loop {
        button.wait_for_falling_edge().await;

        let Some(mut new_state) = config.try_get() else {
            continue;
        };
        new_state.latch = !new_state.latch;
        config.send(new_state);

        if new_state.latch {
            led.set_high();
        } else {
            led.set_low();
        }
    }
}

/// Puts the aux CV output in learn mode; it follows whichever controller moves next.
#[embassy_executor::task]
pub async fn learn_aux(mut button: ExtiInput<'static>) -> ! {
    loop {
        button.wait_for_falling_edge().await;
        if COMMANDS.try_send(Command::LearnAux).is_err() {
            warn!("Command queue full; learn request dropped");
        }
    }
}
