//! The task which owns the [`Hub`] and therefore every piece of musical state.
//!
//! Everything that changes notes or timing funnels through here, one event at a time, so handlers never overlap.

use crate::{
    CvDac,
    controls::ConfigReceiver,
    midi::{EVENTS, UsbMidiOut},
    status::{DIRTY, StatusSender},
};
use embassy_futures::select::{Either4, select4};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use embassy_time::{Instant, Timer};
use prisme_lib::hub::Hub;

/// Requests which are not MIDI.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Silence everything.
    Panic,
    /// Follow the next controller moved with the aux CV output.
    LearnAux,
}

const COMMAND_QUEUE_LEN: usize = 4;
/// Requests from controls and the USB connection.
pub static COMMANDS: Channel<CriticalSectionRawMutex, Command, COMMAND_QUEUE_LEN> = Channel::new();

pub type DeviceHub = Hub<UsbMidiOut, CvDac>;

/// Waits for whichever comes first: an event, the next clock deadline, new configuration or a command.
#[embassy_executor::task]
pub async fn scheduler(
    mut hub: DeviceHub,
    mut config: ConfigReceiver<'static>,
    status: StatusSender<'static>,
) -> ! {
    status.send(hub.status());
    loop {
        let deadline = hub.next_deadline().unwrap_or(Instant::MAX);
        let operation = match select4(
            EVENTS.receive(),
            Timer::at(deadline),
            config.changed(),
            COMMANDS.receive(),
        )
        .await
        {
            Either4::First((event, received)) => hub.handle(event, received),
            Either4::Second(()) => hub.poll(Instant::now()),
            Either4::Third(new_config) => hub.reconfigure(&new_config, Instant::now()),
            Either4::Fourth(Command::Panic) => hub.panic(),
            Either4::Fourth(Command::LearnAux) => hub.learn_aux(),
        };
        // a burst of events can hold up polling past a deadline
        let operation = operation | hub.poll(Instant::now());

        if !operation.is_none() {
            status.send(hub.status());
            DIRTY.signal(());
        }
    }
}
