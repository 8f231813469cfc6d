//! USB-MIDI transport: inbound packets become [`Event`]s for the scheduler, outbound messages are queued for the host.

use crate::{UsbDriver, scheduler::{COMMANDS, Command}};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use embassy_time::Instant;
use embassy_usb::{
    UsbDevice,
    class::midi::{Receiver, Sender},
    driver::EndpointError,
};
use prisme_lib::{
    event::{Event, events, packet},
    output::MidiSink,
};
use wmidi::MidiMessage;

const EVENT_QUEUE_LEN: usize = 64;
/// Inbound events, stamped with their arrival.
pub static EVENTS: Channel<CriticalSectionRawMutex, (Event, Instant), EVENT_QUEUE_LEN> =
    Channel::new();

const OUT_QUEUE_LEN: usize = 64;
/// USB-MIDI event packets waiting to go to the host.
static MIDI_OUT: Channel<CriticalSectionRawMutex, [u8; 4], OUT_QUEUE_LEN> = Channel::new();

/// The outbound queue was full, or the message has no USB-MIDI encoding.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Dropped;

/// [`MidiSink`] which never waits: messages go into a bounded queue drained by [`midi_out`].
pub struct UsbMidiOut;

impl MidiSink for UsbMidiOut {
    type Error = Dropped;

    fn send(&mut self, message: MidiMessage<'static>) -> Result<(), Dropped> {
        let packet = packet(&message).ok_or(Dropped)?;
        MIDI_OUT.try_send(packet).map_err(|_| Dropped)
    }
}

#[embassy_executor::task]
pub async fn usb_task(mut usb: UsbDevice<'static, UsbDriver>) -> ! {
    usb.run().await
}

/// Reads packets from the host for as long as it is connected. Losing the host silences everything, since any
/// note-offs still to come are lost with it.
#[embassy_executor::task]
pub async fn midi_in(mut rx: Receiver<'static, UsbDriver>) -> ! {
    loop {
        rx.wait_connection().await;
        info!("USB connected");
        let _ = receive(&mut rx).await;
        info!("USB disconnected");
        if COMMANDS.try_send(Command::Panic).is_err() {
            warn!("Command queue full; panic not sent");
        }
    }
}

/// Sends queued packets to the host.
#[embassy_executor::task]
pub async fn midi_out(mut tx: Sender<'static, UsbDriver>) -> ! {
    loop {
        tx.wait_connection().await;
        // anything queued while disconnected is stale
        MIDI_OUT.clear();
        loop {
            let packet = MIDI_OUT.receive().await;
            if tx.write_packet(&packet).await.is_err() {
                break;
            }
        }
    }
}

#[doc(hidden)]
struct Disconnected {}

impl From<EndpointError> for Disconnected {
    fn from(val: EndpointError) -> Self {
        match val {
            EndpointError::BufferOverflow => panic!("Buffer overflow"),
            EndpointError::Disabled => Disconnected {},
        }
    }
}

/// Splits whatever the host sent into events and hands them to the scheduler.
async fn receive(rx: &mut Receiver<'static, UsbDriver>) -> Result<(), Disconnected> {
    let mut buf = [0; 64];
    loop {
        let n = rx.read_packet(&mut buf).await?;
        let now = Instant::now();
        for event in events(&buf[..n]) {
            EVENTS.send((event, now)).await;
        }
    }
}
