//! Reports device status without holding up the scheduler.

use embassy_stm32::gpio::Output;
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    signal::Signal,
    watch::{AnonReceiver, Sender, Watch},
};
use embassy_time::{Duration, Instant, Timer};
use prisme_lib::hub::Status;

const STATUS_RECEIVER_CNT: usize = 0;
/// Latest [`Status`] snapshot.
pub static STATUS: Watch<CriticalSectionRawMutex, Status, STATUS_RECEIVER_CNT> = Watch::new();
pub type StatusSender<'a> = Sender<'a, CriticalSectionRawMutex, Status, STATUS_RECEIVER_CNT>;
pub type StatusSpy<'a> = AnonReceiver<'a, CriticalSectionRawMutex, Status, STATUS_RECEIVER_CNT>;

/// Raised whenever a new snapshot is worth reporting.
pub static DIRTY: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// At most ten reports a second.
const MIN_REPORT_INTERVAL: Duration = Duration::from_millis(100);

/// Logs the latest snapshot whenever it changes and lights the red LED while a fault is on record.
#[embassy_executor::task]
pub async fn report_status(mut status: StatusSpy<'static>, mut fault_led: Output<'static>) -> ! {
    let mut last_report = Instant::MIN;
    loop {
        DIRTY.wait().await;
        // changes made while throttled are folded into a single report
        Timer::at(last_report + MIN_REPORT_INTERVAL).await;
        last_report = Instant::now();

        let Some(snapshot) = status.try_get() else {
            continue;
        };
        info!("{}", snapshot);
        if snapshot.fault.is_some() {
            fault_led.set_high();
        } else {
            fault_led.set_low();
        }
    }
}
