use bms_core::{Reply, Request, RequestMailbox};
use can_messages::{BITRATE, ModuleAddress, ShuntRequest, Slot, Temperatures, prelude::*};
use defmt::{info, warn};
use embassy_executor::task;
use embassy_futures::join::join;
use embassy_stm32::can::{Can, CanRx, CanTx, Fifo, filter::Mask32, frame::Frame};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use embassy_time::{Duration, Timer, with_timeout};
use portable_atomic::{AtomicU8, Ordering};

/// Requests waiting for the main cycle.
pub static REQUESTS: RequestMailbox<CriticalSectionRawMutex> = RequestMailbox::new();
/// Replies waiting for transmission, with the address they were requested on.
pub static REPLIES: Channel<CriticalSectionRawMutex, (ModuleAddress, Reply), 2> = Channel::new();
/// Current selector identity.
pub static ADDRESS: AtomicU8 = AtomicU8::new(0);

/// Pause between the frames of one reply.
const FRAME_GAP: Duration = Duration::from_millis(1);
/// Longest wait for a frame to leave its mailbox.
const FRAME_TIMEOUT: Duration = Duration::from_millis(2);

#[task]
pub async fn process(mut can: Can<'static>) {
    can.set_bitrate(BITRATE);
    can.set_tx_fifo_scheduling(true);
    can.enable().await;
    info!("CAN initialized at {} bit/s.", BITRATE);
    let (tx, rx) = can.split();
    join(transmit(tx), receive(rx)).await;
}

async fn receive(mut rx: CanRx<'static>) {
    // Identity can change at run time, matching is done in software.
    rx.modify_filters()
        .enable_bank(0, Fifo::Fifo0, Mask32::accept_all());
    loop {
        let envelope = match rx.read().await {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("CAN bus error: {}", e);
                continue;
            }
        };
        let address = ModuleAddress::new(ADDRESS.load(Ordering::Relaxed));
        let Some(id) = envelope.raw_id() else {
            continue;
        };
        let Some(group) = address.match_request(id) else {
            continue;
        };
        match envelope.try_decode::<ShuntRequest>(id) {
            Some(request) => REQUESTS.post(Request::new(group, request)),
            None => warn!("Short request for {}", group),
        }
    }
}

async fn transmit(mut tx: CanTx<'static>) {
    loop {
        let (address, reply) = REPLIES.receive().await;
        let group = reply.group;
        let voltages = reply
            .voltages
            .iter()
            .zip(Slot::VOLTAGES)
            .map(|(message, slot)| OutgoingCan::<Frame>::try_encode(message, address.id(group, slot)));
        let temperatures: Option<Frame> =
            reply.temperatures.try_encode(address.id_of::<Temperatures>(group));

        for frame in voltages.chain([temperatures]) {
            match frame {
                Some(frame) => send(&mut tx, &frame).await,
                None => warn!("Reply identifier out of range"),
            }
            Timer::after(FRAME_GAP).await;
        }
    }
}

/// Queue one frame and give it a bounded time to go out. A frame that loses
/// arbitration for too long is aborted, the controller will poll again.
async fn send(tx: &mut CanTx<'static>, frame: &Frame) {
    let mailbox = tx.write(frame).await.mailbox();
    if with_timeout(FRAME_TIMEOUT, tx.flush(mailbox)).await.is_err() {
        let aborted = tx.abort(mailbox);
        warn!("CAN frame dropped (aborted: {})", aborted);
    }
}
