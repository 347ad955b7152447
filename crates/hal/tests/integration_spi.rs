//! SPI transfer engine scenarios against the SPI mock.
//!
//! Drives the engine the way the vector does, through `on_interrupt` or
//! explicit `irq_handler` events, and checks bytes on the wire, state
//! transitions and fault latching.
#![allow(clippy::unwrap_used)]
#![allow(clippy::indexing_slicing)]
#![allow(clippy::arithmetic_side_effects)]
#![allow(clippy::cast_possible_truncation)]

use std::sync::{Arc, LazyLock};

use hal::interrupt::InterruptDispatcher;
use hal::spi::mock::MockSpi;
use hal::spi::registers::CR2;
use hal::spi::{
    SpiControl2, SpiErrorFlags, SpiEvent, SpiInstance, SpiStatus, SpiTransferEngine,
    TransferError, TransferState,
};
use platform::{InterruptHandler, RegisterField, SpiConfig};

type Engine<const N: usize> = SpiTransferEngine<MockSpi, N, N>;

fn engine<const N: usize>() -> Engine<N> {
    let engine = Engine::<N>::new(MockSpi::new());
    engine.configure(SpiConfig::default());
    engine
}

fn interrupt_enabled(engine: &Engine<8>, field: SpiControl2) -> bool {
    field.bits().extract(engine.registers().peek(CR2)) != 0
}

// ── Transmit ─────────────────────────────────────────────────────────────────

#[test]
fn two_bytes_go_out_in_order() {
    let spi = engine::<8>();
    assert_eq!(spi.send(&[0xA5, 0x3C]), Ok(2));
    assert_eq!(spi.state(), TransferState::Transmitting);

    spi.irq_handler(SpiEvent::TransmitEmpty);
    assert_eq!(spi.state(), TransferState::Transmitting, "one byte still queued");
    spi.irq_handler(SpiEvent::TransmitEmpty);

    assert_eq!(spi.registers().transmitted().as_slice(), &[0xA5, 0x3C]);
    assert_eq!(spi.state(), TransferState::Idle);
    assert!(!interrupt_enabled(&spi, SpiControl2::TransmitInterrupt));
}

#[test]
fn n_bytes_drain_after_n_events() {
    let spi = engine::<8>();
    let payload = [1, 2, 3, 4, 5, 6, 7];
    assert_eq!(spi.send(&payload), Ok(payload.len()));
    for _ in 0..payload.len() {
        spi.on_interrupt();
    }
    assert_eq!(spi.tx_pending(), 0);
    assert_eq!(spi.state(), TransferState::Idle);
    assert_eq!(spi.registers().transmitted().as_slice(), &payload);

    spi.on_interrupt();
    assert_eq!(
        spi.registers().transmitted().len(),
        payload.len(),
        "TXE with TXEIE disarmed must not write DR"
    );
}

#[test]
fn send_reports_partial_fill() {
    let spi = engine::<4>();
    assert_eq!(spi.send(&[0, 1, 2, 3, 4, 5]), Ok(4));
    assert_eq!(spi.tx_pending(), 4);
    assert_eq!(spi.send(&[9]), Err(TransferError::BufferFull));

    spi.irq_handler(SpiEvent::TransmitEmpty);
    assert_eq!(spi.send(&[4, 5]), Ok(1), "one slot freed");
}

// ── Receive ──────────────────────────────────────────────────────────────────

#[test]
fn received_bytes_are_buffered_until_read() {
    let spi = engine::<8>();
    spi.registers().feed(&[0x10, 0x20, 0x30]);
    for _ in 0..3 {
        spi.on_interrupt();
    }
    assert_eq!(spi.state(), TransferState::Receiving);
    assert_eq!(spi.rx_available(), 3);
    assert!(!spi.read_status(SpiStatus::ReceiveNotEmpty));

    let mut buf = [0u8; 2];
    assert_eq!(spi.receive(&mut buf), 2);
    assert_eq!(buf, [0x10, 0x20]);
    assert_eq!(spi.state(), TransferState::Receiving);

    assert_eq!(spi.receive(&mut buf), 1);
    assert_eq!(buf[0], 0x30);
    assert_eq!(spi.state(), TransferState::Idle, "drained RX returns to Idle");
    assert_eq!(spi.receive(&mut buf), 0);
}

#[test]
fn rx_overflow_faults_exactly_once() {
    let spi = engine::<8>();
    spi.registers().feed(&[0; 12]);
    for _ in 0..12 {
        spi.irq_handler(SpiEvent::ReceiveNotEmpty);
    }

    assert_eq!(spi.state(), TransferState::Error);
    assert_eq!(spi.fault_count(), 1);
    assert!(spi.error_flags().contains(SpiErrorFlags::BUFFER_OVERRUN));
    assert_eq!(spi.rx_available(), 8);
    assert!(!interrupt_enabled(&spi, SpiControl2::ReceiveInterrupt));
    assert!(!interrupt_enabled(&spi, SpiControl2::ErrorInterrupt));

    assert!(matches!(spi.send(&[1]), Err(TransferError::Faulted(_))));
}

#[test]
fn concurrent_receive_never_idles_with_unread_bytes() {
    const COUNT: usize = 200;
    let spi: Arc<Engine<8>> = Arc::new(engine());

    let isr = {
        let spi = Arc::clone(&spi);
        std::thread::spawn(move || {
            for i in 0..COUNT {
                while spi.rx_available() == 8 {
                    std::thread::yield_now();
                }
                spi.registers().feed(&[i as u8]);
                spi.irq_handler(SpiEvent::ReceiveNotEmpty);
            }
        })
    };

    let mut received = Vec::with_capacity(COUNT);
    let mut buf = [0u8; 3];
    while received.len() < COUNT {
        let n = spi.receive(&mut buf);
        received.extend_from_slice(&buf[..n]);
        let idle_with_data = critical_section::with(|_| {
            spi.state() == TransferState::Idle && spi.rx_available() > 0
        });
        assert!(!idle_with_data, "Idle while unread bytes are buffered");
        if n == 0 {
            std::thread::yield_now();
        }
    }
    isr.join().unwrap();

    let expected: Vec<u8> = (0..COUNT).map(|i| i as u8).collect();
    assert_eq!(received, expected);
    assert_eq!(spi.state(), TransferState::Idle);
    assert_eq!(spi.fault_count(), 0);
}

// ── Faults and recovery ──────────────────────────────────────────────────────

#[test]
fn hardware_overrun_latches_and_clears_flag() {
    let spi = engine::<8>();
    spi.registers().set_status(SpiStatus::Overrun, true);
    spi.on_interrupt();

    assert_eq!(spi.state(), TransferState::Error);
    assert_eq!(spi.error_flags(), SpiErrorFlags::OVERRUN);
    assert!(
        !spi.read_status(SpiStatus::Overrun),
        "DR then SR read must clear OVR"
    );
}

#[test]
fn recover_returns_to_idle_and_rearms() {
    let spi = engine::<8>();
    spi.send(&[1, 2, 3]).unwrap();
    spi.registers().set_status(SpiStatus::CrcError, true);
    spi.on_interrupt();
    assert_eq!(spi.state(), TransferState::Error);

    assert_eq!(spi.recover(), SpiErrorFlags::CRC_ERROR);
    assert!(!spi.read_status(SpiStatus::CrcError), "CRCERR must be written back to 0");
    assert_eq!(spi.state(), TransferState::Idle);
    assert_eq!(spi.tx_pending(), 0, "queued bytes are dropped");
    assert!(interrupt_enabled(&spi, SpiControl2::ReceiveInterrupt));
    assert!(interrupt_enabled(&spi, SpiControl2::ErrorInterrupt));
    assert!(!interrupt_enabled(&spi, SpiControl2::TransmitInterrupt));

    assert_eq!(spi.send(&[0x42]), Ok(1));
    spi.on_interrupt();
    assert_eq!(spi.registers().transmitted().last(), Some(&0x42));
    assert_eq!(spi.state(), TransferState::Idle);
    assert_eq!(spi.fault_count(), 1, "cleared CRC error must not fault again");
}

// ── Completion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn wait_idle_completes_when_isr_drains() {
    let spi: Arc<Engine<8>> = Arc::new(engine());
    spi.send(&[1, 2, 3]).unwrap();

    let isr = {
        let spi = Arc::clone(&spi);
        std::thread::spawn(move || {
            for _ in 0..3 {
                std::thread::sleep(std::time::Duration::from_millis(1));
                spi.on_interrupt();
            }
        })
    };

    spi.wait_idle().await.unwrap();
    assert_eq!(spi.state(), TransferState::Idle);
    isr.join().unwrap();
}

#[tokio::test]
async fn wait_idle_reports_fault() {
    let spi: Arc<Engine<8>> = Arc::new(engine());
    spi.send(&[1]).unwrap();

    let isr = {
        let spi = Arc::clone(&spi);
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(1));
            spi.irq_handler(SpiEvent::Error(SpiErrorFlags::MODE_FAULT));
        })
    };

    assert_eq!(
        spi.wait_idle().await,
        Err(TransferError::Faulted(SpiErrorFlags::MODE_FAULT))
    );
    isr.join().unwrap();
}

// ── Dispatch ─────────────────────────────────────────────────────────────────

static SPI2: LazyLock<Engine<8>> = LazyLock::new(engine::<8>);
static IRQS: InterruptDispatcher = InterruptDispatcher::new();

#[test]
fn dispatcher_routes_vector_to_engine() {
    IRQS.register(SpiInstance::Spi2.irq(), &*SPI2).unwrap();

    SPI2.send(&[0xEE]).unwrap();
    assert!(IRQS.dispatch(SpiInstance::Spi2.irq()));
    assert_eq!(SPI2.registers().transmitted().as_slice(), &[0xEE]);
    assert_eq!(SPI2.state(), TransferState::Idle);
    assert!(!IRQS.dispatch(SpiInstance::Spi1.irq()));
}
