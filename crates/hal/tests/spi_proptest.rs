//! Property-based tests for the SPI transfer engine.
//! Verifies FIFO delivery and fault latching for arbitrary payloads.
#![allow(clippy::unwrap_used)]
#![allow(clippy::arithmetic_side_effects)]
#![allow(clippy::indexing_slicing)]
#![allow(clippy::cast_possible_truncation)]

use hal::spi::mock::MockSpi;
use hal::spi::{SpiErrorFlags, SpiEvent, SpiTransferEngine, TransferState};
use platform::SpiConfig;
use proptest::prelude::*;

const CAPACITY: usize = 16;

type Engine = SpiTransferEngine<MockSpi, CAPACITY, CAPACITY>;

fn engine() -> Engine {
    let engine = Engine::new(MockSpi::new());
    engine.configure(SpiConfig::default());
    engine
}

proptest! {
    /// Whatever `send` accepts reaches DR unchanged, one byte per TX event.
    #[test]
    fn accepted_bytes_reach_dr_in_order(
        chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..24), 1..6)
    ) {
        let spi = engine();
        let mut expected = Vec::new();
        for chunk in &chunks {
            let accepted = spi.send(chunk).unwrap_or(0);
            expected.extend_from_slice(&chunk[..accepted]);
            for _ in 0..accepted {
                spi.irq_handler(SpiEvent::TransmitEmpty);
            }
            prop_assert_eq!(spi.state(), TransferState::Idle);
        }
        let sent = spi.registers().transmitted();
        prop_assert_eq!(sent.as_slice(), expected.as_slice());
    }

    /// Received bytes beyond capacity fault the engine once and keep the
    /// first `CAPACITY` bytes.
    #[test]
    fn rx_beyond_capacity_faults_once(extra in 1usize..32) {
        let spi = engine();
        let total = CAPACITY + extra;
        let bytes: Vec<u8> = (0..total).map(|i| i as u8).collect();
        spi.registers().feed(&bytes);
        for _ in 0..total {
            spi.irq_handler(SpiEvent::ReceiveNotEmpty);
        }
        prop_assert_eq!(spi.state(), TransferState::Error);
        prop_assert_eq!(spi.fault_count(), 1);
        prop_assert!(spi.error_flags().contains(SpiErrorFlags::BUFFER_OVERRUN));

        let mut out = [0u8; CAPACITY];
        prop_assert_eq!(spi.receive(&mut out), CAPACITY);
        prop_assert_eq!(&out[..], &bytes[..CAPACITY]);
    }
}
