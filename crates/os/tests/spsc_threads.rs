//! Cross-thread tests: one producer, one consumer, as task and ISR would be.

use std::sync::Arc;
use std::thread;

use os::{OverflowPolicy, RingBuffer, Semaphore};

#[test]
fn spsc_transfers_every_item_in_order() {
    const COUNT: u32 = 10_000;
    let rb: Arc<RingBuffer<u32, 16>> = Arc::new(RingBuffer::new(OverflowPolicy::Reject));

    let producer = {
        let rb = Arc::clone(&rb);
        thread::spawn(move || {
            for i in 0..COUNT {
                while rb.push(i).is_err() {
                    thread::yield_now();
                }
            }
        })
    };

    let mut expected = 0;
    while expected < COUNT {
        if let Some(v) = rb.pop() {
            assert_eq!(v, expected, "items must arrive in FIFO order");
            expected += 1;
        } else {
            thread::yield_now();
        }
    }
    producer.join().unwrap();
    assert!(rb.is_empty());
}

#[test]
fn wait_blocking_returns_after_signal_from_other_thread() {
    let sem: Arc<Semaphore<2>> = Arc::new(Semaphore::binary(true));
    let signaller = {
        let sem = Arc::clone(&sem);
        thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(10));
            assert!(sem.signal());
        })
    };
    sem.wait_blocking();
    signaller.join().unwrap();
    assert_eq!(sem.count(), 0, "the woken waiter must consume the permit");
}

#[tokio::test]
async fn async_wait_wakes_on_signal() {
    let sem: Arc<Semaphore<2>> = Arc::new(Semaphore::binary(true));
    let waiter = {
        let sem = Arc::clone(&sem);
        tokio::spawn(async move {
            sem.wait().await;
        })
    };
    tokio::task::yield_now().await;
    assert!(!waiter.is_finished(), "waiter must park without a permit");
    sem.signal();
    waiter.await.unwrap();
    assert_eq!(sem.count(), 0);
}
