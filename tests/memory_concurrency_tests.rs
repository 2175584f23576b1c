//! One writer, several readers on a shared sliding-window memory

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use stratum_live::{SlidingWindowMemory, TrackerError};

const ROW_LEN: usize = 64;
const CAPACITY: usize = 32;
const APPENDS: i64 = 20_000;

#[test]
fn test_readers_never_observe_torn_rows() {
    let memory = Arc::new(SlidingWindowMemory::with_row_len(CAPACITY, ROW_LEN).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let memory = memory.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut reads = 0u64;
                let mut lost = 0u64;
                while !done.load(Ordering::SeqCst) {
                    let last = memory.last_index();
                    if last < 0 {
                        continue;
                    }
                    // Reach back past the window on purpose now and then
                    let index = last - (reads as i64 % (CAPACITY as i64 + 4));
                    match memory.get(index) {
                        Ok(row) => {
                            assert_eq!(row.len(), ROW_LEN);
                            assert!(row.iter().all(|&x| x == index as f64), "torn row at {}", index);
                            reads += 1;
                        }
                        Err(e) => {
                            assert!(matches!(e, TrackerError::OutOfRange { .. }));
                            assert!(e.is_overwritten() || index < 0);
                            lost += 1;
                            reads += 1;
                        }
                    }
                }
                (reads, lost)
            })
        })
        .collect();

    for i in 0..APPENDS {
        let index = memory.append(vec![i as f64; ROW_LEN]).unwrap();
        assert_eq!(index, i);
    }
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        let (reads, _lost) = reader.join().unwrap();
        assert!(reads > 0);
    }

    let (min_valid, max_valid) = memory.valid_range();
    assert_eq!(max_valid, APPENDS - 1);
    assert_eq!(max_valid - min_valid + 1, CAPACITY as i64);
}

#[test]
fn test_range_reads_are_contiguous_across_wrap() {
    let memory = Arc::new(SlidingWindowMemory::<f64>::new(100).unwrap());
    let writer = {
        let memory = memory.clone();
        thread::spawn(move || {
            for i in 0..50_000 {
                memory.append(i as f64).unwrap();
            }
        })
    };

    let reader = {
        let memory = memory.clone();
        thread::spawn(move || {
            let mut checked = 0;
            while checked < 2_000 {
                let (min_valid, max_valid) = memory.valid_range();
                let len = (max_valid - min_valid + 1).min(40);
                if len <= 0 {
                    continue;
                }
                if let Ok(values) = memory.get_range(max_valid - len + 1, len as usize) {
                    for pair in values.windows(2) {
                        assert_eq!(pair[1], pair[0] + 1.0);
                    }
                    checked += 1;
                }
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
}
