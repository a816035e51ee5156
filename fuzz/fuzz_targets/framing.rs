#![no_main]

use chunkq_core::{cut_to_last_message, records, RECORD_TERMINATOR};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    match cut_to_last_message(data) {
        Ok((complete, remainder)) => {
            // The split is lossless and lands right after a terminator.
            assert_eq!(complete.len() + remainder.len(), data.len());
            assert!(complete.is_empty() || complete.last() == Some(&RECORD_TERMINATOR));
            assert!(!remainder.contains(&RECORD_TERMINATOR));

            let mut total = 0;
            for record in records(complete) {
                assert_eq!(record.last(), Some(&RECORD_TERMINATOR));
                assert_eq!(
                    record.iter().filter(|&&b| b == RECORD_TERMINATOR).count(),
                    1
                );
                total += record.len();
            }
            assert_eq!(total, complete.len());
        }
        Err(_) => {
            assert!(!data.is_empty());
            assert!(!data.contains(&RECORD_TERMINATOR));
        }
    }
});
