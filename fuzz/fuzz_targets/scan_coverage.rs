#![no_main]
use libfuzzer_sys::fuzz_target;
use mathscan_syntax::{Segment, scan};

fuzz_target!(|data: &[u8]| {
    let s = String::from_utf8_lossy(data);
    let segments = scan(&s);

    // Segments must tile the input exactly.
    let rebuilt: String = segments.iter().map(Segment::raw).collect();
    assert_eq!(rebuilt, s);
    assert!(
        !segments
            .windows(2)
            .any(|w| matches!(w, [Segment::Text(_), Segment::Text(_)]))
    );
});
