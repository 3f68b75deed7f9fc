#![no_main]
use libfuzzer_sys::fuzz_target;
use mathscan_core::normalize::normalize;

fn placeholders(text: &str) -> usize {
    text.matches(['\u{E000}', '\u{E001}']).count()
}

fuzz_target!(|data: &[u8]| {
    let s = String::from_utf8_lossy(data);
    let once = normalize(&s);
    assert_eq!(placeholders(&once), placeholders(&s));
});
