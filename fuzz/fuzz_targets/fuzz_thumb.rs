#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // One-shot entry.
    let _ = thumb_asm::assemble(data);

    // Line-sequence entry.
    let lines: Vec<&str> = data.lines().collect();
    let _ = thumb_asm::assemble_lines(&lines);

    // Builder API, line by line.
    let mut asm = thumb_asm::Assembler::new();
    for line in data.lines() {
        if asm.emit(line).is_err() {
            return;
        }
    }
    if let Ok(result) = asm.finish() {
        // Exercise the accessors; the stream must always be word-aligned.
        assert_eq!(result.len() % 2, 0);
        let _ = result.to_le_bytes();
        let _ = result.listing();
    }
});
