//! Basic assembly example — demonstrates the one-shot and builder APIs.
//!
//! Run with: `cargo run --example basic`

use thumb_asm::{assemble, Assembler};

fn main() {
    println!("=== thumb_asm basic example ===\n");

    // --- One-shot assembly ---
    println!("1. One-shot assembly (mov r0,#42; bx lr):");
    let halfwords = assemble("mov r0,#42\nbx lr").unwrap();
    print_halfwords("   ", &halfwords);

    // --- Builder API ---
    println!("\n2. Builder API (countdown loop):");
    let mut asm = Assembler::new();
    asm.emit(
        "
  mov r0,#10
loop:
  sub r0,#1
  bne loop
  bx lr
",
    )
    .unwrap();

    let result = asm.finish().unwrap();
    print_halfwords("   ", result.halfwords());

    // Label addresses
    println!("\n   Labels:");
    for (name, addr) in result.labels() {
        println!("   {}: 0x{:X}", name, addr);
    }

    // Listing output
    println!("\n   Listing:");
    for line in result.listing().lines() {
        println!("   {}", line);
    }

    // --- Thumb-2 wide encodings and data ---
    println!("\n3. Wide encodings and data words:");
    let halfwords = assemble("  movw r1,#0x1234\n  bl over\n  .word 0xDEADBEEF\nover:\n  nop").unwrap();
    print_halfwords("   ", &halfwords);
}

fn print_halfwords(indent: &str, halfwords: &[u16]) {
    print!("{indent}");
    for hw in halfwords {
        print!("{:04X} ", hw);
    }
    println!();
}
