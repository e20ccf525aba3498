//! Property-based tests using proptest.
//!
//! These verify assembler invariants across large random input spaces —
//! complementing the targeted unit/integration tests and the fuzz target.

use proptest::prelude::*;
use thumb_asm::encoder::{ConvertCtx, Converter, LabelTable};
use thumb_asm::{assemble, assemble_lines, Assembler};

// ── Strategies ──────────────────────────────────────────────────────────

/// Arbitrary ASCII text (the assembler only accepts text input).
fn arb_asm_input() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::char::range('\0', '\x7f'), 0..256)
        .prop_map(|v| v.into_iter().collect())
}

/// Valid 16-bit instructions from a curated pool.
fn valid_thumb16_insn() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "nop",
        "wfe",
        "wfi",
        "cpsie i",
        "cpsid i",
        "bkpt #0",
        "mov r0,#0",
        "mov r0,#42",
        "mov r7,#255",
        "mov r0,r1",
        "mov sp,r2",
        "movs r1,#1",
        "add r0,#4",
        "add r0,r1,r2",
        "add r0,r1,#3",
        "add sp,#16",
        "add r2,sp,#8",
        "adds r0,r0,#1",
        "sub r0,#4",
        "sub sp,#16",
        "sub r3,r2,r1",
        "lsl r0,r1,#3",
        "lsl r0,r1",
        "lsr r4,r5,#9",
        "asr r6,r7,#2",
        "cmp r0,#0",
        "cmp r0,r1",
        "and r0,r1",
        "orr r2,r3",
        "eor r4,r5",
        "bic r6,r7",
        "mvn r0,r1",
        "neg r2,r3",
        "mul r4,r5",
        "tst r6,r7",
        "cmn r0,r1",
        "adc r2,r3",
        "sbc r4,r5",
        "ror r6,r7",
        "bx lr",
        "bx r0",
        "push {r0,lr}",
        "pop {r0,r7}",
        "str r0,[r1,#4]",
        "str r0,[sp,#8]",
        "str r0,[r1,r2]",
        "strb r0,[r1,#3]",
        "ldr r0,[r1,#4]",
        "ldr r0,[pc,#8]",
        "ldr r0,[sp,#8]",
        "ldrb r0,[r1,r2]",
    ])
}

/// Valid 32-bit (two half-word) instructions from a curated pool.
fn valid_thumb32_insn() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "movw r0,#0x1234",
        "movw r7,#65535",
        "movw r12,#0",
        "add.w r0,r1,r2",
        "adc.w r3,r4,r5",
        ".word 0x12345678",
        ".word 42",
    ])
}

// ── Property: No panics on arbitrary input ──────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2000))]

    /// The assembler must NEVER panic on arbitrary input — only Ok/Err.
    #[test]
    fn no_panic_on_arbitrary_input(input in arb_asm_input()) {
        let _ = assemble(&input);
    }

    /// Line-sequence entry must not panic either.
    #[test]
    fn no_panic_on_arbitrary_lines(input in arb_asm_input()) {
        let lines: Vec<&str> = input.lines().collect();
        let _ = assemble_lines(&lines);
    }

    /// Builder API must not panic on arbitrary input.
    #[test]
    fn no_panic_builder_api(input in arb_asm_input()) {
        let mut asm = Assembler::new();
        for line in input.lines() {
            if asm.emit(line).is_err() {
                return Ok(());
            }
        }
        let _ = asm.finish();
    }
}

// ── Property: Valid instructions always succeed ─────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn valid_16_bit_always_assembles(insn in valid_thumb16_insn()) {
        let result = assemble(insn);
        prop_assert!(result.is_ok(), "Failed to assemble: {}", insn);
        // One half-word of code plus the alignment pad.
        prop_assert_eq!(result.unwrap().len(), 2, "{}", insn);
    }

    #[test]
    fn valid_32_bit_always_assembles(insn in valid_thumb32_insn()) {
        let result = assemble(insn);
        prop_assert!(result.is_ok(), "Failed to assemble: {}", insn);
        prop_assert_eq!(result.unwrap().len(), 2, "{}", insn);
    }
}

// ── Property: Determinism ───────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn deterministic(insn in valid_thumb16_insn()) {
        prop_assert_eq!(assemble(insn).unwrap(), assemble(insn).unwrap());
    }

    #[test]
    fn deterministic_multi(insns in prop::collection::vec(valid_thumb16_insn(), 1..16)) {
        let src = insns.join("\n");
        prop_assert_eq!(assemble(&src).unwrap(), assemble(&src).unwrap());
    }
}

// ── Property: Output length ─────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// N 16-bit instructions emit N half-words, padded to even.
    #[test]
    fn halfword_count_16_bit(insns in prop::collection::vec(valid_thumb16_insn(), 1..16)) {
        let output = assemble(&insns.join("\n")).unwrap();
        let n = insns.len();
        prop_assert_eq!(output.len(), n + n % 2);
    }

    /// N 32-bit instructions emit exactly 2N half-words (never padded).
    #[test]
    fn halfword_count_32_bit(insns in prop::collection::vec(valid_thumb32_insn(), 1..8)) {
        let output = assemble(&insns.join("\n")).unwrap();
        prop_assert_eq!(output.len(), insns.len() * 2);
    }

    /// Output length is even for any mix.
    #[test]
    fn output_always_even(
        a in prop::collection::vec(valid_thumb16_insn(), 0..8),
        b in prop::collection::vec(valid_thumb32_insn(), 0..4),
    ) {
        let mut lines: Vec<&str> = Vec::new();
        lines.extend(a.iter().copied());
        lines.extend(b.iter().copied());
        let output = assemble_lines(&lines).unwrap();
        prop_assert_eq!(output.len() % 2, 0);
    }
}

// ── Property: mov imm8 field round-trip ─────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// The full accepted imm8 range encodes verbatim into the low byte.
    #[test]
    fn mov_imm8_round_trip(v in 0u32..=255) {
        let hw = assemble(&format!("mov r3,#{v}")).unwrap();
        prop_assert_eq!(u32::from(hw[0]), 0x2300 | v);
    }

    /// Out-of-range imm8 values are rejected.
    #[test]
    fn mov_imm8_rejects_out_of_range(v in 256i64..=100_000) {
        let src = format!("mov r3,#{}", v);
        prop_assert!(assemble(&src).is_err());
    }
}

// ── Property: field converters round-trip ───────────────────────────────

/// Strategy: (off, bits, shift, field) with the field value in range.
fn uint_case() -> impl Strategy<Value = (u32, u32, u32, i64)> {
    (0u32..=8, 1u32..=8, 0u32..=2).prop_flat_map(|(off, bits, shift)| {
        (Just(off), Just(bits), Just(shift), 0i64..(1i64 << bits))
    })
}

fn sint_case() -> impl Strategy<Value = (u32, u32, u32, i64)> {
    (0u32..=8, 2u32..=8, 0u32..=2).prop_flat_map(|(off, bits, shift)| {
        let half = 1i64 << (bits - 1);
        (Just(off), Just(bits), Just(shift), -half..half)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// uint: emit then extract reproduces `value >> shift`.
    #[test]
    fn uint_field_round_trip((off, bits, shift, field) in uint_case()) {
        let labels = LabelTable::new();
        let ctx = ConvertCtx { labels: &labels, line: 1 };
        let value = field << shift;
        let out = Converter::Uint { off, bits, shift }
            .apply(&format!("#{value}"), &ctx)
            .unwrap();
        prop_assert_eq!((out >> off) & ((1 << bits) - 1), field as u32);
        // Nothing outside the field is written.
        prop_assert_eq!(out & !(((1u32 << bits) - 1) << off), 0);
    }

    /// sint: the encoded field, sign-extended from `bits`, equals
    /// `value >> shift`.
    #[test]
    fn sint_field_round_trip((off, bits, shift, field) in sint_case()) {
        let labels = LabelTable::new();
        let ctx = ConvertCtx { labels: &labels, line: 1 };
        let value = field << shift;
        let out = Converter::Sint { off, bits, shift }
            .apply(&format!("#{value}"), &ctx)
            .unwrap();
        let raw = (out >> off) & ((1 << bits) - 1);
        let extended = ((raw << (32 - bits)) as i32) >> (32 - bits);
        prop_assert_eq!(i64::from(extended), field);
    }

    /// Misaligned values are rejected whenever shift > 0.
    #[test]
    fn misaligned_values_rejected(
        (off, bits, shift, field) in uint_case(),
        misalign in 1i64..4,
    ) {
        prop_assume!(shift > 0);
        prop_assume!(misalign < (1i64 << shift));
        let labels = LabelTable::new();
        let ctx = ConvertCtx { labels: &labels, line: 1 };
        let value = (field << shift) | misalign;
        prop_assume!(value <= ((1i64 << bits) - 1) << shift);
        let result = Converter::Uint { off, bits, shift }.apply(&format!("#{value}"), &ctx);
        prop_assert!(result.is_err());
    }
}

// ── Property: Label-based programs ──────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Forward and backward conditional branches over small nop seas stay
    /// in range and assemble cleanly.
    #[test]
    fn label_programs_assemble(
        nops_before in 0u32..64,
        nops_after in 0u32..64,
    ) {
        let mut prog = String::from("start:\n");
        for _ in 0..nops_before {
            prog.push_str("  nop\n");
        }
        prog.push_str("  bne end\n");
        for _ in 0..nops_after {
            prog.push_str("  nop\n");
        }
        prog.push_str("end:\n");
        prog.push_str("  bx lr\n");

        let result = assemble(&prog);
        prop_assert!(result.is_ok(), "label program failed: {:?}", result);
        prop_assert_eq!(result.unwrap().len() % 2, 0);
    }

    /// `bl` reaches targets across larger distances.
    #[test]
    fn bl_long_range(nops in 0u32..512) {
        let mut prog = String::from("  bl far\n");
        for _ in 0..nops {
            prog.push_str("  nop\n");
        }
        prog.push_str("far:\n  bx lr\n");
        prop_assert!(assemble(&prog).is_ok());
    }
}
