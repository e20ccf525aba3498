//! Bit templates and argument converters — the field-packing layer.
//!
//! Every encoding in the instruction table is described by a *template*: a
//! 16- or 32-character string of `0`/`1` literals and placeholder characters.
//! The literal bits form the base opcode; each placeholder position is filled
//! by an argument *converter* that turns one captured operand string into a
//! bit pattern which is OR-ed into the opcode.
//!
//! Converters are a closed sum type dispatched by exhaustive match. They only
//! ever write into placeholder positions — the table tests assert this for
//! every variant.

use std::collections::HashMap;

use crate::error::AsmError;

// ── Templates ────────────────────────────────────────────────────────────

/// Instruction width: one half-word (Thumb) or two (Thumb-2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Width {
    /// 16-bit encoding, emitted as a single half-word.
    Half,
    /// 32-bit encoding, emitted high half-word first.
    Word,
}

impl Width {
    /// Size of the encoded instruction in bytes (2 or 4).
    #[must_use]
    pub fn bytes(self) -> u32 {
        match self {
            Width::Half => 2,
            Width::Word => 4,
        }
    }

    /// Size of the encoded instruction in bits (16 or 32).
    #[must_use]
    pub fn bits(self) -> u32 {
        match self {
            Width::Half => 16,
            Width::Word => 32,
        }
    }
}

/// A parsed encoding template: base opcode plus placeholder mask.
///
/// The character at index `i` of the source string maps to bit
/// `width - 1 - i`. `0` and `1` are literal bits; any other character
/// (`-` and `_` by convention) is a placeholder that converters fill in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    base: u32,
    placeholders: u32,
    width: Width,
}

impl Template {
    /// Parse a template string into base opcode, placeholder mask, and width.
    ///
    /// # Errors
    ///
    /// Returns [`AsmError::InternalTemplate`] if the string length is
    /// neither 16 nor 32.
    pub fn parse(text: &str) -> Result<Self, AsmError> {
        let width = match text.len() {
            16 => Width::Half,
            32 => Width::Word,
            n => {
                return Err(AsmError::InternalTemplate {
                    detail: format!("template '{}' has width {} (expected 16 or 32)", text, n),
                })
            }
        };
        let mut base = 0u32;
        let mut placeholders = 0u32;
        for (i, c) in text.chars().enumerate() {
            let bit = 1u32 << (width.bits() - 1 - i as u32);
            match c {
                '0' => {}
                '1' => base |= bit,
                _ => placeholders |= bit,
            }
        }
        Ok(Template {
            base,
            placeholders,
            width,
        })
    }

    /// The base opcode: all literal `1` bits set, placeholders zero.
    #[must_use]
    pub fn base(self) -> u32 {
        self.base
    }

    /// Mask of the placeholder positions.
    #[must_use]
    pub fn placeholder_mask(self) -> u32 {
        self.placeholders
    }

    /// Encoding width.
    #[must_use]
    pub fn width(self) -> Width {
        self.width
    }
}

// ── Label table ──────────────────────────────────────────────────────────

/// Key under which the engine publishes the pipeline PC during pass 2.
///
/// ARM pipeline convention: while an instruction executes, PC reads as the
/// instruction's own address plus 4.
pub const PC_KEY: &str = "PC";

/// Map from label name to its byte address within the fragment.
///
/// Built during pass 1; read-only during pass 2 apart from the [`PC_KEY`]
/// entry, which the engine refreshes before each instruction. Each entry
/// remembers the line that defined it so duplicate definitions can name the
/// first site.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    entries: HashMap<String, (u32, u32)>,
}

impl LabelTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a label at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`AsmError::DuplicateLabel`] if the name is already defined.
    pub fn define(&mut self, name: &str, addr: u32, line: u32) -> Result<(), AsmError> {
        if let Some(&(_, first_line)) = self.entries.get(name) {
            return Err(AsmError::DuplicateLabel {
                label: name.into(),
                line,
                first_line,
            });
        }
        self.entries.insert(name.into(), (addr, line));
        Ok(())
    }

    /// Publish the pipeline PC for the instruction about to be encoded.
    pub fn set_pc(&mut self, value: u32) {
        self.entries.insert(PC_KEY.into(), (value, 0));
    }

    /// Look up a label's byte address.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<u32> {
        self.entries.get(name).map(|&(addr, _)| addr)
    }

    /// Number of defined labels (including `PC` once pass 2 has started).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Context handed to every converter: the label table and the 1-based
/// source line for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct ConvertCtx<'a> {
    /// Label table, with [`PC_KEY`] set to the pipeline PC.
    pub labels: &'a LabelTable,
    /// 1-based source line of the instruction being encoded.
    pub line: u32,
}

// ── Converters ───────────────────────────────────────────────────────────

/// An argument converter: one captured operand string → field bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    /// Low register `r0..r7`, shifted to `off`.
    Reg {
        /// Bit offset of the 3-bit register field.
        off: u32,
    },
    /// Any register `r0..r15` (`lr`=14, `pc`=15), shifted to `off`.
    Reg4 {
        /// Bit offset of the 4-bit register field.
        off: u32,
    },
    /// Either a low register or a 3-bit immediate; the immediate form also
    /// sets the flag bit that selects the immediate encoding.
    RegOrImm {
        /// Bit offset of the 3-bit register/immediate field.
        reg_off: u32,
        /// Bit set when the operand is an immediate.
        imm_bit: u32,
    },
    /// Register list `r0..r7, lr` accumulated into a 9-bit mask
    /// (`r0`=1 .. `r7`=128, `lr`=256).
    RegList,
    /// Unsigned immediate or PC-relative displacement.
    Uint {
        /// Bit offset of the field.
        off: u32,
        /// Field width in bits.
        bits: u32,
        /// Scale: the value must be a multiple of `1 << shift` and is
        /// stored right-shifted by `shift`.
        shift: u32,
    },
    /// Signed immediate or PC-relative displacement, stored two's-complement
    /// in the field width.
    Sint {
        /// Bit offset of the field.
        off: u32,
        /// Field width in bits.
        bits: u32,
        /// Scale, as for [`Converter::Uint`].
        shift: u32,
    },
    /// Thumb-2 T3 16-bit immediate, split into `i:imm4:imm3:imm8`.
    T3Imm,
    /// Long branch-with-link displacement, split into two 11-bit halves.
    BlAddr,
    /// Raw 32-bit word for `.word`, half-swapped so high-first emission
    /// produces the little-endian layout.
    WordLit,
}

impl Converter {
    /// Convert one operand string into field bits.
    ///
    /// # Errors
    ///
    /// Returns the matching [`AsmError`] for unknown registers, undefined
    /// labels, malformed immediates, and range/alignment violations.
    pub fn apply(self, text: &str, ctx: &ConvertCtx<'_>) -> Result<u32, AsmError> {
        match self {
            Converter::Reg { off } => match parse_low_reg(text) {
                Some(r) => Ok(r << off),
                None => Err(AsmError::UnknownRegister {
                    name: text.into(),
                    line: ctx.line,
                }),
            },
            Converter::Reg4 { off } => match parse_any_reg(text) {
                Some(r) => Ok(r << off),
                None => Err(AsmError::UnknownRegister {
                    name: text.into(),
                    line: ctx.line,
                }),
            },
            Converter::RegOrImm { reg_off, imm_bit } => {
                let imm_text = text.strip_prefix('#').unwrap_or(text);
                if let Ok(v) = imm_text.parse::<i64>() {
                    if (0..=7).contains(&v) {
                        Ok(((v as u32) << reg_off) | (1 << imm_bit))
                    } else {
                        Err(AsmError::ImmediateOutOfRange {
                            value: v,
                            min: 0,
                            max: 7,
                            line: ctx.line,
                        })
                    }
                } else if let Some(r) = parse_low_reg(text) {
                    Ok(r << reg_off)
                } else {
                    Err(AsmError::UnknownRegister {
                        name: text.into(),
                        line: ctx.line,
                    })
                }
            }
            Converter::RegList => {
                let mut mask = 0u32;
                for token in text.split(',') {
                    let token = token.trim();
                    mask |= if token == "lr" {
                        0x100
                    } else if let Some(r) = parse_low_reg(token) {
                        1 << r
                    } else {
                        return Err(AsmError::UnknownRegister {
                            name: token.into(),
                            line: ctx.line,
                        });
                    };
                }
                Ok(mask)
            }
            Converter::Uint { off, bits, shift } => {
                let v = resolve_value(text, ctx)?;
                encode_field(v, off, bits, shift, false, ctx)
            }
            Converter::Sint { off, bits, shift } => {
                let v = resolve_value(text, ctx)?;
                encode_field(v, off, bits, shift, true, ctx)
            }
            Converter::T3Imm => {
                let imm = text
                    .strip_prefix('#')
                    .ok_or_else(|| AsmError::MalformedImmediate {
                        text: text.into(),
                        line: ctx.line,
                    })?;
                let v = parse_int(imm).ok_or_else(|| AsmError::MalformedImmediate {
                    text: text.into(),
                    line: ctx.line,
                })?;
                if !(0..=0xFFFF).contains(&v) {
                    return Err(AsmError::ImmediateOutOfRange {
                        value: v,
                        min: 0,
                        max: 0xFFFF,
                        line: ctx.line,
                    });
                }
                let v = v as u32;
                // imm16 splits as i:imm4:imm3:imm8 across the two half-words.
                let imm4 = (v >> 12) & 0xF;
                let i = (v >> 11) & 1;
                let imm3 = (v >> 8) & 0x7;
                let imm8 = v & 0xFF;
                Ok((i << 26) | (imm4 << 16) | (imm3 << 12) | imm8)
            }
            Converter::BlAddr => {
                // 22-bit half-word displacement, split 11/11 across the
                // two half-words of the long-branch encoding.
                let v = resolve_value(text, ctx)?;
                let field = encode_field(v, 0, 22, 1, true, ctx)?;
                Ok((((field >> 11) & 0x7FF) << 16) | (field & 0x7FF))
            }
            Converter::WordLit => {
                let v = if let Some(hex) = strip_hex_prefix(text) {
                    u32::from_str_radix(hex, 16).map_err(|_| AsmError::MalformedImmediate {
                        text: text.into(),
                        line: ctx.line,
                    })?
                } else {
                    let d = text
                        .parse::<i64>()
                        .map_err(|_| AsmError::MalformedImmediate {
                            text: text.into(),
                            line: ctx.line,
                        })?;
                    if d < i64::from(i32::MIN) || d > i64::from(u32::MAX) {
                        return Err(AsmError::ImmediateOutOfRange {
                            value: d,
                            min: i64::from(i32::MIN),
                            max: i64::from(u32::MAX),
                            line: ctx.line,
                        });
                    }
                    d as u32
                };
                // Swap halves: the engine emits the high half-word first,
                // which must carry the low 16 bits of the literal.
                Ok((v >> 16) | (v << 16))
            }
        }
    }
}

// ── Operand parsing helpers ──────────────────────────────────────────────

/// Parse a low register name `r0..r7`.
fn parse_low_reg(text: &str) -> Option<u32> {
    parse_any_reg(text).filter(|&r| r < 8)
}

/// Parse any register name: `r0..r15`, `lr` (=14), `pc` (=15).
fn parse_any_reg(text: &str) -> Option<u32> {
    match text {
        "lr" => return Some(14),
        "pc" => return Some(15),
        _ => {}
    }
    let num = text.strip_prefix('r')?;
    if num.is_empty() || num.len() > 2 || !num.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if num.len() == 2 && num.starts_with('0') {
        return None;
    }
    let v = num.parse::<u32>().ok()?;
    (v < 16).then_some(v)
}

/// Parse a decimal or `0x`-prefixed hexadecimal integer.
fn parse_int(text: &str) -> Option<i64> {
    match strip_hex_prefix(text) {
        Some(hex) => i64::from_str_radix(hex, 16).ok(),
        None => text.parse::<i64>().ok(),
    }
}

fn strip_hex_prefix(text: &str) -> Option<&str> {
    text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))
}

/// Resolve an operand to a numeric value: either a `#`-prefixed immediate
/// or a `NAME`/`NAME+INT` label reference taken PC-relative.
fn resolve_value(text: &str, ctx: &ConvertCtx<'_>) -> Result<i64, AsmError> {
    if let Some(imm) = text.strip_prefix('#') {
        return imm
            .parse::<i64>()
            .map_err(|_| AsmError::MalformedImmediate {
                text: text.into(),
                line: ctx.line,
            });
    }
    let (name, addend) = match text.split_once('+') {
        Some((name, addend)) => {
            let addend = addend
                .parse::<i64>()
                .map_err(|_| AsmError::MalformedImmediate {
                    text: text.into(),
                    line: ctx.line,
                })?;
            (name, addend)
        }
        None => (text, 0),
    };
    let base = ctx
        .labels
        .get(name)
        .ok_or_else(|| AsmError::UndefinedLabel {
            label: name.into(),
            line: ctx.line,
        })?;
    let pc = ctx
        .labels
        .get(PC_KEY)
        .ok_or_else(|| AsmError::UndefinedLabel {
            label: PC_KEY.into(),
            line: ctx.line,
        })?;
    Ok(i64::from(base) + addend - i64::from(pc))
}

/// Range-check, alignment-check, and pack a value into a bit field.
///
/// Signed fields are stored two's-complement: the value is arithmetically
/// shifted, then masked to `bits` — re-widening without re-masking would
/// corrupt the encoding.
fn encode_field(
    v: i64,
    off: u32,
    bits: u32,
    shift: u32,
    signed: bool,
    ctx: &ConvertCtx<'_>,
) -> Result<u32, AsmError> {
    let scale = 1i64 << shift;
    let (min, max) = if signed {
        let min = -(1i64 << (bits - 1)) * scale;
        (min, ((1i64 << bits) - 1) * scale + min)
    } else {
        (0, ((1i64 << bits) - 1) * scale)
    };
    if v < min || v > max {
        return Err(AsmError::ImmediateOutOfRange {
            value: v,
            min,
            max,
            line: ctx.line,
        });
    }
    if v & (scale - 1) != 0 {
        return Err(AsmError::ImmediateAlignment {
            value: v,
            align: scale,
            line: ctx.line,
        });
    }
    let field = ((v >> shift) & ((1i64 << bits) - 1)) as u32;
    Ok(field << off)
}
