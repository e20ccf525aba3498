//! Public assembler API and the two-pass engine.
//!
//! Thumb branches and PC-relative loads are encoded as PC-relative
//! displacements, so a label's address is only known once every preceding
//! instruction's size is fixed. Pass 1 walks the lines selecting variants
//! by operand syntax alone and accumulates byte addresses into the label
//! table; pass 2 re-walks with the table populated and emits opcodes.
//! Variant selection depends only on the argument blob, so both passes are
//! guaranteed to agree on every instruction's size.

use regex::Captures;

use crate::encoder::{ConvertCtx, LabelTable, Width};
use crate::error::AsmError;
use crate::lexer::{tokenize_line, Line};
use crate::thumb::{self, Variant};

// ── Resource limits ──────────────────────────────────────────────────────

/// Configurable resource limits for defense against pathological input.
///
/// All limits default to values far beyond any realistic inline-assembly
/// fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceLimits {
    /// Maximum number of source lines per assemble call. Default: 1,000,000.
    pub max_lines: usize,
    /// Maximum number of label definitions. Default: 100,000.
    pub max_labels: usize,
    /// Maximum output size in half-words (16 MiB). Default: 8,388,608.
    pub max_output_halfwords: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_lines: 1_000_000,
            max_labels: 100_000,
            max_output_halfwords: 8 * 1024 * 1024,
        }
    }
}

// ── AssemblyResult ───────────────────────────────────────────────────────

/// The result of a successful assembly operation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[must_use]
pub struct AssemblyResult {
    /// The emitted half-word stream, padded to an even count.
    halfwords: Vec<u16>,
    /// Label addresses in definition order (name → byte offset).
    labels: Vec<(String, u32)>,
    /// Source annotations for the listing: `(byte offset, source text)`.
    annotations: Vec<(u32, String)>,
    /// Half-word count before the alignment pad.
    code_len: usize,
}

impl AssemblyResult {
    /// The assembled half-words. 32-bit instructions occupy two consecutive
    /// half-words, high half first; the stream length is always even.
    ///
    /// # Examples
    ///
    /// ```
    /// use thumb_asm::Assembler;
    ///
    /// let mut asm = Assembler::new();
    /// asm.emit("mov r0,#42\nbx lr")?;
    /// let result = asm.finish()?;
    /// assert_eq!(result.halfwords(), &[0x202A, 0x4770]);
    /// # Ok::<(), thumb_asm::AsmError>(())
    /// ```
    #[must_use]
    pub fn halfwords(&self) -> &[u16] {
        &self.halfwords
    }

    /// Consume and return the half-word stream.
    #[must_use]
    pub fn into_halfwords(self) -> Vec<u16> {
        self.halfwords
    }

    /// The stream rendered as little-endian bytes, ready to be copied into
    /// executable memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use thumb_asm::Assembler;
    ///
    /// let mut asm = Assembler::new();
    /// asm.emit("bx lr\nnop")?;
    /// assert_eq!(asm.finish()?.to_le_bytes(), vec![0x70, 0x47, 0xC0, 0x46]);
    /// # Ok::<(), thumb_asm::AsmError>(())
    /// ```
    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.halfwords
            .iter()
            .flat_map(|hw| hw.to_le_bytes())
            .collect()
    }

    /// Number of emitted half-words (always even).
    #[must_use]
    pub fn len(&self) -> usize {
        self.halfwords.len()
    }

    /// Whether nothing was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.halfwords.is_empty()
    }

    /// Label addresses (name, byte offset) in definition order.
    #[must_use]
    pub fn labels(&self) -> &[(String, u32)] {
        &self.labels
    }

    /// Look up a label's byte offset within the fragment.
    ///
    /// # Examples
    ///
    /// ```
    /// use thumb_asm::Assembler;
    ///
    /// let mut asm = Assembler::new();
    /// asm.emit("nop\ntarget:\nbx lr")?;
    /// let result = asm.finish()?;
    /// assert_eq!(result.label_address("target"), Some(2));
    /// assert_eq!(result.label_address("missing"), None);
    /// # Ok::<(), thumb_asm::AsmError>(())
    /// ```
    #[must_use]
    pub fn label_address(&self, name: &str) -> Option<u32> {
        self.labels
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, addr)| addr)
    }

    /// Produce a human-readable listing of offset, half-words, and source.
    ///
    /// Labels are shown on their own line at their resolved offset.
    ///
    /// # Example output
    ///
    /// ```text
    /// 0000            loop:
    /// 0000  3801      sub r0,#1
    /// 0002  D1FD      bne loop
    /// ```
    #[must_use]
    pub fn listing(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let mut sorted: Vec<(&str, u32)> = self
            .labels
            .iter()
            .map(|(name, addr)| (name.as_str(), *addr))
            .collect();
        sorted.sort_by_key(|&(_, addr)| addr);

        let mut next_label = 0;
        for (i, (addr, text)) in self.annotations.iter().enumerate() {
            while next_label < sorted.len() && sorted[next_label].1 <= *addr {
                let (name, label_addr) = sorted[next_label];
                let _ = writeln!(out, "{:04X}            {}:", label_addr, name);
                next_label += 1;
            }
            let end = self
                .annotations
                .get(i + 1)
                .map_or(self.code_len, |&(next, _)| next as usize / 2);
            let hex = self.halfwords[*addr as usize / 2..end]
                .iter()
                .map(|hw| format!("{:04X}", hw))
                .collect::<Vec<_>>()
                .join(" ");
            let _ = writeln!(out, "{:04X}  {:<9} {}", addr, hex, text);
        }
        // Trailing labels and the alignment pad, if any.
        for &(name, label_addr) in &sorted[next_label..] {
            let _ = writeln!(out, "{:04X}            {}:", label_addr, name);
        }
        if self.halfwords.len() > self.code_len {
            let _ = writeln!(out, "{:04X}  {:<9}", self.code_len * 2, "0000");
        }
        out
    }
}

// ── Assembler ────────────────────────────────────────────────────────────

/// Builder-pattern assembler over one fragment.
///
/// Lines are collected with [`Assembler::emit`] and assembled in two passes
/// by [`Assembler::finish`] — nothing is encoded until the whole fragment is
/// known, because forward label references need pass-1 addresses.
///
/// # Examples
///
/// ```
/// use thumb_asm::Assembler;
///
/// let mut asm = Assembler::new();
/// asm.emit("loop:")?;
/// asm.emit("  sub r0,#1")?;
/// asm.emit("  bne loop")?;
/// let result = asm.finish()?;
/// assert_eq!(result.halfwords(), &[0x3801, 0xD1FD]);
/// # Ok::<(), thumb_asm::AsmError>(())
/// ```
#[derive(Debug, Default)]
pub struct Assembler {
    lines: Vec<String>,
    limits: ResourceLimits,
}

impl Assembler {
    /// Create an assembler with default [`ResourceLimits`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the resource limits.
    pub fn limits(&mut self, limits: ResourceLimits) {
        self.limits = limits;
    }

    /// Append source text to the fragment. Accepts any number of lines.
    ///
    /// # Errors
    ///
    /// Returns [`AsmError::ResourceLimitExceeded`] when the configured line
    /// limit is exceeded. Syntax and encoding errors surface in
    /// [`Assembler::finish`].
    pub fn emit(&mut self, source: &str) -> Result<(), AsmError> {
        for line in source.lines() {
            if self.lines.len() >= self.limits.max_lines {
                return Err(AsmError::ResourceLimitExceeded {
                    resource: "lines".into(),
                    limit: self.limits.max_lines,
                });
            }
            self.lines.push(line.to_string());
        }
        Ok(())
    }

    /// Run both passes and produce the half-word stream.
    ///
    /// # Errors
    ///
    /// Returns the first [`AsmError`] encountered; no partial output is
    /// kept.
    pub fn finish(self) -> Result<AssemblyResult, AsmError> {
        // ── Pass 1: label addresses ─────────────────────────────────────
        let mut labels = LabelTable::new();
        let mut label_order: Vec<(String, u32)> = Vec::new();
        let mut addr = 0u32;
        for (idx, raw) in self.lines.iter().enumerate() {
            let line_no = idx as u32 + 1;
            match tokenize_line(raw) {
                Line::Empty => {}
                Line::Label(name) => {
                    if label_order.len() >= self.limits.max_labels {
                        return Err(AsmError::ResourceLimitExceeded {
                            resource: "labels".into(),
                            limit: self.limits.max_labels,
                        });
                    }
                    labels.define(name, addr, line_no)?;
                    label_order.push((name.to_string(), addr));
                }
                Line::Instr { mnemonic, args } => {
                    // Converters are not invoked here: the label table is
                    // incomplete and would yield spurious range errors.
                    let (variant, _) = select_line(mnemonic, &args, line_no)?;
                    addr += variant.template.width().bytes();
                }
            }
        }

        // ── Pass 2: encode ──────────────────────────────────────────────
        let mut halfwords: Vec<u16> = Vec::new();
        let mut annotations: Vec<(u32, String)> = Vec::new();
        let mut addr = 0u32;
        for (idx, raw) in self.lines.iter().enumerate() {
            let line_no = idx as u32 + 1;
            match tokenize_line(raw) {
                Line::Empty | Line::Label(_) => {}
                Line::Instr { mnemonic, args } => {
                    // ARM pipeline convention: PC reads as current + 4.
                    labels.set_pc(addr + 4);
                    let (variant, caps) = select_line(mnemonic, &args, line_no)?;
                    let ctx = ConvertCtx {
                        labels: &labels,
                        line: line_no,
                    };
                    let mut opcode = variant.template.base();
                    for (i, conv) in variant.converters.iter().enumerate() {
                        let text = caps.get(i + 1).map_or("", |m| m.as_str());
                        opcode |= conv.apply(text, &ctx)?;
                    }
                    annotations.push((addr, raw.trim().to_string()));
                    match variant.template.width() {
                        Width::Half => halfwords.push(opcode as u16),
                        Width::Word => {
                            halfwords.push((opcode >> 16) as u16);
                            halfwords.push(opcode as u16);
                        }
                    }
                    if halfwords.len() > self.limits.max_output_halfwords {
                        return Err(AsmError::ResourceLimitExceeded {
                            resource: "output half-words".into(),
                            limit: self.limits.max_output_halfwords,
                        });
                    }
                    addr += variant.template.width().bytes();
                }
            }
        }

        // Word-align the stream for the loader.
        let code_len = halfwords.len();
        if halfwords.len() % 2 == 1 {
            halfwords.push(0);
        }

        Ok(AssemblyResult {
            halfwords,
            labels: label_order,
            annotations,
            code_len,
        })
    }
}

/// Resolve mnemonic and operand blob to the first matching variant.
fn select_line<'a>(
    mnemonic: &str,
    args: &'a str,
    line: u32,
) -> Result<(&'static Variant, Captures<'a>), AsmError> {
    let variants = thumb::lookup(mnemonic).ok_or_else(|| AsmError::UnknownMnemonic {
        mnemonic: mnemonic.into(),
        line,
    })?;
    thumb::select_variant(variants, args).ok_or_else(|| AsmError::NoMatchingVariant {
        mnemonic: mnemonic.into(),
        args: args.into(),
        line,
    })
}
