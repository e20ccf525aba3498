//! Line tokenizer for assembly source.
//!
//! The input surface is line-oriented: each source line is either empty, a
//! label definition (`name:`), or a mnemonic followed by an argument blob.
//! All whitespace inside the arguments is stripped before the blob is handed
//! to the instruction table, so operand patterns match a canonical form
//! (`add r0 , r1 , #4` and `add r0,r1,#4` are the same instruction).

/// A classified source line. Text is borrowed from the input where possible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'src> {
    /// Empty or whitespace-only line — produces no output.
    Empty,
    /// Label definition: `name:` with the colon stripped.
    Label(&'src str),
    /// Instruction: mnemonic plus whitespace-stripped argument blob.
    Instr {
        /// The mnemonic (text before the first space or tab).
        mnemonic: &'src str,
        /// The argument blob with every space and tab removed.
        args: String,
    },
}

/// Classify one source line.
///
/// A trailing `:` marks a label definition. Otherwise the mnemonic runs up
/// to the first space or tab; the remainder becomes the argument blob with
/// all spaces and tabs removed. A line with no whitespace at all is a bare
/// mnemonic with an empty blob (`nop`, `wfi`, ...).
pub fn tokenize_line(raw: &str) -> Line<'_> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Line::Empty;
    }
    if let Some(name) = trimmed.strip_suffix(':') {
        return Line::Label(name);
    }
    match trimmed.find([' ', '\t']) {
        Some(pos) => {
            let args = trimmed[pos..]
                .chars()
                .filter(|&c| c != ' ' && c != '\t')
                .collect();
            Line::Instr {
                mnemonic: &trimmed[..pos],
                args,
            }
        }
        None => Line::Instr {
            mnemonic: trimmed,
            args: String::new(),
        },
    }
}
