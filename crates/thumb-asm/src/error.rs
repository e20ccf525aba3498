//! Error types for assembly failures.
//!
//! Every failure is synchronous and aborts the whole assemble call — the
//! caller gets either a complete half-word stream or a single [`AsmError`]
//! naming the offending line and value. No partial output is ever returned.

use std::fmt;

/// Assembly error with the 1-based source line and a descriptive payload.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AsmError {
    /// Mnemonic not present in the instruction table.
    UnknownMnemonic {
        /// The mnemonic that was not recognized.
        mnemonic: String,
        /// 1-based source line of the instruction.
        line: u32,
    },

    /// The mnemonic is known, but no variant's operand pattern matches.
    NoMatchingVariant {
        /// The mnemonic whose variants were tried.
        mnemonic: String,
        /// The whitespace-stripped argument blob that failed to match.
        args: String,
        /// 1-based source line of the instruction.
        line: u32,
    },

    /// A register converter saw a name outside its allowed set.
    UnknownRegister {
        /// The offending register text.
        name: String,
        /// 1-based source line of the instruction.
        line: u32,
    },

    /// A label reference was never defined in pass 1.
    UndefinedLabel {
        /// The undefined label name.
        label: String,
        /// 1-based source line of the reference.
        line: u32,
    },

    /// A label was defined more than once.
    DuplicateLabel {
        /// The duplicated label name.
        label: String,
        /// 1-based source line of the duplicate definition.
        line: u32,
        /// 1-based source line of the first definition.
        first_line: u32,
    },

    /// Immediate or displacement outside the field's declared range.
    ImmediateOutOfRange {
        /// The value that did not fit.
        value: i64,
        /// Minimum allowed value (inclusive).
        min: i64,
        /// Maximum allowed value (inclusive).
        max: i64,
        /// 1-based source line of the instruction.
        line: u32,
    },

    /// Immediate or displacement not a multiple of the field's scale.
    ImmediateAlignment {
        /// The misaligned value.
        value: i64,
        /// Required alignment (`1 << shift`).
        align: i64,
        /// 1-based source line of the instruction.
        line: u32,
    },

    /// Missing `#` prefix or non-parsable integer text.
    MalformedImmediate {
        /// The text that failed to parse.
        text: String,
        /// 1-based source line of the instruction.
        line: u32,
    },

    /// A template in the instruction table is malformed (wrong width, or a
    /// converter writes over a literal bit). Surfaced by table validation
    /// and the test suite; never expected at runtime.
    InternalTemplate {
        /// What is wrong with the template.
        detail: String,
    },

    /// A configured resource limit was exceeded (defense against DoS).
    ResourceLimitExceeded {
        /// Human-readable name of the resource (e.g. "lines", "labels").
        resource: String,
        /// The configured limit that was exceeded.
        limit: usize,
    },
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmError::UnknownMnemonic { mnemonic, line } => {
                write!(f, "line {}: unknown mnemonic '{}'", line, mnemonic)
            }
            AsmError::NoMatchingVariant {
                mnemonic,
                args,
                line,
            } => {
                write!(
                    f,
                    "line {}: no operand form of '{}' matches '{}'",
                    line, mnemonic, args
                )
            }
            AsmError::UnknownRegister { name, line } => {
                write!(f, "line {}: unknown register '{}'", line, name)
            }
            AsmError::UndefinedLabel { label, line } => {
                write!(f, "line {}: undefined label '{}'", line, label)
            }
            AsmError::DuplicateLabel {
                label,
                line,
                first_line,
            } => {
                write!(
                    f,
                    "line {}: duplicate label '{}' (first defined on line {})",
                    line, label, first_line
                )
            }
            AsmError::ImmediateOutOfRange {
                value,
                min,
                max,
                line,
            } => {
                write!(
                    f,
                    "line {}: value {} out of range [{}..{}]",
                    line, value, min, max
                )
            }
            AsmError::ImmediateAlignment { value, align, line } => {
                write!(
                    f,
                    "line {}: value {} must be a multiple of {}",
                    line, value, align
                )
            }
            AsmError::MalformedImmediate { text, line } => {
                write!(f, "line {}: malformed immediate '{}'", line, text)
            }
            AsmError::InternalTemplate { detail } => {
                write!(f, "internal template error: {}", detail)
            }
            AsmError::ResourceLimitExceeded { resource, limit } => {
                write!(f, "resource limit exceeded: {} (limit: {})", resource, limit)
            }
        }
    }
}

impl std::error::Error for AsmError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_unknown_mnemonic_display() {
        let err = AsmError::UnknownMnemonic {
            mnemonic: "frob".into(),
            line: 3,
        };
        assert_eq!(format!("{}", err), "line 3: unknown mnemonic 'frob'");
    }

    #[test]
    fn error_no_matching_variant_display() {
        let err = AsmError::NoMatchingVariant {
            mnemonic: "add".into(),
            args: "r9,#1".into(),
            line: 7,
        };
        assert_eq!(
            format!("{}", err),
            "line 7: no operand form of 'add' matches 'r9,#1'"
        );
    }

    #[test]
    fn error_unknown_register_display() {
        let err = AsmError::UnknownRegister {
            name: "r8".into(),
            line: 1,
        };
        assert_eq!(format!("{}", err), "line 1: unknown register 'r8'");
    }

    #[test]
    fn error_undefined_label_display() {
        let err = AsmError::UndefinedLabel {
            label: "target".into(),
            line: 10,
        };
        assert_eq!(format!("{}", err), "line 10: undefined label 'target'");
    }

    #[test]
    fn error_duplicate_label_display() {
        let err = AsmError::DuplicateLabel {
            label: "loop".into(),
            line: 20,
            first_line: 5,
        };
        assert_eq!(
            format!("{}", err),
            "line 20: duplicate label 'loop' (first defined on line 5)"
        );
    }

    #[test]
    fn error_immediate_out_of_range_display() {
        let err = AsmError::ImmediateOutOfRange {
            value: 256,
            min: 0,
            max: 255,
            line: 2,
        };
        assert_eq!(format!("{}", err), "line 2: value 256 out of range [0..255]");
    }

    #[test]
    fn error_immediate_alignment_display() {
        let err = AsmError::ImmediateAlignment {
            value: 3,
            align: 4,
            line: 4,
        };
        assert_eq!(format!("{}", err), "line 4: value 3 must be a multiple of 4");
    }

    #[test]
    fn error_malformed_immediate_display() {
        let err = AsmError::MalformedImmediate {
            text: "#abc".into(),
            line: 9,
        };
        assert_eq!(format!("{}", err), "line 9: malformed immediate '#abc'");
    }

    #[test]
    fn error_resource_limit_display() {
        let err = AsmError::ResourceLimitExceeded {
            resource: "lines".into(),
            limit: 1_000_000,
        };
        assert_eq!(
            format!("{}", err),
            "resource limit exceeded: lines (limit: 1000000)"
        );
    }
}
