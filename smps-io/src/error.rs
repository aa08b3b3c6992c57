//! Error taxonomy for SMPS tokenization, mirroring the `file`/`line`/`reason`
//! diagnostic shape the original `smps::SMPSCore` constructors threw as plain
//! `std::runtime_error`s.

use derive_more::{Display, Error};

#[derive(Debug, Display, Error, PartialEq)]
pub enum Error {
    /// A malformed COR/TIM/STO line, tagged with the file and 1-based line
    /// number it was found on.
    #[display("{file}:{line}: {reason}")]
    Parse {
        file: String,
        line: usize,
        reason: String,
    },

    /// A construct this tokenizer does not support: BLOCKS, scenario trees,
    /// more than two periods, or a random cell outside RHS/adjacent-transfer.
    #[display("{file}:{line}: unsupported construct: {reason}")]
    Unsupported {
        file: String,
        line: usize,
        reason: String,
    },
}

impl Error {
    pub fn parse(file: impl Into<String>, line: usize, reason: impl Into<String>) -> Self {
        Error::Parse {
            file: file.into(),
            line,
            reason: reason.into(),
        }
    }

    pub fn unsupported(file: impl Into<String>, line: usize, reason: impl Into<String>) -> Self {
        Error::Unsupported {
            file: file.into(),
            line,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
