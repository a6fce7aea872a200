//! Textual memory traces: `<op> <hex address>,<decimal size>` records
//! separated by whitespace. Input is read as raw bytes, one byte per
//! operation letter.

use std::fmt;

use nom::{
    bytes::complete::tag_no_case,
    character::complete::{char, hex_digit1, multispace0, satisfy, u32},
    combinator::{map, map_res, opt},
    sequence::preceded,
    IResult,
};
use num_enum::FromPrimitive;

use crate::addr::Addr;

/// Operation letter of a trace record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum Operation {
    /// `I`, instruction fetch
    Instruction = 0x49,
    /// `L`
    Load = 0x4c,
    /// `M`, a load followed by a store to the same address
    Modify = 0x4d,
    /// `S`
    Store = 0x53,
    #[num_enum(catch_all)]
    Other(u8),
}

impl Operation {
    pub fn letter(self) -> char {
        match self {
            Operation::Instruction => 'I',
            Operation::Load => 'L',
            Operation::Modify => 'M',
            Operation::Store => 'S',
            Operation::Other(c) => c as char,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRecord {
    pub op: Operation,
    pub addr: Addr,
    /// access width in bytes. carried along, never used for hit/miss
    pub size: u32,
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {},{}", self.op, self.addr, self.size)
    }
}

/// any single non-whitespace byte; unknown letters become `Other`.
fn operation(input: &[u8]) -> IResult<&[u8], Operation> {
    map(satisfy(|c| !c.is_ascii_whitespace()), |c| {
        Operation::from(c as u8)
    })(input)
}

fn hex_addr(input: &[u8]) -> IResult<&[u8], Addr> {
    preceded(
        opt(tag_no_case("0x")),
        map_res(hex_digit1, |h: &[u8]| {
            // hex_digit1 only yields ascii
            let h = std::str::from_utf8(h).unwrap_or_default();
            u64::from_str_radix(h, 16).map(Addr::new)
        }),
    )(input)
}

fn access_size(input: &[u8]) -> IResult<&[u8], u32> {
    let (input, _) = multispace0(input)?;
    preceded(opt(char('+')), u32)(input)
}

/// parses one record, skipping the whitespace in front of it.
pub fn parse_record(input: &[u8]) -> IResult<&[u8], TraceRecord> {
    let (input, _) = multispace0(input)?;
    let (input, op) = operation(input)?;
    let (input, _) = multispace0(input)?;
    let (input, addr) = hex_addr(input)?;
    let (input, _) = char(',')(input)?;
    let (input, size) = access_size(input)?;
    Ok((input, TraceRecord { op, addr, size }))
}

/// Yields records until the input ends or a record does not parse.
/// A malformed record is not an error: reading just stops there.
pub struct TraceReader<'a> {
    rest: &'a [u8],
    consumed: usize,
    truncated: bool,
}

impl<'a> TraceReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            rest: input,
            consumed: 0,
            truncated: false,
        }
    }
    /// whether reading stopped at a malformed record rather than at the end
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

impl Iterator for TraceReader<'_> {
    type Item = TraceRecord;

    fn next(&mut self) -> Option<Self::Item> {
        match parse_record(self.rest) {
            Ok((rest, record)) => {
                self.rest = rest;
                self.consumed += 1;
                Some(record)
            }
            Err(_) => {
                let start = self.rest.iter().position(|b| !b.is_ascii_whitespace());
                if let Some(start) = start {
                    self.truncated = true;
                    let line = self.rest[start..].split(|&b| b == b'\n').next();
                    log::debug!(
                        "stopped reading trace after {} records at `{}`",
                        self.consumed,
                        String::from_utf8_lossy(line.unwrap_or_default())
                    );
                }
                self.rest = &[];
                None
            }
        }
    }
}
