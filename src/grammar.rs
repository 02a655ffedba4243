//! Parses one line of a lineage trace into a [`ParsedLine`].
//!
//! A record is one of: an item line (`(id) (type) representation`), a
//! patch-start line (`patch_<identifier>`), or a patch-end line (empty or
//! whitespace-only). Anything else is malformed and produces a
//! [`GrammarError`] naming the offending text.
//!
//! Tokens are whitespace-separated except inside the `°`/`·`-delimited
//! creation and literal payloads. Two distinct "raw token" character
//! classes are used inside those payloads: [`is_value_char`] (forbids
//! both `°` and `·`, used for a literal's `value` field, since a literal
//! quadruple is itself `·`-delimited) and [`is_non_circle_char`] (forbids
//! only `°`, used for free-form creation-parameter tokens, which may
//! legitimately contain a `·`). This split, underspecified in prose, is
//! taken from the original grammar's `any_value` vs. `any_non_circle`
//! token rules.

pub mod param;

use crate::{CreationMethod, DataType, ExecutionType, ItemId, ValueType};
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{char, digit1, space0};
use nom::combinator::{map, map_res, opt, value};
use nom::multi::many1;
use nom::sequence::{delimited, preceded, tuple};
use nom::IResult;
use param::{parse_param_group, Param};
use std::fmt;

/// The short type tag on an item line: `L`, `C`, `I`, or `D`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TypeTag {
    Literal,
    Creation,
    Instruction,
    Dedup,
}

impl TypeTag {
    /// The long kind name this tag maps to, per the data model.
    pub fn kind(self) -> crate::TraceItemKind {
        match self {
            TypeTag::Literal => crate::TraceItemKind::Literal,
            TypeTag::Creation => crate::TraceItemKind::Creation,
            TypeTag::Instruction => crate::TraceItemKind::Instruction,
            TypeTag::Dedup => crate::TraceItemKind::Dedup,
        }
    }
}

/// A literal's representation: `value · data_type · value_type · flag`.
///
/// `flag` is kept as the raw matched string (`"true"` or `"false"`); the
/// item loader is responsible for coercing it to `bool`, per the split
/// between grammar (syntax) and item loader (semantics).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LiteralRepr {
    pub value: String,
    pub data_type: DataType,
    pub value_type: ValueType,
    pub flag: String,
}

/// A creation's representation, one variant per creation method (plus the
/// `IN#<n>` dedup-input placeholder, which carries no execution_type).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "creation_method")]
pub enum CreationRepr {
    #[serde(rename = "in")]
    DedupIn { n: u64 },
    #[serde(rename = "rand")]
    Rand {
        execution_type: ExecutionType,
        other_params: Vec<Param>,
    },
    #[serde(rename = "createvar")]
    CreateVar {
        execution_type: ExecutionType,
        function: String,
        file_name: String,
        file_overwrite: String,
        data_type: DataType,
        format: String,
        other_params: Vec<Param>,
    },
    #[serde(rename = "seq")]
    Seq {
        execution_type: ExecutionType,
        other_params: Vec<Param>,
    },
}

impl CreationRepr {
    /// The `creation_method` column value for the `creation` table.
    pub fn method(&self) -> CreationMethod {
        match self {
            CreationRepr::DedupIn { .. } => CreationMethod::In,
            CreationRepr::Rand { .. } => CreationMethod::Rand,
            CreationRepr::CreateVar { .. } => CreationMethod::CreateVar,
            CreationRepr::Seq { .. } => CreationMethod::Seq,
        }
    }

    /// The `execution_type` column value; absent for the `IN#` placeholder.
    pub fn execution_type(&self) -> Option<ExecutionType> {
        match self {
            CreationRepr::DedupIn { .. } => None,
            CreationRepr::Rand { execution_type, .. }
            | CreationRepr::CreateVar { execution_type, .. }
            | CreationRepr::Seq { execution_type, .. } => Some(*execution_type),
        }
    }
}

/// An instruction's representation: `op_code input_refs [special_value_bits]`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct InstructionRepr {
    pub op_code: String,
    pub inputs: Vec<ItemId>,
    pub special_value_bits: Option<u64>,
}

/// A dedup's representation: `dedup_name input_refs`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DedupRepr {
    pub dedup_name: String,
    pub inputs: Vec<ItemId>,
}

/// The parsed body of an item line, keyed by its [`TypeTag`].
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum Representation {
    Literal(LiteralRepr),
    Creation(CreationRepr),
    Instruction(InstructionRepr),
    Dedup(DedupRepr),
}

impl Representation {
    /// The ordered list of ids this representation refers to as inputs;
    /// empty for `Literal` and `Creation`.
    pub fn inputs(&self) -> &[ItemId] {
        match self {
            Representation::Instruction(repr) => &repr.inputs,
            Representation::Dedup(repr) => &repr.inputs,
            Representation::Literal(_) | Representation::Creation(_) => &[],
        }
    }
}

/// One parsed line of a trace file.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Item {
        id: ItemId,
        type_tag: TypeTag,
        representation: Representation,
    },
    PatchStart {
        patch_id: String,
    },
    PatchEnd,
}

/// A line failed to match the grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarError {
    pub line_number: usize,
    pub line: String,
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "malformed trace record on line {}: {:?}",
            self.line_number, self.line
        )
    }
}

impl std::error::Error for GrammarError {}

/// `value` field character class: anything but `°` and `·` (spaces allowed).
pub(crate) fn is_value_char(c: char) -> bool {
    c != '°' && c != '·'
}

/// Free-form creation-parameter token character class: anything but
/// whitespace and `°` (a `·` is allowed).
pub(crate) fn is_non_circle_char(c: char) -> bool {
    !c.is_whitespace() && c != '°'
}

pub(crate) fn parse_data_type(input: &str) -> IResult<&str, DataType> {
    alt((
        value(DataType::Scalar, tag("SCALAR")),
        value(DataType::Frame, tag("FRAME")),
        value(DataType::Matrix, tag("MATRIX")),
        value(DataType::List, tag("LIST")),
    ))(input)
}

pub(crate) fn parse_value_type(input: &str) -> IResult<&str, ValueType> {
    alt((
        value(ValueType::Int64, tag("INT64")),
        value(ValueType::Fp64, tag("FP64")),
        value(ValueType::String, tag("STRING")),
        value(ValueType::Boolean, tag("BOOLEAN")),
    ))(input)
}

fn parse_execution_type(input: &str) -> IResult<&str, ExecutionType> {
    alt((
        value(ExecutionType::CpFile, tag("CP_FILE")),
        value(ExecutionType::Cp, tag("CP")),
        value(ExecutionType::Spark, tag("SPARK")),
        value(ExecutionType::Gpu, tag("GPU")),
        value(ExecutionType::Fed, tag("FED")),
    ))(input)
}

fn parse_item_id(input: &str) -> IResult<&str, ItemId> {
    map(
        delimited(char('('), map_res(digit1, str::parse::<u64>), char(')')),
        ItemId::from,
    )(input)
}

fn parse_type_tag(input: &str) -> IResult<&str, TypeTag> {
    delimited(
        char('('),
        alt((
            value(TypeTag::Literal, char('L')),
            value(TypeTag::Creation, char('C')),
            value(TypeTag::Instruction, char('I')),
            value(TypeTag::Dedup, char('D')),
        )),
        char(')'),
    )(input)
}

fn non_circle_token(input: &str) -> IResult<&str, &str> {
    take_while1(is_non_circle_char)(input)
}

fn parse_literal_repr(input: &str) -> IResult<&str, LiteralRepr> {
    let (input, value) = take_while1(is_value_char)(input)?;
    let (input, _) = char('·')(input)?;
    let (input, data_type) = parse_data_type(input)?;
    let (input, _) = char('·')(input)?;
    let (input, value_type) = parse_value_type(input)?;
    let (input, _) = char('·')(input)?;
    let (input, flag) = alt((tag("true"), tag("false")))(input)?;
    Ok((
        input,
        LiteralRepr {
            value: value.to_string(),
            data_type,
            value_type,
            flag: flag.to_string(),
        },
    ))
}

fn parse_dedup_in(input: &str) -> IResult<&str, CreationRepr> {
    let (input, _) = tag("IN#")(input)?;
    let (input, n) = map_res(digit1, str::parse::<u64>)(input)?;
    Ok((input, CreationRepr::DedupIn { n }))
}

fn parse_rand(input: &str) -> IResult<&str, CreationRepr> {
    let (input, execution_type) = parse_execution_type(input)?;
    let (input, _) = char('°')(input)?;
    let (input, _) = tag("rand")(input)?;
    let (input, other_params) = parse_param_group(input)?;
    Ok((
        input,
        CreationRepr::Rand {
            execution_type,
            other_params,
        },
    ))
}

fn parse_seq(input: &str) -> IResult<&str, CreationRepr> {
    let (input, execution_type) = parse_execution_type(input)?;
    let (input, _) = char('°')(input)?;
    let (input, _) = tag("seq")(input)?;
    let (input, other_params) = parse_param_group(input)?;
    Ok((
        input,
        CreationRepr::Seq {
            execution_type,
            other_params,
        },
    ))
}

fn parse_create_var(input: &str) -> IResult<&str, CreationRepr> {
    let (input, execution_type) = parse_execution_type(input)?;
    let (input, _) = char('°')(input)?;
    let (input, _) = tag("createvar")(input)?;
    let (input, _) = char('°')(input)?;
    let (input, function) = non_circle_token(input)?;
    let (input, _) = char('°')(input)?;
    let (input, file_name) = non_circle_token(input)?;
    let (input, _) = char('°')(input)?;
    let (input, file_overwrite) = alt((tag("true"), tag("false")))(input)?;
    let (input, _) = char('°')(input)?;
    let (input, data_type) = parse_data_type(input)?;
    let (input, _) = char('°')(input)?;
    let (input, format) = non_circle_token(input)?;
    let (input, other_params) = parse_param_group(input)?;
    Ok((
        input,
        CreationRepr::CreateVar {
            execution_type,
            function: function.to_string(),
            file_name: file_name.to_string(),
            file_overwrite: file_overwrite.to_string(),
            data_type,
            format: format.to_string(),
            other_params,
        },
    ))
}

fn parse_creation_repr(input: &str) -> IResult<&str, CreationRepr> {
    alt((parse_dedup_in, parse_rand, parse_create_var, parse_seq))(input)
}

fn parse_item_ref(input: &str) -> IResult<&str, ItemId> {
    delimited(char('('), map_res(digit1, str::parse::<u64>), char(')'))(input).map(
        |(rest, id)| (rest, ItemId::from(id)),
    )
}

fn parse_inputs(input: &str) -> IResult<&str, Vec<ItemId>> {
    many1(preceded(space0, parse_item_ref))(input)
}

fn parse_instruction_repr(input: &str) -> IResult<&str, InstructionRepr> {
    let (input, op_code) = take_while1(|c: char| !c.is_whitespace())(input)?;
    let (input, inputs) = parse_inputs(input)?;
    let (input, special_value_bits) = opt(preceded(
        space0,
        delimited(char('['), map_res(digit1, str::parse::<u64>), char(']')),
    ))(input)?;
    Ok((
        input,
        InstructionRepr {
            op_code: op_code.to_string(),
            inputs,
            special_value_bits,
        },
    ))
}

fn parse_dedup_repr(input: &str) -> IResult<&str, DedupRepr> {
    let (input, dedup_name) = take_while1(|c: char| !c.is_whitespace())(input)?;
    let (input, inputs) = parse_inputs(input)?;
    Ok((
        input,
        DedupRepr {
            dedup_name: dedup_name.to_string(),
            inputs,
        },
    ))
}

fn parse_item_line(line: &str) -> IResult<&str, ParsedLine> {
    let (input, id) = parse_item_id(line)?;
    let (input, type_tag) = parse_type_tag(input)?;
    let (input, _) = space0(input)?;
    let (input, representation) = match type_tag {
        TypeTag::Literal => map(parse_literal_repr, Representation::Literal)(input)?,
        TypeTag::Creation => map(parse_creation_repr, Representation::Creation)(input)?,
        TypeTag::Instruction => map(parse_instruction_repr, Representation::Instruction)(input)?,
        TypeTag::Dedup => map(parse_dedup_repr, Representation::Dedup)(input)?,
    };
    Ok((
        input,
        ParsedLine::Item {
            id,
            type_tag,
            representation,
        },
    ))
}

fn parse_patch_start(line: &str) -> IResult<&str, ParsedLine> {
    let (input, _) = tag("patch_")(line)?;
    let (input, patch_id) = take_while1(|c: char| !c.is_whitespace())(input)?;
    Ok((
        input,
        ParsedLine::PatchStart {
            patch_id: patch_id.to_string(),
        },
    ))
}

/// Parses one line (without its trailing newline) into a [`ParsedLine`].
///
/// `line_number` is the 1-based line number, used only to annotate a
/// [`GrammarError`] if the line is malformed.
pub fn parse_line(line: &str, line_number: usize) -> Result<ParsedLine, GrammarError> {
    if line.trim().is_empty() {
        return Ok(ParsedLine::PatchEnd);
    }

    let result = if line.starts_with('(') {
        parse_item_line(line)
    } else {
        parse_patch_start(line)
    };

    match result {
        Ok((remaining, parsed)) if remaining.trim().is_empty() => Ok(parsed),
        _ => Err(GrammarError {
            line_number,
            line: line.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literal_line() {
        let parsed = parse_line("(12)(L)1·SCALAR·INT64·true", 1).unwrap();
        match parsed {
            ParsedLine::Item {
                id,
                type_tag,
                representation,
            } => {
                assert_eq!(id.id(), 12);
                assert_eq!(type_tag, TypeTag::Literal);
                assert_eq!(
                    representation,
                    Representation::Literal(LiteralRepr {
                        value: "1".into(),
                        data_type: DataType::Scalar,
                        value_type: ValueType::Int64,
                        flag: "true".into(),
                    })
                );
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn parses_instruction_line_with_special_bits() {
        let parsed = parse_line("(4074)(I)rightIndex (22) (4074) [1]", 2).unwrap();
        match parsed {
            ParsedLine::Item {
                representation: Representation::Instruction(repr),
                ..
            } => {
                assert_eq!(repr.op_code, "rightIndex");
                assert_eq!(repr.inputs, vec![ItemId::from(22), ItemId::from(4074)]);
                assert_eq!(repr.special_value_bits, Some(1));
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn parses_dedup_line() {
        let parsed = parse_line("(22)(D)dedup_X_SB515_3 (7) (12)", 3).unwrap();
        match parsed {
            ParsedLine::Item {
                representation: Representation::Dedup(repr),
                ..
            } => {
                assert_eq!(repr.dedup_name, "dedup_X_SB515_3");
                assert_eq!(repr.inputs, vec![ItemId::from(7), ItemId::from(12)]);
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn parses_dedup_in_placeholder() {
        let parsed = parse_line("(5)(C)IN#1045", 4).unwrap();
        match parsed {
            ParsedLine::Item {
                representation: Representation::Creation(CreationRepr::DedupIn { n }),
                ..
            } => assert_eq!(n, 1045),
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn parses_createvar_creation() {
        let line = "(7)(C)CP°createvar°pREADxxx°target/testTemp/functions/lineage/FullReusePerfTest/in/X°false°MATRIX°text°2000°128°-1°-1°copy";
        let parsed = parse_line(line, 5).unwrap();
        match parsed {
            ParsedLine::Item {
                representation: Representation::Creation(CreationRepr::CreateVar {
                    execution_type,
                    function,
                    file_name,
                    file_overwrite,
                    data_type,
                    format,
                    other_params,
                }),
                ..
            } => {
                assert_eq!(execution_type, ExecutionType::Cp);
                assert_eq!(function, "pREADxxx");
                assert_eq!(
                    file_name,
                    "target/testTemp/functions/lineage/FullReusePerfTest/in/X"
                );
                assert_eq!(file_overwrite, "false");
                assert_eq!(data_type, DataType::Matrix);
                assert_eq!(format, "text");
                assert_eq!(other_params.len(), 5);
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn parses_rand_creation() {
        let line = "(9)(C)CP°rand°6400·SCALAR·INT64·true°784·SCALAR·INT64·true°1000°0°20°1.0°42°1.0°8°uniform";
        let parsed = parse_line(line, 6).unwrap();
        match parsed {
            ParsedLine::Item {
                representation: Representation::Creation(CreationRepr::Rand {
                    execution_type,
                    other_params,
                }),
                ..
            } => {
                assert_eq!(execution_type, ExecutionType::Cp);
                assert_eq!(other_params.len(), 10);
                assert!(other_params
                    .iter()
                    .any(|p| matches!(p, Param::Distribution { pdf } if pdf == "uniform")));
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn parses_patch_start_and_end() {
        assert_eq!(
            parse_line("patch_X_SB515_3", 7).unwrap(),
            ParsedLine::PatchStart {
                patch_id: "X_SB515_3".into()
            }
        );
        assert_eq!(parse_line("", 8).unwrap(), ParsedLine::PatchEnd);
        assert_eq!(parse_line("   ", 9).unwrap(), ParsedLine::PatchEnd);
    }

    #[test]
    fn malformed_line_is_an_error() {
        let err = parse_line("not a valid record", 10).unwrap_err();
        assert_eq!(err.line_number, 10);
    }

    #[test]
    fn cp_file_is_not_shadowed_by_cp_prefix() {
        let parsed = parse_line("(1)(C)CP_FILE°seq", 11).unwrap();
        match parsed {
            ParsedLine::Item {
                representation:
                    Representation::Creation(CreationRepr::Seq {
                        execution_type, ..
                    }),
                ..
            } => assert_eq!(execution_type, ExecutionType::CpFile),
            other => panic!("unexpected parse: {:?}", other),
        }
    }
}
