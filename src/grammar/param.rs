//! Creation-parameter parsing.
//!
//! `rand`, `createvar`, and `seq` creation records carry a `°`-separated
//! group of free-form parameters. Each parameter is matched greedily, in
//! priority order: a nested literal quadruple, a float, an integer, a
//! distribution keyword, or a raw value string. See [`Param`].

use super::{is_non_circle_char, parse_data_type, parse_value_type};
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{char, digit1};
use nom::combinator::{opt, recognize};
use nom::error::{make_error, ErrorKind};
use nom::multi::many0;
use nom::sequence::{preceded, tuple};
use nom::IResult;

/// One parameter in a creation's `other_params` list.
///
/// The three shapes mirror what the grammar can greedily match for a
/// single `°`-delimited slot: a full literal quadruple, a bare
/// distribution keyword, or anything else as a raw value string (floats
/// and integers fall into the raw-value shape too — the distinction only
/// matters for the grammar's matching priority, not for the data shape).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum Param {
    Literal {
        value: String,
        data_type: crate::DataType,
        value_type: crate::ValueType,
        flag: String,
    },
    Distribution {
        pdf: String,
    },
    Value {
        value: String,
    },
}

/// Characters allowed in a raw creation-parameter token: anything but
/// whitespace and `°`. Unlike a literal `value` field, this class
/// tolerates an embedded `·`.
fn is_raw_param_char(c: char) -> bool {
    is_non_circle_char(c)
}

fn at_boundary(input: &str) -> bool {
    input.is_empty() || input.starts_with('°')
}

/// Runs `parser`, then requires the next character (if any) to be the `°`
/// that starts the following parameter. Used to stop a greedy numeric or
/// keyword match from swallowing a following raw token that merely starts
/// with the same characters (e.g. `uniformXYZ`, `1.5abc`).
fn bounded<'a, O>(
    mut parser: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    move |input: &'a str| {
        let (rest, out) = parser(input)?;
        if at_boundary(rest) {
            Ok((rest, out))
        } else {
            Err(nom::Err::Error(make_error(input, ErrorKind::Verify)))
        }
    }
}

fn parse_value_str(input: &str) -> IResult<&str, String> {
    use nom::bytes::complete::take_while1;
    let (input, value) = take_while1(|c: char| c != '°' && c != '·')(input)?;
    Ok((input, value.to_string()))
}

fn parse_param_literal(input: &str) -> IResult<&str, Param> {
    let (input, value) = parse_value_str(input)?;
    let (input, _) = char('·')(input)?;
    let (input, data_type) = parse_data_type(input)?;
    let (input, _) = char('·')(input)?;
    let (input, value_type) = parse_value_type(input)?;
    let (input, _) = char('·')(input)?;
    let (input, flag) = bounded(alt((tag("true"), tag("false"))))(input)?;
    Ok((
        input,
        Param::Literal {
            value,
            data_type,
            value_type,
            flag: flag.to_string(),
        },
    ))
}

fn parse_param_float(input: &str) -> IResult<&str, Param> {
    let (input, matched) = bounded(recognize(tuple((
        opt(char('-')),
        digit1,
        char('.'),
        digit1,
        opt(tuple((alt((char('E'), char('e'))), opt(char('-')), digit1))),
    ))))(input)?;
    Ok((
        input,
        Param::Value {
            value: matched.to_string(),
        },
    ))
}

fn parse_param_int(input: &str) -> IResult<&str, Param> {
    let (input, matched) = bounded(recognize(tuple((opt(char('-')), digit1))))(input)?;
    Ok((
        input,
        Param::Value {
            value: matched.to_string(),
        },
    ))
}

fn parse_param_distribution(input: &str) -> IResult<&str, Param> {
    let (input, pdf) = bounded(alt((tag("uniform"), tag("normal"), tag("poisson"))))(input)?;
    Ok((
        input,
        Param::Distribution {
            pdf: pdf.to_string(),
        },
    ))
}

fn parse_param_raw(input: &str) -> IResult<&str, Param> {
    use nom::bytes::complete::take_while1;
    let (input, value) = take_while1(is_raw_param_char)(input)?;
    Ok((
        input,
        Param::Value {
            value: value.to_string(),
        },
    ))
}

/// Parses one `°`-delimited parameter, trying each shape in priority
/// order and falling back to a raw value string.
pub(crate) fn parse_param(input: &str) -> IResult<&str, Param> {
    alt((
        parse_param_literal,
        parse_param_float,
        parse_param_int,
        parse_param_distribution,
        parse_param_raw,
    ))(input)
}

/// Parses a zero-or-more `°`-separated group of parameters.
pub(crate) fn parse_param_group(input: &str) -> IResult<&str, Vec<Param>> {
    many0(preceded(char('°'), parse_param))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_param() {
        let (rest, p) = parse_param("6400·SCALAR·INT64·true").unwrap();
        assert_eq!(rest, "");
        assert_eq!(
            p,
            Param::Literal {
                value: "6400".into(),
                data_type: crate::DataType::Scalar,
                value_type: crate::ValueType::Int64,
                flag: "true".into(),
            }
        );
    }

    #[test]
    fn float_param() {
        let (rest, p) = parse_param("1.0").unwrap();
        assert_eq!(rest, "");
        assert_eq!(
            p,
            Param::Value {
                value: "1.0".into()
            }
        );
    }

    #[test]
    fn negative_int_param() {
        let (rest, p) = parse_param("-1").unwrap();
        assert_eq!(rest, "");
        assert_eq!(
            p,
            Param::Value {
                value: "-1".into()
            }
        );
    }

    #[test]
    fn distribution_param() {
        let (rest, p) = parse_param("uniform").unwrap();
        assert_eq!(rest, "");
        assert_eq!(
            p,
            Param::Distribution {
                pdf: "uniform".into()
            }
        );
    }

    #[test]
    fn raw_value_with_middle_dot() {
        let (rest, p) = parse_param("xxx·MATRIX·FP64").unwrap();
        assert_eq!(rest, "");
        assert_eq!(
            p,
            Param::Value {
                value: "xxx·MATRIX·FP64".into()
            }
        );
    }

    #[test]
    fn distribution_keyword_prefix_is_raw() {
        let (rest, p) = parse_param("uniformXYZ").unwrap();
        assert_eq!(rest, "");
        assert_eq!(
            p,
            Param::Value {
                value: "uniformXYZ".into()
            }
        );
    }

    #[test]
    fn group_of_params() {
        let (rest, params) = parse_param_group("°1000°0°20°1.0°42°1.0°8°xxx·MATRIX·FP64").unwrap();
        assert_eq!(rest, "");
        assert_eq!(params.len(), 8);
    }
}
