use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, not_line_ending, space0, space1},
    combinator::{map, opt, value},
    error::ParseError,
    number::complete::double,
    sequence::{pair, preceded},
    IResult,
};

use super::Span;

/// Sample value as written by Prometheus clients: plain or scientific
/// notation floats, plus the special `NaN`, `+Inf` and `-Inf` spellings.
pub fn parse_value<'a, E: ParseError<Span<'a>>>(i: Span<'a>) -> IResult<Span<'a>, f64, E> {
    alt((
        value(f64::INFINITY, tag("+Inf")),
        value(f64::NEG_INFINITY, tag("-Inf")),
        value(f64::NAN, tag("NaN")),
        double,
    ))(i)
}

/// Optional timestamp following the value. Prometheus writes integer
/// milliseconds, OpenMetrics writes float seconds; both are kept as given.
pub fn parse_timestamp<'a, E: ParseError<Span<'a>>>(
    i: Span<'a>,
) -> IResult<Span<'a>, Option<f64>, E> {
    opt(preceded(space1, double))(i)
}

/// OpenMetrics exemplars (`# {trace_id="..."} 1.0`) trail the sample and are
/// skipped.
pub fn parse_exemplar<'a, E: ParseError<Span<'a>>>(i: Span<'a>) -> IResult<Span<'a>, (), E> {
    map(
        opt(preceded(pair(space0, char('#')), not_line_ending)),
        |_| (),
    )(i)
}
