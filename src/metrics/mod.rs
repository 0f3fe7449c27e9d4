mod sample_value;

use std::collections::HashMap;

use nom::{
    branch::alt,
    bytes::complete::{is_not, take_while},
    character::complete::{char, line_ending, none_of, not_line_ending, satisfy, space0},
    combinator::{map, opt, recognize, value},
    error::ParseError,
    multi::{fold_many0, separated_list0},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};
use nom_locate::LocatedSpan;
use nom_supreme::{
    error::{ErrorTree, GenericErrorTree},
    final_parser::final_parser,
};
use serde::Serialize;
use sample_value::{parse_exemplar, parse_timestamp, parse_value};

pub type Span<'a> = LocatedSpan<&'a str>;

/// One line of the text exposition format.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricSample {
    pub name: String,
    pub labels: HashMap<String, String>,
    pub value: f64,
    pub timestamp: Option<f64>,
}

impl MetricSample {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }
}

#[derive(thiserror::Error, Debug, miette::Diagnostic)]
#[error("failed to parse metrics exposition at line {line}")]
#[diagnostic(code(metrics::parse))]
pub struct MetricsParseError {
    #[source_code]
    src: String,

    #[label("{kind}")]
    bad_bit: miette::SourceSpan,

    kind: String,
    line: u32,
}

impl MetricsParseError {
    fn new(src_input: &str, e: &ErrorTree<Span>) -> Self {
        let (offset, line, kind) = match deepest_failure(e) {
            Some((location, kind)) => (location.location_offset(), location.location_line(), kind),
            None => (0, 1, "unrecognised input".to_string()),
        };
        MetricsParseError {
            src: src_input.to_string(),
            bad_bit: miette::SourceSpan::new(offset.into(), 0.into()),
            kind,
            line,
        }
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

/// The failure furthest into the input is the one worth pointing at.
fn deepest_failure<'a>(e: &ErrorTree<Span<'a>>) -> Option<(Span<'a>, String)> {
    match e {
        GenericErrorTree::Base { location, kind } => Some((*location, kind.to_string())),
        GenericErrorTree::Stack { base, .. } => deepest_failure(base),
        GenericErrorTree::Alt(alternatives) => alternatives
            .iter()
            .filter_map(deepest_failure)
            .max_by_key(|(location, _)| location.location_offset()),
    }
}

/// Parses a whole scrape body. Any line that is not blank, a comment or a
/// sample fails the body.
pub fn parse_metric_samples(body: &str) -> Result<Vec<MetricSample>, MetricsParseError> {
    finish(body, parse_exposition::<ErrorTree<Span>>)
}

pub fn is_valid_metric_name(name: &str) -> bool {
    finish(name, parse_metric_name::<ErrorTree<Span>>).is_ok()
}

fn finish<'a, O>(
    src: &'a str,
    parser: impl FnMut(Span<'a>) -> IResult<Span<'a>, O, ErrorTree<Span<'a>>>,
) -> Result<O, MetricsParseError> {
    final_parser(parser)(Span::new(src))
        .map_err(|e: ErrorTree<Span<'a>>| MetricsParseError::new(src, &e))
}

fn parse_exposition<'a, E: ParseError<Span<'a>>>(
    i: Span<'a>,
) -> IResult<Span<'a>, Vec<MetricSample>, E> {
    map(separated_list0(line_ending, parse_line::<E>), |lines| {
        lines.into_iter().flatten().collect()
    })(i)
}

fn parse_line<'a, E: ParseError<Span<'a>>>(
    i: Span<'a>,
) -> IResult<Span<'a>, Option<MetricSample>, E> {
    alt((
        value(None, parse_comment::<E>),
        map(parse_sample::<E>, Some),
        value(None, space0),
    ))(i)
}

fn parse_comment<'a, E: ParseError<Span<'a>>>(i: Span<'a>) -> IResult<Span<'a>, Span<'a>, E> {
    recognize(pair(preceded(space0, char('#')), not_line_ending))(i)
}

fn parse_sample<'a, E: ParseError<Span<'a>>>(i: Span<'a>) -> IResult<Span<'a>, MetricSample, E> {
    map(
        tuple((
            preceded(space0, parse_metric_name::<E>),
            opt(preceded(space0, parse_labelset::<E>)),
            preceded(space0, parse_value::<E>),
            parse_timestamp::<E>,
            parse_exemplar::<E>,
            space0,
        )),
        |(name, labels, value, timestamp, _, _)| MetricSample {
            name: name.fragment().to_string(),
            labels: labels.unwrap_or_default(),
            value,
            timestamp,
        },
    )(i)
}

fn parse_metric_name<'a, E: ParseError<Span<'a>>>(i: Span<'a>) -> IResult<Span<'a>, Span<'a>, E> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_' || c == ':'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == ':'),
    ))(i)
}

fn parse_label_name<'a, E: ParseError<Span<'a>>>(i: Span<'a>) -> IResult<Span<'a>, Span<'a>, E> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(i)
}

fn parse_label_value<'a, E: ParseError<Span<'a>>>(i: Span<'a>) -> IResult<Span<'a>, String, E> {
    delimited(
        char('"'),
        fold_many0(
            alt((
                map(is_not("\\\"\n"), |chunk: Span<'a>| *chunk.fragment()),
                preceded(
                    char('\\'),
                    alt((
                        value("\\", char('\\')),
                        value("\"", char('"')),
                        value("\n", char('n')),
                    )),
                ),
                // unknown escapes are kept as written
                map(recognize(pair(char('\\'), none_of("\n"))), |escape: Span<'a>| {
                    *escape.fragment()
                }),
            )),
            String::new,
            |mut acc: String, chunk: &str| {
                acc.push_str(chunk);
                acc
            },
        ),
        char('"'),
    )(i)
}

fn parse_label<'a, E: ParseError<Span<'a>>>(i: Span<'a>) -> IResult<Span<'a>, (String, String), E> {
    map(
        separated_pair(
            parse_label_name::<E>,
            delimited(space0, char('='), space0),
            parse_label_value::<E>,
        ),
        |(name, value)| (name.fragment().to_string(), value),
    )(i)
}

fn parse_labelset<'a, E: ParseError<Span<'a>>>(
    i: Span<'a>,
) -> IResult<Span<'a>, HashMap<String, String>, E> {
    map(
        delimited(
            pair(char('{'), space0),
            terminated(
                separated_list0(delimited(space0, char(','), space0), parse_label::<E>),
                opt(pair(space0, char(','))),
            ),
            pair(space0, char('}')),
        ),
        |labels| labels.into_iter().collect(),
    )(i)
}
