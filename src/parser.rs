use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_until},
    character::complete::{alpha1, char, digit1, multispace0, multispace1},
    combinator::{map, map_res, opt, recognize},
    multi::{many0, separated_list1},
    sequence::{delimited, preceded, tuple},
    IResult,
};

use crate::model::{MoviePatch, NewMovie};
use crate::query::MovieFilter;

/// One line typed into the interactive client.
#[derive(Debug, PartialEq, Clone)]
pub enum Command {
    List { filter: MovieFilter, sort_by: Option<String> },
    Get { id: u64 },
    Search { term: String },
    Add { movie: NewMovie },
    Update { id: u64, patch: MoviePatch },
    Delete { id: u64 },
    Stats,
    Health,
    Help,
    Exit,
}

// --- BASIC PARSERS ---

fn parse_float(input: &str) -> IResult<&str, f64> {
    let (input, num_str) = recognize(tuple((
        opt(char('-')),
        digit1,
        opt(tuple((char('.'), digit1))),
    )))(input)?;
    match num_str.parse::<f64>() {
        Ok(n) => Ok((input, n)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Float))),
    }
}

fn parse_id(input: &str) -> IResult<&str, u64> {
    map_res(digit1, |s: &str| s.parse::<u64>())(input)
}

fn parse_year(input: &str) -> IResult<&str, i32> {
    map_res(digit1, |s: &str| s.parse::<i32>())(input)
}

fn parse_quoted_string(input: &str) -> IResult<&str, String> {
    let (input, _) = char('"')(input)?;
    let (input, content) = take_until("\"")(input)?;
    let (input, _) = char('"')(input)?;
    Ok((input, content.to_string()))
}

// --- HELPERS ---
fn ws<'a, F, O, E: nom::error::ParseError<&'a str>>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O, E>
where F: FnMut(&'a str) -> IResult<&'a str, O, E> {
    delimited(multispace0, inner, multispace0)
}

fn tag_ci(t: &'static str) -> impl FnMut(&str) -> IResult<&str, &str> {
    move |input| tag_no_case(t)(input)
}

fn keyword_then_id(keyword: &'static str) -> impl FnMut(&str) -> IResult<&str, u64> {
    move |input| {
        let (input, _) = tag_ci(keyword)(input)?;
        let (input, _) = multispace1(input)?;
        parse_id(input)
    }
}

// --- LIST CLAUSES ---

enum ListClause {
    Genre(String),
    Year(i32),
    MinRating(f64),
    SortBy(String),
}

fn parse_list_clause(input: &str) -> IResult<&str, ListClause> {
    ws(alt((
        map(preceded(ws(tag_ci("GENRE")), parse_quoted_string), ListClause::Genre),
        map(preceded(ws(tag_ci("YEAR")), parse_year), ListClause::Year),
        map(
            preceded(tuple((ws(tag_ci("MIN")), ws(tag_ci("RATING")))), parse_float),
            ListClause::MinRating,
        ),
        map(
            preceded(tuple((ws(tag_ci("SORT")), ws(tag_ci("BY")))), alpha1),
            |key: &str| ListClause::SortBy(key.to_lowercase()),
        ),
    )))(input)
}

// --- UPDATE ASSIGNMENTS ---

fn assignment<'a, O>(
    field: &'static str,
    value: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    preceded(tuple((ws(tag_ci(field)), ws(char('=')))), value)
}

fn parse_assignments(input: &str) -> IResult<&str, MoviePatch> {
    let mut patch = MoviePatch::default();
    let (input, _) = separated_list1(
        ws(char(',')),
        alt((
            map(assignment("TITLE", parse_quoted_string), Field::Title),
            map(assignment("DIRECTOR", parse_quoted_string), Field::Director),
            map(assignment("DESCRIPTION", parse_quoted_string), Field::Description),
            map(assignment("GENRE", parse_quoted_string), Field::Genre),
            map(assignment("YEAR", parse_year), Field::Year),
            map(assignment("RATING", parse_float), Field::Rating),
        )),
    )(input)
    .map(|(rest, fields)| {
        for field in fields {
            field.apply(&mut patch);
        }
        (rest, ())
    })?;
    Ok((input, patch))
}

enum Field {
    Title(String),
    Director(String),
    Description(String),
    Genre(String),
    Year(i32),
    Rating(f64),
}

impl Field {
    fn apply(self, patch: &mut MoviePatch) {
        match self {
            Field::Title(v) => patch.title = Some(v),
            Field::Director(v) => patch.director = Some(v),
            Field::Description(v) => patch.description = Some(v),
            Field::Genre(v) => patch.genre = Some(v),
            Field::Year(v) => patch.year = Some(v),
            Field::Rating(v) => patch.rating = Some(v),
        }
    }
}

// --- COMMAND PARSERS ---

fn parse_list(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("LIST")(input)?;
    let (input, clauses) = many0(parse_list_clause)(input)?;

    let mut filter = MovieFilter::default();
    let mut sort_by = None;
    for clause in clauses {
        match clause {
            ListClause::Genre(g) => filter.genre = Some(g),
            ListClause::Year(y) => filter.year = Some(y),
            ListClause::MinRating(r) => filter.min_rating = Some(r),
            ListClause::SortBy(key) => sort_by = Some(key),
        }
    }
    Ok((input, Command::List { filter, sort_by }))
}

fn parse_get(input: &str) -> IResult<&str, Command> {
    map(keyword_then_id("GET"), |id| Command::Get { id })(input)
}

fn parse_delete(input: &str) -> IResult<&str, Command> {
    map(keyword_then_id("DELETE"), |id| Command::Delete { id })(input)
}

fn parse_search(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("SEARCH")(input)?;
    let (input, term) = preceded(multispace1, parse_quoted_string)(input)?;
    Ok((input, Command::Search { term }))
}

fn parse_add(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("ADD")(input)?;
    let (input, title) = ws(parse_quoted_string)(input)?;
    let (input, director) = preceded(ws(tag_ci("BY")), parse_quoted_string)(input)?;
    let (input, year) = preceded(ws(tag_ci("YEAR")), parse_year)(input)?;
    let (input, genre) = preceded(ws(tag_ci("GENRE")), parse_quoted_string)(input)?;
    let (input, rating) = preceded(ws(tag_ci("RATING")), parse_float)(input)?;
    let (input, description) = opt(preceded(ws(tag_ci("DESC")), parse_quoted_string))(input)?;

    let movie = NewMovie {
        title,
        director,
        year,
        genre,
        rating,
        description: description.unwrap_or_default(),
    };
    Ok((input, Command::Add { movie }))
}

fn parse_update(input: &str) -> IResult<&str, Command> {
    let (input, id) = keyword_then_id("UPDATE")(input)?;
    let (input, _) = ws(tag_ci("SET"))(input)?;
    let (input, patch) = parse_assignments(input)?;
    Ok((input, Command::Update { id, patch }))
}

fn parse_stats(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("STATS")(input)?;
    Ok((input, Command::Stats))
}

fn parse_health(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("HEALTH")(input)?;
    Ok((input, Command::Health))
}

fn parse_help(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("HELP")(input)?;
    Ok((input, Command::Help))
}

fn parse_exit(input: &str) -> IResult<&str, Command> {
    let (input, _) = alt((tag_ci("EXIT"), tag_ci("QUIT")))(input)?;
    Ok((input, Command::Exit))
}

pub fn parse_command(input: &str) -> Result<Command, String> {
    let input = input.trim();
    let result = alt((
        parse_list,
        parse_get,
        parse_search,
        parse_add,
        parse_update,
        parse_delete,
        parse_stats,
        parse_health,
        parse_help,
        parse_exit,
    ))(input);

    match result {
        Ok((remainder, cmd)) => {
            if !remainder.trim().is_empty() {
                return Err(format!("Unexpected tokens at end: '{}'", remainder));
            }
            Ok(cmd)
        },
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let context: String = if e.input.chars().count() > 20 {
                format!("{}...", e.input.chars().take(20).collect::<String>())
            } else {
                e.input.to_string()
            };
            Err(format!("Invalid syntax near: '{}'", context))
        },
        Err(nom::Err::Incomplete(_)) => Err("Incomplete command.".to_string()),
    }
}
