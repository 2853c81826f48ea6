use std::collections::BTreeSet;
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Local,
  NaiveDate,
  Weekday
};
use gantry_shared::{
  WorkPattern,
  weekday_from_index
};
use regex::Regex;

const DATE_TOKEN: &str =
  r"\d{4}-\d{1,2}-\d{1,2}|\d{1,2}/\d{1,2}/\d{4}";

fn range_regex()
-> anyhow::Result<&'static Regex> {
  static RANGE_RE: OnceLock<
    Result<Regex, regex::Error>
  > = OnceLock::new();
  RANGE_RE
    .get_or_init(|| {
      Regex::new(&format!(
        r"^(?P<from>{DATE_TOKEN})\s*-\s*(?P<to>{DATE_TOKEN})$"
      ))
    })
    .as_ref()
    .map_err(|e| {
      anyhow!(
        "internal regex compile \
         failure: {e}"
      )
    })
}

#[must_use]
pub fn today() -> NaiveDate {
  Local::now().date_naive()
}

/// Parses one calendar date.
///
/// Accepts `YYYY-MM-DD`, `DD/MM/YYYY`
/// and the keyword `today`.
#[tracing::instrument(level = "trace")]
pub fn parse_date(
  input: &str
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  if token.eq_ignore_ascii_case("today")
  {
    return Ok(today());
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Ok(date);
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%d/%m/%Y"
    )
  {
    return Ok(date);
  }

  Err(anyhow!(
    "invalid date: {token:?} \
     (expected YYYY-MM-DD or \
     DD/MM/YYYY)"
  ))
}

/// Parses a comma-separated list of
/// dates and inclusive ranges, e.g.
/// `2024-12-25, 28/12/2024 -
/// 30/12/2024`. Blank input yields an
/// empty set.
#[tracing::instrument(level = "trace")]
pub fn parse_date_list(
  input: &str
) -> anyhow::Result<BTreeSet<NaiveDate>>
{
  let mut out = BTreeSet::new();

  for piece in input.split(',') {
    let piece = piece.trim();
    if piece.is_empty() {
      continue;
    }

    if let Some(caps) =
      range_regex()?.captures(piece)
    {
      let from = caps
        .name("from")
        .map(|m| m.as_str())
        .ok_or_else(|| {
          anyhow!("missing range start")
        })?;
      let to = caps
        .name("to")
        .map(|m| m.as_str())
        .ok_or_else(|| {
          anyhow!("missing range end")
        })?;
      let from = parse_date(from)
        .with_context(|| {
          format!(
            "invalid range start in \
             {piece:?}"
          )
        })?;
      let to = parse_date(to)
        .with_context(|| {
          format!(
            "invalid range end in \
             {piece:?}"
          )
        })?;
      if to < from {
        return Err(anyhow!(
          "date range ends before it \
           starts: {piece:?}"
        ));
      }
      out.extend(days_inclusive(
        from, to
      ));
      continue;
    }

    out.insert(parse_date(piece)?);
  }

  tracing::debug!(
    count = out.len(),
    "parsed date list"
  );
  Ok(out)
}

/// Every calendar day from `start` to
/// `end`, both included. Empty when
/// `end < start`.
pub fn days_inclusive(
  start: NaiveDate,
  end: NaiveDate
) -> impl Iterator<Item = NaiveDate> {
  start
    .iter_days()
    .take_while(move |day| *day <= end)
}

#[must_use]
pub fn format_date_list(
  dates: &BTreeSet<NaiveDate>
) -> String {
  dates
    .iter()
    .map(|date| {
      date.format("%Y-%m-%d").to_string()
    })
    .collect::<Vec<_>>()
    .join(", ")
}

pub fn parse_weekday(
  token: &str
) -> Option<Weekday> {
  let lower =
    token.trim().to_ascii_lowercase();
  if let Ok(idx) = lower.parse::<u8>() {
    return weekday_from_index(idx);
  }
  match lower.as_str() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

/// Parses `mon,tue,fri`, `0,1,4` or the
/// shorthands `weekdays` / `all`.
pub fn parse_work_pattern(
  input: &str
) -> anyhow::Result<WorkPattern> {
  match input
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "weekdays" => {
      return Ok(WorkPattern::weekdays());
    }
    | "all" => {
      return Ok(
        (0_u8..7)
          .filter_map(weekday_from_index)
          .collect()
      );
    }
    | _ => {}
  }

  let mut pattern = WorkPattern::EMPTY;
  for token in input.split(',') {
    if token.trim().is_empty() {
      continue;
    }
    let day = parse_weekday(token)
      .ok_or_else(|| {
        anyhow!(
          "unknown weekday: {:?}",
          token.trim()
        )
      })?;
    pattern.insert(day);
  }
  Ok(pattern)
}
