use std::collections::BTreeSet;
use std::fmt;

use chrono::{
  NaiveDate,
  Weekday
};
use serde::de::Error as _;
use serde::{
  Deserialize,
  Deserializer,
  Serialize,
  Serializer
};

/// Days of the week an employee works,
/// stored as a Monday-first bitmask.
///
/// On the wire this is the sorted list
/// of weekday indices, `0` = Monday up
/// to `6` = Sunday.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
)]
pub struct WorkPattern(u8);

impl WorkPattern {
  pub const EMPTY: WorkPattern =
    WorkPattern(0);

  #[must_use]
  pub fn weekdays() -> Self {
    [
      Weekday::Mon,
      Weekday::Tue,
      Weekday::Wed,
      Weekday::Thu,
      Weekday::Fri
    ]
    .into_iter()
    .collect()
  }

  pub fn insert(
    &mut self,
    day: Weekday
  ) {
    self.0 |= 1
      << day.num_days_from_monday();
  }

  #[must_use]
  pub fn contains(
    &self,
    day: Weekday
  ) -> bool {
    self.0
      & (1
        << day.num_days_from_monday())
      != 0
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.0 == 0
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.0.count_ones() as usize
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = Weekday> + '_
  {
    (0_u8..7)
      .filter(|idx| {
        self.0 & (1 << idx) != 0
      })
      .filter_map(weekday_from_index)
  }

  pub fn from_indices<I>(
    indices: I
  ) -> Result<Self, u8>
  where
    I: IntoIterator<Item = u8>
  {
    let mut pattern = Self::EMPTY;
    for idx in indices {
      let day = weekday_from_index(idx)
        .ok_or(idx)?;
      pattern.insert(day);
    }
    Ok(pattern)
  }
}

impl FromIterator<Weekday>
  for WorkPattern
{
  fn from_iter<T>(iter: T) -> Self
  where
    T: IntoIterator<Item = Weekday>
  {
    let mut pattern = Self::EMPTY;
    for day in iter {
      pattern.insert(day);
    }
    pattern
  }
}

impl fmt::Display for WorkPattern {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    let labels = self
      .iter()
      .map(|day| day.to_string())
      .collect::<Vec<_>>();
    write!(f, "{}", labels.join(","))
  }
}

impl Serialize for WorkPattern {
  fn serialize<S>(
    &self,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    let indices = self
      .iter()
      .map(|day| {
        day.num_days_from_monday() as u8
      })
      .collect::<Vec<_>>();
    indices.serialize(serializer)
  }
}

impl<'de> Deserialize<'de>
  for WorkPattern
{
  fn deserialize<D>(
    deserializer: D
  ) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw =
      Vec::<u8>::deserialize(deserializer)?;
    WorkPattern::from_indices(raw)
      .map_err(|idx| {
        D::Error::custom(format!(
          "weekday index out of range \
           0..=6: {idx}"
        ))
      })
  }
}

#[must_use]
pub fn weekday_from_index(
  idx: u8
) -> Option<Weekday> {
  match idx {
    | 0 => Some(Weekday::Mon),
    | 1 => Some(Weekday::Tue),
    | 2 => Some(Weekday::Wed),
    | 3 => Some(Weekday::Thu),
    | 4 => Some(Weekday::Fri),
    | 5 => Some(Weekday::Sat),
    | 6 => Some(Weekday::Sun),
    | _ => None
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct ProjectConfig {
  pub name:            String,
  pub start_date:      NaiveDate,
  #[serde(default)]
  pub global_holidays: BTreeSet<NaiveDate>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
)]
pub struct Employee {
  pub name:         String,
  #[serde(default = "WorkPattern::weekdays")]
  pub work_pattern: WorkPattern,
  #[serde(default)]
  pub holidays:     BTreeSet<NaiveDate>
}

fn default_availability() -> u8 {
  100
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
)]
pub struct Task {
  pub name:               String,
  pub assigned_to:        String,
  pub estimated_duration: u32,
  #[serde(default = "default_availability")]
  pub availability:       u8,
  #[serde(default)]
  pub contingency_margin: u32,
  #[serde(default)]
  pub dependency:         Option<String>,
  #[serde(default)]
  pub custom_start_date:  Option<NaiveDate>
}

/// A task as computed by the scheduling
/// service. Read-only on the client.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct ScheduledTask {
  pub name:               String,
  pub assigned_to:        String,
  pub estimated_duration: u32,
  #[serde(default)]
  pub actual_duration:    u32,
  #[serde(default)]
  pub availability:       Option<u8>,
  #[serde(default)]
  pub contingency_margin: Option<u32>,
  #[serde(default)]
  pub dependency:         Option<String>,
  #[serde(default)]
  pub start_date:         Option<NaiveDate>,
  #[serde(default)]
  pub end_date:           Option<NaiveDate>,
  #[serde(default)]
  pub working_dates:      BTreeSet<NaiveDate>,
  #[serde(default)]
  pub holiday_dates:      BTreeSet<NaiveDate>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct Schedule {
  #[serde(default)]
  pub project_name: Option<String>,
  pub start_date:   NaiveDate,
  #[serde(default)]
  pub end_date:     Option<NaiveDate>,
  #[serde(default)]
  pub tasks:        Vec<ScheduledTask>
}

impl Schedule {
  /// Last calendar day of the chart. A
  /// schedule without an end date spans
  /// its start day only.
  #[must_use]
  pub fn last_day(&self) -> NaiveDate {
    self
      .end_date
      .unwrap_or(self.start_date)
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct ImportedProject {
  pub project_info: ProjectConfig,
  #[serde(default)]
  pub employees:    Vec<Employee>,
  #[serde(default)]
  pub tasks:        Vec<Task>
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeesPayload<'a> {
  pub employees: &'a [Employee]
}

#[derive(Debug, Clone, Serialize)]
pub struct TasksPayload<'a> {
  pub tasks: &'a [Task]
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct ExportRequest {
  pub filename: String
}

/// Body of every JSON answer from the
/// scheduling service.
#[derive(
  Debug,
  Clone,
  Default,
  Serialize,
  Deserialize,
)]
pub struct ApiReply {
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub error:   Option<String>
}
