use anyhow::anyhow;
use chrono::{
  DateTime,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;

pub const TIMEZONE_ENV_VAR: &str =
  "TASKDECK_TIMEZONE";

/// Resolves the timezone used for
/// display and for date-only input.
///
/// The environment wins over the
/// configured value; anything that
/// fails to parse falls back to UTC.
pub fn resolve_display_timezone(
  configured: Option<&str>
) -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw)
  {
    return tz;
  }

  configured
    .and_then(parse_timezone)
    .unwrap_or(chrono_tz::UTC)
}

fn parse_timezone(
  raw: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }
  match trimmed.parse::<Tz>() {
    | Ok(tz) => Some(tz),
    | Err(err) => {
      tracing::warn!(
        timezone = %trimmed,
        error = %err,
        "invalid timezone; ignoring"
      );
      None
    }
  }
}

#[must_use]
pub fn format_display_date(
  dt: DateTime<Utc>,
  tz: Tz
) -> String {
  dt.with_timezone(&tz)
    .format("%Y-%m-%d")
    .to_string()
}

/// Parses a due date typed by a user.
///
/// Accepts RFC 3339 timestamps,
/// `YYYY-MM-DD`, `today`, `tomorrow`
/// and relative offsets such as `+3d`,
/// `+12h` or `+2w`. Date-only forms
/// land on local midnight in `tz`.
#[tracing::instrument(skip(now, tz))]
pub fn parse_due_input(
  input: &str,
  now: DateTime<Utc>,
  tz: Tz
) -> anyhow::Result<DateTime<Utc>> {
  let raw = input.trim();
  if raw.is_empty() {
    return Err(anyhow!(
      "due date cannot be empty"
    ));
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(raw)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      raw, "%Y-%m-%d"
    )
  {
    return local_midnight(date, tz);
  }

  let today =
    now.with_timezone(&tz).date_naive();
  match raw.to_ascii_lowercase().as_str()
  {
    | "today" => {
      return local_midnight(today, tz);
    }
    | "tomorrow" => {
      let tomorrow = today
        .succ_opt()
        .ok_or_else(|| {
          anyhow!(
            "date out of range: {raw}"
          )
        })?;
      return local_midnight(
        tomorrow, tz
      );
    }
    | _ => {}
  }

  let rel_re = Regex::new(
    r"^\+(?P<num>\d+)(?P<unit>[hdw])$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;
  if let Some(caps) =
    rel_re.captures(raw)
  {
    let num: i64 = caps["num"]
      .parse()
      .map_err(|e| {
        anyhow!(
          "invalid offset {raw}: {e}"
        )
      })?;
    let delta = match &caps["unit"] {
      | "h" => Duration::hours(num),
      | "d" => Duration::days(num),
      | _ => Duration::weeks(num)
    };
    return now
      .checked_add_signed(delta)
      .ok_or_else(|| {
        anyhow!(
          "date out of range: {raw}"
        )
      });
  }

  Err(anyhow!(
    "unrecognized due date: {raw}"
  ))
}

fn local_midnight(
  date: NaiveDate,
  tz: Tz
) -> anyhow::Result<DateTime<Utc>> {
  let naive =
    date.and_time(NaiveTime::MIN);
  match tz.from_local_datetime(&naive) {
    | LocalResult::Single(dt) => {
      Ok(dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      earliest,
      _
    ) => Ok(earliest.with_timezone(&Utc)),
    | LocalResult::None => {
      // Midnight skipped by a DST jump;
      // the day still starts an hour on.
      let shifted =
        naive + Duration::hours(1);
      tz.from_local_datetime(&shifted)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
          anyhow!(
            "no valid local time for \
             {date} in {}",
            tz.name()
          )
        })
    }
  }
}

fn parse_iso(
  raw: &str
) -> Result<DateTime<Utc>, String> {
  if let Ok(dt) =
    DateTime::parse_from_rfc3339(raw)
  {
    return Ok(dt.with_timezone(&Utc));
  }
  NaiveDate::parse_from_str(
    raw, "%Y-%m-%d"
  )
  .map(|date| {
    Utc.from_utc_datetime(
      &date.and_time(NaiveTime::MIN)
    )
  })
  .map_err(|_| {
    format!(
      "invalid ISO-8601 timestamp: \
       {raw}"
    )
  })
}


pub mod iso_date_serde {
  use chrono::{
    DateTime,
    SecondsFormat,
    Utc
  };
  use serde::Serializer;

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &dt.to_rfc3339_opts(
        SecondsFormat::Millis,
        true
      )
    )
  }

  pub mod option {
    use chrono::{
      DateTime,
      Utc
    };
    use serde::{
      Deserialize,
      Deserializer,
      Serializer
    };

    pub fn serialize<S>(
      dt: &Option<DateTime<Utc>>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match dt {
        | Some(value) => {
          super::serialize(
            value, serializer
          )
        }
        | None => {
          serializer.serialize_none()
        }
      }
    }

    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<
      Option<DateTime<Utc>>,
      D::Error
    >
    where
      D: Deserializer<'de>
    {
      let opt =
        Option::<String>::deserialize(
          deserializer
        )?;
      match opt {
        | Some(raw)
          if raw.trim().is_empty() =>
        {
          Ok(None)
        }
        | Some(raw) => {
          super::super::parse_iso(
            raw.trim()
          )
          .map(Some)
          .map_err(
            serde::de::Error::custom
          )
        }
        | None => Ok(None)
      }
    }
  }
}
