use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow,
  bail
};
use chrono_tz::Tz;
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::datetime::resolve_display_timezone;
use crate::sort::SortMode;

const RC_ENV_VAR: &str = "TASKDECKRC";
const RC_FILE: &str = ".taskdeckrc";
const DEFAULT_DATA_DIR: &str =
  "~/.taskdeck";
const MAX_INCLUDE_DEPTH: usize = 8;

/// Settings read from the rc file and
/// `--rc key=value` overrides.
///
/// Recognized keys: `data.location`,
/// `default.sort`, `show.completed`,
/// `color` and `timezone`. Anything else
/// is logged and ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  data_location:    PathBuf,
  default_sort:     SortMode,
  show_completed:   bool,
  color:            bool,
  timezone:         Option<String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      data_location:  PathBuf::from(
        DEFAULT_DATA_DIR
      ),
      default_sort:   SortMode::Created,
      show_completed: true,
      color:          true,
      timezone:       None,
      loaded_files:   Vec::new()
    }
  }
}

impl Config {
  /// Defaults, then the rc file picked
  /// by `locate_rc_file`.
  #[tracing::instrument]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();
    match locate_rc_file(rc_override) {
      | Some(path) => {
        info!(rc = %path.display(), "loading rc file");
        let mut chain = Vec::new();
        cfg.read_rc(&path, &mut chain)?;
      }
      | None => {
        debug!("no rc file; using defaults");
      }
    }
    Ok(cfg)
  }

  /// Sets one key from its textual
  /// form.
  pub fn set(
    &mut self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    match key {
      | "data.location" => {
        if value.is_empty() {
          bail!(
            "data.location cannot be \
             empty"
          );
        }
        self.data_location =
          PathBuf::from(value);
      }
      | "default.sort" => {
        self.default_sort =
          SortMode::parse_lenient(value);
      }
      | "show.completed" => {
        self.show_completed =
          parse_bool(value)
            .context("show.completed")?;
      }
      | "color" => {
        self.color = parse_bool(value)
          .context("color")?;
      }
      | "timezone" => {
        self.timezone = Some(value)
          .filter(|v| !v.is_empty())
          .map(str::to_string);
      }
      | other => {
        warn!(key = %other, "unknown config key; ignoring");
      }
    }
    Ok(())
  }

  /// Applies `--rc` pairs; a leading
  /// `rc.` on the key is optional.
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      let key = key
        .strip_prefix("rc.")
        .unwrap_or(&key);
      debug!(key = %key, value = %value, "applying override");
      self
        .set(key, value.trim())
        .with_context(|| {
          format!(
            "invalid override {key}"
          )
        })?;
    }
    Ok(())
  }

  pub fn default_sort(&self) -> SortMode {
    self.default_sort
  }

  pub fn show_completed(&self) -> bool {
    self.show_completed
  }

  pub fn color(&self) -> bool {
    self.color
  }

  pub fn timezone(&self) -> Tz {
    resolve_display_timezone(
      self.timezone.as_deref()
    )
  }

  /// Where task data lives: the
  /// `--data` flag, else
  /// `data.location`.
  pub fn data_dir(
    &self,
    override_dir: Option<&Path>
  ) -> anyhow::Result<PathBuf> {
    let dir = match override_dir {
      | Some(dir) => dir.to_path_buf(),
      | None => {
        expand_home(&self.data_location)
      }
    };
    if dir.starts_with("~") {
      return Err(anyhow!(
        "cannot expand {}: home \
         directory unknown",
        dir.display()
      ));
    }
    Ok(dir)
  }

  /// `chain` holds the files currently
  /// being read, outermost first.
  fn read_rc(
    &mut self,
    path: &Path,
    chain: &mut Vec<PathBuf>
  ) -> anyhow::Result<()> {
    let path = fs::canonicalize(
      expand_home(path)
    )
    .with_context(|| {
      format!(
        "failed to read {}",
        path.display()
      )
    })?;

    if chain.contains(&path) {
      bail!(
        "include cycle: {} is already \
         being loaded",
        path.display()
      );
    }
    if chain.len() >= MAX_INCLUDE_DEPTH
    {
      bail!(
        "includes nested more than \
         {MAX_INCLUDE_DEPTH} deep at {}",
        path.display()
      );
    }

    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    chain.push(path.clone());
    self.loaded_files.push(path.clone());
    let dir = path
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_default();

    for (idx, raw) in
      text.lines().enumerate()
    {
      let line_no = idx + 1;
      let line = strip_comment(raw);
      if line.is_empty() {
        continue;
      }

      if let Some(target) =
        line.strip_prefix("include ")
      {
        let target = target.trim();
        if target.is_empty() {
          bail!(
            "{}:{line_no}: include \
             needs a path",
            path.display()
          );
        }
        // Absolute targets replace `dir`
        // on join.
        let included = dir.join(
          expand_home(Path::new(target))
        );
        if !included.exists() {
          warn!(include = %included.display(), "include file does not exist; skipping");
          continue;
        }
        self.read_rc(&included, chain)?;
        continue;
      }

      let (key, value) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "{}:{line_no}: expected \
             `key = value`, got {raw:?}",
            path.display()
          )
        })?;
      let (key, value) =
        (key.trim(), value.trim());
      trace!(key = %key, value = %value, "rc entry");
      self.set(key, value).with_context(
        || {
          format!(
            "{}:{line_no}",
            path.display()
          )
        }
      )?;
    }

    chain.pop();
    Ok(())
  }
}

/// `--config`, then `$TASKDECKRC`
/// (empty or `/dev/null` disables it),
/// then `~/.taskdeckrc` if present.
fn locate_rc_file(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(path.to_path_buf());
  }

  if let Ok(raw) =
    std::env::var(RC_ENV_VAR)
  {
    let raw = raw.trim();
    if raw.is_empty()
      || raw == "/dev/null"
    {
      return None;
    }
    return Some(PathBuf::from(raw));
  }

  dirs::home_dir()
    .map(|home| home.join(RC_FILE))
    .filter(|candidate| {
      candidate.is_file()
    })
}

fn strip_comment(raw: &str) -> &str {
  raw
    .split_once('#')
    .map_or(raw, |(before, _)| before)
    .trim()
}

fn expand_home(path: &Path) -> PathBuf {
  match (
    path.strip_prefix("~"),
    dirs::home_dir()
  ) {
    | (Ok(rest), Some(home)) => {
      if rest.as_os_str().is_empty() {
        home
      } else {
        home.join(rest)
      }
    }
    | _ => path.to_path_buf()
  }
}

fn parse_bool(
  raw: &str
) -> anyhow::Result<bool> {
  match raw
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "on" | "yes" | "y" | "true"
    | "1" => Ok(true),
    | "off" | "no" | "n" | "false"
    | "0" => Ok(false),
    | other => Err(anyhow!(
      "expected on/off, yes/no or \
       true/false, got {other:?}"
    ))
  }
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::path::Path;

  use tempfile::tempdir;

  use super::{
    Config,
    parse_bool
  };
  use crate::sort::SortMode;

  #[test]
  fn rc_file_with_include_and_overrides()
  {
    let temp = tempdir().unwrap();
    fs::write(
      temp.path().join("extra.rc"),
      "show.completed = off\n"
    )
    .unwrap();
    let main = temp.path().join("main.rc");
    fs::write(
      &main,
      "# comment\n\
       default.sort = priority  # trailing\n\
       include extra.rc\n\
       some.future.key = 1\n"
    )
    .unwrap();

    let mut cfg =
      Config::load(Some(main.as_path())).unwrap();
    assert_eq!(
      cfg.default_sort(),
      SortMode::Priority
    );
    assert!(!cfg.show_completed());
    assert_eq!(cfg.loaded_files.len(), 2);

    cfg
      .apply_overrides([(
        "rc.show.completed".to_string(),
        "yes".to_string()
      )])
      .unwrap();
    assert!(cfg.show_completed());
  }

  #[test]
  fn self_include_is_an_error() {
    let temp = tempdir().unwrap();
    let main = temp.path().join("main.rc");
    fs::write(
      &main,
      "color = off\ninclude main.rc\n"
    )
    .unwrap();

    let err =
      Config::load(Some(main.as_path()))
        .unwrap_err();
    assert!(
      format!("{err:#}")
        .contains("include cycle")
    );
  }

  #[test]
  fn mutual_includes_are_an_error() {
    let temp = tempdir().unwrap();
    fs::write(
      temp.path().join("a.rc"),
      "include b.rc\n"
    )
    .unwrap();
    fs::write(
      temp.path().join("b.rc"),
      "include a.rc\n"
    )
    .unwrap();

    let a = temp.path().join("a.rc");
    assert!(
      Config::load(Some(a.as_path())).is_err()
    );
  }

  #[test]
  fn repeated_sibling_include_is_fine() {
    let temp = tempdir().unwrap();
    fs::write(
      temp.path().join("shared.rc"),
      "color = off\n"
    )
    .unwrap();
    let main = temp.path().join("main.rc");
    fs::write(
      &main,
      "include shared.rc\n\
       include shared.rc\n"
    )
    .unwrap();

    let cfg =
      Config::load(Some(main.as_path())).unwrap();
    assert!(!cfg.color());
    assert_eq!(cfg.loaded_files.len(), 3);
  }

  #[test]
  fn malformed_line_is_an_error() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("bad.rc");
    fs::write(&path, "no equals here\n")
      .unwrap();
    assert!(
      Config::load(Some(path.as_path())).is_err()
    );
  }

  #[test]
  fn unrecognized_boolean_is_rejected() {
    assert!(parse_bool("maybe").is_err());
    assert!(!parse_bool(" Off ").unwrap());
    assert!(parse_bool("1").unwrap());

    let temp = tempdir().unwrap();
    let path = temp.path().join("bad.rc");
    fs::write(&path, "color = maybe\n")
      .unwrap();
    assert!(
      Config::load(Some(path.as_path())).is_err()
    );

    let mut cfg = Config::default();
    assert!(
      cfg
        .apply_overrides([(
          "show.completed".to_string(),
          "sometimes".to_string()
        )])
        .is_err()
    );
    assert!(cfg.show_completed());
  }

  #[test]
  fn data_dir_prefers_flag_over_config() {
    let mut cfg = Config::default();
    cfg
      .set("data.location", "/srv/tasks")
      .unwrap();
    assert_eq!(
      cfg.data_dir(None).unwrap(),
      Path::new("/srv/tasks")
    );
    assert_eq!(
      cfg
        .data_dir(Some(Path::new(
          "/tmp/elsewhere"
        )))
        .unwrap(),
      Path::new("/tmp/elsewhere")
    );
    assert!(
      cfg.set("data.location", "").is_err()
    );
  }

  #[test]
  fn defaults_cover_every_key() {
    let cfg = Config::default();
    assert_eq!(
      cfg.default_sort(),
      SortMode::Created
    );
    assert!(cfg.show_completed());
    assert!(cfg.color());
    assert_eq!(cfg.timezone, None);
  }
}
