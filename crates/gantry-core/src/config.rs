use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::gateway::http::{
  DEFAULT_BASE_URL,
  DEFAULT_TIMEOUT_SECS
};

pub const RC_ENV: &str = "GANTRYRC";
pub const RC_FILE: &str = ".gantryrc";

#[derive(Debug, Clone)]
pub struct Config {
  map:              HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  /// Built-in values only, no rc file.
  pub fn defaults() -> Self {
    let mut map = HashMap::new();
    for (key, value) in [
      ("data.location", "~/.gantry".to_string()),
      ("gateway.url", DEFAULT_BASE_URL.to_string()),
      (
        "gateway.timeout",
        DEFAULT_TIMEOUT_SECS.to_string()
      ),
      ("export.location", ".".to_string()),
      ("color", "on".to_string())
    ] {
      map.insert(key.to_string(), value);
    }
    Config {
      map,
      loaded_files: vec![]
    }
  }

  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::defaults();

    let rc =
      resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(gantryrc = %path.display(), "loading gantryrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no gantryrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let line = match raw_line
        .split_once('#')
      {
        | Some((before, _)) => {
          before.trim()
        }
        | None => raw_line.trim()
      };
      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

/// `--data` wins over `data.location`.
/// The directory is created when
/// missing.
#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  ensure_dir(&dir)?;
  Ok(dir)
}

#[tracing::instrument(skip(cfg))]
pub fn resolve_export_dir(
  cfg: &Config
) -> anyhow::Result<PathBuf> {
  let dir = cfg
    .get("export.location")
    .map(|raw| {
      expand_tilde(Path::new(&raw))
    })
    .unwrap_or_else(|| {
      PathBuf::from(".")
    });
  ensure_dir(&dir)?;
  Ok(dir)
}

fn ensure_dir(
  dir: &Path
) -> anyhow::Result<()> {
  if !dir.exists() {
    info!(dir = %dir.display(), "creating directory");
    fs::create_dir_all(dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }
  Ok(())
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping gantryrc"
    );
    return Ok(None);
  };
  let candidate = home.join(RC_FILE);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".gantry"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let expanded =
    expand_tilde(Path::new(include));
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;

  use super::{
    Config,
    resolve_data_dir,
    resolve_export_dir
  };

  #[test]
  fn defaults_cover_every_key() {
    let cfg = Config::defaults();
    assert_eq!(
      cfg.get("gateway.url").as_deref(),
      Some("http://127.0.0.1:5000")
    );
    assert_eq!(
      cfg.get("gateway.timeout").as_deref(),
      Some("30")
    );
    assert_eq!(
      cfg.get("export.location").as_deref(),
      Some(".")
    );
    assert_eq!(
      cfg.get_bool("color"),
      Some(true)
    );
  }

  #[test]
  fn rc_file_with_include_and_comments()
  {
    let temp = tempfile::tempdir()
      .expect("tempdir");
    let extra = temp.path().join("extra.rc");
    fs::write(
      &extra,
      "gateway.timeout=5\n"
    )
    .expect("write include");
    let rc = temp.path().join("gantryrc");
    fs::write(
      &rc,
      "# service\ngateway.url = \
       http://sched.local:8080 # lab\n\
       include extra.rc\ncolor=off\n"
    )
    .expect("write rc");

    let mut cfg = Config::load(Some(rc.as_path()))
      .expect("load rc");
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.get("gateway.url").as_deref(),
      Some("http://sched.local:8080")
    );
    assert_eq!(
      cfg.get("gateway.timeout").as_deref(),
      Some("5")
    );
    assert_eq!(
      cfg.get_bool("color"),
      Some(false)
    );

    cfg.apply_overrides([(
      "rc.color".to_string(),
      "yes".to_string()
    )]);
    assert_eq!(
      cfg.get_bool("color"),
      Some(true)
    );
  }

  #[test]
  fn malformed_line_is_rejected() {
    let temp = tempfile::tempdir()
      .expect("tempdir");
    let rc = temp.path().join("gantryrc");
    fs::write(&rc, "just words\n")
      .expect("write rc");
    assert!(Config::load(Some(rc.as_path())).is_err());
  }

  #[test]
  fn directories_are_created() {
    let temp = tempfile::tempdir()
      .expect("tempdir");
    let mut cfg = Config::defaults();
    let exports = temp.path().join("out");
    cfg.apply_overrides([(
      "export.location".to_string(),
      exports.display().to_string()
    )]);

    let data = temp.path().join("data");
    let resolved =
      resolve_data_dir(&cfg, Some(data.as_path()))
        .expect("data dir");
    assert_eq!(resolved, data);
    assert!(data.is_dir());
    assert_eq!(
      resolve_export_dir(&cfg)
        .expect("export dir"),
      exports
    );
    assert!(exports.is_dir());
  }
}
