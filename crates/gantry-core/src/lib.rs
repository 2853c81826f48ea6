pub mod chart;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod draft;
pub mod error;
pub mod frontend;
pub mod gateway;
pub mod render;
pub mod session;
pub mod store;
pub mod tracker;
pub mod wizard;

use std::ffi::OsString;
use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<ExitCode> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting gantry CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.gantryrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;
  let export_dir =
    config::resolve_export_dir(&cfg)
      .context(
        "failed to resolve export \
         directory"
      )?;

  let sessions =
    session::SessionStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open session at {}",
        data_dir.display()
      )
    })?;
  let state = sessions.load()?;

  let renderer =
    render::Renderer::new(&cfg)?;
  let gateway =
    gateway::HttpGateway::from_config(
      &cfg
    )?;
  let frontend =
    commands::TerminalFrontend::new(
      renderer.clone(),
      cli.yes
    );
  let mut wizard =
    wizard::Wizard::restore(
      state, gateway, frontend
    )
    .with_export_dir(export_dir);

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  let outcome = runtime.block_on(
    commands::execute(
      &mut wizard,
      &renderer,
      &mut io::stdout().lock(),
      cli.command
    )
  );

  sessions.save(wizard.state())?;

  match outcome? {
    | commands::Outcome::Done => {
      info!("done");
      Ok(ExitCode::SUCCESS)
    }
    | commands::Outcome::Rejected => {
      Ok(ExitCode::FAILURE)
    }
  }
}
