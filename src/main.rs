//! # credfs
//! A FUSE filesystem that multiplexes the credential directories of
//! command-line AI tools into per-account stores, selected by the identity
//! of the calling process. Non-credential files pass through to a shared
//! backing directory so config and caches stay consistent across accounts.
//!
//! Pid-to-account mappings are managed over a Unix socket at
//! `<run_dir>/control.sock` and persisted to `<run_dir>/pid-map.json`.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Clap;
use daemonize::Daemonize;
use nix::sys::signal::{SigSet, Signal};

use credfs::control::{ControlServer, CONTROL_SOCKET_FILE, DEFAULT_SWEEP_INTERVAL};
use credfs::filesystem::CredentialFs;
use credfs::mount;
use credfs::registry::AccountRegistry;
use credfs::utils;

/// Command line options. Every option falls back to a `CREDFS_*` environment
/// variable, then to its built-in default.
#[derive(Clap, Debug)]
#[clap(version = "0.1.0")]
struct Opts {
    /// Comma-separated list of tools to mount (claude, codex)
    #[clap(long)]
    tools: Option<String>,
    /// Mount point for claude credentials (default: ~/.claude)
    #[clap(long)]
    claude_mount: Option<PathBuf>,
    /// Mount point for codex credentials (default: ~/.codex)
    #[clap(long)]
    codex_mount: Option<PathBuf>,
    /// Run-state directory holding the registry, socket and backing dirs
    #[clap(long)]
    run_dir: Option<PathBuf>,
    /// Root of the per-account profile directories
    #[clap(long)]
    profiles_dir: Option<PathBuf>,
    /// Account used when no registration resolves
    #[clap(long)]
    default_account: Option<String>,
    /// Uid allowed to connect to the control socket (default: our own)
    #[clap(long)]
    allowed_uid: Option<u32>,
    /// Run in the foreground
    #[clap(short, long)]
    foreground: bool,
    /// Log to this file instead of stderr
    #[clap(short, long)]
    log: Option<PathBuf>,
}

struct Config {
    tools: Vec<String>,
    claude_mount: PathBuf,
    codex_mount: PathBuf,
    run_dir: PathBuf,
    profiles_dir: PathBuf,
    default_account: String,
    allowed_uid: u32,
    foreground: bool,
}

impl Config {
    fn resolve(opts: &Opts) -> Result<Self> {
        let home = home_dir()?;
        let tools = opts
            .tools
            .clone()
            .or_else(|| env::var("CREDFS_TOOLS").ok())
            .unwrap_or_else(|| "claude,codex".to_string());

        Ok(Self {
            tools: tools
                .split(',')
                .map(|tool| tool.trim().to_string())
                .filter(|tool| !tool.is_empty())
                .collect(),
            claude_mount: opts
                .claude_mount
                .clone()
                .or_else(|| env_path("CREDFS_CLAUDE_MOUNT"))
                .unwrap_or_else(|| home.join(".claude")),
            codex_mount: opts
                .codex_mount
                .clone()
                .or_else(|| env_path("CREDFS_CODEX_MOUNT"))
                .unwrap_or_else(|| home.join(".codex")),
            run_dir: opts
                .run_dir
                .clone()
                .or_else(|| env_path("CREDFS_RUN_DIR"))
                .unwrap_or_else(|| PathBuf::from("/run/credfs")),
            profiles_dir: opts
                .profiles_dir
                .clone()
                .or_else(|| env_path("CREDFS_PROFILES_DIR"))
                .unwrap_or_else(|| home.join(".credfs/profiles")),
            default_account: opts
                .default_account
                .clone()
                .or_else(|| env::var("CREDFS_DEFAULT_ACCOUNT").ok())
                .unwrap_or_else(|| "default".to_string()),
            allowed_uid: opts
                .allowed_uid
                .or_else(|| env::var("CREDFS_ALLOWED_UID").ok().and_then(|v| v.parse().ok()))
                .unwrap_or_else(|| nix::unistd::getuid().as_raw()),
            foreground: opts.foreground,
        })
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var).map(PathBuf::from)
}

fn home_dir() -> Result<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .context("HOME is not set")
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    if let Err(e) = credfs::logger::init(opts.log.clone()) {
        eprintln!("log init failed: {:?}", e);
    }

    let config = Config::resolve(&opts)?;
    if !config.foreground {
        Daemonize::new().start().context("failed to daemonize")?;
    }

    utils::create_dir_all(&config.run_dir)?;
    utils::create_dir_all(&config.profiles_dir)?;

    // Shutdown signals are handled by waiting on the main thread; block them
    // here so every thread spawned below inherits the mask.
    let mut mask = SigSet::empty();
    mask.add(Signal::SIGINT);
    mask.add(Signal::SIGTERM);
    mask.thread_block().context("failed to block signals")?;

    let registry = Arc::new(AccountRegistry::load(
        config.run_dir.join(mount::REGISTRY_FILE),
        &config.default_account,
    ));

    let control = ControlServer::start(
        config.run_dir.join(CONTROL_SOCKET_FILE),
        Arc::clone(&registry),
        Some(config.allowed_uid),
        DEFAULT_SWEEP_INTERVAL,
    )?;

    mount::write_pid_file(&config.run_dir)?;

    let mut sessions = Vec::new();
    let mut mount_points = Vec::new();
    for tool in &config.tools {
        let (mount_point, cred_files) = match tool.as_str() {
            "claude" => (config.claude_mount.clone(), mount::CLAUDE_CRED_FILES),
            "codex" => (config.codex_mount.clone(), mount::CODEX_CRED_FILES),
            other => {
                log::warn!("unknown tool '{}', skipping", other);
                continue;
            }
        };

        utils::create_dir_all(&mount_point)?;
        let backing = mount::prepare_backing_dir(&config.run_dir, &mount_point, tool)?;
        let fs = CredentialFs::new(
            tool,
            backing,
            config.profiles_dir.clone(),
            Arc::clone(&registry),
            cred_files,
        );
        sessions.push(mount::spawn_mount(fs, mount_point.clone()));
        mount_points.push(mount_point);
    }

    if sessions.is_empty() {
        control.stop();
        bail!("no tools to mount");
    }

    mount::write_ready_marker(&config.run_dir)?;
    log::info!("credfs ready (tools: {})", config.tools.join(", "));

    let signal = mask.wait().context("failed waiting for signal")?;
    log::info!("received {}, shutting down", signal);

    control.stop();
    for mount_point in &mount_points {
        mount::unmount(mount_point);
    }
    for session in sessions {
        let _ = session.join();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn empty_opts() -> Opts {
        Opts {
            tools: None,
            claude_mount: None,
            codex_mount: None,
            run_dir: None,
            profiles_dir: None,
            default_account: None,
            allowed_uid: None,
            foreground: true,
            log: None,
        }
    }

    #[test]
    #[serial]
    fn test_config_defaults() -> Result<()> {
        env::set_var("HOME", "/home/tester");
        env::remove_var("CREDFS_TOOLS");
        env::remove_var("CREDFS_RUN_DIR");

        let config = Config::resolve(&empty_opts())?;
        assert_eq!(config.tools, vec!["claude", "codex"]);
        assert_eq!(config.claude_mount, PathBuf::from("/home/tester/.claude"));
        assert_eq!(config.codex_mount, PathBuf::from("/home/tester/.codex"));
        assert_eq!(config.run_dir, PathBuf::from("/run/credfs"));
        assert_eq!(config.default_account, "default");
        Ok(())
    }

    #[test]
    #[serial]
    fn test_cli_overrides_environment() -> Result<()> {
        env::set_var("HOME", "/home/tester");
        env::set_var("CREDFS_TOOLS", "codex");
        env::set_var("CREDFS_RUN_DIR", "/tmp/env-run");

        let mut opts = empty_opts();
        opts.tools = Some("claude".to_string());

        let config = Config::resolve(&opts)?;
        assert_eq!(config.tools, vec!["claude"]);
        // Unset on the command line, so the environment wins.
        assert_eq!(config.run_dir, PathBuf::from("/tmp/env-run"));

        env::remove_var("CREDFS_TOOLS");
        env::remove_var("CREDFS_RUN_DIR");
        Ok(())
    }

    #[test]
    #[serial]
    fn test_tools_list_is_trimmed() -> Result<()> {
        env::set_var("HOME", "/home/tester");
        env::remove_var("CREDFS_TOOLS");

        let mut opts = empty_opts();
        opts.tools = Some(" claude , ,codex ".to_string());

        let config = Config::resolve(&opts)?;
        assert_eq!(config.tools, vec!["claude", "codex"]);
        Ok(())
    }
}
