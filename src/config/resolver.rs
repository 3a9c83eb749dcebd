//! Merges every configuration source into one [`ResolvedConfig`].
//!
//! Each field is resolved on its own, highest priority first:
//!
//! 1. internal override (`--cderun-*`, only when given)
//! 2. CLI flag (only when given)
//! 3. environment variable
//! 4. tool config entry for the subcommand
//! 5. global config defaults
//! 6. built-in fallback
//!
//! Env lists merge key-wise and volumes accumulate instead of replacing.

use std::path::PathBuf;

use super::env::EnvLookup;
use super::global::GlobalConfig;
use super::tools::{ToolConfig, ToolsConfig};
use super::ConfigError;
use crate::cli::options::CliOptions;
use crate::container::config::VolumeMount;
use crate::container::dry_run::DryRunFormat;
use crate::utils::logger::{self, LogFormat, LogSettings};

pub const ENV_IMAGE: &str = "CDERUN_IMAGE";
pub const ENV_TTY: &str = "CDERUN_TTY";
pub const ENV_INTERACTIVE: &str = "CDERUN_INTERACTIVE";
pub const ENV_NETWORK: &str = "CDERUN_NETWORK";
pub const ENV_REMOVE: &str = "CDERUN_REMOVE";
pub const ENV_WORKDIR: &str = "CDERUN_WORKDIR";
pub const ENV_USER: &str = "CDERUN_USER";
pub const ENV_RUNTIME: &str = "CDERUN_RUNTIME";
pub const ENV_MOUNT_SOCKET: &str = "CDERUN_MOUNT_SOCKET";
/// Connection hint shared with the docker CLI. May be a remote URL, so it
/// supplies a socket value but never counts as an explicit socket.
pub const ENV_DOCKER_HOST: &str = "DOCKER_HOST";
pub const ENV_MOUNT_CDERUN: &str = "CDERUN_MOUNT_CDERUN";
pub const ENV_MOUNT_TOOLS: &str = "CDERUN_MOUNT_TOOLS";
pub const ENV_MOUNT_ALL_TOOLS: &str = "CDERUN_MOUNT_ALL_TOOLS";
pub const ENV_SYNC_WORKDIR: &str = "CDERUN_SYNC_WORKDIR";
pub const ENV_DRY_RUN: &str = "CDERUN_DRY_RUN";
pub const ENV_DRY_RUN_FORMAT: &str = "CDERUN_DRY_RUN_FORMAT";
pub const ENV_LOG_LEVEL: &str = "CDERUN_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "CDERUN_LOG_FORMAT";
pub const ENV_LOG_FILE: &str = "CDERUN_LOG_FILE";
pub const ENV_LOG_TEE: &str = "CDERUN_LOG_TEE";
pub const ENV_LOG_TIMESTAMP: &str = "CDERUN_LOG_TIMESTAMP";

pub const DEFAULT_NETWORK: &str = "bridge";
pub const DEFAULT_RUNTIME: &str = "docker";
pub const DEFAULT_SOCKET: &str = "/var/run/docker.sock";

/// Final settings for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub image: String,
    pub tty: bool,
    pub interactive: bool,
    pub network: String,
    pub remove: bool,
    pub volumes: Vec<VolumeMount>,
    pub env: Vec<String>,
    pub workdir: String,
    pub user: String,
    pub runtime: String,
    pub socket: String,
    /// The socket came from a user-directed source and is a mountable path
    pub socket_set: bool,
    pub mount_cderun: bool,
    pub mount_tools: String,
    pub mount_all_tools: bool,
    pub sync_workdir: bool,
    /// Output format when this is a dry run
    pub dry_run: Option<DryRunFormat>,
    pub log: LogSettings,
}

/// Resolve the settings for `subcommand` from every source.
pub fn resolve(
    subcommand: &str,
    cli: &CliOptions,
    tools: Option<&ToolsConfig>,
    global: Option<&GlobalConfig>,
    env: &dyn EnvLookup,
) -> Result<ResolvedConfig, ConfigError> {
    let p1 = &cli.overrides;
    let tool: Option<&ToolConfig> = tools.and_then(|tools| tools.get(subcommand));
    let defaults = global.map(|global| &global.defaults);

    let image = non_empty(p1.cderun_image.clone())
        .or_else(|| non_empty(cli.image.clone()))
        .or_else(|| env.non_empty(ENV_IMAGE))
        .or_else(|| tool.and_then(|t| non_empty_str(&t.image)))
        .ok_or_else(|| ConfigError::MissingImage(subcommand.to_string()))?;

    let tty = p1
        .cderun_tty
        .or(cli.tty)
        .or_else(|| env.flag(ENV_TTY))
        .or_else(|| tool.and_then(|t| t.tty))
        .or_else(|| defaults.and_then(|d| d.tty))
        .unwrap_or(false);

    let interactive = p1
        .cderun_interactive
        .or(cli.interactive)
        .or_else(|| env.flag(ENV_INTERACTIVE))
        .or_else(|| tool.and_then(|t| t.interactive))
        .or_else(|| defaults.and_then(|d| d.interactive))
        .unwrap_or(false);

    let network = p1
        .cderun_network
        .clone()
        .or_else(|| cli.network.clone())
        .or_else(|| env.non_empty(ENV_NETWORK))
        .or_else(|| tool.and_then(|t| non_empty_str(&t.network)))
        .or_else(|| defaults.and_then(|d| non_empty_str(&d.network)))
        .unwrap_or_else(|| DEFAULT_NETWORK.to_string());

    let remove = p1
        .cderun_remove
        .or(cli.remove)
        .or_else(|| env.flag(ENV_REMOVE))
        .or_else(|| tool.and_then(|t| t.remove))
        .or_else(|| defaults.and_then(|d| d.remove))
        .unwrap_or(true);

    let workdir = p1
        .cderun_workdir
        .clone()
        .or_else(|| cli.workdir.clone())
        .or_else(|| env.non_empty(ENV_WORKDIR))
        .or_else(|| tool.and_then(|t| non_empty_str(&t.workdir)));

    let user = p1
        .cderun_user
        .clone()
        .or_else(|| cli.user.clone())
        .or_else(|| env.non_empty(ENV_USER))
        .or_else(|| tool.and_then(|t| non_empty_str(&t.user)))
        .or_else(|| defaults.and_then(|d| non_empty_str(&d.user)))
        .unwrap_or_default();

    let runtime = p1
        .cderun_runtime
        .clone()
        .or_else(|| cli.runtime.clone())
        .or_else(|| env.non_empty(ENV_RUNTIME))
        .or_else(|| global.and_then(|g| non_empty_str(&g.runtime)))
        .unwrap_or_else(|| DEFAULT_RUNTIME.to_string());

    let explicit_socket = non_empty(p1.cderun_mount_socket.clone())
        .or_else(|| non_empty(cli.mount_socket.clone()))
        .or_else(|| env.non_empty(ENV_MOUNT_SOCKET));
    let socket_set = explicit_socket.is_some();
    let socket = explicit_socket
        .or_else(|| env.non_empty(ENV_DOCKER_HOST))
        .or_else(|| global.and_then(|g| non_empty_str(&g.runtime_path)))
        .unwrap_or_else(|| DEFAULT_SOCKET.to_string());
    let socket = socket
        .strip_prefix("unix://")
        .map(str::to_string)
        .unwrap_or(socket);

    let mount_cderun = p1
        .cderun_mount_cderun
        .or(cli.mount_cderun)
        .or_else(|| env.flag(ENV_MOUNT_CDERUN))
        .or_else(|| tool.and_then(|t| t.mount_cderun))
        .or_else(|| defaults.and_then(|d| d.mount_cderun))
        .unwrap_or(false);

    let mount_tools = p1
        .cderun_mount_tools
        .clone()
        .or_else(|| cli.mount_tools.clone())
        .or_else(|| env.non_empty(ENV_MOUNT_TOOLS))
        .unwrap_or_default();

    let mount_all_tools = p1
        .cderun_mount_all_tools
        .or(cli.mount_all_tools)
        .or_else(|| env.flag(ENV_MOUNT_ALL_TOOLS))
        .unwrap_or(false);

    let sync_workdir = p1
        .cderun_sync_workdir
        .or(cli.sync_workdir)
        .or_else(|| env.flag(ENV_SYNC_WORKDIR))
        .or_else(|| tool.and_then(|t| t.sync_workdir))
        .or_else(|| defaults.and_then(|d| d.sync_workdir))
        .unwrap_or(false);

    // Volumes accumulate: tool, then CLI, then overrides.
    let mut volumes = match tool {
        Some(t) => VolumeMount::parse_all(&t.volumes)?,
        None => Vec::new(),
    };
    volumes.extend(VolumeMount::parse_all(&cli.volumes)?);
    volumes.extend(VolumeMount::parse_all(&p1.cderun_volumes)?);

    let mut workdir = workdir.unwrap_or_default();
    if sync_workdir {
        if let Ok(cwd) = std::env::current_dir() {
            let cwd = cwd.to_string_lossy().into_owned();
            volumes.push(VolumeMount::new(cwd.clone(), cwd.clone(), false));
            if workdir.is_empty() {
                workdir = cwd;
            }
        }
    }

    let tool_env: &[String] = tool.map(|t| t.env.as_slice()).unwrap_or_default();
    let merged = merge_env(&merge_env(tool_env, &cli.env), &p1.cderun_env);
    let env_list = expand_env(merged, env);

    let dry_run = p1
        .cderun_dry_run
        .or(cli.dry_run)
        .or_else(|| env.flag(ENV_DRY_RUN))
        .unwrap_or(false);
    let dry_run = if dry_run {
        let format = p1
            .cderun_dry_run_format
            .clone()
            .or_else(|| cli.dry_run_format.clone())
            .or_else(|| env.non_empty(ENV_DRY_RUN_FORMAT))
            .unwrap_or_else(|| "yaml".to_string());
        Some(format.parse::<DryRunFormat>()?)
    } else {
        None
    };

    Ok(ResolvedConfig {
        image,
        tty,
        interactive,
        network,
        remove,
        volumes,
        env: env_list,
        workdir,
        user,
        runtime,
        socket,
        socket_set,
        mount_cderun,
        mount_tools,
        mount_all_tools,
        sync_workdir,
        dry_run,
        log: resolve_log(cli, global, env),
    })
}

fn resolve_log(cli: &CliOptions, global: Option<&GlobalConfig>, env: &dyn EnvLookup) -> LogSettings {
    let p1 = &cli.overrides;
    let log = global.map(|g| &g.log);

    let level = p1
        .cderun_log_level
        .as_deref()
        .map(logger::parse_level)
        .or_else(|| logger::verbosity_level(p1.cderun_verbose))
        .or_else(|| cli.log_level.as_deref().map(logger::parse_level))
        .or_else(|| logger::verbosity_level(cli.verbose))
        .or_else(|| env.non_empty(ENV_LOG_LEVEL).map(|l| logger::parse_level(&l)))
        .or_else(|| log.and_then(|l| non_empty_str(&l.level)).map(|l| logger::parse_level(&l)))
        .unwrap_or(LogSettings::default().level);

    let format = p1
        .cderun_log_format
        .clone()
        .or_else(|| cli.log_format.clone())
        .or_else(|| env.non_empty(ENV_LOG_FORMAT))
        .or_else(|| log.and_then(|l| non_empty_str(&l.format)))
        .map(|f| LogFormat::parse(&f))
        .unwrap_or_default();

    let file = non_empty(p1.cderun_log_file.clone())
        .or_else(|| non_empty(cli.log_file.clone()))
        .or_else(|| env.non_empty(ENV_LOG_FILE))
        .or_else(|| log.and_then(|l| non_empty_str(&l.file)))
        .map(PathBuf::from);

    let tee = p1
        .cderun_log_tee
        .or(cli.log_tee)
        .or_else(|| env.flag(ENV_LOG_TEE))
        .or_else(|| log.and_then(|l| l.tee))
        .unwrap_or(false);

    let timestamp = cli
        .log_timestamp
        .or_else(|| env.flag(ENV_LOG_TIMESTAMP))
        .or_else(|| log.and_then(|l| l.timestamp))
        .unwrap_or(true);

    LogSettings {
        level,
        format,
        file,
        tee,
        timestamp,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Config-file strings default to empty, which means unset
fn non_empty_str(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Key of a `KEY=VALUE` or bare `KEY` entry
fn env_key(entry: &str) -> &str {
    entry.split_once('=').map_or(entry, |(key, _)| key)
}

/// Merge two env lists key-wise.
///
/// Entries from `overlay` replace entries of `base` with the same key in
/// place; new keys are appended in order of first appearance.
pub fn merge_env(base: &[String], overlay: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(base.len() + overlay.len());
    for entry in base.iter().chain(overlay) {
        let key = env_key(entry);
        match merged.iter_mut().find(|existing| env_key(existing) == key) {
            Some(existing) => *existing = entry.to_string(),
            None => merged.push(entry.to_string()),
        }
    }
    merged
}

/// Turn bare `KEY` entries into `KEY=value` using the host environment
pub fn expand_env(entries: Vec<String>, env: &dyn EnvLookup) -> Vec<String> {
    entries
        .into_iter()
        .map(|entry| {
            if entry.contains('=') {
                entry
            } else {
                let value = env.var(&entry).unwrap_or_default();
                format!("{}={}", entry, value)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::global::Defaults;
    use std::collections::HashMap;
    use tracing::level_filters::LevelFilter;

    fn tools(entries: &[(&str, ToolConfig)]) -> ToolsConfig {
        entries
            .iter()
            .map(|(name, config)| (name.to_string(), config.clone()))
            .collect()
    }

    fn node(image: &str) -> ToolConfig {
        ToolConfig {
            image: image.to_string(),
            ..Default::default()
        }
    }

    fn env(vars: &[(&str, &str)]) -> HashMap<String, String> {
        vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_image_from_tool_config() {
        let tools = tools(&[("python", node("python:3.11"))]);
        let res = resolve("python", &CliOptions::default(), Some(&tools), None, &env(&[])).unwrap();
        assert_eq!(res.image, "python:3.11");
    }

    #[test]
    fn test_missing_image_names_the_tool() {
        let err = resolve("unknown", &CliOptions::default(), None, None, &env(&[])).unwrap_err();
        assert!(matches!(&err, ConfigError::MissingImage(tool) if tool == "unknown"));
        assert!(err.to_string().contains("no image mapping found for tool: unknown"));
    }

    #[test]
    fn test_empty_image_everywhere_is_missing() {
        let cli = CliOptions {
            image: Some(String::new()),
            ..Default::default()
        };
        let tools = tools(&[("node", node(""))]);
        let result = resolve("node", &cli, Some(&tools), None, &env(&[(ENV_IMAGE, "")]));
        assert!(matches!(result, Err(ConfigError::MissingImage(_))));
    }

    #[test]
    fn test_image_precedence() {
        let tools = tools(&[("node", node("node:tool"))]);
        let vars = env(&[(ENV_IMAGE, "node:env")]);

        let mut cli = CliOptions::default();
        let res = resolve("node", &cli, Some(&tools), None, &vars).unwrap();
        assert_eq!(res.image, "node:env");

        cli.image = Some("node:cli".to_string());
        let res = resolve("node", &cli, Some(&tools), None, &vars).unwrap();
        assert_eq!(res.image, "node:cli");

        cli.overrides.cderun_image = Some("node:override".to_string());
        let res = resolve("node", &cli, Some(&tools), None, &vars).unwrap();
        assert_eq!(res.image, "node:override");
    }

    #[test]
    fn test_cli_beats_tool_and_global() {
        let cli = CliOptions {
            tty: Some(true),
            ..Default::default()
        };
        let tools = tools(&[(
            "node",
            ToolConfig {
                tty: Some(false),
                ..node("node:20")
            },
        )]);
        let global = GlobalConfig {
            defaults: Defaults {
                tty: Some(false),
                ..Default::default()
            },
            ..Default::default()
        };

        let res = resolve("node", &cli, Some(&tools), Some(&global), &env(&[])).unwrap();
        assert!(res.tty);
        assert_eq!(res.image, "node:20");
    }

    #[test]
    fn test_override_beats_every_source() {
        let mut cli = CliOptions {
            tty: Some(true),
            interactive: Some(true),
            network: Some("none".to_string()),
            remove: Some(true),
            workdir: Some("/cli".to_string()),
            runtime: Some("docker".to_string()),
            mount_cderun: Some(false),
            ..Default::default()
        };
        cli.overrides.cderun_tty = Some(false);
        cli.overrides.cderun_interactive = Some(false);
        cli.overrides.cderun_network = Some("host".to_string());
        cli.overrides.cderun_remove = Some(false);
        cli.overrides.cderun_workdir = Some("/override".to_string());
        cli.overrides.cderun_runtime = Some("podman".to_string());
        cli.overrides.cderun_mount_cderun = Some(true);

        let vars = env(&[
            (ENV_TTY, "true"),
            (ENV_NETWORK, "env-net"),
            (ENV_REMOVE, "true"),
            (ENV_RUNTIME, "env-runtime"),
        ]);
        let tools = tools(&[(
            "node",
            ToolConfig {
                tty: Some(true),
                network: "tool-net".to_string(),
                workdir: "/tool".to_string(),
                ..node("node:20")
            },
        )]);
        let global = GlobalConfig {
            runtime: "global-runtime".to_string(),
            ..Default::default()
        };

        let res = resolve("node", &cli, Some(&tools), Some(&global), &vars).unwrap();
        assert!(!res.tty);
        assert!(!res.interactive);
        assert_eq!(res.network, "host");
        assert!(!res.remove);
        assert_eq!(res.workdir, "/override");
        assert_eq!(res.runtime, "podman");
        assert!(res.mount_cderun);
    }

    #[test]
    fn test_env_beats_tool_config() {
        let tools = tools(&[(
            "node",
            ToolConfig {
                tty: Some(false),
                ..node("node:20")
            },
        )]);
        let res = resolve("node", &CliOptions::default(), Some(&tools), None, &env(&[(ENV_TTY, "true")])).unwrap();
        assert!(res.tty);
    }

    #[test]
    fn test_unparsable_env_bool_falls_through() {
        let tools = tools(&[(
            "node",
            ToolConfig {
                interactive: Some(true),
                ..node("node:20")
            },
        )]);
        let vars = env(&[(ENV_INTERACTIVE, "sometimes")]);
        let res = resolve("node", &CliOptions::default(), Some(&tools), None, &vars).unwrap();
        assert!(res.interactive);
    }

    #[test]
    fn test_global_defaults_and_fallbacks() {
        let tools = tools(&[("node", node("node:20"))]);

        let res = resolve("node", &CliOptions::default(), Some(&tools), None, &env(&[])).unwrap();
        assert!(!res.tty);
        assert!(!res.interactive);
        assert_eq!(res.network, DEFAULT_NETWORK);
        assert!(res.remove);
        assert_eq!(res.runtime, DEFAULT_RUNTIME);
        assert_eq!(res.socket, DEFAULT_SOCKET);
        assert!(!res.socket_set);
        assert_eq!(res.workdir, "");
        assert_eq!(res.dry_run, None);
        assert_eq!(res.log, LogSettings::default());

        let global = GlobalConfig {
            runtime: "podman".to_string(),
            runtime_path: "/run/podman/podman.sock".to_string(),
            defaults: Defaults {
                network: "host".to_string(),
                remove: Some(false),
                user: "1000:1000".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let res = resolve("node", &CliOptions::default(), Some(&tools), Some(&global), &env(&[])).unwrap();
        assert_eq!(res.network, "host");
        assert!(!res.remove);
        assert_eq!(res.user, "1000:1000");
        assert_eq!(res.runtime, "podman");
        assert_eq!(res.socket, "/run/podman/podman.sock");
        assert!(!res.socket_set);
    }

    #[test]
    fn test_tool_entry_for_other_tool_is_ignored() {
        let tools = tools(&[
            ("node", node("node:20")),
            (
                "python",
                ToolConfig {
                    tty: Some(true),
                    ..node("python:3")
                },
            ),
        ]);
        let res = resolve("node", &CliOptions::default(), Some(&tools), None, &env(&[])).unwrap();
        assert!(!res.tty);
    }

    #[test]
    fn test_workdir_cli_then_tool() {
        let tools = tools(&[(
            "node",
            ToolConfig {
                workdir: "/tool/workdir".to_string(),
                ..node("node:20")
            },
        )]);
        let mut cli = CliOptions {
            workdir: Some("/cli/workdir".to_string()),
            ..Default::default()
        };
        let res = resolve("node", &cli, Some(&tools), None, &env(&[])).unwrap();
        assert_eq!(res.workdir, "/cli/workdir");

        cli.workdir = None;
        let res = resolve("node", &cli, Some(&tools), None, &env(&[])).unwrap();
        assert_eq!(res.workdir, "/tool/workdir");
    }

    #[test]
    fn test_sync_workdir_mounts_cwd() {
        let tools = tools(&[("node", node("node:20"))]);
        let cwd = std::env::current_dir().unwrap().to_string_lossy().into_owned();

        let mut cli = CliOptions {
            sync_workdir: Some(true),
            ..Default::default()
        };
        let res = resolve("node", &cli, Some(&tools), None, &env(&[])).unwrap();
        assert!(res.volumes.contains(&VolumeMount::new(cwd.clone(), cwd.clone(), false)));
        assert_eq!(res.workdir, cwd);

        cli.workdir = Some("/explicit/dir".to_string());
        let res = resolve("node", &cli, Some(&tools), None, &env(&[])).unwrap();
        assert_eq!(res.workdir, "/explicit/dir");
        assert!(res.volumes.contains(&VolumeMount::new(cwd.clone(), cwd, false)));
    }

    #[test]
    fn test_socket_explicit_sources_set_flag() {
        let tools = tools(&[("node", node("node:20"))]);

        let cli = CliOptions {
            mount_socket: Some("/custom.sock".to_string()),
            ..Default::default()
        };
        let res = resolve("node", &cli, Some(&tools), None, &env(&[])).unwrap();
        assert_eq!(res.socket, "/custom.sock");
        assert!(res.socket_set);

        let vars = env(&[(ENV_MOUNT_SOCKET, "unix:///run/docker.sock")]);
        let res = resolve("node", &CliOptions::default(), Some(&tools), None, &vars).unwrap();
        assert_eq!(res.socket, "/run/docker.sock");
        assert!(res.socket_set);

        let mut cli = CliOptions::default();
        cli.overrides.cderun_mount_socket = Some("/override.sock".to_string());
        let res = resolve("node", &cli, Some(&tools), None, &vars).unwrap();
        assert_eq!(res.socket, "/override.sock");
        assert!(res.socket_set);
    }

    #[test]
    fn test_docker_host_supplies_value_but_not_flag() {
        let tools = tools(&[("node", node("node:20"))]);

        let vars = env(&[(ENV_DOCKER_HOST, "unix:///var/run/other.sock")]);
        let res = resolve("node", &CliOptions::default(), Some(&tools), None, &vars).unwrap();
        assert_eq!(res.socket, "/var/run/other.sock");
        assert!(!res.socket_set);

        let vars = env(&[(ENV_DOCKER_HOST, "tcp://10.0.0.5:2376")]);
        let res = resolve("node", &CliOptions::default(), Some(&tools), None, &vars).unwrap();
        assert_eq!(res.socket, "tcp://10.0.0.5:2376");
        assert!(!res.socket_set);
    }

    #[test]
    fn test_mount_cderun_cli_then_tool() {
        let tools = tools(&[(
            "node",
            ToolConfig {
                mount_cderun: Some(false),
                ..node("node:20")
            },
        )]);
        let mut cli = CliOptions {
            mount_cderun: Some(true),
            ..Default::default()
        };
        let res = resolve("node", &cli, Some(&tools), None, &env(&[])).unwrap();
        assert!(res.mount_cderun);

        cli.mount_cderun = None;
        let res = resolve("node", &cli, Some(&tools), None, &env(&[])).unwrap();
        assert!(!res.mount_cderun);
    }

    #[test]
    fn test_mount_tools_precedence() {
        let tools = tools(&[("node", node("node:20"))]);
        let vars = env(&[(ENV_MOUNT_TOOLS, "python"), (ENV_MOUNT_ALL_TOOLS, "1")]);

        let mut cli = CliOptions::default();
        let res = resolve("node", &cli, Some(&tools), None, &vars).unwrap();
        assert_eq!(res.mount_tools, "python");
        assert!(res.mount_all_tools);

        cli.mount_tools = Some("node".to_string());
        cli.overrides.cderun_mount_all_tools = Some(false);
        let res = resolve("node", &cli, Some(&tools), None, &vars).unwrap();
        assert_eq!(res.mount_tools, "node");
        assert!(!res.mount_all_tools);
    }

    #[test]
    fn test_volumes_accumulate_in_order() {
        let tools = tools(&[(
            "node",
            ToolConfig {
                volumes: strings(&["/host/path:/container/path:ro", ".:/app"]),
                ..node("node:20")
            },
        )]);
        let mut cli = CliOptions {
            volumes: strings(&["/h1:/c1", ".:/app"]),
            ..Default::default()
        };
        cli.overrides.cderun_volumes = strings(&["/h2:/c2"]);

        let res = resolve("node", &cli, Some(&tools), None, &env(&[])).unwrap();
        assert_eq!(
            res.volumes,
            vec![
                VolumeMount::new("/host/path", "/container/path", true),
                VolumeMount::new(".", "/app", false),
                VolumeMount::new("/h1", "/c1", false),
                VolumeMount::new(".", "/app", false),
                VolumeMount::new("/h2", "/c2", false),
            ]
        );
    }

    #[test]
    fn test_invalid_volume_is_an_error() {
        let tools = tools(&[("node", node("node:20"))]);
        let cli = CliOptions {
            volumes: strings(&["/just-a-path"]),
            ..Default::default()
        };
        let result = resolve("node", &cli, Some(&tools), None, &env(&[]));
        assert!(matches!(result, Err(ConfigError::InvalidVolume(v)) if v == "/just-a-path"));
    }

    #[test]
    fn test_cli_env_overrides_tool_env() {
        let tools = tools(&[(
            "node",
            ToolConfig {
                env: strings(&["TOOL_KEY=TOOL_VALUE", "OVERRIDE_KEY=TOOL_VALUE"]),
                ..node("node:20-alpine")
            },
        )]);
        let cli = CliOptions {
            env: strings(&["OVERRIDE_KEY=CLI_VALUE"]),
            ..Default::default()
        };

        let res = resolve("node", &cli, Some(&tools), None, &env(&[])).unwrap();
        assert_eq!(res.env, strings(&["TOOL_KEY=TOOL_VALUE", "OVERRIDE_KEY=CLI_VALUE"]));
    }

    #[test]
    fn test_bare_keys_expand_after_merge() {
        let tools = tools(&[(
            "node",
            ToolConfig {
                env: strings(&["HOST_ONLY", "PROMOTED=from-tool", "MISSING"]),
                ..node("node:20")
            },
        )]);
        let cli = CliOptions {
            env: strings(&["PROMOTED"]),
            ..Default::default()
        };
        let vars = env(&[("HOST_ONLY", "h"), ("PROMOTED", "from-host")]);

        let res = resolve("node", &cli, Some(&tools), None, &vars).unwrap();
        assert_eq!(
            res.env,
            strings(&["HOST_ONLY=h", "PROMOTED=from-host", "MISSING="])
        );
    }

    #[test]
    fn test_override_env_always_wins() {
        let tools = tools(&[(
            "node",
            ToolConfig {
                env: strings(&["A=tool", "B=tool"]),
                ..node("node:20")
            },
        )]);
        let mut cli = CliOptions {
            env: strings(&["B=cli", "C=cli"]),
            ..Default::default()
        };
        cli.overrides.cderun_env = strings(&["A=override", "D=override"]);

        let res = resolve("node", &cli, Some(&tools), None, &env(&[])).unwrap();
        assert_eq!(res.env, strings(&["A=override", "B=cli", "C=cli", "D=override"]));
    }

    #[test]
    fn test_merge_env_with_itself_is_stable() {
        let list = strings(&["A=1", "B", "C=3"]);
        assert_eq!(merge_env(&list, &list), list);
    }

    #[test]
    fn test_merge_env_preserves_first_appearance_order() {
        let merged = merge_env(&strings(&["A=1", "B=2"]), &strings(&["C=3", "A=9"]));
        assert_eq!(merged, strings(&["A=9", "B=2", "C=3"]));
    }

    #[test]
    fn test_dry_run_format() {
        let tools = tools(&[("node", node("node:20"))]);

        let mut cli = CliOptions {
            dry_run: Some(true),
            ..Default::default()
        };
        let res = resolve("node", &cli, Some(&tools), None, &env(&[])).unwrap();
        assert_eq!(res.dry_run, Some(DryRunFormat::Yaml));

        cli.dry_run_format = Some("json".to_string());
        cli.overrides.cderun_dry_run_format = Some("simple".to_string());
        let res = resolve("node", &cli, Some(&tools), None, &env(&[])).unwrap();
        assert_eq!(res.dry_run, Some(DryRunFormat::Simple));

        cli.overrides.cderun_dry_run_format = Some("xml".to_string());
        let result = resolve("node", &cli, Some(&tools), None, &env(&[]));
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(f)) if f == "xml"));

        // The format is only checked for dry runs
        cli.dry_run = None;
        assert!(resolve("node", &cli, Some(&tools), None, &env(&[])).is_ok());
    }

    #[test]
    fn test_dry_run_override_and_env() {
        let tools = tools(&[("node", node("node:20"))]);
        let vars = env(&[(ENV_DRY_RUN, "true"), (ENV_DRY_RUN_FORMAT, "json")]);

        let res = resolve("node", &CliOptions::default(), Some(&tools), None, &vars).unwrap();
        assert_eq!(res.dry_run, Some(DryRunFormat::Json));

        let mut cli = CliOptions::default();
        cli.overrides.cderun_dry_run = Some(false);
        let res = resolve("node", &cli, Some(&tools), None, &vars).unwrap();
        assert_eq!(res.dry_run, None);
    }

    #[test]
    fn test_empty_file_strings_fall_through() {
        let global = GlobalConfig {
            defaults: Defaults {
                network: "none".to_string(),
                user: "app".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        let blank = tools(&[("node", node("node:20"))]);
        let res = resolve("node", &CliOptions::default(), Some(&blank), Some(&global), &env(&[])).unwrap();
        assert_eq!(res.network, "none");
        assert_eq!(res.user, "app");
        assert_eq!(res.workdir, "");

        let filled = tools(&[(
            "node",
            ToolConfig {
                network: "host".to_string(),
                user: "node".to_string(),
                workdir: "/app".to_string(),
                ..node("node:20")
            },
        )]);
        let res = resolve("node", &CliOptions::default(), Some(&filled), Some(&global), &env(&[])).unwrap();
        assert_eq!(res.network, "host");
        assert_eq!(res.user, "node");
        assert_eq!(res.workdir, "/app");
    }

    #[test]
    fn test_log_settings_precedence() {
        let tools = tools(&[("node", node("node:20"))]);
        let mut global = GlobalConfig::default();
        global.log.level = "error".to_string();
        global.log.format = "json".to_string();
        global.log.timestamp = Some(false);

        let res = resolve("node", &CliOptions::default(), Some(&tools), Some(&global), &env(&[])).unwrap();
        assert_eq!(res.log.level, LevelFilter::ERROR);
        assert_eq!(res.log.format, LogFormat::Json);
        assert!(!res.log.timestamp);

        let vars = env(&[(ENV_LOG_LEVEL, "info"), (ENV_LOG_FILE, "/tmp/cderun.log")]);
        let res = resolve("node", &CliOptions::default(), Some(&tools), Some(&global), &vars).unwrap();
        assert_eq!(res.log.level, LevelFilter::INFO);
        assert_eq!(res.log.file, Some(PathBuf::from("/tmp/cderun.log")));

        let mut cli = CliOptions {
            verbose: 2,
            ..Default::default()
        };
        let res = resolve("node", &cli, Some(&tools), Some(&global), &vars).unwrap();
        assert_eq!(res.log.level, LevelFilter::DEBUG);

        cli.overrides.cderun_log_level = Some("trace".to_string());
        cli.overrides.cderun_log_tee = Some(true);
        let res = resolve("node", &cli, Some(&tools), Some(&global), &vars).unwrap();
        assert_eq!(res.log.level, LevelFilter::TRACE);
        assert!(res.log.tee);
    }
}
