use clap::{ArgAction, Args};

/// Flags accepted before the subcommand.
///
/// Every setting is optional: `None` means the flag was not given, so the
/// resolver can fall through to lower-priority sources.
#[derive(Args, Debug, Clone, Default)]
pub struct CliOptions {
    /// Allocate a pseudo-TTY
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub tty: Option<bool>,

    /// Keep STDIN open even if not attached
    #[arg(short, long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub interactive: Option<bool>,

    /// Connect the container to a network [default: bridge]
    #[arg(long)]
    pub network: Option<String>,

    /// Runtime socket to use and mount (e.g. /var/run/docker.sock)
    #[arg(long, value_name = "PATH")]
    pub mount_socket: Option<String>,

    /// Mount the cderun binary for use inside the container
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub mount_cderun: Option<bool>,

    /// Image to use
    #[arg(long)]
    pub image: Option<String>,

    /// Container runtime to use (docker, podman) [default: docker]
    #[arg(long)]
    pub runtime: Option<String>,

    /// Set environment variables (KEY=VALUE, or KEY to copy from the host)
    #[arg(short, long, value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Working directory inside the container
    #[arg(short, long)]
    pub workdir: Option<String>,

    /// Bind mount a volume (host:container[:ro|rw])
    #[arg(short = 'v', long = "volume", value_name = "HOST:CONTAINER")]
    pub volumes: Vec<String>,

    /// User to run the command as
    #[arg(short, long)]
    pub user: Option<String>,

    /// Mount the named tools (comma separated) into the container
    #[arg(long, value_name = "TOOLS")]
    pub mount_tools: Option<String>,

    /// Mount every tool defined in the tools config into the container
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub mount_all_tools: Option<bool>,

    /// Automatically remove the container when it exits [default: true]
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub remove: Option<bool>,

    /// Mount the current directory at the same path and run there
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub sync_workdir: Option<bool>,

    /// Preview the container configuration without running it
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub dry_run: Option<bool>,

    /// Dry-run output format (yaml, json, simple) [default: yaml]
    #[arg(short = 'f', long, value_name = "FORMAT")]
    pub dry_run_format: Option<String>,

    /// Increase log verbosity (once: info, twice: debug, three times: trace)
    #[arg(long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Write logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<String>,

    /// Log format (text, json)
    #[arg(long, value_name = "FORMAT")]
    pub log_format: Option<String>,

    /// Write logs to stderr as well as the log file
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub log_tee: Option<bool>,

    /// Include timestamps in logs [default: true]
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub log_timestamp: Option<bool>,

    #[command(flatten)]
    pub overrides: Overrides,
}

/// Highest-priority settings.
///
/// These may be written after the subcommand; the argument preprocessor
/// hoists them in front of it before parsing.
#[derive(Args, Debug, Clone, Default)]
#[command(next_help_heading = "Internal overrides (highest priority, usable after the subcommand)")]
pub struct Overrides {
    /// Override TTY setting
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub cderun_tty: Option<bool>,

    /// Override interactive setting
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub cderun_interactive: Option<bool>,

    /// Override image
    #[arg(long, value_name = "IMAGE")]
    pub cderun_image: Option<String>,

    /// Override network
    #[arg(long, value_name = "NETWORK")]
    pub cderun_network: Option<String>,

    /// Override remove setting
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub cderun_remove: Option<bool>,

    /// Override runtime
    #[arg(long, value_name = "RUNTIME")]
    pub cderun_runtime: Option<String>,

    /// Override socket path
    #[arg(long, value_name = "PATH")]
    pub cderun_mount_socket: Option<String>,

    /// Override environment variables
    #[arg(long, value_name = "KEY=VALUE")]
    pub cderun_env: Vec<String>,

    /// Override workdir
    #[arg(long, value_name = "DIR")]
    pub cderun_workdir: Option<String>,

    /// Add volume mounts after all others
    #[arg(long = "cderun-volume", value_name = "HOST:CONTAINER")]
    pub cderun_volumes: Vec<String>,

    /// Override user
    #[arg(long, value_name = "USER")]
    pub cderun_user: Option<String>,

    /// Override mount-cderun setting
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub cderun_mount_cderun: Option<bool>,

    /// Override mount-tools setting
    #[arg(long, value_name = "TOOLS")]
    pub cderun_mount_tools: Option<String>,

    /// Override mount-all-tools setting
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub cderun_mount_all_tools: Option<bool>,

    /// Override sync-workdir setting
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub cderun_sync_workdir: Option<bool>,

    /// Override dry-run setting
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub cderun_dry_run: Option<bool>,

    /// Override dry-run format
    #[arg(long, value_name = "FORMAT")]
    pub cderun_dry_run_format: Option<String>,

    /// Override verbosity
    #[arg(long, action = ArgAction::Count)]
    pub cderun_verbose: u8,

    /// Override log level
    #[arg(long, value_name = "LEVEL")]
    pub cderun_log_level: Option<String>,

    /// Override log file
    #[arg(long, value_name = "PATH")]
    pub cderun_log_file: Option<String>,

    /// Override log format
    #[arg(long, value_name = "FORMAT")]
    pub cderun_log_format: Option<String>,

    /// Override log-tee setting
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub cderun_log_tee: Option<bool>,
}
