use std::path::Path;
use tracing::warn;

use super::config::{ContainerConfig, VolumeMount};
use crate::config::resolver::ResolvedConfig;
use crate::config::tools::ToolsConfig;
use crate::config::ConfigError;

/// Where the cderun binary appears inside the container
pub const CDERUN_CONTAINER_PATH: &str = "/usr/local/bin/cderun";
const TOOL_BIN_DIR: &str = "/usr/local/bin";

/// Turn resolved settings into the spec handed to the runtime.
///
/// Mount flags add the running executable and the runtime socket, plus one
/// alias of the executable per mounted tool so that tools can call each
/// other from inside the container.
pub fn build_container_config(
    resolved: &ResolvedConfig,
    subcommand: &str,
    passthrough: &[String],
    tools: Option<&ToolsConfig>,
) -> Result<ContainerConfig, ConfigError> {
    let mut config = base_config(resolved, subcommand, passthrough);
    if !wants_self_mount(resolved) {
        return Ok(config);
    }
    if !resolved.socket_set {
        return Err(ConfigError::SocketRequired);
    }
    let exe = std::env::current_exe().map_err(ConfigError::CurrentExe)?;
    add_self_mounts(&mut config, resolved, &exe, tools)?;
    Ok(config)
}

fn base_config(resolved: &ResolvedConfig, subcommand: &str, passthrough: &[String]) -> ContainerConfig {
    ContainerConfig {
        image: resolved.image.clone(),
        command: vec![subcommand.to_string()],
        args: passthrough.to_vec(),
        tty: resolved.tty,
        interactive: resolved.interactive,
        remove: resolved.remove,
        network: resolved.network.clone(),
        volumes: resolved.volumes.clone(),
        env: resolved.env.clone(),
        workdir: resolved.workdir.clone(),
        user: resolved.user.clone(),
    }
}

fn wants_self_mount(resolved: &ResolvedConfig) -> bool {
    resolved.mount_cderun || resolved.mount_all_tools || !resolved.mount_tools.is_empty()
}

fn add_self_mounts(
    config: &mut ContainerConfig,
    resolved: &ResolvedConfig,
    exe: &Path,
    tools: Option<&ToolsConfig>,
) -> Result<(), ConfigError> {
    let exe = exe.to_string_lossy().into_owned();
    let tool_mount = |name: &str| VolumeMount::new(exe.clone(), format!("{}/{}", TOOL_BIN_DIR, name), true);

    config
        .volumes
        .push(VolumeMount::new(exe.clone(), CDERUN_CONTAINER_PATH, true));
    config
        .volumes
        .push(VolumeMount::new(resolved.socket.clone(), resolved.socket.clone(), false));

    if resolved.mount_all_tools {
        match tools {
            Some(tools) if !tools.is_empty() => {
                config.volumes.extend(tools.keys().map(|name| tool_mount(name)));
            }
            _ => warn!("--mount-all-tools specified but no tools defined in .tools.yaml"),
        }
    } else if !resolved.mount_tools.is_empty() {
        for name in resolved.mount_tools.split(',').map(str::trim) {
            if name.is_empty() {
                continue;
            }
            if !tools.is_some_and(|tools| tools.contains_key(name)) {
                return Err(ConfigError::UnknownTool(name.to_string()));
            }
            config.volumes.push(tool_mount(name));
        }
    }

    Ok(())
}
