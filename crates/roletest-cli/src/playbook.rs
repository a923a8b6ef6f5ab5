//! Test playbook and container layout for a role run
//!
//! The host-side work directory holds the generated playbook and inventory
//! and is mounted at [`TEST_DIR`]. The role under test lands in
//! `TEST_DIR/roles/<name>`, either bind-mounted from the host or installed
//! with ansible-galaxy. Extra search paths are mounted read-only under
//! [`ANSIBLE_ROOT`] and announced through the matching `ANSIBLE_*` variables.

use anyhow::{bail, Context, Result};
use roletest_config::RolePaths;
use roletest_provider::ContainerOptions;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const ANSIBLE_ROOT: &str = "/etc/ansible";
pub const TEST_DIR: &str = "/etc/ansible/test";
pub const PLAYBOOK_FILE: &str = "playbook.yml";
pub const INVENTORY_FILE: &str = "hosts";

/// Keeps the container alive between execs
const KEEPALIVE_CMD: [&str; 3] = ["tail", "-f", "/dev/null"];

const INVENTORY: &str = "localhost ansible_connection=local\n";

/// Where the role under test comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleSource {
    /// Role directory on the host
    Local { path: PathBuf, name: String },
    /// Galaxy name or git URL, installed inside the container
    Remote { source: String, name: String },
}

impl RoleSource {
    /// An existing directory is a local role; anything else is handed to
    /// ansible-galaxy
    pub fn parse(role: &str) -> Result<Self> {
        let role = role.trim();
        if role.is_empty() {
            bail!("Role must not be empty");
        }

        let path = Path::new(role);
        if path.is_dir() {
            let path = path
                .canonicalize()
                .with_context(|| format!("Failed to resolve role path {}", role))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .context("Role path has no directory name")?;
            return Ok(Self::Local { path, name });
        }

        let name = remote_role_name(role);
        if name.is_empty() {
            bail!("Cannot derive a role name from '{}'", role);
        }
        Ok(Self::Remote {
            source: role.to_string(),
            name,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Local { name, .. } | Self::Remote { name, .. } => name,
        }
    }

    /// ansible-galaxy invocation installing a remote role, `None` for local
    pub fn install_command(&self) -> Option<Vec<String>> {
        let Self::Remote { source, .. } = self else {
            return None;
        };
        let source = if is_git_source(source) && !source.starts_with("git+") {
            format!("git+{}", source)
        } else {
            source.clone()
        };
        Some(vec![
            "ansible-galaxy".to_string(),
            "install".to_string(),
            "-p".to_string(),
            format!("{}/roles", TEST_DIR),
            source,
        ])
    }
}

fn is_git_source(source: &str) -> bool {
    source.contains("://") || source.starts_with("git@") || source.ends_with(".git")
}

/// `user.role,v1.2` -> `user.role`; `https://host/org/role.git,main` -> `role`
fn remote_role_name(source: &str) -> String {
    let source = source.split(',').next().unwrap_or_default();
    if !is_git_source(source) {
        return source.to_string();
    }
    let last = source
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default();
    last.trim_end_matches(".git").to_string()
}

/// ansible-playbook options passed through from the command line
#[derive(Debug, Clone, Default)]
pub struct PlaybookArgs {
    pub extra_vars: Vec<String>,
    pub limit: Option<String>,
    pub skip_tags: Option<String>,
    pub tags: Option<String>,
    pub verbosity: u8,
}

/// Playbook applying a single role to every host
pub fn render_playbook(role_name: &str) -> String {
    format!(
        "---\n- hosts: all\n  roles:\n    - role: \"{}\"\n",
        role_name.replace('"', "\\\"")
    )
}

/// Write the playbook, inventory and roles directory into `dir`
pub fn write_test_files(dir: &Path, role: &RoleSource) -> Result<()> {
    std::fs::write(dir.join(PLAYBOOK_FILE), render_playbook(role.name()))
        .context("Failed to write test playbook")?;
    std::fs::write(dir.join(INVENTORY_FILE), INVENTORY).context("Failed to write inventory")?;
    std::fs::create_dir_all(dir.join("roles")).context("Failed to create roles directory")?;
    Ok(())
}

pub fn playbook_command(args: &PlaybookArgs) -> Vec<String> {
    let mut cmd = vec![
        "ansible-playbook".to_string(),
        "-i".to_string(),
        format!("{}/{}", TEST_DIR, INVENTORY_FILE),
        format!("{}/{}", TEST_DIR, PLAYBOOK_FILE),
    ];

    for vars in &args.extra_vars {
        cmd.push("--extra-vars".to_string());
        cmd.push(vars.clone());
    }
    let optional = [
        ("--limit", &args.limit),
        ("--skip-tags", &args.skip_tags),
        ("--tags", &args.tags),
    ];
    for (flag, value) in optional {
        if let Some(value) = value {
            cmd.push(flag.to_string());
            cmd.push(value.clone());
        }
    }
    if args.verbosity > 0 {
        cmd.push(format!("-{}", "v".repeat(args.verbosity as usize)));
    }

    cmd
}

/// Container-side directory for a search path key
fn mount_point(key: &str) -> String {
    format!("{}/{}", ANSIBLE_ROOT, key)
}

fn env_var(key: &str) -> String {
    match key {
        "roles" => "ANSIBLE_ROLES_PATH".to_string(),
        other => format!("ANSIBLE_{}", other.to_uppercase()),
    }
}

/// Bind mounts (`host:container[:ro]`) for the work dir, role and search paths
pub fn binds(work_dir: &Path, role: &RoleSource, paths: &RolePaths) -> Vec<String> {
    let mut binds = vec![format!("{}:{}", work_dir.display(), TEST_DIR)];

    if let RoleSource::Local { path, name } = role {
        binds.push(format!("{}:{}/roles/{}:ro", path.display(), TEST_DIR, name));
    }
    for (key, path) in paths.entries() {
        binds.push(format!("{}:{}:ro", path.display(), mount_point(key)));
    }

    binds
}

/// Environment for ansible execs pointing at the mounted search paths
pub fn ansible_env(paths: &RolePaths) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = paths
        .entries()
        .into_iter()
        .map(|(key, _)| (env_var(key), mount_point(key)))
        .collect();
    env.insert("PYTHONUNBUFFERED".to_string(), "1".to_string());
    env
}

pub fn container_options(
    image: &str,
    name: &str,
    binds: Vec<String>,
    privileged: bool,
) -> ContainerOptions {
    ContainerOptions::new(image)
        .with_name(name)
        .with_option("Cmd", json!(KEEPALIVE_CMD))
        .with_option(
            "HostConfig",
            json!({
                "Binds": binds,
                "Privileged": privileged,
            }),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use roletest_config::PluginPaths;

    #[test]
    fn test_parse_local_role() {
        let tmp = tempfile::tempdir().unwrap();
        let role_dir = tmp.path().join("nginx");
        std::fs::create_dir(&role_dir).unwrap();

        let role = RoleSource::parse(role_dir.to_str().unwrap()).unwrap();
        match &role {
            RoleSource::Local { path, name } => {
                assert!(path.is_absolute());
                assert_eq!(name, "nginx");
            }
            other => panic!("expected local role, got {:?}", other),
        }
        assert!(role.install_command().is_none());
    }

    #[test]
    fn test_parse_galaxy_role() {
        let role = RoleSource::parse("geerlingguy.nginx").unwrap();
        assert_eq!(role.name(), "geerlingguy.nginx");
        assert_eq!(
            role.install_command().unwrap(),
            vec![
                "ansible-galaxy",
                "install",
                "-p",
                "/etc/ansible/test/roles",
                "geerlingguy.nginx"
            ]
        );
    }

    #[test]
    fn test_parse_galaxy_role_with_version() {
        let role = RoleSource::parse("geerlingguy.nginx,2.8.0").unwrap();
        assert_eq!(role.name(), "geerlingguy.nginx");
        assert_eq!(
            role.install_command().unwrap().last().unwrap(),
            "geerlingguy.nginx,2.8.0"
        );
    }

    #[test]
    fn test_parse_git_role() {
        let role = RoleSource::parse("https://github.com/example/ansible-nginx.git").unwrap();
        assert_eq!(role.name(), "ansible-nginx");
        assert_eq!(
            role.install_command().unwrap().last().unwrap(),
            "git+https://github.com/example/ansible-nginx.git"
        );

        let role = RoleSource::parse("git@github.com:example/redis.git").unwrap();
        assert_eq!(role.name(), "redis");

        let role = RoleSource::parse("git+https://git.example.com/roles/base,v1").unwrap();
        assert_eq!(role.name(), "base");
        assert_eq!(
            role.install_command().unwrap().last().unwrap(),
            "git+https://git.example.com/roles/base,v1"
        );
    }

    #[test]
    fn test_parse_empty_role_fails() {
        assert!(RoleSource::parse("  ").is_err());
    }

    #[test]
    fn test_playbook_command_minimal() {
        assert_eq!(
            playbook_command(&PlaybookArgs::default()),
            vec![
                "ansible-playbook",
                "-i",
                "/etc/ansible/test/hosts",
                "/etc/ansible/test/playbook.yml"
            ]
        );
    }

    #[test]
    fn test_playbook_command_passes_options() {
        let args = PlaybookArgs {
            extra_vars: vec!["port=8080".into(), "{\"debug\": true}".into()],
            limit: Some("web".into()),
            skip_tags: Some("slow".into()),
            tags: Some("install,config".into()),
            verbosity: 3,
        };
        let cmd = playbook_command(&args);
        assert_eq!(
            &cmd[4..],
            &[
                "--extra-vars",
                "port=8080",
                "--extra-vars",
                "{\"debug\": true}",
                "--limit",
                "web",
                "--skip-tags",
                "slow",
                "--tags",
                "install,config",
                "-vvv"
            ]
        );
    }

    #[test]
    fn test_render_playbook() {
        let yaml = render_playbook("geerlingguy.nginx");
        assert!(yaml.starts_with("---\n- hosts: all\n"));
        assert!(yaml.contains("- role: \"geerlingguy.nginx\""));
    }

    #[test]
    fn test_write_test_files() {
        let tmp = tempfile::tempdir().unwrap();
        let role = RoleSource::parse("acme.base").unwrap();
        write_test_files(tmp.path(), &role).unwrap();

        let playbook = std::fs::read_to_string(tmp.path().join("playbook.yml")).unwrap();
        assert!(playbook.contains("acme.base"));
        let inventory = std::fs::read_to_string(tmp.path().join("hosts")).unwrap();
        assert!(inventory.contains("ansible_connection=local"));
        assert!(tmp.path().join("roles").is_dir());
    }

    #[test]
    fn test_binds_and_env() {
        let role = RoleSource::Local {
            path: PathBuf::from("/src/roles/nginx"),
            name: "nginx".into(),
        };
        let paths = RolePaths {
            roles: Some(PathBuf::from("/src/roles")),
            library: None,
            plugins: PluginPaths {
                filter: Some(PathBuf::from("/src/filter_plugins")),
                ..Default::default()
            },
        };

        assert_eq!(
            binds(Path::new("/tmp/work"), &role, &paths),
            vec![
                "/tmp/work:/etc/ansible/test",
                "/src/roles/nginx:/etc/ansible/test/roles/nginx:ro",
                "/src/roles:/etc/ansible/roles:ro",
                "/src/filter_plugins:/etc/ansible/filter_plugins:ro",
            ]
        );

        let env = ansible_env(&paths);
        assert_eq!(env["ANSIBLE_ROLES_PATH"], "/etc/ansible/roles");
        assert_eq!(env["ANSIBLE_FILTER_PLUGINS"], "/etc/ansible/filter_plugins");
        assert!(!env.contains_key("ANSIBLE_LIBRARY"));
    }

    #[test]
    fn test_container_options() {
        let options = container_options("ansiblerole/test:1.9", "role-x", vec!["/a:/b".into()], true);
        assert_eq!(options.image, "ansiblerole/test:1.9");
        assert_eq!(options.name.as_deref(), Some("role-x"));
        assert_eq!(options.extra["Cmd"], json!(["tail", "-f", "/dev/null"]));
        assert_eq!(options.extra["HostConfig"]["Binds"], json!(["/a:/b"]));
        assert_eq!(options.extra["HostConfig"]["Privileged"], json!(true));
    }
}
