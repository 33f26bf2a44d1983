//! Process supervision for external SSH clients
//!
//! Pure infrastructure with no persisted state: launch one OS process per
//! forwarding session, probe whether a pid is still alive, and request
//! termination. A spawned process is referenced only by pid — the OS owns
//! it, not this crate — so every process that is still running when the
//! managing process restarts keeps running.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::{getpgid, Pid};
use portway_proto::{Error, ForwardType, Result};
use tracing::debug;

/// Credential handed to the spawn boundary. The password variant exists only
/// for the duration of the create call stack and is masked in every rendered
/// command line.
#[derive(Clone)]
pub enum SpawnAuth {
    Key(PathBuf),
    Password(String),
}

impl std::fmt::Debug for SpawnAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpawnAuth::Key(path) => f.debug_tuple("Key").field(path).finish(),
            SpawnAuth::Password(_) => f.debug_tuple("Password").field(&"<masked>").finish(),
        }
    }
}

/// Fully resolved parameters for one SSH forwarding process
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub forward: ForwardType,
    pub local_port: u16,
    /// Target host for local/remote forwards; unused for dynamic
    pub remote_host: String,
    /// Target port for local/remote forwards; unused for dynamic
    pub remote_port: u16,
    pub auth: SpawnAuth,
}

/// Program, argument list, and a loggable rendition with the password masked
struct LaunchPlan {
    program: String,
    args: Vec<String>,
    display: String,
}

/// Spawns, probes, and terminates SSH client processes
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    ssh_program: String,
    sshpass_program: String,
    grace_period: Duration,
}

impl ProcessSupervisor {
    pub fn new(ssh_program: String, sshpass_program: String, grace_period: Duration) -> Self {
        Self {
            ssh_program,
            sshpass_program,
            grace_period,
        }
    }

    /// Launch the SSH process for one tunnel and return its pid.
    ///
    /// The child is detached into its own process group with all standard
    /// streams discarded (long-lived tunnels produce unbounded chatter that
    /// nobody reads). After a short grace period liveness is re-checked
    /// once: a child that already exited almost always means bad credentials
    /// or an unreachable target, and is surfaced as a synchronous
    /// `SpawnFailed` instead of a tunnel that is born dead.
    pub async fn spawn(&self, spec: &SpawnSpec) -> Result<u32> {
        let plan = self.launch_plan(spec);

        let mut command = tokio::process::Command::new(&plan.program);
        command
            .args(&plan.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        unsafe {
            // New process group, so signals aimed at our group never take
            // the tunnel down with us.
            command.pre_exec(|| {
                if libc::setpgid(0, 0) != 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let mut child = command
            .spawn()
            .map_err(|e| Error::SpawnFailed(format!("launch {}: {e}", plan.program)))?;
        let pid = child
            .id()
            .ok_or_else(|| Error::SpawnFailed("child exited before a pid was observed".into()))?;

        debug!(pid, command = %plan.display, "spawned ssh process");

        // Best-effort reaper: collect the exit status whenever it happens so
        // the process table does not accumulate zombies. Nothing reacts to
        // the exit itself; the next list() notices the dead pid.
        tokio::spawn(async move {
            let _ = child.wait().await;
        });

        tokio::time::sleep(self.grace_period).await;
        if !self.is_alive(pid) {
            return Err(Error::SpawnFailed(
                "SSH process exited immediately - check credentials and connectivity".into(),
            ));
        }

        Ok(pid)
    }

    /// Liveness probe: signal 0 against the pid. Any error (no such
    /// process, permission) counts as not alive. Never blocks.
    pub fn is_alive(&self, pid: u32) -> bool {
        kill(Pid::from_raw(pid as i32), None).is_ok()
    }

    /// Request termination with SIGTERM.
    ///
    /// The signal goes to the whole process group so a password-auth
    /// wrapper cannot shield the wrapped ssh client; if the group lookup
    /// fails the single pid is signalled instead. Fire-and-forget: no wait
    /// for exit, no SIGKILL escalation.
    pub fn terminate(&self, pid: u32) -> std::result::Result<(), nix::errno::Errno> {
        let pid = Pid::from_raw(pid as i32);
        match getpgid(Some(pid)) {
            Ok(pgid) => killpg(pgid, Signal::SIGTERM),
            Err(err) => {
                debug!(%pid, %err, "process group lookup failed, signalling pid directly");
                kill(pid, Signal::SIGTERM)
            }
        }
    }

    fn launch_plan(&self, spec: &SpawnSpec) -> LaunchPlan {
        let mut ssh_args = vec![
            "-N".to_string(),
            "-T".to_string(),
            "-o".to_string(),
            "ExitOnForwardFailure=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "ServerAliveInterval=60".to_string(),
            "-o".to_string(),
            "ServerAliveCountMax=3".to_string(),
        ];
        if let SpawnAuth::Key(path) = &spec.auth {
            ssh_args.push("-i".to_string());
            ssh_args.push(path.to_string_lossy().into_owned());
        }
        ssh_args.push("-p".to_string());
        ssh_args.push(spec.port.to_string());
        ssh_args.extend(forward_args(spec));
        ssh_args.push(format!("{}@{}", spec.user, spec.host));

        match &spec.auth {
            SpawnAuth::Key(_) => LaunchPlan {
                display: format!("{} {}", self.ssh_program, ssh_args.join(" ")),
                program: self.ssh_program.clone(),
                args: ssh_args,
            },
            SpawnAuth::Password(password) => {
                let mut args = vec![
                    "-p".to_string(),
                    password.clone(),
                    self.ssh_program.clone(),
                ];
                args.extend(ssh_args.iter().cloned());
                LaunchPlan {
                    display: format!(
                        "{} -p <masked> {} {}",
                        self.sshpass_program,
                        self.ssh_program,
                        ssh_args.join(" ")
                    ),
                    program: self.sshpass_program.clone(),
                    args,
                }
            }
        }
    }
}

/// Port-forwarding flag for the requested mode, bound on all interfaces
fn forward_args(spec: &SpawnSpec) -> Vec<String> {
    match spec.forward {
        ForwardType::Local => vec![
            "-L".to_string(),
            format!(
                "0.0.0.0:{}:{}:{}",
                spec.local_port, spec.remote_host, spec.remote_port
            ),
        ],
        ForwardType::Remote => vec![
            "-R".to_string(),
            format!(
                "0.0.0.0:{}:{}:{}",
                spec.remote_port, spec.remote_host, spec.local_port
            ),
        ],
        ForwardType::Dynamic => vec!["-D".to_string(), format!("0.0.0.0:{}", spec.local_port)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supervisor() -> ProcessSupervisor {
        ProcessSupervisor::new(
            "ssh".to_string(),
            "sshpass".to_string(),
            Duration::from_millis(50),
        )
    }

    fn key_spec(forward: ForwardType) -> SpawnSpec {
        SpawnSpec {
            host: "example.com".into(),
            port: 22,
            user: "alice".into(),
            forward,
            local_port: 8080,
            remote_host: "127.0.0.1".into(),
            remote_port: 80,
            auth: SpawnAuth::Key(PathBuf::from("/keys/id_ed25519")),
        }
    }

    #[test]
    fn key_auth_command_line() {
        let plan = supervisor().launch_plan(&key_spec(ForwardType::Local));
        assert_eq!(plan.program, "ssh");
        assert_eq!(
            plan.args,
            vec![
                "-N",
                "-T",
                "-o",
                "ExitOnForwardFailure=yes",
                "-o",
                "StrictHostKeyChecking=no",
                "-o",
                "ServerAliveInterval=60",
                "-o",
                "ServerAliveCountMax=3",
                "-i",
                "/keys/id_ed25519",
                "-p",
                "22",
                "-L",
                "0.0.0.0:8080:127.0.0.1:80",
                "alice@example.com"
            ]
        );
    }

    #[test]
    fn forward_flag_variants() {
        let local = forward_args(&key_spec(ForwardType::Local));
        assert_eq!(local, vec!["-L", "0.0.0.0:8080:127.0.0.1:80"]);

        let remote = forward_args(&key_spec(ForwardType::Remote));
        assert_eq!(remote, vec!["-R", "0.0.0.0:80:127.0.0.1:8080"]);

        let dynamic = forward_args(&key_spec(ForwardType::Dynamic));
        assert_eq!(dynamic, vec!["-D", "0.0.0.0:8080"]);
    }

    #[test]
    fn password_auth_wraps_and_masks() {
        let mut spec = key_spec(ForwardType::Dynamic);
        spec.auth = SpawnAuth::Password("hunter2".into());
        let plan = supervisor().launch_plan(&spec);

        assert_eq!(plan.program, "sshpass");
        assert_eq!(plan.args[0], "-p");
        assert_eq!(plan.args[1], "hunter2");
        assert_eq!(plan.args[2], "ssh");
        // No key flag without a key
        assert!(!plan.args.contains(&"-i".to_string()));
        // The loggable rendition never carries the password
        assert!(!plan.display.contains("hunter2"));
        assert!(plan.display.contains("<masked>"));
    }

    #[test]
    fn spawn_auth_debug_is_masked() {
        let rendered = format!("{:?}", SpawnAuth::Password("hunter2".into()));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn liveness_probe() {
        let sup = supervisor();
        assert!(sup.is_alive(std::process::id()));
        // Max pid on Linux is bounded well below this
        assert!(!sup.is_alive(u32::MAX / 2));
    }

    #[tokio::test]
    async fn terminate_kills_the_process_group() {
        // Stand-in for a long-lived tunnel: a sleeping child in its own group.
        let sup = ProcessSupervisor::new(
            "/bin/sh".to_string(),
            "sshpass".to_string(),
            Duration::from_millis(50),
        );

        let mut command = tokio::process::Command::new("/bin/sh");
        command.args(["-c", "sleep 30"]).stdin(Stdio::null());
        unsafe {
            command.pre_exec(|| {
                libc::setpgid(0, 0);
                Ok(())
            });
        }
        let mut child = command.spawn().unwrap();
        let pid = child.id().unwrap();

        assert!(sup.is_alive(pid));
        sup.terminate(pid).unwrap();

        let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .expect("child did not exit after SIGTERM")
            .unwrap();
        assert!(!status.success());
    }
}
