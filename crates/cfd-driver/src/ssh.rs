//! Remote commands over the platform's SSH proxy.
//!
//! The one-time code reaches `sshpass` on [`CODE_FD`], never in argv or
//! on stdin. Stdin carries the input for the remote command, so job
//! scripts of any size are streamed rather than passed as arguments.

use cfd_config::EgressProxyConfig;
use std::io::Write;
use std::os::fd::AsRawFd;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{StageError, StageResult};

pub const SSH_PORT: u16 = 2222;

/// Descriptor the child reads the SSH code from (`sshpass -d`).
pub const CODE_FD: i32 = 3;

/// Remote command that runs whatever arrives on stdin.
pub const REMOTE_SHELL: &str = "bash -s";

/// Arguments for `sshpass` to run `command` on instance 0 of `guid`.
///
/// Traffic goes through `corkscrew` when an egress proxy is configured.
pub fn ssh_args(
    guid: &str,
    ssh_host: &str,
    egress: &EgressProxyConfig,
    command: &str,
) -> Vec<String> {
    let mut args = vec![
        "-d".to_string(),
        CODE_FD.to_string(),
        "ssh".to_string(),
        "-p".to_string(),
        SSH_PORT.to_string(),
        "-T".to_string(),
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
    ];

    if egress.is_configured() {
        args.push("-o".to_string());
        args.push(format!(
            "ProxyCommand corkscrew {} {} %h %p {}",
            egress.proxy_host_ssh,
            egress.proxy_port_ssh,
            egress.proxy_auth_file.display()
        ));
    }

    args.push(format!("cf:{guid}/0@{ssh_host}"));
    if !command.is_empty() {
        args.push(command.to_string());
    }
    args
}

/// Run `program` with `args`, handing it `code` on [`CODE_FD`] and
/// streaming `input` to its stdin.
///
/// Returns stdout followed by stderr. A non-zero exit is
/// [`StageError::Ssh`] carrying stderr.
pub async fn execute(
    program: &str,
    args: &[String],
    code: &str,
    input: &[u8],
) -> StageResult<String> {
    debug!(program = %program, input_bytes = input.len(), "Starting ssh session");

    let spawn_err = |source| StageError::Spawn {
        program: program.to_string(),
        source,
    };

    // The code fits in the pipe buffer, so it is written before the child exists.
    let (code_reader, mut code_writer) = std::io::pipe().map_err(spawn_err)?;
    code_writer.write_all(code.as_bytes()).map_err(spawn_err)?;
    drop(code_writer);

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let code_fd = code_reader.as_raw_fd();
    // SAFETY: the hook only calls async-signal-safe `dup2`/`fcntl` on
    // descriptors that stay open until `spawn` returns.
    unsafe {
        command.pre_exec(move || inherit_as(code_fd, CODE_FD));
    }

    let mut child = command.spawn().map_err(spawn_err)?;
    drop(command);
    drop(code_reader);

    let stdin = child.stdin.take();
    let feed = async move {
        let Some(mut stdin) = stdin else {
            return Ok(());
        };
        // The program may exit without reading; that is for the exit status to report.
        match stdin.write_all(input).await {
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
            _ => Ok(()),
        }
    };

    let (fed, output) = tokio::join!(feed, child.wait_with_output());
    let output = output.map_err(spawn_err)?;
    fed.map_err(spawn_err)?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        warn!(status = %output.status, "ssh session failed");
        return Err(StageError::Ssh {
            status: output.status.to_string(),
            stderr: stderr.into_owned(),
        });
    }

    Ok(format!("{stdout}{stderr}"))
}

/// Make `fd` available to the exec'd program as `target`.
fn inherit_as(fd: i32, target: i32) -> std::io::Result<()> {
    // dup2 onto itself keeps close-on-exec, so clear it by hand.
    let rc = if fd == target {
        unsafe { libc::fcntl(fd, libc::F_SETFD, 0) }
    } else {
        unsafe { libc::dup2(fd, target) }
    };
    if rc == -1 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn egress() -> EgressProxyConfig {
        EgressProxyConfig {
            proxy_host_http: "http://u:p@egress-proxy.apps.internal:8080".to_string(),
            proxy_host_https: "https://u:p@egress-proxy.apps.internal:61443".to_string(),
            proxy_host_ssh: "egress-proxy.apps.internal".to_string(),
            proxy_port_ssh: 8080,
            proxy_auth_file: PathBuf::from("/home/vcap/app/ssh_proxy.auth"),
        }
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_ssh_args_without_proxy() {
        let args = ssh_args(
            "app-guid",
            "ssh.fr-stage.cloud.gov",
            &EgressProxyConfig::default(),
            "echo hi",
        );

        assert_eq!(
            args,
            [
                "-d",
                "3",
                "ssh",
                "-p",
                "2222",
                "-T",
                "-o",
                "StrictHostKeyChecking=no",
                "cf:app-guid/0@ssh.fr-stage.cloud.gov",
                "echo hi",
            ]
        );
    }

    #[test]
    fn test_ssh_args_with_proxy() {
        let args = ssh_args("app-guid", "ssh.example.com", &egress(), "");

        let proxy = "ProxyCommand corkscrew egress-proxy.apps.internal 8080 \
                     %h %p /home/vcap/app/ssh_proxy.auth";
        assert_eq!(
            args,
            [
                "-d",
                "3",
                "ssh",
                "-p",
                "2222",
                "-T",
                "-o",
                "StrictHostKeyChecking=no",
                "-o",
                proxy,
                "cf:app-guid/0@ssh.example.com",
            ]
        );
    }

    #[tokio::test]
    async fn test_execute_returns_output() {
        let out = execute("echo", &["hello".to_string()], "code", b"")
            .await
            .unwrap();
        assert_eq!(out, "hello\n");
    }

    #[tokio::test]
    async fn test_execute_passes_code_on_its_own_descriptor() {
        let args = sh("cat <&3; printf '|'; cat");
        let out = execute("sh", &args, "one-time-code", b"echo hi")
            .await
            .unwrap();
        assert_eq!(out, "one-time-code|echo hi");
    }

    #[tokio::test]
    async fn test_execute_streams_large_input() {
        let input = "echo line\n".repeat(30_000);
        assert!(input.len() > 128 * 1024);

        let args = sh("read -r code <&3; printf '%s ' \"$code\"; wc -c | tr -d ' '");
        let out = execute("sh", &args, "one-time-code", input.as_bytes())
            .await
            .unwrap();

        assert_eq!(out, format!("one-time-code {}\n", input.len()));
    }

    #[tokio::test]
    async fn test_execute_ignores_unread_input() {
        let input = vec![b'x'; 512 * 1024];
        let out = execute("echo", &["done".to_string()], "code", &input)
            .await
            .unwrap();
        assert_eq!(out, "done\n");
    }

    #[tokio::test]
    async fn test_execute_failure_carries_stderr() {
        let err = execute("sh", &sh("echo boom >&2; exit 3"), "", b"")
            .await
            .unwrap_err();

        match err {
            StageError::Ssh { status, stderr } => {
                assert!(status.contains('3'));
                assert_eq!(stderr, "boom\n");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_missing_program() {
        let err = execute("definitely-not-a-real-program-cfd", &[], "", b"")
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Spawn { .. }));
    }
}
