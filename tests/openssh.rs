use std::path::PathBuf;
use std::time::Duration;

use execmon::command::{RemoteTarget, Target};
use execmon::exec::remote::{OpenSshConfig, OpenSshTransport, join_command, shell_quote};
use execmon_test_utils::argv;
use execmon_test_utils::builders::DescriptorBuilder;

fn key(host: &str, port: Option<u16>) -> RemoteTarget {
    let mut builder = DescriptorBuilder::remote(host, "game");
    if let Some(port) = port {
        builder = builder.port(port);
    }
    match builder.target() {
        Target::Remote(target) => target,
        other => panic!("expected a remote target, got {other:?}"),
    }
}

fn transport() -> OpenSshTransport {
    OpenSshTransport::new(OpenSshConfig {
        ssh_program: PathBuf::from("ssh"),
        control_dir: PathBuf::from("/run/execmon-test"),
        connect_timeout: Duration::from_secs(3),
    })
}

#[test]
fn control_sockets_are_stable_and_short() {
    let transport = transport();
    let socket = transport.control_socket(&key("10.0.0.5", None));

    assert_eq!(socket, transport.control_socket(&key("10.0.0.5", None)));
    assert!(socket.starts_with("/run/execmon-test"));
    assert!(socket.as_os_str().len() < 100);
    assert_eq!(socket.extension().and_then(|e| e.to_str()), Some("sock"));
}

#[test]
fn control_sockets_differ_per_session_key() {
    let transport = transport();
    let plain = transport.control_socket(&key("10.0.0.5", None));
    assert_ne!(plain, transport.control_socket(&key("10.0.0.6", None)));
    assert_ne!(plain, transport.control_socket(&key("10.0.0.5", Some(2222))));
}

#[test]
fn shell_quoting_leaves_plain_words_alone() {
    assert_eq!(shell_quote("ls"), "ls");
    assert_eq!(shell_quote("/srv/mc/world-1.tgz"), "/srv/mc/world-1.tgz");
    assert_eq!(shell_quote(""), "''");
    assert_eq!(shell_quote("a b"), "'a b'");
    assert_eq!(shell_quote("it's"), r"'it'\''s'");
}

#[test]
fn joined_commands_keep_argument_boundaries() {
    let joined = join_command(&argv(&["echo", "$HOME", "x; rm -rf /"]));
    assert_eq!(joined, "echo '$HOME' 'x; rm -rf /'");
}
