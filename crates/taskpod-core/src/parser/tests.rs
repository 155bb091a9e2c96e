//! パーサーのテスト

use super::*;
use crate::error::GroupError;
use crate::model::{Probe, RestartPolicy};

const SPEECH_TO_TEXT: &str = r#"
group "speech-to-text" {
    cpu 2048
    memory 4096
    ready_deadline 600
    public "speech-to-text"

    process "speech-to-text" {
        image "speech-to-text:latest"
        cpu 512
        memory 512
        port 8080
        essential
        depends_on "faster-whisper-server"
        env {
            WHISPER_URL "http://localhost:8000"
        }
        probe {
            http "/management/health"
            interval 30
            timeout 5
            failure_threshold 3
            success_threshold 3
        }
    }

    process "faster-whisper-server" {
        image "fedirz/faster-whisper-server:sha-307e23f-cpu"
        cpu 1536
        memory 3584
        port 8000
        essential
        log_prefix "faster-whisper"
        probe {
            command "CMD-SHELL" "curl -f http://localhost:8000/health || exit 1"
            interval 30
            timeout 5
            grace_period 300
        }
    }
}
"#;

#[test]
fn test_parse_speech_to_text_group() {
    let group = parse_kdl_string(SPEECH_TO_TEXT, "unnamed".to_string()).unwrap();

    assert_eq!(group.name, "speech-to-text");
    assert_eq!(group.cpu, 2048);
    assert_eq!(group.memory_mib, 4096);
    assert_eq!(group.public, "speech-to-text");
    assert_eq!(group.ready_deadline_secs, 600);
    assert_eq!(group.processes.len(), 2);

    let api = group.process("speech-to-text").unwrap();
    assert_eq!(api.cpu, 512);
    assert_eq!(api.port, Some(8080));
    assert!(api.essential);
    assert_eq!(api.depends_on, vec!["faster-whisper-server".to_string()]);
    assert_eq!(
        api.environment.get("WHISPER_URL"),
        Some(&"http://localhost:8000".to_string())
    );
    assert_eq!(
        api.probe.probe,
        Probe::HttpGet {
            path: "/management/health".to_string()
        }
    );

    let whisper = group.process("faster-whisper-server").unwrap();
    assert_eq!(whisper.cpu, 1536);
    assert_eq!(whisper.memory_mib, 3584);
    assert_eq!(whisper.log_prefix, Some("faster-whisper".to_string()));
    assert_eq!(whisper.probe.grace_period_secs, 300);
    assert!(matches!(whisper.probe.probe, Probe::Command { .. }));
}

#[test]
fn test_parse_probe_defaults() {
    let kdl = r#"
group "g" {
    cpu 1024
    memory 1024
    public "api"
    process "api" {
        image "api:latest"
        port 8080
        probe {
            http "/health"
        }
    }
}
"#;
    let group = parse_kdl_string(kdl, "g".to_string()).unwrap();
    let probe = &group.process("api").unwrap().probe;
    assert_eq!(probe.interval_secs, 30);
    assert_eq!(probe.timeout_secs, 5);
    assert_eq!(probe.failure_threshold, 3);
    assert_eq!(probe.success_threshold, 3);
    assert_eq!(probe.grace_period_secs, 10);
}

#[test]
fn test_parse_flat_env_form() {
    let kdl = r#"
group "g" {
    cpu 1024
    memory 1024
    public "api"
    process "api" {
        image "api:latest"
        env "MODE=production"
        probe {
            command "CMD-SHELL" "true"
        }
    }
}
"#;
    let group = parse_kdl_string(kdl, "g".to_string()).unwrap();
    assert_eq!(
        group.process("api").unwrap().environment.get("MODE"),
        Some(&"production".to_string())
    );
}

#[test]
fn test_parse_restart_policy() {
    let kdl = r#"
group "g" {
    cpu 1024
    memory 1024
    public "api"
    process "api" {
        image "api:latest"
        restart "disabled"
        probe {
            command "CMD-SHELL" "true"
        }
    }
}
"#;
    let group = parse_kdl_string(kdl, "g".to_string()).unwrap();
    assert_eq!(group.process("api").unwrap().restart, RestartPolicy::Disabled);
}

#[test]
fn test_missing_image_is_an_error() {
    let kdl = r#"
group "g" {
    cpu 1024
    memory 1024
    public "api"
    process "api" {
        probe {
            command "CMD-SHELL" "true"
        }
    }
}
"#;
    let result = parse_kdl_string(kdl, "g".to_string());
    assert!(matches!(result, Err(GroupError::InvalidConfig(_))));
}

#[test]
fn test_missing_probe_is_an_error() {
    let kdl = r#"
group "g" {
    cpu 1024
    memory 1024
    public "api"
    process "api" {
        image "api:latest"
    }
}
"#;
    let result = parse_kdl_string(kdl, "g".to_string());
    assert!(matches!(result, Err(GroupError::InvalidProbe { .. })));
}

#[test]
fn test_missing_group_node() {
    let result = parse_kdl_string("process \"api\"", "g".to_string());
    assert!(matches!(result, Err(GroupError::InvalidConfig(_))));
}

#[test]
fn test_parse_validates_cycles() {
    let kdl = r#"
group "g" {
    cpu 2048
    memory 2048
    public "a"
    process "a" {
        image "a:latest"
        depends_on "b"
        probe { command "CMD-SHELL" "true" }
    }
    process "b" {
        image "b:latest"
        depends_on "a"
        probe { command "CMD-SHELL" "true" }
    }
}
"#;
    let result = parse_kdl_string(kdl, "g".to_string());
    assert!(matches!(result, Err(GroupError::CircularDependency(_))));
}

#[test]
fn test_parse_validates_resource_budget() {
    let kdl = r#"
group "g" {
    cpu 1024
    memory 1024
    public "api"
    process "api" {
        image "api:latest"
        cpu 2048
        probe { command "CMD-SHELL" "true" }
    }
}
"#;
    let result = parse_kdl_string(kdl, "g".to_string());
    assert!(matches!(
        result,
        Err(GroupError::ResourceBudgetExceeded { kind: "cpu", .. })
    ));
}

#[test]
fn test_parse_kdl_file() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::with_suffix(".kdl").unwrap();
    file.write_all(SPEECH_TO_TEXT.as_bytes()).unwrap();

    let group = parse_kdl_file(file.path()).unwrap();
    assert_eq!(group.name, "speech-to-text");
    assert_eq!(group.processes.len(), 2);
}

#[test]
fn test_parse_kdl_file_not_found() {
    let result = parse_kdl_file("/nonexistent/group.kdl");
    assert!(matches!(result, Err(GroupError::Io(_))));
}
