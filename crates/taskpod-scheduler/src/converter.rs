//! ProcessSpec から Docker API パラメータへの変換

// Bollard 0.19.4 の非推奨APIを一時的に使用
#![allow(deprecated)]

use bollard::container::{Config, CreateContainerOptions, NetworkingConfig};
use bollard::models::{EndpointSettings, HostConfig, PortBinding};
use std::collections::HashMap;
use taskpod_core::ProcessSpec;

/// グループインスタンスのネットワーク名を生成
///
/// 同一グループのプロセスは専用ブリッジネットワークを共有し、
/// プロセス名のエイリアスで互いに到達できます。
pub fn get_network_name(group_instance: &str) -> String {
    format!("taskpod-{}", group_instance)
}

/// コンテナ名を生成
pub fn get_container_name(group_instance: &str, process_name: &str) -> String {
    format!("{}-{}", group_instance, process_name)
}

/// ProcessSpecをDockerのコンテナ設定に変換
///
/// CPU/メモリ予約はプロセスごとの第一級フィールドをそのまま
/// コンテナのリソース制限に写します（1024ユニット = 1 vCPU）。
pub fn process_to_container_config(
    group_instance: &str,
    spec: &ProcessSpec,
) -> (Config<String>, CreateContainerOptions<String>) {
    // 環境変数の設定
    let env: Vec<String> = spec
        .environment
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();

    // ポートバインディング（公開ポートは同番号でホストへバインド）
    let mut port_bindings = HashMap::new();
    let mut exposed_ports = HashMap::new();

    if let Some(port) = spec.port {
        let container_port = format!("{}/tcp", port);
        exposed_ports.insert(container_port.clone(), HashMap::new());
        port_bindings.insert(
            container_port,
            Some(vec![PortBinding {
                host_ip: Some("127.0.0.1".to_string()),
                host_port: Some(port.to_string()),
            }]),
        );
    }

    let network_name = get_network_name(group_instance);

    let host_config = Some(HostConfig {
        port_bindings: Some(port_bindings),
        network_mode: Some(network_name.clone()),
        // 予約値をDockerのリソース制限に変換
        nano_cpus: if spec.cpu > 0 {
            Some(spec.cpu as i64 * 1_000_000_000 / 1024)
        } else {
            None
        },
        memory: if spec.memory_mib > 0 {
            Some(spec.memory_mib as i64 * 1024 * 1024)
        } else {
            None
        },
        ..Default::default()
    });

    // ラベル設定
    let mut labels = HashMap::new();
    labels.insert("taskpod.group".to_string(), group_instance.to_string());
    labels.insert("taskpod.process".to_string(), spec.name.clone());
    if let Some(prefix) = &spec.log_prefix {
        labels.insert("taskpod.log-prefix".to_string(), prefix.clone());
    }

    // ネットワーク設定（プロセス名でエイリアス）
    let mut endpoints = HashMap::new();
    endpoints.insert(
        network_name,
        EndpointSettings {
            aliases: Some(vec![spec.name.clone()]),
            ..Default::default()
        },
    );
    let networking_config = Some(NetworkingConfig {
        endpoints_config: endpoints,
    });

    let config = Config {
        image: Some(spec.image.clone()),
        env: Some(env),
        exposed_ports: Some(exposed_ports),
        host_config,
        labels: Some(labels),
        networking_config,
        ..Default::default()
    };

    let options = CreateContainerOptions {
        name: get_container_name(group_instance, &spec.name),
        platform: None,
    };

    (config, options)
}
