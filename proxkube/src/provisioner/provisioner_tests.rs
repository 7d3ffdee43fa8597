//! Scenario tests for the provisioning stages.

#[cfg(test)]
mod tests {
    use crate::errors::{HypervisorError, ProvisionError, RemoteError, StoreError};
    use crate::events::EventState;
    use crate::hypervisor::VmStatus;
    use crate::model::{Addon, Cluster, HelmApp, K8sResource, KeyPair, NodeType, ProvisionRequest, ProvisionStages};
    use crate::provisioner::vm::OS_UPGRADE;
    use crate::provisioner::Provisioner;
    use crate::remote::ExecutionResult;
    use crate::store::{ClusterStore, MockClusterStore};
    use crate::testing::{fast_config, node_ip, test_cluster, HypervisorCall, HypervisorOp, TestHarness};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const ADD_NODE: &str = "sudo microk8s add-node --format json";
    const KUBE_CONFIG: &str = "sudo microk8s config";

    fn states(harness: &TestHarness, name: &str) -> Vec<EventState> {
        harness
            .events
            .get()
            .into_iter()
            .filter(|e| e.name == name)
            .map(|e| e.state)
            .collect()
    }

    fn details(harness: &TestHarness, name: &str) -> Vec<String> {
        harness
            .events
            .get()
            .into_iter()
            .filter(|e| e.name == name && !e.details.is_empty())
            .map(|e| e.details)
            .collect()
    }

    fn call_kinds(calls: &[HypervisorCall]) -> Vec<&'static str> {
        calls
            .iter()
            .map(|c| match c {
                HypervisorCall::Create(_) => "create",
                HypervisorCall::Update(_) => "update",
                HypervisorCall::Resize(_) => "resize",
                HypervisorCall::Start(_) => "start",
                HypervisorCall::Shutdown(_) => "shutdown",
                HypervisorCall::Stop(_) => "stop",
                HypervisorCall::Status(_) => "status",
                HypervisorCall::Delete(_) => "delete",
            })
            .collect()
    }

    async fn run(harness: &TestHarness, cluster: Cluster, stages: ProvisionStages) -> Result<(), ProvisionError> {
        harness.store.save_cluster(&cluster).await.unwrap();
        harness
            .service
            .create_cluster(ProvisionRequest::new(cluster, stages))
            .await
    }

    fn join_only() -> ProvisionStages {
        ProvisionStages {
            join_nodes_to_cluster: true,
            ..ProvisionStages::none()
        }
    }

    fn create_only() -> ProvisionStages {
        ProvisionStages {
            create_virtual_machines: true,
            ..ProvisionStages::none()
        }
    }

    #[tokio::test]
    async fn test_join_uses_lowest_master_and_flags_workers() {
        let harness = TestHarness::new();
        let cluster = test_cluster(&[
            (50, NodeType::Master),
            (10, NodeType::Master),
            (30, NodeType::Worker),
        ]);
        let master = harness.node(10);
        master.respond_always(
            ADD_NODE,
            ExecutionResult::success(r#"{"token": "t0k3n", "urls": ["10.0.0.20:25000/t0k3n"]}"#),
        );

        run(&harness, cluster, join_only()).await.unwrap();

        assert_eq!(
            master.commands(),
            vec![
                ADD_NODE.to_string(),
                "echo '10.0.0.60 demo-master-50' | sudo tee -a /etc/hosts".to_string(),
                ADD_NODE.to_string(),
                "echo '10.0.0.40 demo-worker-30' | sudo tee -a /etc/hosts".to_string(),
                KUBE_CONFIG.to_string(),
            ]
        );
        assert_eq!(
            harness.node(50).commands(),
            vec!["sudo microk8s join 10.0.0.20:25000/t0k3n".to_string()]
        );
        assert_eq!(
            harness.node(30).commands(),
            vec!["sudo microk8s join 10.0.0.20:25000/t0k3n --worker".to_string()]
        );
        assert_eq!(
            states(&harness, "[VM30] Join node to cluster"),
            vec![EventState::Started, EventState::Finished]
        );
    }

    #[tokio::test]
    async fn test_single_node_has_nothing_to_join() {
        let harness = TestHarness::new();
        let cluster = test_cluster(&[(101, NodeType::Master)]);

        run(&harness, cluster, join_only()).await.unwrap();

        let events: Vec<_> = harness
            .events
            .get()
            .into_iter()
            .filter(|e| e.name == "No nodes to join")
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].state, EventState::Started);
        assert_eq!(events[1].state, EventState::Finished);
        assert_eq!(events[0].correlation_id, events[1].correlation_id);
        assert_eq!(harness.node(101).commands(), vec![KUBE_CONFIG.to_string()]);
    }

    #[tokio::test]
    async fn test_join_without_master_fails() {
        let harness = TestHarness::new();
        let cluster = test_cluster(&[(101, NodeType::Worker), (102, NodeType::Worker)]);

        let err = run(&harness, cluster, join_only()).await.unwrap_err();

        assert!(matches!(err, ProvisionError::NoMasterNode { .. }));
        assert_eq!(
            states(&harness, "Find first master node"),
            vec![EventState::Started, EventState::Error]
        );
    }

    #[tokio::test]
    async fn test_malformed_join_token_stops_join() {
        let harness = TestHarness::new();
        let cluster = test_cluster(&[(101, NodeType::Master), (102, NodeType::Worker)]);
        harness
            .node(101)
            .respond(ADD_NODE, ExecutionResult::success("Join node with: microk8s join ..."));

        let err = run(&harness, cluster, join_only()).await.unwrap_err();

        assert!(matches!(err, ProvisionError::Protocol(_)));
        assert_eq!(
            states(&harness, "[VM102] Generate join token"),
            vec![EventState::Started, EventState::Error]
        );
        assert!(harness.node(102).commands().is_empty());
    }

    #[tokio::test]
    async fn test_join_token_without_url() {
        let harness = TestHarness::new();
        let cluster = test_cluster(&[(101, NodeType::Master), (102, NodeType::Worker)]);
        harness
            .node(101)
            .respond(ADD_NODE, ExecutionResult::success(r#"{"token": "t0k3n", "urls": []}"#));

        let err = run(&harness, cluster, join_only()).await.unwrap_err();

        assert!(matches!(err, ProvisionError::MissingJoinUrl { vmid: 102 }));
    }

    #[tokio::test]
    async fn test_create_vm_transport_error_halts_pipeline() {
        let harness = TestHarness::new();
        let cluster = test_cluster(&[(101, NodeType::Master), (102, NodeType::Worker)]);
        harness.hypervisor.fail(
            HypervisorOp::Create,
            101,
            HypervisorError::Transport("connection reset".to_string()),
        );

        let err = run(&harness, cluster, create_only()).await.unwrap_err();

        assert!(matches!(err, ProvisionError::Hypervisor(HypervisorError::Transport(_))));
        assert_eq!(
            states(&harness, "[VM101] Create Virtual Machine"),
            vec![EventState::Started, EventState::Error]
        );
        assert_eq!(
            details(&harness, "[VM101] Create Virtual Machine"),
            vec!["Hypervisor transport error: connection reset".to_string()]
        );
        assert!(states(&harness, "[VM101] Import disk").is_empty());
        assert!(states(&harness, "Start virtual machine").is_empty());
        assert!(!harness
            .hypervisor
            .calls()
            .iter()
            .any(|c| matches!(c, HypervisorCall::Start(_))));
    }

    #[tokio::test]
    async fn test_used_vmid_is_rejected() {
        let harness = TestHarness::new();
        harness.hypervisor.reserve_id(101);
        let cluster = test_cluster(&[(101, NodeType::Master)]);

        let err = run(&harness, cluster, create_only()).await.unwrap_err();

        assert!(matches!(err, ProvisionError::VmIdInUse(101)));
        assert!(harness.hypervisor.calls().is_empty());
        assert_eq!(
            states(&harness, "Check availability of VM ids"),
            vec![EventState::Started, EventState::Error]
        );
    }

    #[tokio::test]
    async fn test_vm_lifecycle() {
        let harness = TestHarness::new();
        let cluster = test_cluster(&[(101, NodeType::Master)]);

        run(&harness, cluster, create_only()).await.unwrap();

        let calls = harness.hypervisor.calls_for(101);
        assert_eq!(
            call_kinds(&calls),
            vec![
                "create", "update", "resize", "update", "update", "update", "update", "start",
                "shutdown", "status", "start",
            ]
        );
        let HypervisorCall::Create(created) = &calls[0] else {
            panic!("first call should create the VM");
        };
        assert_eq!(created.name.as_deref(), Some("demo-master-101"));
        assert_eq!(created.net0.as_deref(), Some("model=virtio,bridge=vmbr0"));
        let HypervisorCall::Update(cloud_init) = &calls[6] else {
            panic!("cloud-init update expected");
        };
        assert_eq!(cloud_init.ipconfig0.as_deref(), Some("ip=10.0.0.11/24,gw=10.0.0.1"));
        assert_eq!(cloud_init.ciuser.as_deref(), Some("ubuntu"));

        assert_eq!(
            harness.host.commands(),
            vec!["qm importdisk 101 /var/k4p/jammy-server-cloudimg-amd64.img local-lvm".to_string()]
        );
        assert_eq!(
            harness.node(101).commands(),
            vec!["uptime".to_string(), OS_UPGRADE.to_string(), "uptime".to_string()]
        );
    }

    #[tokio::test]
    async fn test_ignored_shutdown_falls_back_to_stop() {
        let harness = TestHarness::new();
        harness.hypervisor.ignore_shutdown(101);
        let cluster = test_cluster(&[(101, NodeType::Master)]);

        run(&harness, cluster, create_only()).await.unwrap();

        let kinds = call_kinds(&harness.hypervisor.calls_for(101));
        let shutdown = kinds.iter().position(|k| *k == "shutdown").unwrap();
        assert_eq!(
            kinds[shutdown..].to_vec(),
            vec!["shutdown", "status", "status", "status", "stop", "status", "start"]
        );
        assert_eq!(
            states(&harness, "Shutdown virtual machine"),
            vec![EventState::Started, EventState::Finished]
        );
    }

    #[tokio::test]
    async fn test_unreachable_vm_fails_start() {
        let harness = TestHarness::new();
        harness
            .node(101)
            .fail_always("uptime", RemoteError::transport("connection refused"));
        let cluster = test_cluster(&[(101, NodeType::Master)]);

        let err = run(&harness, cluster, create_only()).await.unwrap_err();

        assert!(matches!(err, ProvisionError::Remote(RemoteError::Transport(_))));
        assert_eq!(harness.node(101).count("uptime"), 3);
        assert_eq!(
            states(&harness, "Start virtual machine"),
            vec![EventState::Started, EventState::Error]
        );
        assert!(states(&harness, "Update virtual machine OS").is_empty());
    }

    #[tokio::test]
    async fn test_setup_enables_iscsid() {
        let harness = TestHarness::new();
        let cluster = test_cluster(&[(101, NodeType::Master), (102, NodeType::Worker)]);
        let stages = ProvisionStages {
            setup_virtual_machines: true,
            ..ProvisionStages::none()
        };

        run(&harness, cluster, stages).await.unwrap();

        for vmid in [101, 102] {
            assert_eq!(
                harness.node(vmid).commands(),
                vec!["sudo systemctl enable iscsid".to_string()]
            );
        }
        let mut setup = details(&harness, "Setup virtual machine OS");
        setup.sort();
        assert_eq!(
            setup,
            vec![
                "VM ID: 101".to_string(),
                "VM ID: 102".to_string(),
                "[iscsid] service enabled".to_string(),
                "[iscsid] service enabled".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_install_kubernetes_and_store_kube_config() {
        let harness = TestHarness::with_config(fast_config().with_kubernetes_channel("1.28/stable"));
        let cluster = test_cluster(&[(101, NodeType::Master), (102, NodeType::Worker)]);
        harness
            .node(101)
            .respond(KUBE_CONFIG, ExecutionResult::success("apiVersion: v1\nkind: Config\n"));
        let stages = ProvisionStages {
            install_kubernetes: true,
            ..ProvisionStages::none()
        };

        run(&harness, cluster, stages).await.unwrap();

        assert_eq!(
            harness.node(102).commands(),
            vec![
                "sudo snap install microk8s --classic --channel=1.28/stable".to_string(),
                "sudo microk8s status --wait-ready".to_string(),
            ]
        );
        let stored = harness.store.load_cluster("demo").await.unwrap();
        assert_eq!(stored.kube_config.as_deref(), Some("apiVersion: v1\nkind: Config\n"));
        assert_eq!(
            states(&harness, "Add Kubernetes config to project file"),
            vec![EventState::Started, EventState::Finished]
        );
    }

    #[tokio::test]
    async fn test_missing_key_pair_is_generated_and_saved() {
        let harness = TestHarness::new();
        let cluster = test_cluster(&[(101, NodeType::Master)]).with_ssh_key(KeyPair::default());

        run(&harness, cluster, ProvisionStages::none()).await.unwrap();

        assert_eq!(harness.keys.generated(), 1);
        let stored = harness.store.load_cluster("demo").await.unwrap();
        assert!(!stored.ssh_key.is_empty());
    }

    #[tokio::test]
    async fn test_existing_key_pair_is_kept() {
        let harness = TestHarness::new();
        let cluster = test_cluster(&[(101, NodeType::Master)]);

        harness
            .service
            .create_cluster(ProvisionRequest::new(cluster, ProvisionStages::none()))
            .await
            .unwrap();

        assert_eq!(harness.keys.generated(), 0);
        assert!(harness.store.is_empty());
        assert!(harness.events.is_empty());
    }

    #[tokio::test]
    async fn test_addons_with_retry_and_manifests() {
        let harness = TestHarness::new();
        let mut cluster = test_cluster(&[(101, NodeType::Master)]);
        cluster.addons = vec![
            Addon::new("dns"),
            Addon::new("metallb")
                .with_args("10.0.0.100-10.0.0.120")
                .with_manifest("apiVersion: v1\nkind: ConfigMap"),
        ];
        let master = harness.node(101);
        master.respond("sudo microk8s enable dns", ExecutionResult::failure(1, "not ready"));
        let stages = ProvisionStages {
            install_addons: true,
            ..ProvisionStages::none()
        };

        run(&harness, cluster, stages).await.unwrap();

        assert_eq!(
            master.commands(),
            vec![
                "sudo microk8s enable dns".to_string(),
                "sudo microk8s enable dns".to_string(),
                "sudo microk8s enable metallb 10.0.0.100-10.0.0.120".to_string(),
                "tee /tmp/metallb-0.yaml > /dev/null".to_string(),
                "sudo microk8s.kubectl apply -f /tmp/metallb-0.yaml".to_string(),
                "sudo rm -f /tmp/metallb-0.yaml".to_string(),
            ]
        );
        assert_eq!(
            master.stdin_of("tee /tmp/metallb-0.yaml > /dev/null").as_deref(),
            Some("apiVersion: v1\nkind: ConfigMap")
        );
    }

    #[tokio::test]
    async fn test_failing_addon_stops_stage() {
        let harness = TestHarness::new();
        let cluster = test_cluster(&[(101, NodeType::Master)]);
        let master = harness.node(101);
        master.respond_always("sudo microk8s enable dns", ExecutionResult::failure(1, "addon not found"));
        let stages = ProvisionStages {
            install_addons: true,
            install_helm_apps: true,
            ..ProvisionStages::none()
        };

        let err = run(&harness, cluster, stages).await.unwrap_err();

        assert_eq!(err.to_string(), "[1] - addon not found");
        assert_eq!(master.count("sudo microk8s enable dns"), 2);
        assert_eq!(
            states(&harness, "Enable addon [dns]"),
            vec![EventState::Started, EventState::Error]
        );
        assert!(states(&harness, "Enable addon [helm3]").is_empty());
    }

    fn longhorn() -> HelmApp {
        HelmApp {
            chart_name: "longhorn".to_string(),
            repository: "https://charts.longhorn.io".to_string(),
            release_name: "longhorn".to_string(),
            namespace: "longhorn-system".to_string(),
            value_file_content: Some("defaultSettings:\n  defaultReplicaCount: 2\n".to_string()),
            wait: true,
            ..HelmApp::default()
        }
    }

    #[tokio::test]
    async fn test_helm_app_with_values_file() {
        let harness = TestHarness::new();
        let mut cluster = test_cluster(&[(101, NodeType::Master)]);
        cluster.helm_apps = vec![longhorn()];
        let stages = ProvisionStages {
            install_helm_apps: true,
            ..ProvisionStages::none()
        };

        run(&harness, cluster, stages).await.unwrap();

        let master = harness.node(101);
        assert_eq!(
            master.commands(),
            vec![
                "sudo microk8s.helm3 repo add longhorn https://charts.longhorn.io".to_string(),
                "sudo microk8s.helm3 repo update".to_string(),
                "tee /tmp/longhorn.yaml > /dev/null".to_string(),
                "sudo microk8s.helm3 upgrade --install longhorn longhorn/longhorn \
                 --namespace longhorn-system --create-namespace -f /tmp/longhorn.yaml --wait"
                    .to_string(),
                "sudo rm -f /tmp/longhorn.yaml".to_string(),
            ]
        );
        assert_eq!(
            master.stdin_of("tee /tmp/longhorn.yaml > /dev/null").as_deref(),
            Some("defaultSettings:\n  defaultReplicaCount: 2\n")
        );
        assert_eq!(
            states(&harness, "Install Helm app [longhorn]"),
            vec![EventState::Started, EventState::Finished]
        );
    }

    #[tokio::test]
    async fn test_failing_helm_repo_reports_error() {
        let harness = TestHarness::new();
        let mut cluster = test_cluster(&[(101, NodeType::Master)]);
        cluster.helm_apps = vec![longhorn()];
        let master = harness.node(101);
        master.respond(
            "sudo microk8s.helm3 repo add longhorn https://charts.longhorn.io",
            ExecutionResult::failure(1, "Error: not a valid chart repository"),
        );
        let stages = ProvisionStages {
            install_helm_apps: true,
            ..ProvisionStages::none()
        };

        let err = run(&harness, cluster, stages).await.unwrap_err();

        assert!(matches!(err, ProvisionError::Remote(RemoteError::CommandFailed { code: 1, .. })));
        assert_eq!(master.commands().len(), 1);
        assert_eq!(
            details(&harness, "Install Helm app [longhorn]"),
            vec!["[1] - Error: not a valid chart repository".to_string()]
        );
    }

    #[tokio::test]
    async fn test_k8s_resources_are_applied() {
        let harness = TestHarness::new();
        let mut cluster = test_cluster(&[(101, NodeType::Master)]);
        cluster.k8s_resources = vec![
            K8sResource {
                name: "demo namespace".to_string(),
                content: "apiVersion: v1\nkind: Namespace".to_string(),
                ..K8sResource::default()
            },
            K8sResource {
                name: "empty".to_string(),
                content: "  ".to_string(),
                ..K8sResource::default()
            },
        ];
        let stages = ProvisionStages {
            install_k8s_resources: true,
            ..ProvisionStages::none()
        };

        run(&harness, cluster, stages).await.unwrap();

        assert_eq!(
            harness.node(101).commands(),
            vec![
                "tee /tmp/demo_namespace_k8s_resource.yaml > /dev/null".to_string(),
                "sudo microk8s.kubectl apply -f /tmp/demo_namespace_k8s_resource.yaml".to_string(),
                "sudo rm -f /tmp/demo_namespace_k8s_resource.yaml".to_string(),
            ]
        );
        assert_eq!(
            states(&harness, "Apply K8s resource [empty]"),
            vec![EventState::Started, EventState::Finished]
        );
    }

    #[tokio::test]
    async fn test_task_log_after_run() {
        let harness = TestHarness::new();
        let cluster = test_cluster(&[(101, NodeType::Master)]);

        run(&harness, cluster, join_only()).await.unwrap();

        let tasks = harness.service.get_task_log();
        let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tasks.len(), 3);
        assert!(names.contains(&"No nodes to join"));
        assert!(names.contains(&"Get KubeConfig from cluster"));
        assert!(tasks.iter().all(|t| t.state == EventState::Finished));
    }

    fn error_details(harness: &TestHarness) -> Vec<(String, String)> {
        harness
            .events
            .get()
            .into_iter()
            .filter(|e| e.state == EventState::Error)
            .map(|e| (e.name, e.details))
            .collect()
    }

    #[tokio::test]
    async fn test_refused_node_is_reported_in_install_session() {
        let harness = TestHarness::new();
        let cluster = test_cluster(&[(101, NodeType::Master), (102, NodeType::Worker)]);
        harness.connector.refuse(node_ip(101), "no route to host");
        let stages = ProvisionStages {
            install_kubernetes: true,
            ..ProvisionStages::none()
        };

        let err = run(&harness, cluster, stages).await.unwrap_err();

        assert_eq!(err.to_string(), "Transport error: no route to host");
        assert_eq!(
            states(&harness, "[VM101] Install Kubernetes"),
            vec![EventState::Started, EventState::Error]
        );
        assert_eq!(
            error_details(&harness),
            vec![(
                "[VM101] Install Kubernetes".to_string(),
                "Transport error: no route to host".to_string()
            )]
        );
        assert!(harness
            .service
            .get_task_log()
            .iter()
            .any(|t| t.name == "[VM101] Install Kubernetes" && t.state == EventState::Error));
    }

    #[tokio::test]
    async fn test_refused_master_is_reported_in_join_session() {
        let harness = TestHarness::new();
        let cluster = test_cluster(&[(101, NodeType::Master), (102, NodeType::Worker)]);
        harness.connector.refuse(node_ip(101), "connection refused");

        let err = run(&harness, cluster, join_only()).await.unwrap_err();

        assert!(matches!(err, ProvisionError::Remote(RemoteError::Transport(_))));
        assert_eq!(
            states(&harness, "[VM102] Generate join token"),
            vec![EventState::Started, EventState::Error]
        );
        assert!(harness.node(102).commands().is_empty());
    }

    #[tokio::test]
    async fn test_refused_master_is_reported_in_kube_config_session() {
        let harness = TestHarness::new();
        let cluster = test_cluster(&[(101, NodeType::Master)]);
        harness.connector.refuse(node_ip(101), "connection refused");

        run(&harness, cluster, join_only()).await.unwrap_err();

        assert_eq!(
            states(&harness, "Get KubeConfig from cluster"),
            vec![EventState::Started, EventState::Error]
        );
        assert!(states(&harness, "Add Kubernetes config to project file").is_empty());
    }

    #[tokio::test]
    async fn test_refused_master_is_reported_in_addon_session() {
        let harness = TestHarness::new();
        let mut cluster = test_cluster(&[(101, NodeType::Master)]);
        cluster.addons = vec![Addon::new("dns")];
        harness.connector.refuse(node_ip(101), "connection refused");
        let stages = ProvisionStages {
            install_addons: true,
            ..ProvisionStages::none()
        };

        run(&harness, cluster, stages).await.unwrap_err();

        assert_eq!(
            error_details(&harness),
            vec![(
                "Enable addon [dns]".to_string(),
                "Transport error: connection refused".to_string()
            )]
        );
        assert_eq!(harness.connector.connection_count(), 0);
    }

    fn provisioner_with_store(harness: &TestHarness, store: MockClusterStore) -> Provisioner {
        Provisioner::new(
            harness.hypervisor.clone(),
            harness.host.clone(),
            harness.connector.clone(),
            Arc::new(store),
            harness.keys.clone(),
            fast_config(),
            harness.events.clone(),
        )
    }

    #[tokio::test]
    async fn test_failed_key_save_is_reported() {
        let harness = TestHarness::new();
        let mut store = MockClusterStore::new();
        store
            .expect_save_cluster()
            .times(1)
            .returning(|_| Err(StoreError::Backend("disk full".into())));
        let provisioner = provisioner_with_store(&harness, store);
        let mut cluster = test_cluster(&[(101, NodeType::Master)]);
        cluster.ssh_key = KeyPair::default();

        let err = provisioner
            .create_cluster(ProvisionRequest::new(cluster, ProvisionStages::all()))
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Store(StoreError::Backend(_))));
        assert_eq!(harness.keys.generated(), 1);
        assert_eq!(
            error_details(&harness),
            vec![(
                "Generate SSH key pair".to_string(),
                "Store backend error: disk full".to_string()
            )]
        );
        assert!(harness.hypervisor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_cluster_load_is_reported_when_storing_kube_config() {
        let harness = TestHarness::new();
        let mut store = MockClusterStore::new();
        store
            .expect_load_cluster()
            .times(1)
            .returning(|name| Err(StoreError::ClusterNotFound(name.to_string())));
        store.expect_save_cluster().never();
        let provisioner = provisioner_with_store(&harness, store);
        let cluster = test_cluster(&[(101, NodeType::Master)]);

        let err = provisioner
            .create_cluster(ProvisionRequest::new(cluster, join_only()))
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Store(StoreError::ClusterNotFound(_))));
        assert_eq!(
            states(&harness, "Add Kubernetes config to project file"),
            vec![EventState::Started, EventState::Error]
        );
        assert_eq!(
            details(&harness, "Add Kubernetes config to project file"),
            vec!["Cluster [demo] not found".to_string()]
        );
    }

    async fn stored_cluster(harness: &TestHarness) {
        let cluster = test_cluster(&[(101, NodeType::Master), (102, NodeType::Worker)]);
        harness.store.save_cluster(&cluster).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_cluster_destroys_vms_and_removes_cluster() {
        let harness = TestHarness::new();
        stored_cluster(&harness).await;
        harness.hypervisor.add_vm(101, VmStatus::Running);
        harness.hypervisor.add_vm(102, VmStatus::Stopped);

        harness.service.delete_cluster("demo").await.unwrap();

        assert_eq!(
            call_kinds(&harness.hypervisor.calls_for(101)),
            vec!["status", "shutdown", "status", "delete"]
        );
        assert_eq!(call_kinds(&harness.hypervisor.calls_for(102)), vec!["status", "delete"]);
        assert_eq!(harness.hypervisor.status_of(101), None);
        assert!(harness.store.is_empty());
        assert_eq!(
            states(&harness, "Shutdown virtual machine"),
            vec![EventState::Started, EventState::Finished]
        );
        assert_eq!(
            states(&harness, "Remove cluster [demo]"),
            vec![EventState::Started, EventState::Finished]
        );
        assert!(error_details(&harness).is_empty());
    }

    #[tokio::test]
    async fn test_delete_cluster_skips_missing_vm() {
        let harness = TestHarness::new();
        stored_cluster(&harness).await;
        harness.hypervisor.add_vm(101, VmStatus::Running);

        harness.service.delete_cluster("demo").await.unwrap();

        assert!(harness.hypervisor.calls_for(102).is_empty());
        assert_eq!(
            states(&harness, "Delete virtual machine"),
            vec![EventState::Started, EventState::Finished]
        );
        assert!(harness.store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_cluster_stops_vm_ignoring_shutdown() {
        let harness = TestHarness::new();
        stored_cluster(&harness).await;
        harness.hypervisor.add_vm(101, VmStatus::Running);
        harness.hypervisor.add_vm(102, VmStatus::Running);
        harness.hypervisor.ignore_shutdown(102);

        harness.service.delete_cluster("demo").await.unwrap();

        assert_eq!(
            call_kinds(&harness.hypervisor.calls_for(102)),
            vec!["status", "shutdown", "status", "status", "status", "stop", "status", "delete"]
        );
        assert!(harness.store.is_empty());
    }

    #[tokio::test]
    async fn test_failed_vm_delete_keeps_cluster() {
        let harness = TestHarness::new();
        stored_cluster(&harness).await;
        harness.hypervisor.add_vm(101, VmStatus::Stopped);
        harness.hypervisor.add_vm(102, VmStatus::Stopped);
        harness.hypervisor.fail(
            HypervisorOp::Delete,
            102,
            HypervisorError::Status {
                status: 500,
                body: "VM is locked (backup)".into(),
            },
        );

        let err = harness.service.delete_cluster("demo").await.unwrap_err();

        assert!(matches!(err, ProvisionError::Hypervisor(_)));
        assert_eq!(error_details(&harness).len(), 1);
        assert_eq!(error_details(&harness)[0].0, "Delete virtual machine");
        assert_eq!(harness.hypervisor.status_of(101), None);
        assert_eq!(harness.store.len(), 1);
        assert!(states(&harness, "Remove cluster [demo]").is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_cluster() {
        let harness = TestHarness::new();

        let err = harness.service.delete_cluster("ghost").await.unwrap_err();

        assert!(matches!(err, ProvisionError::Store(StoreError::ClusterNotFound(_))));
        assert_eq!(
            states(&harness, "Load cluster [ghost]"),
            vec![EventState::Started, EventState::Error]
        );
        assert!(harness.hypervisor.calls().is_empty());
    }
}
