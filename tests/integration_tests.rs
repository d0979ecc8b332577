/*
 * Integration tests for edeploy-hook
 *
 * These tests drive the hook end to end: JSON request in, processed request
 * out, against real catalog directories and lock files.
 */

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use edeploy_hook::{
    DirectoryCatalog, DirectoryCatalogLoader, DiscoveryError, DiscoveryHook, FileLock,
    HookConfig, LockProvider, NodeInfo, Quota, Result,
};
use mockall::mock;
use serde_json::json;
use tempfile::TempDir;

mock! {
    Lock {}
    impl LockProvider for Lock {
        fn acquire(&self) -> Result<()>;
        fn release(&self) -> Result<()>;
    }
}

// Test utilities
fn write_catalog(dir: &Path, state: &str, specs: &[(&str, &str)]) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("state"), state).unwrap();
    for (name, content) in specs {
        fs::write(dir.join(format!("{}.specs", name)), content).unwrap();
    }
}

fn hook_for(workdir: &TempDir) -> DiscoveryHook {
    DiscoveryHook::from_config(&HookConfig {
        lockname: workdir.path().join("discoverd.lock"),
        configdir: workdir.path().join("edeploy"),
    })
}

fn request(value: serde_json::Value) -> NodeInfo {
    serde_json::from_value(value).unwrap()
}

fn eth0_request() -> NodeInfo {
    request(json!({
        "data": [
            ["network", "eth0", "serial", "99:99:99:99:99:99"],
            ["network", "eth0", "ipv4", "192.168.100.12"],
        ]
    }))
}

struct CountingLock {
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl LockProvider for CountingLock {
    fn acquire(&self) -> Result<()> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_hook_resolves_profile_from_directory() {
    let workdir = TempDir::new().unwrap();
    write_catalog(
        &workdir.path().join("edeploy"),
        r#"[["hw1", "*"]]"#,
        &[(
            "hw1",
            r#"[["network", "$iface", "serial", "$mac"], ["network", "$iface", "ipv4", "$ipv4"]]"#,
        )],
    );

    let node = hook_for(&workdir).process(eth0_request()).unwrap();

    assert_eq!(node.profile.as_deref(), Some("hw1"));
    assert_eq!(node.attribute("iface"), Some("eth0"));
    assert_eq!(node.interfaces["eth0"].mac, "99:99:99:99:99:99");
    assert_eq!(node.interfaces["eth0"].ip, "192.168.100.12");

    let out = serde_json::to_value(&node).unwrap();
    assert!(out.get("data").is_none());
    assert_eq!(out["interfaces"]["eth0"]["ip"], "192.168.100.12");
}

#[test]
fn test_hook_marker_profile() {
    let workdir = TempDir::new().unwrap();
    write_catalog(
        &workdir.path().join("edeploy"),
        r#"[["hw1", "*"]]"#,
        &[("hw1", r#"[["hw1", "*"]]"#)],
    );

    let node = hook_for(&workdir)
        .process(request(json!({
            "data": [["hw1", "rack-3"], ["network", "eth0", "serial", "aa:bb"]]
        })))
        .unwrap();
    assert_eq!(node.profile.as_deref(), Some("hw1"));
    assert_eq!(node.interfaces["eth0"].ip, "none");
}

#[test]
fn test_hook_full_inventory() {
    let workdir = TempDir::new().unwrap();
    write_catalog(
        &workdir.path().join("edeploy"),
        r#"[["compute", "*"]]"#,
        &[("compute", r#"[["cpu", "logical", "number", "$cpus"], ["system", "product", "name", "$product"]]"#)],
    );

    let node = hook_for(&workdir)
        .process(request(json!({
            "ipmi_username": "admin",
            "data": [
                ["memory", "total", "size", "65536"],
                ["cpu", "logical", "number", "32"],
                ["system", "kernel", "arch", "x86_64"],
                ["system", "product", "name", "R640"],
                ["disk", "sda", "size", "480"],
                ["ipmi", "lan", "ip-address", "10.20.0.5"],
                ["network", "eth0", "serial", "aa:00"],
                ["network", "eth0", "ipv4", "10.0.0.10"],
                ["network", "eth1", "serial", "aa:01"],
            ]
        })))
        .unwrap();

    assert_eq!(node.memory_mb.as_deref(), Some("65536"));
    assert_eq!(node.cpus.as_deref(), Some("32"));
    assert_eq!(node.cpu_arch.as_deref(), Some("x86_64"));
    assert_eq!(node.local_gb.as_deref(), Some("480"));
    assert_eq!(node.ipmi_address.as_deref(), Some("10.20.0.5"));
    assert_eq!(node.interfaces.len(), 2);
    assert_eq!(node.interfaces["eth1"].ip, "none");
    assert_eq!(node.profile.as_deref(), Some("compute"));
    assert_eq!(node.attribute("product"), Some("R640"));
    assert_eq!(node.attribute("ipmi_username"), Some("admin"));
}

#[test]
fn test_hook_no_data() {
    let workdir = TempDir::new().unwrap();
    let mut node = request(json!({"ipmi_address": "10.0.0.1"}));
    let before = node.clone();

    let err = hook_for(&workdir).pre_discover(&mut node).unwrap_err();
    assert!(matches!(err, DiscoveryError::MissingData));
    assert_eq!(node, before);
    assert!(!workdir.path().join("discoverd.lock").exists());
}

#[test]
fn test_hook_no_profile() {
    let workdir = TempDir::new().unwrap();
    write_catalog(
        &workdir.path().join("edeploy"),
        r#"[["hw1", "*"]]"#,
        &[("hw1", r#"[["hw1", "*"]]"#)],
    );

    let node = hook_for(&workdir).process(request(json!({"data": []}))).unwrap();
    assert!(node.profile.is_none());
    assert!(node.interfaces.is_empty());
}

#[test]
fn test_incoming_interfaces_are_replaced() {
    let workdir = TempDir::new().unwrap();
    let node = hook_for(&workdir)
        .process(request(json!({
            "data": [],
            "interfaces": {"eth9": {"mac": "x", "ip": "y"}},
        })))
        .unwrap();

    assert!(node.interfaces.is_empty());
}

#[test]
fn test_numeric_attributes_in_request() {
    let workdir = TempDir::new().unwrap();
    let node = hook_for(&workdir)
        .process(request(json!({
            "data": [["cpu", "logical", "number", "8"]],
            "cpus": 4,
            "local_gb": 250,
        })))
        .unwrap();

    let out = serde_json::to_value(&node).unwrap();
    assert_eq!(out["cpus"], "8");
    assert_eq!(out["local_gb"], 250);
    assert!(out.get("data").is_none());
}

#[test]
fn test_missing_catalog_directory_is_not_fatal() {
    let workdir = TempDir::new().unwrap();
    let node = hook_for(&workdir).process(eth0_request()).unwrap();

    assert!(node.profile.is_none());
    assert_eq!(node.interfaces["eth0"].mac, "99:99:99:99:99:99");

    let lock = FileLock::new(workdir.path().join("discoverd.lock"));
    lock.acquire().unwrap();
    lock.release().unwrap();
}

#[test]
fn test_lock_released_once_on_success_and_failure() {
    let workdir = TempDir::new().unwrap();
    let configdir = workdir.path().join("edeploy");
    write_catalog(&configdir, r#"[["hw1", "*"]]"#, &[("hw1", r#"[["hw1", "*"]]"#)]);

    for (facts, expect_profile) in [
        (json!([["hw1", "x"]]), true),
        (json!([["network", "eth0", "serial", "aa"]]), false),
    ] {
        let acquired = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));
        let hook = DiscoveryHook::new(
            Box::new(CountingLock {
                acquired: Arc::clone(&acquired),
                released: Arc::clone(&released),
            }),
            Box::new(DirectoryCatalogLoader),
            &configdir,
        );

        let node = hook.process(request(json!({ "data": facts }))).unwrap();
        assert_eq!(node.profile.is_some(), expect_profile);
        assert_eq!(acquired.load(Ordering::SeqCst), 1);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn test_release_failure_does_not_fail_discovery() {
    let workdir = TempDir::new().unwrap();
    let mut lock = MockLock::new();
    lock.expect_acquire().times(1).returning(|| Ok(()));
    lock.expect_release()
        .times(1)
        .returning(|| Err(DiscoveryError::generic("unlock failed")));

    let hook = DiscoveryHook::new(
        Box::new(lock),
        Box::new(DirectoryCatalogLoader),
        workdir.path().join("absent"),
    );
    let node = hook.process(eth0_request()).unwrap();
    assert!(node.profile.is_none());
}

#[test]
fn test_quota_is_consumed_across_requests() {
    let workdir = TempDir::new().unwrap();
    let configdir = workdir.path().join("edeploy");
    write_catalog(
        &configdir,
        r#"[["hw1", 1], ["spare", "*"]]"#,
        &[("hw1", r#"[["network", "*", "serial", "*"]]"#), ("spare", "[]")],
    );

    let hook = hook_for(&workdir);
    let first = hook.process(eth0_request()).unwrap();
    let second = hook.process(eth0_request()).unwrap();

    assert_eq!(first.profile.as_deref(), Some("hw1"));
    assert_eq!(second.profile.as_deref(), Some("spare"));

    let catalog = DirectoryCatalog::load(&configdir).unwrap();
    assert_eq!(catalog.entries()[0].quota(), Quota::Remaining(0));
    assert_eq!(catalog.entries()[1].quota(), Quota::Unlimited);
}

#[test]
fn test_concurrent_requests_share_quota_safely() {
    let workdir = Arc::new(TempDir::new().unwrap());
    write_catalog(
        &workdir.path().join("edeploy"),
        r#"[["hw1", 3]]"#,
        &[("hw1", r#"[["network", "*", "serial", "*"]]"#)],
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let workdir = Arc::clone(&workdir);
            thread::spawn(move || {
                // each thread opens its own lock file description
                let hook = hook_for(&workdir);
                hook.process(eth0_request()).unwrap().profile
            })
        })
        .collect();

    let matched = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(Option::is_some)
        .count();
    assert_eq!(matched, 3);

    let catalog = DirectoryCatalog::load(&workdir.path().join("edeploy")).unwrap();
    assert_eq!(catalog.entries()[0].quota(), Quota::Remaining(0));
}
