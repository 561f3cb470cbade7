//! End-to-end install tests against a scripted engine

mod support;

use llb_yarn::gateway::{BuildOpts, GatewayError, MemoryRef, MockClient, SolveResult};
use llb_yarn::llb::caps::CAP_META_IGNORE_CACHE;
use llb_yarn::llb::{pb, CapSet, Definition, ATTR_FOLLOW_PATHS, ATTR_INCLUDE_PATTERNS};
use llb_yarn::{install, InstallError, Stage};
use std::sync::Arc;
use std::time::Duration;
use support::{copies, empty_result, image_identifiers, install_op, manifest_result};
use tokio_util::sync::CancellationToken;

fn client(opts: BuildOpts) -> MockClient {
    MockClient::new(opts)
}

fn default_opts() -> BuildOpts {
    BuildOpts::new(CapSet::all())
}

fn local_attrs(definition: &Definition) -> Vec<std::collections::BTreeMap<String, String>> {
    definition
        .ops()
        .unwrap()
        .into_iter()
        .filter_map(|op| match op.op {
            Some(pb::op::Op::Source(source)) if source.identifier == "local://context" => {
                Some(source.attrs)
            }
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_default_image() {
    let client = client(default_opts());
    client.push_result(manifest_result("{}"));
    client.push_result(empty_result());

    install(&client, &CancellationToken::new()).await.unwrap();

    let requests = client.requests();
    assert_eq!(
        image_identifiers(&requests[1]),
        vec!["docker-image://docker.io/library/node:alpine"]
    );
}

#[tokio::test]
async fn test_custom_image() {
    let client = client(default_opts().with_opt("yarn", "custom/image:tag"));
    client.push_result(manifest_result("{}"));
    client.push_result(empty_result());

    install(&client, &CancellationToken::new()).await.unwrap();

    let requests = client.requests();
    assert_eq!(
        image_identifiers(&requests[1]),
        vec!["docker-image://docker.io/custom/image:tag"]
    );
}

#[tokio::test]
async fn test_discovery_failure_stops_install() {
    let client = client(default_opts());
    client.push_error(GatewayError::Solve("context not found".to_string()));
    client.push_result(empty_result());

    let err = install(&client, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        InstallError::Resolve {
            stage: Stage::Discovery,
            ..
        }
    ));
    assert_eq!(client.solve_count(), 1);
}

#[tokio::test]
async fn test_multi_platform_discovery_result_is_ambiguous() {
    let client = client(default_opts());
    let mut result = SolveResult::new();
    result.add_ref("linux/amd64", Arc::new(MemoryRef::new()));
    result.add_ref("linux/arm64", Arc::new(MemoryRef::new()));
    client.push_result(result);

    let err = install(&client, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        InstallError::AmbiguousResult {
            stage: Stage::Discovery,
            ..
        }
    ));
    assert_eq!(client.solve_count(), 1);
}

#[tokio::test]
async fn test_definitions_carry_no_platform() {
    let client = client(default_opts());
    client.push_result(manifest_result(r#"{"workspaces": ["packages/a"]}"#));
    client.push_result(empty_result());

    install(&client, &CancellationToken::new()).await.unwrap();

    for request in client.requests() {
        for op in request.definition.ops().unwrap() {
            assert!(op.platform.is_none());
        }
    }
}

#[tokio::test]
async fn test_discovery_definition_follows_inputs() {
    let client = client(default_opts());
    client.push_result(manifest_result("{}"));
    client.push_result(empty_result());

    install(&client, &CancellationToken::new()).await.unwrap();

    let discovery = &client.requests()[0].definition;
    // local source plus terminal
    assert_eq!(discovery.len(), 2);
    let attrs = local_attrs(discovery);
    assert_eq!(attrs.len(), 1);
    assert_eq!(
        attrs[0].get(ATTR_FOLLOW_PATHS).map(String::as_str),
        Some(r#"["package.json","yarn.lock",".npmrc",".yarnrc"]"#)
    );
}

#[tokio::test]
async fn test_npm_lockfile_is_followed() {
    let client = client(default_opts().with_opt("lockfile", "package-lock.json"));
    client.push_result(manifest_result("{}"));
    client.push_result(empty_result());

    install(&client, &CancellationToken::new()).await.unwrap();

    let attrs = local_attrs(&client.requests()[0].definition);
    assert_eq!(
        attrs[0].get(ATTR_FOLLOW_PATHS).map(String::as_str),
        Some(r#"["package.json","package-lock.json",".npmrc",".yarnrc"]"#)
    );
}

#[tokio::test]
async fn test_workspaces_layered_into_final_definition() {
    let client = client(default_opts());
    client.push_result(manifest_result(
        r#"{"workspaces": ["packages/a", "packages/b"]}"#,
    ));
    client.push_result(empty_result());

    install(&client, &CancellationToken::new()).await.unwrap();

    let final_definition = &client.requests()[1].definition;
    let attrs = local_attrs(final_definition);
    assert_eq!(attrs.len(), 2);
    assert!(attrs.iter().any(|a| a.get(ATTR_INCLUDE_PATTERNS).map(String::as_str)
        == Some(r#"["packages/a/package.json","packages/b/package.json"]"#)));

    let copies = copies(final_definition);
    assert_eq!(copies.len(), 3);
    assert_eq!(copies[2].src, "/opt/output/node_modules");
    assert_eq!(copies[2].dest, "/");
}

#[tokio::test]
async fn test_workspaces_disabled() {
    let client = client(default_opts().with_opt("workspaces", "false"));
    client.push_result(empty_result());

    install(&client, &CancellationToken::new()).await.unwrap();

    assert_eq!(client.solve_count(), 1);
    assert_eq!(copies(&client.requests()[0].definition).len(), 2);
}

#[tokio::test]
async fn test_cache_mount_and_no_cache() {
    for no_cache in [false, true] {
        let mut opts = default_opts();
        if no_cache {
            opts = opts.with_opt("no-cache", "");
        }
        let client = client(opts);
        client.push_result(manifest_result("{}"));
        client.push_result(empty_result());

        install(&client, &CancellationToken::new()).await.unwrap();

        let (exec, metadata) = install_op(&client.requests()[1].definition);
        let caches: Vec<_> = exec.mounts.iter().filter_map(|m| m.cache_opt.as_ref()).collect();
        assert_eq!(caches.len(), 1);
        assert_eq!(caches[0].id, "openllb/llb-yarn");
        assert_eq!(caches[0].sharing, pb::CacheSharingOpt::Shared as i32);
        assert_eq!(metadata.ignore_cache, no_cache);
    }
}

#[tokio::test]
async fn test_no_cache_requires_capability() {
    let client = client(
        BuildOpts::new(CapSet::all().without(CAP_META_IGNORE_CACHE)).with_opt("no-cache", ""),
    );
    client.push_result(manifest_result("{}"));
    client.push_result(empty_result());

    let err = install(&client, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        InstallError::Compose {
            stage: Stage::Final,
            ..
        }
    ));
    assert_eq!(client.solve_count(), 1);
}

#[tokio::test]
async fn test_final_definition_is_deterministic() {
    let mut definitions = Vec::new();
    for _ in 0..2 {
        let client = client(default_opts());
        client.push_result(manifest_result(r#"{"workspaces": ["packages/*"]}"#));
        client.push_result(empty_result());
        install(&client, &CancellationToken::new()).await.unwrap();
        definitions.push(client.requests()[1].definition.to_bytes());
    }
    assert_eq!(definitions[0], definitions[1]);
}

#[tokio::test]
async fn test_cancel_during_final_solve() {
    let client = client(default_opts().with_opt("workspaces", "false")).hanging();
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = install(&client, &cancel).await.unwrap_err();
    assert!(matches!(
        err,
        InstallError::Cancelled {
            stage: Stage::Final
        }
    ));
}
