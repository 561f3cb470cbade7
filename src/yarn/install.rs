use super::{cancellable, compose, context_source, control_cache, discover_patterns};
use crate::config::InstallConfig;
use crate::error::{InstallError, Stage};
use crate::gateway::{Client, SolveRequest, SolveResult};
use crate::llb::State;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Frontend entry point: discovers workspaces, composes the install graph and
/// solves it with `client`.
pub async fn install(
    client: &dyn Client,
    cancel: &CancellationToken,
) -> Result<SolveResult, InstallError> {
    let config = InstallConfig::from_build_opts(client.build_opts())?;
    let state = new_state(client, &config, cancel).await?;

    let definition = state
        .marshal(&client.build_opts().llb_caps)
        .map_err(|source| InstallError::Compose {
            stage: Stage::Final,
            source,
        })?;

    info!(
        image = %config.image,
        ops = definition.len(),
        "Solving install definition"
    );

    cancellable(Stage::Final, cancel, async {
        client
            .solve(SolveRequest { definition })
            .await
            .map_err(|source| InstallError::Resolve {
                stage: Stage::Final,
                source,
            })
    })
    .await
}

/// Discovery and composition without the final solve
pub async fn new_state(
    client: &dyn Client,
    config: &InstallConfig,
    cancel: &CancellationToken,
) -> Result<State, InstallError> {
    let context = context_source(config.lockfile);

    let patterns = if config.workspaces {
        discover_patterns(client, &context, cancel).await?
    } else {
        debug!("Workspace discovery disabled");
        Vec::new()
    };

    compose(
        &context,
        &patterns,
        &config.image,
        control_cache(client.build_opts()),
    )
    .map_err(|source| InstallError::Compose {
        stage: Stage::Final,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{BuildOpts, GatewayError, MemoryRef, MockClient};
    use crate::llb::{pb, CapSet};
    use std::sync::Arc;

    fn manifest_result(manifest: &str) -> SolveResult {
        SolveResult::with_ref(Arc::new(
            MemoryRef::new().with_file("package.json", manifest.to_string()),
        ))
    }

    fn image_identifiers(request: &SolveRequest) -> Vec<String> {
        request
            .definition
            .ops()
            .unwrap()
            .into_iter()
            .filter_map(|op| match op.op {
                Some(pb::op::Op::Source(source)) if source.identifier.starts_with("docker-image://") => {
                    Some(source.identifier)
                }
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_install_solves_twice() {
        let client = MockClient::new(BuildOpts::new(CapSet::all()));
        client.push_result(manifest_result("{}"));
        client.push_result(SolveResult::with_ref(Arc::new(MemoryRef::new())));

        let result = install(&client, &CancellationToken::new()).await.unwrap();
        assert!(result.single_ref().is_ok());

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert!(image_identifiers(&requests[0]).is_empty());
        assert_eq!(
            image_identifiers(&requests[1]),
            vec!["docker-image://docker.io/library/node:alpine"]
        );
    }

    #[tokio::test]
    async fn test_workspaces_disabled_skips_discovery() {
        let client = MockClient::new(
            BuildOpts::new(CapSet::all()).with_opt(crate::config::OPT_WORKSPACES, "false"),
        );
        client.push_result(SolveResult::with_ref(Arc::new(MemoryRef::new())));

        install(&client, &CancellationToken::new()).await.unwrap();
        assert_eq!(client.solve_count(), 1);
    }

    #[tokio::test]
    async fn test_final_solve_failure_is_final_stage() {
        let client = MockClient::new(BuildOpts::new(CapSet::all()));
        client.push_result(manifest_result("{}"));
        client.push_error(GatewayError::Solve("yarn exited with 1".to_string()));

        let err = install(&client, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InstallError::Resolve {
                stage: Stage::Final,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_invalid_option_fails_before_solving() {
        let client = MockClient::new(
            BuildOpts::new(CapSet::all()).with_opt(crate::config::OPT_LOCKFILE, "bun.lockb"),
        );

        let err = install(&client, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Config(_)));
        assert_eq!(client.solve_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_discovery() {
        let client = MockClient::new(BuildOpts::new(CapSet::all()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = install(&client, &cancel).await.unwrap_err();
        assert!(matches!(
            err,
            InstallError::Cancelled {
                stage: Stage::Discovery
            }
        ));
        assert_eq!(client.solve_count(), 0);
    }
}
