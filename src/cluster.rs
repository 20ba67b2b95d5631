//! Cluster control-plane access for the restore workflow
//!
//! The restore transaction needs exactly two things from the cluster: apply
//! a claim manifest into a namespace and read a claim's status phase. They
//! sit behind a trait so the wait/rollback logic can run against canned
//! phases in tests.

use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;

use crate::error::{Error, Result};

/// Field manager recorded for server-side applies
const FIELD_MANAGER: &str = "longhorn-pvc-restore";

/// Claim status phase meaning a volume is provisioned and attached
pub const BOUND_PHASE: &str = "Bound";

/// Claim operations used by the restore transaction
pub trait ClaimOps {
    /// Apply a claim manifest into a namespace (declarative, server-side).
    fn apply(
        &self,
        namespace: &str,
        manifest: &PersistentVolumeClaim,
    ) -> impl std::future::Future<Output = Result<()>>;

    /// Read a claim's current status phase, `None` when not reported yet.
    fn phase(
        &self,
        name: &str,
        namespace: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>>>;
}

/// `ClaimOps` backed by a real Kubernetes client
#[derive(Clone)]
pub struct KubeClaims {
    client: Client,
}

impl KubeClaims {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl ClaimOps for KubeClaims {
    async fn apply(&self, namespace: &str, manifest: &PersistentVolumeClaim) -> Result<()> {
        let name = manifest
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| Error::transaction("manifest has no metadata.name"))?;

        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        api.patch(
            name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(manifest),
        )
        .await?;
        Ok(())
    }

    async fn phase(&self, name: &str, namespace: &str) -> Result<Option<String>> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        let claim = api.get(name).await?;
        Ok(claim.status.and_then(|s| s.phase))
    }
}
