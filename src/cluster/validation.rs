//! Stateless validation helpers.
//!
//! Free functions used by test suites to assert deployment-level
//! invariants: disruption budgets exist for every daemon role, data
//! distribution is even, and stateful daemons are actually backed by PVCs.

use std::collections::HashMap;

use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use tracing::{info, instrument, warn};

use crate::client::{CephCommands, CommandRunner};
use crate::cluster::topology::DaemonPod;
use crate::config::{
    DEFAULT_DEVICESET_PVC_NAME, DEFAULT_MON_PVC_NAME, HarnessConfig, MDS_PDB, MON_PDB,
    MON_POD_PATTERN, OSD_PDB, OSD_POD_PATTERN, STATUS_BOUND,
};
use crate::crd::StorageCluster;
use crate::error::{Error, Result};

/// Maximum acceptable balancer eval score for an optimized cluster.
const BALANCER_EVAL_LIMIT: f64 = 0.02;
/// Maximum acceptable spread between the busiest and idlest OSD, in PGs.
const PG_SPREAD_LIMIT: i64 = 5;

/// OSD count from the StorageCluster's primary device set:
/// `count × replica`.
pub async fn count_cluster_osd(client: Client, config: &HarnessConfig) -> Result<i32> {
    let api: Api<StorageCluster> = Api::namespaced(client, &config.namespace);
    let storage_cluster = api.get(&config.storage_cluster_name).await?;
    storage_cluster.osd_count()
}

/// Disruption-budget names a healthy cluster carries: one each for mds and
/// mon, and one per OSD.
fn expected_pdb_names(osd_count: i32) -> Vec<String> {
    let mut names = vec![MDS_PDB.to_string(), MON_PDB.to_string()];
    for i in 0..osd_count {
        names.push(format!("{OSD_PDB}{i}"));
    }
    names.sort();
    names
}

/// Verify that exactly the expected PodDisruptionBudgets exist.
#[instrument(skip(client, config), fields(namespace = %config.namespace))]
pub async fn validate_pdb_creation(client: Client, config: &HarnessConfig) -> Result<()> {
    let osd_count = count_cluster_osd(client.clone(), config).await?;
    let api: Api<PodDisruptionBudget> = Api::namespaced(client, &config.namespace);
    let mut actual: Vec<String> = api
        .list(&ListParams::default())
        .await?
        .items
        .iter()
        .map(ResourceExt::name_any)
        .collect();
    actual.sort();

    let expected = expected_pdb_names(osd_count);
    if actual != expected {
        return Err(Error::Validation(format!(
            "PodDisruptionBudget mismatch: expected {expected:?}, found {actual:?}"
        )));
    }
    info!(count = expected.len(), "All PodDisruptionBudgets present");
    Ok(())
}

fn all_above_threshold(utilization: &HashMap<String, f64>, threshold: f64) -> bool {
    utilization.iter().all(|(osd, used)| {
        if *used < threshold {
            warn!(%osd, used, threshold, "OSD below utilization threshold");
            false
        } else {
            true
        }
    })
}

/// Whether every OSD's utilization is at or above `threshold` percent.
pub async fn validate_osd_utilization<R: CommandRunner>(
    commands: &CephCommands<R>,
    threshold: f64,
) -> Result<bool> {
    let utilization = commands.get_osd_utilization().await?;
    Ok(all_above_threshold(&utilization, threshold))
}

fn pg_spread_ok(pgs: &HashMap<String, i64>) -> bool {
    let Some(max) = pgs.values().copied().max() else {
        return true;
    };
    let Some(min) = pgs.values().copied().min() else {
        return true;
    };
    max - min <= PG_SPREAD_LIMIT
}

/// Judge PG balancing quality.
///
/// Returns `None` when the balancer is inactive or not in `upmap` mode (no
/// judgement possible), otherwise `Some(true)` iff the eval score is within
/// [`BALANCER_EVAL_LIMIT`] and the per-OSD PG spread is within
/// [`PG_SPREAD_LIMIT`].
#[instrument(skip(commands))]
pub async fn validate_pg_balancer<R: CommandRunner>(
    commands: &CephCommands<R>,
) -> Result<Option<bool>> {
    let status = commands.balancer_status().await?;
    if !status.active || status.mode != "upmap" {
        warn!(active = status.active, mode = %status.mode, "Balancer not judging");
        return Ok(None);
    }

    let eval = commands.balancer_eval().await?;
    let pgs = commands.get_pgs_per_osd().await?;
    let balanced = eval <= BALANCER_EVAL_LIMIT && pg_spread_ok(&pgs);
    info!(eval, balanced, "PG balancer judged");
    Ok(Some(balanced))
}

/// Verify mon and osd-prepare pods are backed by Bound PVCs.
///
/// On local-storage deployments the device-set claim count is not compared
/// against the prepare-pod count; device paths vary per node there.
#[instrument(skip(client, config), fields(namespace = %config.namespace))]
pub async fn validate_cluster_on_pvc(client: Client, config: &HarnessConfig) -> Result<()> {
    let pvcs: Api<PersistentVolumeClaim> = Api::namespaced(client.clone(), &config.namespace);
    let mut bound = Vec::new();
    let mut deviceset_claims = 0usize;
    let mut mon_claims = 0usize;
    for pvc in pvcs.list(&ListParams::default()).await?.items {
        let name = pvc.name_any();
        let is_deviceset = name.starts_with(DEFAULT_DEVICESET_PVC_NAME);
        let is_mon = !is_deviceset && name.starts_with(DEFAULT_MON_PVC_NAME);
        if !is_deviceset && !is_mon {
            continue;
        }
        let phase = pvc
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or_default();
        if phase != STATUS_BOUND {
            return Err(Error::Validation(format!("PVC {name} is {phase}, not Bound")));
        }
        if is_deviceset {
            deviceset_claims += 1;
        } else {
            mon_claims += 1;
        }
        bound.push(name);
    }

    let pods: Api<Pod> = Api::namespaced(client, &config.namespace);
    let all: Vec<DaemonPod> = pods
        .list(&ListParams::default())
        .await?
        .items
        .iter()
        .map(DaemonPod::from_pod)
        .collect();
    let osd_prepare_prefix = format!("{OSD_POD_PATTERN}-prepare");
    let mon_pods: Vec<&DaemonPod> = all
        .iter()
        .filter(|p| p.name.starts_with(MON_POD_PATTERN))
        .collect();
    let prepare_pods: Vec<&DaemonPod> = all
        .iter()
        .filter(|p| p.name.starts_with(&osd_prepare_prefix))
        .collect();

    for pod in mon_pods.iter().chain(prepare_pods.iter()) {
        if !pod.pvc_claims.iter().any(|claim| bound.contains(claim)) {
            return Err(Error::Validation(format!(
                "Pod {} mounts no Bound mon or device-set PVC",
                pod.name
            )));
        }
    }

    if !config.local_storage {
        if mon_claims != mon_pods.len() {
            return Err(Error::Validation(format!(
                "{} mon PVCs for {} mon pods",
                mon_claims,
                mon_pods.len()
            )));
        }
        if deviceset_claims != prepare_pods.len() {
            return Err(Error::Validation(format!(
                "{} device-set PVCs for {} osd-prepare pods",
                deviceset_claims,
                prepare_pods.len()
            )));
        }
    }

    info!(
        mon_claims,
        deviceset_claims, "Mon and OSD pods verified on PVC"
    );
    Ok(())
}
