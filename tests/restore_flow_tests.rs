//! End-to-end tests for the guided restore workflow
//!
//! These run the full per-entry protocol against an in-memory backup
//! catalog, scripted operator decisions and canned claim phases, checking
//! the annotation value, the rollback guarantee and that one entry's
//! failure never stops the run.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use tempfile::TempDir;

use longhorn_pvc_restore::catalog::{backup_list_prefix, BackupCatalog, BackupRecord};
use longhorn_pvc_restore::cluster::ClaimOps;
use longhorn_pvc_restore::config::WaitOptions;
use longhorn_pvc_restore::error::{Error, Result};
use longhorn_pvc_restore::manifest::ManifestLocator;
use longhorn_pvc_restore::mapping::MappingEntry;
use longhorn_pvc_restore::prompt::{BackupChoice, Prompt};
use longhorn_pvc_restore::restore::{EntryOutcome, RestoreRunner, RESTORE_ANNOTATION};
use longhorn_pvc_restore::storage::ObjectStore;

// ============================================================================
// Test Doubles
// ============================================================================

/// In-memory object store seeded with Longhorn-style backup layouts.
#[derive(Default)]
struct MemoryStore {
    objects: HashMap<String, Vec<u8>>,
    prefixes: HashMap<String, Vec<String>>,
}

impl MemoryStore {
    fn with_backup(mut self, volume: &str, backup: &str, created: &str) -> Self {
        let cfg = format!(
            r#"{{"Name":"{}","VolumeName":"{}","Created":"{}"}}"#,
            backup, volume, created
        );
        self.add_backup_object(volume, backup, cfg.into_bytes());
        self
    }

    fn with_corrupt_backup(mut self, volume: &str, backup: &str) -> Self {
        self.add_backup_object(volume, backup, b"{not json".to_vec());
        self
    }

    fn add_backup_object(&mut self, volume: &str, backup: &str, body: Vec<u8>) {
        let prefix = backup_list_prefix(volume);
        self.prefixes
            .entry(prefix.clone())
            .or_default()
            .push(format!("{}{}/", prefix, backup));
        self.objects
            .insert(format!("{}{}/backup.cfg", prefix, backup), body);
    }
}

impl ObjectStore for MemoryStore {
    async fn list_common_prefixes(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self.prefixes.get(prefix).cloned().unwrap_or_default())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.get(key).cloned())
    }
}

/// Claim operations with a scripted phase sequence.
///
/// Each `phase` call pops the next scripted response; once the script is
/// exhausted the claim stays Pending forever.
#[derive(Clone, Default)]
struct FakeClaims {
    applied: Rc<RefCell<Vec<(String, PersistentVolumeClaim)>>>,
    phases: Rc<RefCell<VecDeque<Result<Option<String>>>>>,
}

impl FakeClaims {
    fn script_phase(&self, response: Result<Option<String>>) {
        self.phases.borrow_mut().push_back(response);
    }

    fn script_bound_after(&self, pending_polls: usize) {
        for _ in 0..pending_polls {
            self.script_phase(Ok(Some("Pending".to_string())));
        }
        self.script_phase(Ok(Some("Bound".to_string())));
    }

    fn applied(&self) -> Vec<(String, PersistentVolumeClaim)> {
        self.applied.borrow().clone()
    }
}

impl ClaimOps for FakeClaims {
    async fn apply(&self, namespace: &str, manifest: &PersistentVolumeClaim) -> Result<()> {
        self.applied
            .borrow_mut()
            .push((namespace.to_string(), manifest.clone()));
        Ok(())
    }

    async fn phase(&self, _name: &str, _namespace: &str) -> Result<Option<String>> {
        self.phases
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(Some("Pending".to_string())))
    }
}

/// Prompt that replays scripted decisions.
#[derive(Default)]
struct ScriptedPrompt {
    choices: VecDeque<BackupChoice>,
    selections: VecDeque<Option<usize>>,
    keep_answers: VecDeque<bool>,
}

impl ScriptedPrompt {
    fn choice(mut self, choice: BackupChoice) -> Self {
        self.choices.push_back(choice);
        self
    }

    fn selection(mut self, selection: Option<usize>) -> Self {
        self.selections.push_back(selection);
        self
    }

    fn keep(mut self, keep: bool) -> Self {
        self.keep_answers.push_back(keep);
        self
    }
}

impl Prompt for ScriptedPrompt {
    fn choose_backup(
        &mut self,
        _entry: &MappingEntry,
        _latest: &BackupRecord,
    ) -> Result<BackupChoice> {
        self.choices
            .pop_front()
            .ok_or_else(|| Error::Prompt("unexpected choose_backup".to_string()))
    }

    fn select_backup(&mut self, _backups: &[BackupRecord]) -> Result<Option<usize>> {
        self.selections
            .pop_front()
            .ok_or_else(|| Error::Prompt("unexpected select_backup".to_string()))
    }

    fn keep_annotation(&mut self, _manifest: &Path) -> Result<bool> {
        self.keep_answers
            .pop_front()
            .ok_or_else(|| Error::Prompt("unexpected keep_annotation".to_string()))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

const MANIFEST: &str = "apiVersion: v1\nkind: PersistentVolumeClaim\nmetadata:\n  name: media-data\nspec:\n  storageClassName: longhorn\n  accessModes:\n    - ReadWriteOnce\n";

fn entry(namespace: &str, pvc: &str, volume: &str) -> MappingEntry {
    MappingEntry {
        namespace: namespace.to_string(),
        pvc_name: pvc.to_string(),
        volume_name: volume.to_string(),
    }
}

/// Lay out `apps/<namespace>/pvc.yaml` declaring `pvc_name`.
fn manifest_tree(dir: &TempDir, namespace: &str, pvc_name: &str) -> PathBuf {
    let path = dir.path().join("apps").join(namespace).join("pvc.yaml");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, MANIFEST.replace("media-data", pvc_name)).unwrap();
    path
}

fn fast_wait() -> WaitOptions {
    WaitOptions {
        poll_interval: Duration::from_millis(1),
        timeout: Duration::from_millis(25),
    }
}

fn runner(
    store: MemoryStore,
    claims: FakeClaims,
    prompt: ScriptedPrompt,
    roots: Vec<PathBuf>,
) -> RestoreRunner<MemoryStore, FakeClaims, ScriptedPrompt> {
    RestoreRunner::new(
        BackupCatalog::new(store),
        claims,
        prompt,
        ManifestLocator::new(roots),
        "mybucket".to_string(),
        fast_wait(),
    )
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn accept_default_restores_and_keeps_annotation() {
    let dir = TempDir::new().unwrap();
    let manifest = manifest_tree(&dir, "media", "media-data");

    let store = MemoryStore::default().with_backup("ab12cd34e5f6", "backup-1", "2024-01-01T00:00:00Z");
    let claims = FakeClaims::default();
    claims.script_bound_after(1);

    let prompt = ScriptedPrompt::default()
        .choice(BackupChoice::AcceptLatest)
        .keep(true);

    let mut runner = runner(store, claims.clone(), prompt, vec![dir.path().join("apps")]);
    let outcomes = runner
        .run(&[entry("media", "media-data", "ab12cd34e5f6")])
        .await;

    assert_eq!(outcomes, vec![EntryOutcome::Restored]);

    // The applied claim carries the restore annotation.
    let applied = claims.applied();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].0, "media");
    let annotations = applied[0].1.metadata.annotations.as_ref().unwrap();
    assert_eq!(
        annotations.get(RESTORE_ANNOTATION).map(String::as_str),
        Some("s3://mybucket@/longhorn/?backup=backup-1&volume=ab12cd34e5f6")
    );

    // Operator kept the annotation: file stays annotated, undo copy gone.
    let content = fs::read_to_string(&manifest).unwrap();
    assert!(content.contains("s3://mybucket@/longhorn/?backup=backup-1&volume=ab12cd34e5f6"));
    let mut bak = manifest.clone().into_os_string();
    bak.push(".bak");
    assert!(!PathBuf::from(bak).exists());
}

#[tokio::test]
async fn bound_timeout_rolls_back_and_run_continues() {
    let dir = TempDir::new().unwrap();
    let manifest = manifest_tree(&dir, "media", "media-data");
    let original = fs::read(&manifest).unwrap();

    // First volume never binds (script exhausted => Pending forever); the
    // second entry has no backups and is skipped cleanly.
    let store = MemoryStore::default().with_backup("vol-stuck", "backup-1", "2024-01-01T00:00:00Z");
    let claims = FakeClaims::default();

    let prompt = ScriptedPrompt::default().choice(BackupChoice::AcceptLatest);

    let mut runner = runner(store, claims.clone(), prompt, vec![dir.path().join("apps")]);
    let outcomes = runner
        .run(&[
            entry("media", "media-data", "vol-stuck"),
            entry("media", "other-data", "vol-unseen"),
        ])
        .await;

    assert_eq!(outcomes, vec![EntryOutcome::Failed, EntryOutcome::NoBackups]);

    // Rollback restored the exact pre-transaction bytes.
    assert_eq!(fs::read(&manifest).unwrap(), original);

    // The apply did happen; no compensating delete is modeled.
    assert_eq!(claims.applied().len(), 1);
}

#[tokio::test]
async fn transient_status_errors_are_tolerated() {
    let dir = TempDir::new().unwrap();
    manifest_tree(&dir, "media", "media-data");

    let store = MemoryStore::default().with_backup("vol-1", "backup-1", "2024-01-01T00:00:00Z");
    let claims = FakeClaims::default();
    claims.script_phase(Err(Error::transaction("status read glitch")));
    claims.script_phase(Ok(Some("Bound".to_string())));

    let prompt = ScriptedPrompt::default()
        .choice(BackupChoice::AcceptLatest)
        .keep(false);

    let mut runner = runner(store, claims, prompt, vec![dir.path().join("apps")]);
    let outcomes = runner.run(&[entry("media", "media-data", "vol-1")]).await;

    assert_eq!(outcomes, vec![EntryOutcome::Restored]);
}

#[tokio::test]
async fn cleanup_restore_choice_reverts_manifest_after_success() {
    let dir = TempDir::new().unwrap();
    let manifest = manifest_tree(&dir, "media", "media-data");
    let original = fs::read(&manifest).unwrap();

    let store = MemoryStore::default().with_backup("vol-1", "backup-1", "2024-01-01T00:00:00Z");
    let claims = FakeClaims::default();
    claims.script_bound_after(0);

    let prompt = ScriptedPrompt::default()
        .choice(BackupChoice::AcceptLatest)
        .keep(false);

    let mut runner = runner(store, claims, prompt, vec![dir.path().join("apps")]);
    let outcomes = runner.run(&[entry("media", "media-data", "vol-1")]).await;

    assert_eq!(outcomes, vec![EntryOutcome::Restored]);
    assert_eq!(fs::read(&manifest).unwrap(), original);
}

#[tokio::test]
async fn pick_from_list_uses_selected_backup() {
    let dir = TempDir::new().unwrap();
    manifest_tree(&dir, "media", "media-data");

    let store = MemoryStore::default()
        .with_backup("vol-1", "backup-new", "2024-03-01T00:00:00Z")
        .with_backup("vol-1", "backup-old", "2024-01-01T00:00:00Z");
    let claims = FakeClaims::default();
    claims.script_bound_after(0);

    // Index 1 in the newest-first list is the older backup.
    let prompt = ScriptedPrompt::default()
        .choice(BackupChoice::PickFromList)
        .selection(Some(1))
        .keep(true);

    let mut runner = runner(store, claims.clone(), prompt, vec![dir.path().join("apps")]);
    let outcomes = runner.run(&[entry("media", "media-data", "vol-1")]).await;

    assert_eq!(outcomes, vec![EntryOutcome::Restored]);
    let applied = claims.applied();
    let annotations = applied[0].1.metadata.annotations.as_ref().unwrap();
    assert_eq!(
        annotations.get(RESTORE_ANNOTATION).map(String::as_str),
        Some("s3://mybucket@/longhorn/?backup=backup-old&volume=vol-1")
    );
}

#[tokio::test]
async fn invalid_selection_skips_without_mutation() {
    let dir = TempDir::new().unwrap();
    let manifest = manifest_tree(&dir, "media", "media-data");
    let original = fs::read(&manifest).unwrap();

    let store = MemoryStore::default().with_backup("vol-1", "backup-1", "2024-01-01T00:00:00Z");
    let claims = FakeClaims::default();

    let prompt = ScriptedPrompt::default()
        .choice(BackupChoice::PickFromList)
        .selection(None);

    let mut runner = runner(store, claims.clone(), prompt, vec![dir.path().join("apps")]);
    let outcomes = runner.run(&[entry("media", "media-data", "vol-1")]).await;

    assert_eq!(outcomes, vec![EntryOutcome::Declined]);
    assert_eq!(fs::read(&manifest).unwrap(), original);
    assert!(claims.applied().is_empty());
}

#[tokio::test]
async fn decline_skips_without_mutation() {
    let dir = TempDir::new().unwrap();
    let manifest = manifest_tree(&dir, "media", "media-data");
    let original = fs::read(&manifest).unwrap();

    let store = MemoryStore::default().with_backup("vol-1", "backup-1", "2024-01-01T00:00:00Z");
    let claims = FakeClaims::default();

    let prompt = ScriptedPrompt::default().choice(BackupChoice::Decline);

    let mut runner = runner(store, claims.clone(), prompt, vec![dir.path().join("apps")]);
    let outcomes = runner.run(&[entry("media", "media-data", "vol-1")]).await;

    assert_eq!(outcomes, vec![EntryOutcome::Declined]);
    assert_eq!(fs::read(&manifest).unwrap(), original);
    assert!(claims.applied().is_empty());
}

#[tokio::test]
async fn corrupt_catalog_metadata_skips_entry_and_continues() {
    let dir = TempDir::new().unwrap();
    manifest_tree(&dir, "media", "media-data");
    manifest_tree(&dir, "media", "other-data");

    let store = MemoryStore::default()
        .with_corrupt_backup("vol-bad", "backup-1")
        .with_backup("vol-good", "backup-2", "2024-01-01T00:00:00Z");
    let claims = FakeClaims::default();
    claims.script_bound_after(0);

    // Only the second entry reaches the prompts.
    let prompt = ScriptedPrompt::default()
        .choice(BackupChoice::AcceptLatest)
        .keep(true);

    let mut runner = runner(store, claims, prompt, vec![dir.path().join("apps")]);
    let outcomes = runner
        .run(&[
            entry("media", "media-data", "vol-bad"),
            entry("media", "other-data", "vol-good"),
        ])
        .await;

    assert_eq!(
        outcomes,
        vec![EntryOutcome::CatalogError, EntryOutcome::Restored]
    );
}

#[tokio::test]
async fn missing_manifest_skips_entry() {
    let dir = TempDir::new().unwrap();

    let store = MemoryStore::default().with_backup("vol-1", "backup-1", "2024-01-01T00:00:00Z");
    let claims = FakeClaims::default();

    let prompt = ScriptedPrompt::default().choice(BackupChoice::AcceptLatest);

    let mut runner = runner(store, claims.clone(), prompt, vec![dir.path().join("apps")]);
    let outcomes = runner.run(&[entry("media", "media-data", "vol-1")]).await;

    assert_eq!(outcomes, vec![EntryOutcome::ManifestMissing]);
    assert!(claims.applied().is_empty());
}
