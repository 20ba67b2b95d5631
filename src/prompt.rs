//! Operator interaction
//!
//! The restore workflow is decision-agnostic: every point where it needs the
//! operator is a method on the `Prompt` trait, so tests drive the workflow
//! with scripted decisions. `ConsolePrompt` is the line-oriented stdin
//! implementation used by the binary.

use std::io::{self, Write};
use std::path::Path;

use crate::catalog::BackupRecord;
use crate::error::{Error, Result};
use crate::mapping::MappingEntry;

/// Display format for backup timestamps
const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Operator response to the latest-backup suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupChoice {
    /// Restore the most recent backup
    AcceptLatest,
    /// Show the full list and pick by number
    PickFromList,
    /// Skip this claim entirely
    Decline,
}

/// Decision points the restore workflow suspends on
pub trait Prompt {
    /// Offer the most recent backup for a claim.
    fn choose_backup(&mut self, entry: &MappingEntry, latest: &BackupRecord)
        -> Result<BackupChoice>;

    /// Let the operator pick one backup from the full list.
    /// `None` means no valid selection was made.
    fn select_backup(&mut self, backups: &[BackupRecord]) -> Result<Option<usize>>;

    /// Final cleanup-or-keep choice: `true` keeps the annotated manifest
    /// (operator cleans up later), `false` restores the original.
    fn keep_annotation(&mut self, manifest: &Path) -> Result<bool>;
}

/// Line-oriented stdin prompt
#[derive(Default)]
pub struct ConsolePrompt;

impl ConsolePrompt {
    fn read_line(&self) -> Result<String> {
        io::stdout()
            .flush()
            .map_err(|e| Error::Prompt(e.to_string()))?;
        let mut line = String::new();
        io::stdin()
            .read_line(&mut line)
            .map_err(|e| Error::Prompt(e.to_string()))?;
        Ok(line.trim().to_lowercase())
    }
}

impl Prompt for ConsolePrompt {
    fn choose_backup(
        &mut self,
        entry: &MappingEntry,
        latest: &BackupRecord,
    ) -> Result<BackupChoice> {
        print!(
            " -> PVC '{}/{}': latest backup from {}. Restore? (y/n/list): ",
            entry.namespace,
            entry.pvc_name,
            latest.created_at.format(DISPLAY_FORMAT)
        );
        Ok(match self.read_line()?.as_str() {
            "y" => BackupChoice::AcceptLatest,
            "list" => BackupChoice::PickFromList,
            _ => BackupChoice::Decline,
        })
    }

    fn select_backup(&mut self, backups: &[BackupRecord]) -> Result<Option<usize>> {
        println!(" -> Available backups:");
        for (i, backup) in backups.iter().enumerate() {
            println!(
                "   [{}] {} ({})",
                i + 1,
                backup.name,
                backup.created_at.format(DISPLAY_FORMAT)
            );
        }
        print!("Choose a backup number: ");

        let input = self.read_line()?;
        match input.parse::<usize>() {
            Ok(n) if (1..=backups.len()).contains(&n) => Ok(Some(n - 1)),
            _ => Ok(None),
        }
    }

    fn keep_annotation(&mut self, manifest: &Path) -> Result<bool> {
        print!(
            " -> Restore original manifest {} (removes annotation)? (y/n): ",
            manifest.display()
        );
        Ok(self.read_line()?.as_str() != "y")
    }
}
