//! Archive of the best covering test per goal.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::Path;

use super::candidate::{Candidate, TestCase};
use super::goal::{GoalId, GoalSet};

/// Best-known covering candidate per covered goal.
///
/// Entries are never removed. An entry is replaced only by a candidate that
/// also covers the goal and is strictly smaller.
#[derive(Debug, Clone)]
pub struct Archive<T> {
    entries: BTreeMap<GoalId, Candidate<T>>,
}

impl<T> Default for Archive<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

/// Outcome of offering a candidate to the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveUpdate {
    /// First covering candidate for the goal.
    Inserted,
    /// Replaced a larger covering candidate.
    Replaced,
    /// Existing entry kept.
    Kept,
}

impl<T: TestCase> Archive<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a covering candidate for `goal`.
    pub fn offer(&mut self, goal: GoalId, candidate: &Candidate<T>) -> ArchiveUpdate {
        match self.entries.get_mut(&goal) {
            None => {
                self.entries.insert(goal, candidate.clone());
                ArchiveUpdate::Inserted
            }
            Some(existing) if candidate.size() < existing.size() => {
                *existing = candidate.clone();
                ArchiveUpdate::Replaced
            }
            Some(_) => ArchiveUpdate::Kept,
        }
    }

    pub fn get(&self, goal: GoalId) -> Option<&Candidate<T>> {
        self.entries.get(&goal)
    }

    pub fn contains(&self, goal: GoalId) -> bool {
        self.entries.contains_key(&goal)
    }

    /// All entries in goal order.
    pub fn iter(&self) -> impl Iterator<Item = (GoalId, &Candidate<T>)> {
        self.entries.iter().map(|(&goal, c)| (goal, c))
    }

    /// Distinct archived candidates, in goal order of first appearance.
    pub fn solutions(&self) -> Vec<Candidate<T>> {
        let mut seen = HashSet::new();
        self.entries
            .values()
            .filter(|c| seen.insert(c.id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Summarize the archive for export.
    pub fn export(&self, goals: &GoalSet) -> ArchiveExport {
        let entries = self
            .entries
            .iter()
            .map(|(&goal, candidate)| ArchivedGoal {
                goal,
                name: goals
                    .get(goal)
                    .map(|g| g.name().to_string())
                    .unwrap_or_default(),
                candidate_id: candidate.id,
                size: candidate.size(),
                generation: candidate.generation,
            })
            .collect();

        ArchiveExport {
            covered: self.entries.len(),
            total: goals.len(),
            entries,
        }
    }

    /// Write the archive summary as pretty JSON.
    pub fn save_json<P: AsRef<Path>>(&self, goals: &GoalSet, path: P) -> io::Result<()> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.export(goals))?;
        fs::write(path, json)
    }
}

/// Exported archive format.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ArchiveExport {
    /// Number of covered goals.
    pub covered: usize,
    /// Total number of goals.
    pub total: usize,
    /// One entry per covered goal.
    pub entries: Vec<ArchivedGoal>,
}

/// One archived goal for export.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ArchivedGoal {
    pub goal: GoalId,
    pub name: String,
    pub candidate_id: u64,
    pub size: usize,
    pub generation: usize,
}

/// Load an archive export from file.
pub fn load_archive_export<P: AsRef<Path>>(path: P) -> io::Result<ArchiveExport> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::candidate::testing::sized_probe;
    use crate::search::goal::GoalKind;
    use tempfile::tempdir;

    #[test]
    fn test_offer_replaces_only_strictly_smaller() {
        let mut archive = Archive::new();
        let goal = GoalId(0);

        assert_eq!(archive.offer(goal, &sized_probe(1, 5, &[0.0])), ArchiveUpdate::Inserted);
        assert_eq!(archive.offer(goal, &sized_probe(2, 5, &[0.0])), ArchiveUpdate::Kept);
        assert_eq!(archive.get(goal).map(|c| c.id), Some(1));

        assert_eq!(archive.offer(goal, &sized_probe(3, 2, &[0.0])), ArchiveUpdate::Replaced);
        assert_eq!(archive.get(goal).map(|c| c.id), Some(3));
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn test_solutions_are_distinct() {
        let mut archive = Archive::new();
        let shared = sized_probe(7, 1, &[0.0, 0.0]);
        archive.offer(GoalId(0), &shared);
        archive.offer(GoalId(1), &shared);
        archive.offer(GoalId(2), &sized_probe(8, 1, &[0.0, 0.0, 0.0]));

        let ids: Vec<u64> = archive.solutions().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![7, 8]);
    }

    #[test]
    fn test_save_and_load_export() {
        let mut builder = GoalSet::builder();
        let a = builder.add(GoalKind::Line, "line 1", vec![]);
        builder.add(GoalKind::Line, "line 2", vec![a]);
        let goals = builder.build().unwrap();

        let mut archive = Archive::new();
        archive.offer(a, &sized_probe(4, 3, &[0.0, 1.0]));

        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("archive.json");
        archive.save_json(&goals, &path).unwrap();

        let export = load_archive_export(&path).unwrap();
        assert_eq!(export.covered, 1);
        assert_eq!(export.total, 2);
        assert_eq!(export.entries[0].name, "line 1");
        assert_eq!(export.entries[0].candidate_id, 4);
    }
}
