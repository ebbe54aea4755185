//! Partition assignment and rebalancing algorithms.
//!
//! Three free functions for deterministic partition distribution:
//! - `compute_assignment()`: modulo-based partition ownership with round-robin backups
//! - `plan_rebalance()`: diff current state against target to produce migration tasks
//! - `order_migrations()`: sort migrations for availability preservation

use super::state::ClusterPartitionTable;
use super::types::{MemberInfo, MigrationTask, NodeState, PartitionAssignment};

/// Computes a deterministic partition assignment for the given active members.
///
/// Uses modulo-based distribution with lexicographic node ordering for
/// reproducibility. Backup replicas are assigned round-robin from the next
/// `backup_count` members after the owner (wrapping around).
///
/// Returns an empty Vec if no active members exist.
#[must_use]
pub fn compute_assignment(
    members: &[MemberInfo],
    partition_count: u32,
    backup_count: u32,
) -> Vec<PartitionAssignment> {
    // Filter to Active members only and sort by node_id for determinism.
    let mut active: Vec<&MemberInfo> = members
        .iter()
        .filter(|m| m.state == NodeState::Active)
        .collect();
    active.sort_by(|a, b| a.node_id.cmp(&b.node_id));

    let n = active.len();
    if n == 0 {
        return Vec::new();
    }

    let mut assignments = Vec::with_capacity(partition_count as usize);

    for pid in 0..partition_count {
        let owner_idx = (pid as usize) % n;
        let owner = active[owner_idx].node_id.clone();

        // Assign backups from the next members in the sorted list (wrapping).
        // Skip if only 1 active member -- backup must be on a different node.
        let mut backups = Vec::new();
        if n > 1 {
            let actual_backup_count = (backup_count as usize).min(n - 1);
            for i in 1..=actual_backup_count {
                let backup_idx = (owner_idx + i) % n;
                backups.push(active[backup_idx].node_id.clone());
            }
        }

        assignments.push(PartitionAssignment {
            partition_id: pid,
            owner,
            backups,
        });
    }

    assignments
}

/// Plans migration tasks to transition from current partition state to target.
///
/// Compares each target assignment against the current partition table. If the
/// owner differs, a `MigrationTask` is created. Partitions with no current
/// entry in the table are skipped -- unassigned partitions should be populated
/// via `apply_assignments()` directly, not through migration (there is no
/// source node to migrate from).
///
/// Returns migrations sorted by `partition_id` for deterministic ordering.
#[must_use]
pub fn plan_rebalance(
    current: &ClusterPartitionTable,
    target: &[PartitionAssignment],
) -> Vec<MigrationTask> {
    let mut tasks = Vec::new();

    for assignment in target {
        // Skip partitions with no current entry -- no source to migrate from.
        let Some(current_meta) = current.get_partition(assignment.partition_id) else {
            continue;
        };

        // Only create a migration if the owner is changing.
        if current_meta.owner != assignment.owner {
            tasks.push(MigrationTask {
                partition_id: assignment.partition_id,
                source: current_meta.owner.clone(),
                destination: assignment.owner.clone(),
                new_backups: assignment.backups.clone(),
            });
        }
    }

    // Sort by partition_id for deterministic ordering.
    tasks.sort_by_key(|t| t.partition_id);
    tasks
}

/// Orders migration tasks for availability preservation.
///
/// Sorts migrations to minimize data loss risk:
/// 1. Backup promotions first (destination is already a backup of the partition)
/// 2. Partitions with fewer total replicas migrate first (most at risk)
pub fn order_migrations(tasks: &mut [MigrationTask], partition_table: &ClusterPartitionTable) {
    tasks.sort_by(|a, b| {
        let a_is_promotion = is_backup_promotion(a, partition_table);
        let b_is_promotion = is_backup_promotion(b, partition_table);

        // Backup promotions first.
        match (a_is_promotion, b_is_promotion) {
            (true, false) => return std::cmp::Ordering::Less,
            (false, true) => return std::cmp::Ordering::Greater,
            _ => {}
        }

        // Fewer replicas migrate first (most at risk of data loss).
        let a_replicas = replica_count(a.partition_id, partition_table);
        let b_replicas = replica_count(b.partition_id, partition_table);

        a_replicas
            .cmp(&b_replicas)
            .then_with(|| a.partition_id.cmp(&b.partition_id))
    });
}

/// Returns `true` if the migration destination is already a backup for the partition.
fn is_backup_promotion(task: &MigrationTask, table: &ClusterPartitionTable) -> bool {
    table
        .get_partition(task.partition_id)
        .is_some_and(|meta| meta.backups.contains(&task.destination))
}

/// Returns the total replica count (owner + backups) for a partition.
fn replica_count(partition_id: u32, table: &ClusterPartitionTable) -> usize {
    table
        .get_partition(partition_id)
        .map_or(0, |meta| 1 + meta.backups.len())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
