//! Grouped merging for large inputs.
//!
//! Inputs are split into contiguous groups, each group is merged on its own,
//! and the group outputs are merged into the final file. Everything the
//! batch creates lives in one uniquely named directory under the work
//! directory, removed on success and on failure.

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use tempfile::Builder;

use super::scope::unique_token;
use super::{ClipMerger, FallbackChain, MergeError, MergeOutcome, MergeResult};
use crate::compat::{analyze, CompatibilityReport};
use crate::inspect::{inspect_all, Inspection};
use crate::models::MergeStrategy;

/// Split `count` items into contiguous ranges of at most `group_size`.
/// Only the last range may be shorter.
pub fn partition(count: usize, group_size: usize) -> Vec<Range<usize>> {
    let size = group_size.max(1);
    (0..count)
        .step_by(size)
        .map(|start| start..(start + size).min(count))
        .collect()
}

pub(super) fn merge_batched(
    merger: &ClipMerger<'_>,
    inspections: &[Inspection],
    report: CompatibilityReport,
    output: &Path,
) -> MergeResult<MergeOutcome> {
    let count = inspections.len();

    if count <= merger.group_size {
        // Few but large inputs: no grouping to gain, merge directly.
        let chain = merger.selector.select_leaf(&report);
        let paths: Vec<PathBuf> = inspections.iter().map(|i| i.path.clone()).collect();
        let (strategy, attempts) = merger.run_chain(&chain, &paths, output, report.total_bytes)?;
        return Ok(MergeOutcome {
            output: output.to_path_buf(),
            report,
            chain,
            strategy,
            attempts,
            groups: None,
        });
    }

    let ranges = partition(count, merger.group_size);
    let sizes: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
    tracing::info!("Batching {} clips into groups of {:?}", count, sizes);
    if let Some(logger) = merger.logger {
        logger.section(&format!("Batch merge: {} groups", ranges.len()));
    }

    let batch_dir = Builder::new()
        .prefix(&format!("batch_{}_", unique_token()))
        .tempdir_in(&merger.work_dir)
        .map_err(|e| MergeError::io("create batch directory", e))?;

    let mut attempts = Vec::new();
    let mut group_outputs = Vec::with_capacity(ranges.len());

    for (index, range) in ranges.into_iter().enumerate() {
        let group = &inspections[range];
        let group_output = batch_dir.path().join(format!("group_{:03}.mp4", index));

        if let [single] = group {
            fs::copy(&single.path, &group_output).map_err(|e| {
                MergeError::io(format!("copy {} into batch", single.path.display()), e)
            })?;
        } else {
            let group_report = analyze(group);
            let chain = merger.selector.select_leaf(&group_report);
            let paths: Vec<PathBuf> = group.iter().map(|i| i.path.clone()).collect();
            tracing::debug!("Group {} ({} clips): {}", index, group.len(), chain);

            let (_, group_attempts) = merger
                .run_chain(&chain, &paths, &group_output, group_report.total_bytes)
                .map_err(|e| MergeError::Group {
                    index,
                    source: Box::new(e),
                })?;
            attempts.extend(group_attempts);
        }
        group_outputs.push(group_output);
    }

    // Group outputs are new media; describe them afresh.
    let group_inspections = inspect_all(merger.inspector, &group_outputs);
    let final_merge = merger.merge_inspected(&group_inspections, output)?;
    attempts.extend(final_merge.attempts);

    let batch_path = batch_dir.path().to_path_buf();
    if let Err(e) = batch_dir.close() {
        tracing::warn!("Failed to remove {}: {}", batch_path.display(), e);
    }

    Ok(MergeOutcome {
        output: output.to_path_buf(),
        report,
        chain: FallbackChain::single(MergeStrategy::Batched),
        strategy: MergeStrategy::Batched,
        attempts,
        groups: Some(sizes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MergeSettings;
    use crate::testing::{touch_clips, FakeInspector, ScriptedEngine};
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn leftover_batches(work: &Path) -> usize {
        fs::read_dir(work)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_name().to_string_lossy().starts_with("batch_"))
                    .count()
            })
            .unwrap_or(0)
    }

    #[test]
    fn partition_keeps_order_and_short_tail() {
        let groups = partition(23, 10);
        assert_eq!(groups, vec![0..10, 10..20, 20..23]);
        assert!(partition(0, 10).is_empty());
        assert_eq!(partition(10, 10), vec![0..10]);
    }

    #[test]
    fn twenty_three_clips_merge_in_three_groups() {
        let dir = tempdir().unwrap();
        let clips = touch_clips(dir.path(), 23);
        let work = dir.path().join("work");
        let inspector = FakeInspector::new();
        let engine = ScriptedEngine::succeeding();
        let merger = ClipMerger::new(&inspector, &engine, &MergeSettings::default(), &work);

        let output = dir.path().join("final.mp4");
        let outcome = merger.merge(&clips, &output).unwrap();

        assert_eq!(outcome.strategy, MergeStrategy::Batched);
        assert_eq!(outcome.groups, Some(vec![10, 10, 3]));
        assert_eq!(engine.start_count(), 4);
        assert!(output.exists());

        let first: Vec<String> = (0..10).map(|i| format!("clip_{:03}.mp4", i)).collect();
        assert_eq!(engine.manifest_names(0), first);
        assert_eq!(
            engine.manifest_names(2),
            vec!["clip_020.mp4", "clip_021.mp4", "clip_022.mp4"]
        );
        assert_eq!(
            engine.manifest_names(3),
            vec!["group_000.mp4", "group_001.mp4", "group_002.mp4"]
        );
        assert_eq!(leftover_batches(&work), 0);
    }

    #[test]
    fn single_clip_group_is_copied() {
        let dir = tempdir().unwrap();
        let clips = touch_clips(dir.path(), 21);
        let work = dir.path().join("work");
        let inspector = FakeInspector::new();
        let engine = ScriptedEngine::succeeding();
        let merger = ClipMerger::new(&inspector, &engine, &MergeSettings::default(), &work);

        let outcome = merger.merge(&clips, &dir.path().join("final.mp4")).unwrap();

        assert_eq!(outcome.groups, Some(vec![10, 10, 1]));
        // two group merges plus the final merge
        assert_eq!(engine.start_count(), 3);
        assert_eq!(engine.manifest_names(2)[2], "group_002.mp4");
    }

    #[test]
    fn group_failure_cleans_batch_directory() {
        let dir = tempdir().unwrap();
        let clips = touch_clips(dir.path(), 12);
        let work = dir.path().join("work");
        let inspector = FakeInspector::new();
        let engine = ScriptedEngine::always_failing("Invalid data found when processing input");
        let merger = ClipMerger::new(&inspector, &engine, &MergeSettings::default(), &work);

        let err = merger.merge(&clips, &dir.path().join("final.mp4")).unwrap_err();

        match &err {
            MergeError::Group { index, source } => {
                assert_eq!(*index, 0);
                assert!(matches!(**source, MergeError::ChainExhausted { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.attempts().len(), 3);
        assert_eq!(leftover_batches(&work), 0);
    }

    #[test]
    fn large_volume_with_few_clips_merges_directly() {
        let dir = tempdir().unwrap();
        let clips = touch_clips(dir.path(), 2);
        let settings = MergeSettings {
            volume_threshold_mb: 0,
            ..MergeSettings::default()
        };
        let inspector = FakeInspector::new();
        let engine = ScriptedEngine::succeeding();
        let merger = ClipMerger::new(&inspector, &engine, &settings, dir.path().join("work"));

        let outcome = merger.merge(&clips, &dir.path().join("final.mp4")).unwrap();

        assert_eq!(outcome.strategy, MergeStrategy::StreamCopy);
        assert_eq!(outcome.groups, None);
        assert_eq!(engine.start_count(), 1);
        assert_eq!(leftover_batches(&dir.path().join("work")), 0);
    }

    proptest! {
        #[test]
        fn partition_covers_every_index_once(count in 0usize..200, size in 1usize..20) {
            let groups = partition(count, size);
            let flat: Vec<usize> = groups.iter().cloned().flatten().collect();
            prop_assert_eq!(flat, (0..count).collect::<Vec<_>>());
            if let Some((last, rest)) = groups.split_last() {
                prop_assert!(rest.iter().all(|g| g.len() == size));
                prop_assert!(!last.is_empty() && last.len() <= size);
            }
        }
    }
}
