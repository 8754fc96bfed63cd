use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use promptdex_index::{
    FixedRoot, IndexConfig, IndexPhase, IndexRefreshed, MemoryFileAccess, PromptIndex,
    RefreshReason,
};
use tokio::sync::broadcast::error::TryRecvError;

fn memory_tree() -> Arc<MemoryFileAccess> {
    let fs = Arc::new(MemoryFileAccess::new());
    fs.add_file("/prompts/hello.md", "---\ntitle: Hello\n---\nbody");
    fs.add_file("/prompts/coding/review.md", "# Review");
    fs
}

fn index_over(fs: &Arc<MemoryFileAccess>) -> PromptIndex {
    PromptIndex::new(
        fs.clone(),
        Arc::new(FixedRoot::new("/prompts")),
        IndexConfig::default(),
    )
    .unwrap()
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<IndexRefreshed>) -> Vec<RefreshReason> {
    let mut reasons = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => reasons.push(event.reason),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            Err(TryRecvError::Lagged(_)) => continue,
        }
    }
    reasons
}

#[tokio::test]
async fn test_get_structure_is_idempotent_without_io() {
    let fs = memory_tree();
    let index = index_over(&fs);

    let first = index.get_structure().await;
    let io_after_first = fs.counts();
    let second = index.get_structure().await;

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(fs.counts(), io_after_first);
    assert_eq!(index.stats().builds_started, 1);
    assert_eq!(first.prompt_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_share_one_build() {
    let fs = memory_tree();
    fs.set_latency(Some(Duration::from_millis(20)));
    let index = index_over(&fs);
    let mut events = index.subscribe();

    let mut requests = Vec::new();
    for i in 0..8 {
        let index = index.clone();
        requests.push(tokio::spawn(async move {
            if i % 2 == 0 {
                index.get_structure().await
            } else {
                index.build().await
            }
        }));
    }
    let results: Vec<_> = join_all(requests)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(index.stats().builds_started, 1);
    for result in &results[1..] {
        assert!(Arc::ptr_eq(&results[0], result));
    }
    assert_eq!(drain(&mut events).len(), 1);
    assert_eq!(index.phase(), IndexPhase::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_invalidation_burst_coalesces_into_one_rebuild() {
    let fs = memory_tree();
    let index = index_over(&fs);
    index.get_structure().await;
    let mut events = index.subscribe();

    let mut completions = Vec::new();
    for i in 0..5 {
        fs.add_file(format!("/prompts/new-{}.md", i), "# New");
        completions.push(index.invalidate(RefreshReason::FileChange));
        assert_eq!(index.phase(), IndexPhase::PendingDebounce);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(index.stats().builds_started, 1, "no rebuild inside the window");

    let results = join_all(completions).await;
    assert_eq!(index.stats().builds_started, 2);
    for result in &results[1..] {
        assert!(Arc::ptr_eq(&results[0], result));
    }
    assert_eq!(results[0].prompt_count(), 7);
    assert_eq!(drain(&mut events), vec![RefreshReason::FileChange]);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(index.stats().builds_started, 2);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_forced_rebuild_supersedes_pending_debounce() {
    let fs = memory_tree();
    let index = index_over(&fs);
    index.get_structure().await;
    let mut events = index.subscribe();

    fs.add_file("/prompts/moved.md", "# Moved");
    let debounced = index.invalidate(RefreshReason::FileChange);
    let forced = index.rebuild_now(RefreshReason::Manual).await;

    assert!(forced.find_prompt(Path::new("/prompts/moved.md")).is_some());
    assert!(Arc::ptr_eq(&forced, &debounced.await));
    assert!(Arc::ptr_eq(&forced, &index.get_structure().await));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(index.stats().builds_started, 2);
    assert_eq!(drain(&mut events), vec![RefreshReason::Manual]);
}

#[tokio::test(start_paused = true)]
async fn test_get_structure_promotes_pending_rebuild() {
    let fs = memory_tree();
    let index = index_over(&fs);
    index.get_structure().await;

    fs.remove("/prompts/coding");
    let debounced = index.invalidate(RefreshReason::FileChange);
    let now = index.get_structure().await;

    assert_eq!(now.prompt_count(), 1);
    assert!(now.folders.is_empty());
    assert!(Arc::ptr_eq(&now, &debounced.await));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(index.stats().builds_started, 2);
}

#[tokio::test(start_paused = true)]
async fn test_invalidation_during_build_rebuilds_after_it() {
    let fs = memory_tree();
    fs.set_latency(Some(Duration::from_millis(100)));
    let index = index_over(&fs);
    let mut events = index.subscribe();

    let first = tokio::spawn({
        let index = index.clone();
        async move { index.get_structure().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(index.phase(), IndexPhase::Building);

    fs.add_file("/prompts/late.md", "# Late");
    let follow_up = index.invalidate(RefreshReason::FileChange);

    first.await.unwrap();
    assert!(index.cached().is_none(), "stale build must not be cached");

    let second = follow_up.await;
    assert!(second.find_prompt(Path::new("/prompts/late.md")).is_some());
    assert!(Arc::ptr_eq(&second, &index.cached().unwrap()));
    assert_eq!(index.stats().builds_started, 2);
    assert_eq!(
        drain(&mut events),
        vec![RefreshReason::Initial, RefreshReason::FileChange]
    );
}

#[tokio::test]
async fn test_missing_root_yields_empty_structure_without_io() {
    let fs = memory_tree();
    let index = PromptIndex::new(fs.clone(), Arc::new(FixedRoot::none()), IndexConfig::default())
        .unwrap();

    let structure = index.get_structure().await;
    assert!(structure.is_empty());
    assert_eq!(fs.counts().total(), 0);
    assert_eq!(index.phase(), IndexPhase::Ready);
}

#[tokio::test]
async fn test_root_that_appears_later_is_picked_up_on_rebuild() {
    let fs = memory_tree();
    let root = Arc::new(std::sync::Mutex::new(None::<PathBuf>));
    let resolver = {
        let root = root.clone();
        move || root.lock().unwrap().clone()
    };
    let index = PromptIndex::new(fs.clone(), Arc::new(resolver), IndexConfig::default()).unwrap();

    assert!(index.get_structure().await.is_empty());

    *root.lock().unwrap() = Some(PathBuf::from("/prompts"));
    let structure = index.rebuild_now(RefreshReason::Manual).await;
    assert_eq!(structure.prompt_count(), 2);
}

#[tokio::test]
async fn test_unreadable_file_is_left_out() {
    let fs = memory_tree();
    fs.add_file("/prompts/locked.md", "# Locked");
    fs.fail_reads("/prompts/locked.md");
    let index = index_over(&fs);

    let structure = index.get_structure().await;
    assert_eq!(structure.prompt_count(), 2);
    assert!(structure.find_prompt(Path::new("/prompts/locked.md")).is_none());
    assert_eq!(index.stats().builds_failed, 0);
}
