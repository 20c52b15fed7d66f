use std::sync::Arc;

use course_core::model::{CourseStatus, StudentId};
use services::{CatalogService, Clock, ProgressTracker};
use storage::repository::Storage;

async fn run_last_two_lessons_concurrently(storage: Storage) {
    let clock = Clock::default();
    let catalog = CatalogService::new(clock, Arc::clone(&storage.catalog));
    let tracker = ProgressTracker::from_storage(clock, &storage);
    let student = StudentId::new(11);

    let course_id = catalog
        .create_course("Concurrency".to_string(), None)
        .await
        .unwrap();
    let module_id = catalog
        .add_module(course_id, "Locks".to_string(), 0)
        .await
        .unwrap();
    let first = catalog
        .add_lesson(module_id, "Mutex".to_string(), 0)
        .await
        .unwrap();
    let second = catalog
        .add_lesson(module_id, "RwLock".to_string(), 1)
        .await
        .unwrap();

    let handle = tracker
        .find_or_create_course_progress(student, course_id)
        .await
        .unwrap();

    let a = {
        let tracker = tracker.clone();
        tokio::spawn(async move {
            tracker
                .record_lesson_completion(handle.progress_id, course_id, first)
                .await
        })
    };
    let b = {
        let tracker = tracker.clone();
        tokio::spawn(async move {
            tracker
                .record_lesson_completion(handle.progress_id, course_id, second)
                .await
        })
    };
    let (a, b) = tokio::join!(a, b);
    let a = a.expect("task a").expect("completion a");
    let b = b.expect("task b").expect("completion b");

    // Only the later of the two commits observes the full ratio.
    assert!(
        (a == CourseStatus::Completed) != (b == CourseStatus::Completed),
        "expected exactly one promotion: {a:?} / {b:?}"
    );

    let detail = tracker
        .get_detailed_progress(student, course_id)
        .await
        .unwrap();
    assert_eq!(detail.status, CourseStatus::Completed);
    assert_eq!(detail.completed_lesson_ids, vec![first, second]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_completions_in_memory() {
    run_last_two_lessons_concurrently(Storage::in_memory()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_completions_sqlite_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("progress.db").display());
    let storage = Storage::sqlite(&url).await.expect("connect sqlite");

    run_last_two_lessons_concurrently(storage).await;
}
