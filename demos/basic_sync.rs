//! Basic sync example demonstrating the folder synchronization engine.

use std::error::Error;

use foldersync::config::{FolderPair, SyncConfig};
use foldersync::progress::{ErrorResolution, ProgressChannel, ProgressEvent};
use foldersync::{run_sync, ReturnCode};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    println!("Basic Sync Engine Example");
    println!("========================");

    let temp_dir = tempfile::TempDir::new()?;
    let left_dir = temp_dir.path().join("left");
    let right_dir = temp_dir.path().join("right");

    tokio::fs::create_dir_all(&left_dir).await?;
    tokio::fs::write(left_dir.join("file1.txt"), b"This is file 1 content").await?;
    tokio::fs::write(left_dir.join("file2.txt"), b"This is file 2 content").await?;

    tokio::fs::create_dir(left_dir.join("subdir")).await?;
    tokio::fs::write(left_dir.join("subdir").join("file3.txt"), b"This is file 3 content").await?;

    tokio::fs::create_dir_all(&right_dir).await?;

    println!("Left:  {}", left_dir.display());
    println!("Right: {}", right_dir.display());
    println!();

    // Example 1: mirror left onto right, watching progress over a channel.
    println!("Example 1: Mirror with progress reporting");
    println!("------------------------------------------");

    let pair = FolderPair::new(&left_dir, &right_dir);
    let config = SyncConfig::new(vec![pair]);

    let (observer, mut channel) = ProgressChannel::new(ErrorResolution::Ignore);
    let sync_task = tokio::spawn(async move { run_sync(&config, &observer).await });

    while let Some(event) = channel.recv().await {
        match event {
            ProgressEvent::PhaseStarted { phase, total_objects, .. } => {
                println!("  phase {phase:?} started, {total_objects} objects expected");
            }
            ProgressEvent::Status { text } => println!("  {text}"),
            ProgressEvent::Warning { text } => println!("  warning: {text}"),
            ProgressEvent::Error { text } => println!("  error: {text}"),
            _ => {}
        }
    }

    let log = sync_task.await??;
    println!("Sync finished with {:?}", log.worst_return_code());
    assert!(left_dir.join("subdir/file3.txt").exists());
    assert!(right_dir.join("file1.txt").exists());
    assert!(right_dir.join("subdir/file3.txt").exists());
    println!();

    // Example 2: a filtered mirror that only carries .txt files, with the
    // remaining side deletion set to the recycle bin instead of permanent.
    println!("Example 2: Extension filter");
    println!("----------------------------");

    tokio::fs::write(left_dir.join("notes.log"), b"noise").await?;
    let mut filtered_pair = FolderPair::new(&left_dir, &right_dir);
    filtered_pair.filter.exclude_patterns = vec!["**/*.log".to_string()];
    let filtered_config = SyncConfig::new(vec![filtered_pair]);

    let log = run_sync(&filtered_config, &foldersync::progress::NullProgressObserver).await?;
    assert!(!right_dir.join("notes.log").exists());
    assert_eq!(log.worst_return_code(), ReturnCode::Success);

    println!("Filtered sync completed, notes.log stayed on the left only.");
    println!();
    println!("All examples completed successfully!");

    Ok(())
}
