use chrono::{Duration, TimeZone, Utc};
use asset_converter::storage::models::{AssetKind, FileRecord};
use asset_converter::storage::Database;

fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    (dir, db)
}

fn sample_file(id: &str, author_id: u64) -> FileRecord {
    let now = Utc::now();
    FileRecord {
        id: id.to_string(),
        file_name: format!("castle-{id}.glb"),
        origin_file_path: format!("/upload/origin/{author_id}/castle-{id}.glb"),
        converted_file_path: format!("/upload/converted/{author_id}/castle-{id}.gltf"),
        author_id,
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn test_put_and_get_file() {
    let (_dir, db) = test_db();
    let file = sample_file("file-1", 7);

    db.put_file(&file).unwrap();

    let retrieved = db.get_file("file-1").unwrap().expect("file should exist");
    assert_eq!(retrieved.id, "file-1");
    assert_eq!(retrieved.author_id, 7);
    assert_eq!(retrieved.file_name, "castle-file-1.glb");
    assert_eq!(retrieved.origin_file_path, "/upload/origin/7/castle-file-1.glb");
    assert_eq!(
        retrieved.converted_file_path,
        "/upload/converted/7/castle-file-1.gltf"
    );
    assert_eq!(retrieved.created_at, file.created_at);
    assert_eq!(retrieved.kind(), Some(AssetKind::Glb));
}

#[test]
fn test_get_file_not_found() {
    let (_dir, db) = test_db();
    assert!(db.get_file("nonexistent").unwrap().is_none());
}

#[test]
fn test_delete_file() {
    let (_dir, db) = test_db();
    db.put_file(&sample_file("file-3", 7)).unwrap();

    assert!(db.delete_file("file-3").unwrap());
    assert!(db.get_file("file-3").unwrap().is_none());
    assert_eq!(db.count_files_by_author(7).unwrap(), 0);
    assert!(db.get_files_by_author(7).unwrap().is_empty());
}

#[test]
fn test_delete_file_not_found() {
    let (_dir, db) = test_db();
    assert!(!db.delete_file("nonexistent").unwrap());
}

#[test]
fn test_author_index_is_per_user() {
    let (_dir, db) = test_db();
    db.put_file(&sample_file("a-1", 1)).unwrap();
    db.put_file(&sample_file("a-2", 1)).unwrap();
    db.put_file(&sample_file("b-1", 2)).unwrap();

    assert_eq!(db.count_files_by_author(1).unwrap(), 2);
    assert_eq!(db.count_files_by_author(2).unwrap(), 1);
    assert_eq!(db.count_files_by_author(3).unwrap(), 0);

    let ids: Vec<String> = db
        .get_files_by_author(1)
        .unwrap()
        .into_iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(ids, vec!["a-1", "a-2"]);

    // Deleting one record leaves the other user's index alone
    assert!(db.delete_file("a-1").unwrap());
    assert_eq!(db.count_files_by_author(1).unwrap(), 1);
    assert_eq!(db.count_files_by_author(2).unwrap(), 1);
}

#[test]
fn test_put_same_id_twice_does_not_double_count() {
    let (_dir, db) = test_db();
    let mut file = sample_file("file-5", 4);
    db.put_file(&file).unwrap();

    file.updated_at = file.updated_at + Duration::seconds(5);
    db.put_file(&file).unwrap();

    assert_eq!(db.count_files_by_author(4).unwrap(), 1);
    let stored = db.get_file("file-5").unwrap().unwrap();
    assert_eq!(stored.updated_at, file.updated_at);
}

#[test]
fn test_count_between_is_half_open() {
    let (_dir, db) = test_db();
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

    for (id, created_at) in [
        ("before", start - Duration::seconds(1)),
        ("at-start", start),
        ("inside", start + Duration::days(10)),
        ("at-end", end),
    ] {
        let mut file = sample_file(id, 9);
        file.created_at = created_at;
        file.updated_at = created_at;
        db.put_file(&file).unwrap();
    }

    assert_eq!(db.count_files_by_author_between(9, start, end).unwrap(), 2);
    assert_eq!(db.count_files_by_author_between(8, start, end).unwrap(), 0);
}

#[test]
fn test_list_files_newest_first_with_pagination() {
    let (_dir, db) = test_db();
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    for i in 0..5 {
        let mut file = sample_file(&format!("file-{i}"), 3);
        file.created_at = base + Duration::minutes(i);
        db.put_file(&file).unwrap();
    }
    db.put_file(&sample_file("other", 4)).unwrap();

    let (page, total) = db.list_files_by_author(3, 2, 0).unwrap();
    assert_eq!(total, 5);
    let ids: Vec<&str> = page.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["file-4", "file-3"]);

    let (page, total) = db.list_files_by_author(3, 2, 4).unwrap();
    assert_eq!(total, 5);
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, "file-0");

    let (page, _) = db.list_files_by_author(3, 10, 10).unwrap();
    assert!(page.is_empty());
}

#[test]
fn test_purge_all() {
    let (_dir, db) = test_db();
    db.put_file(&sample_file("p-1", 1)).unwrap();
    db.put_file(&sample_file("p-2", 2)).unwrap();

    let stats = db.purge_all().unwrap();
    assert_eq!(stats.files, 2);
    assert!(db.get_file("p-1").unwrap().is_none());
    assert_eq!(db.count_files_by_author(1).unwrap(), 0);
    assert_eq!(db.count_files_by_author(2).unwrap(), 0);
}

#[test]
fn test_reopen_keeps_records() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    {
        let db = Database::open(&data_dir).unwrap();
        db.put_file(&sample_file("persisted", 11)).unwrap();
    }

    let db = Database::open(&data_dir).unwrap();
    assert!(db.get_file("persisted").unwrap().is_some());
    assert_eq!(db.count_files_by_author(11).unwrap(), 1);
}
