use chrono::{DateTime, Utc};
use redb::{ReadableTable, Table};

use super::db::{Database, DatabaseError};
use super::models::{FileRecord, UserId};
use super::tables::*;

/// Read the author index entry, defaulting to an empty list.
fn author_ids(
    table: &Table<'_, u64, &'static [u8]>,
    author_id: UserId,
) -> Result<Vec<String>, DatabaseError> {
    match table.get(author_id)? {
        Some(data) => Ok(rmp_serde::from_slice(data.value())?),
        None => Ok(Vec::new()),
    }
}

impl Database {
    // ========================================================================
    // File operations
    // ========================================================================

    /// Store a file record and update the author index
    pub fn put_file(&self, file: &FileRecord) -> Result<(), DatabaseError> {
        debug_assert!(!file.id.is_empty(), "file id must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(FILES)?;
            let data = rmp_serde::to_vec_named(file)?;
            table.insert(file.id.as_str(), data.as_slice())?;

            let mut author_table = write_txn.open_table(AUTHOR_FILES)?;
            let mut file_ids = author_ids(&author_table, file.author_id)?;
            if !file_ids.contains(&file.id) {
                file_ids.push(file.id.clone());
                let index_data = rmp_serde::to_vec_named(&file_ids)?;
                author_table.insert(file.author_id, index_data.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a file by its UUID
    pub fn get_file(&self, id: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        match table.get(id)? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    /// Get every file owned by an author, in insertion order
    pub fn get_files_by_author(&self, author_id: UserId) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let author_table = read_txn.open_table(AUTHOR_FILES)?;
        let files_table = read_txn.open_table(FILES)?;

        let file_ids: Vec<String> = match author_table.get(author_id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut files = Vec::with_capacity(file_ids.len());
        for file_id in file_ids {
            if let Some(data) = files_table.get(file_id.as_str())? {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                files.push(file);
            }
        }

        Ok(files)
    }

    /// Delete a file by its UUID and clean up the author index
    pub fn delete_file(&self, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let author_id: Option<UserId> = {
            let table = write_txn.open_table(FILES)?;
            let result = match table.get(id)? {
                Some(data) => {
                    let file: FileRecord = rmp_serde::from_slice(data.value())?;
                    Some(file.author_id)
                }
                None => None,
            };
            result
        };

        let deleted = match author_id {
            Some(author_id) => {
                {
                    let mut table = write_txn.open_table(FILES)?;
                    table.remove(id)?;
                }
                {
                    let mut author_table = write_txn.open_table(AUTHOR_FILES)?;
                    let mut ids = author_ids(&author_table, author_id)?;
                    ids.retain(|fid| fid != id);
                    if ids.is_empty() {
                        author_table.remove(author_id)?;
                    } else {
                        let new_data = rmp_serde::to_vec_named(&ids)?;
                        author_table.insert(author_id, new_data.as_slice())?;
                    }
                }
                true
            }
            None => false,
        };

        write_txn.commit()?;
        Ok(deleted)
    }

    /// Count every record owned by an author
    pub fn count_files_by_author(&self, author_id: UserId) -> Result<u64, DatabaseError> {
        let read_txn = self.begin_read()?;
        let author_table = read_txn.open_table(AUTHOR_FILES)?;

        match author_table.get(author_id)? {
            Some(data) => {
                let ids: Vec<String> = rmp_serde::from_slice(data.value())?;
                Ok(ids.len() as u64)
            }
            None => Ok(0),
        }
    }

    /// Count an author's records created within `[start, end)`
    pub fn count_files_by_author_between(
        &self,
        author_id: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let count = self
            .get_files_by_author(author_id)?
            .iter()
            .filter(|f| f.created_at >= start && f.created_at < end)
            .count();
        Ok(count as u64)
    }

    /// One page of an author's records, newest first, plus the author's total
    pub fn list_files_by_author(
        &self,
        author_id: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<FileRecord>, u64), DatabaseError> {
        let mut files = self.get_files_by_author(author_id)?;
        let total = files.len() as u64;

        files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let page = files.into_iter().skip(offset).take(limit).collect();

        Ok((page, total))
    }
}
