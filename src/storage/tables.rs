use redb::TableDefinition;

/// File records: uuid -> FileRecord (msgpack)
pub const FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

/// Author index: user id -> msgpack Vec of file UUIDs
pub const AUTHOR_FILES: TableDefinition<u64, &[u8]> = TableDefinition::new("author_files");
