use redb::TableDefinition;

/// User records: uuid -> UserRecord (msgpack)
pub const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Email index: email -> user uuid (email is the login key)
pub const USER_EMAILS: TableDefinition<&str, &str> = TableDefinition::new("user_emails");

/// File records: uuid -> FileRecord (msgpack)
pub const FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

/// Slug index: slug -> file uuid
pub const FILE_SLUGS: TableDefinition<&str, &str> = TableDefinition::new("file_slugs");

/// Owner index: owner uuid -> msgpack Vec of file UUIDs
pub const OWNER_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_files");

/// Project records: uuid -> ProjectRecord (msgpack)
pub const PROJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("projects");

/// Slug index: slug -> project uuid
pub const PROJECT_SLUGS: TableDefinition<&str, &str> = TableDefinition::new("project_slugs");

/// Owner index: owner uuid -> msgpack Vec of project UUIDs
pub const OWNER_PROJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_projects");

/// Attachment relation: project uuid -> msgpack Vec of file UUIDs
pub const PROJECT_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("project_files");

/// Job records: uuid -> JobRecord (msgpack)
pub const JOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("jobs");
