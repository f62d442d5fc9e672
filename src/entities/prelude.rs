pub use super::file_metadata::Entity as FileMetadataRecords;
