pub mod file_service;
pub mod ledger;
pub mod registry;
pub mod storage;
pub mod thumbnail_service;
pub mod worker;
