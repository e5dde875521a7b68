pub mod db_utils;
pub mod reference_cache;
pub mod upload;
