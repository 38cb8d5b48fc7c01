pub mod deidentify;
pub mod export_mappings;
pub mod generate_ids;
pub mod init_history;
pub mod replace_ids;
pub mod shift_dates;
pub mod verify_id;
