pub mod conf_helper;
pub mod csv_helper;
