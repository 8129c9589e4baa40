pub mod day;
pub mod reports;
pub mod rows;
pub mod table;
