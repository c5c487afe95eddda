pub mod records;
pub mod tags;
