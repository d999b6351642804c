mod employee;
mod hour_entry;

pub use employee::*;
pub use hour_entry::*;
