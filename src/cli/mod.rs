pub mod dates;
pub mod run;
