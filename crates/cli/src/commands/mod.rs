pub mod example;
pub mod list;
pub mod run;
