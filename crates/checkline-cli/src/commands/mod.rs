pub mod add;
pub mod edit;
pub mod list;
pub mod recurrence;
pub mod series;
pub mod show;
pub mod status;
