pub mod cache;
pub mod markers;
pub mod opensubtitles;
pub mod reference;
