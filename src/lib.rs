pub mod booru;
pub mod config;
pub mod observability;
pub mod wallpaper;
pub mod worker;
