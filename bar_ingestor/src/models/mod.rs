pub mod bar;
pub mod timeframe;
pub mod window;
