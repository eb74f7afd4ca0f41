pub mod category;
pub mod input;
pub mod payload;
pub mod quote;
pub mod version;
pub mod view;
