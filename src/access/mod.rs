pub mod resolver;
pub mod gateway;

pub use resolver::{AccessDecision, AccessResolver};
pub use gateway::{ChapterView, ContentGateway, ContentView};
