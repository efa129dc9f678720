pub mod quoter;

pub use quoter::PriceQuoter;
