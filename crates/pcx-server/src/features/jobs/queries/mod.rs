pub mod overview;

pub use overview::{GetOverviewQuery, OverviewResponse};
